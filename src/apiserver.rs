// apiserver.rs

use askama::Template;
use axum::{
    Json, Router,
    body::Body,
    extract::{Form, Query, State},
    http::{Response, StatusCode},
    response::{Html, IntoResponse},
    routing::*,
};
pub use axum_macros::debug_handler;
use log::*;

use crate::*;

#[derive(Template)]
#[template(path = "target.html.ask", escape = "html")]
struct TargetPage {
    ip: String,
    port: u16,
    period: u32,
}

pub fn api_router(state: Arc<Pin<Box<MyState>>>) -> Router {
    Router::new()
        .route("/", get(get_index).fallback(not_found))
        .route("/status.json", get(get_status).fallback(not_found))
        .route("/temperature", get(get_temperature).fallback(not_found))
        .route("/light", get(get_light).fallback(not_found))
        .route("/value", get(get_value).fallback(not_found))
        .route("/set", get(get_set).fallback(not_found))
        .route("/target", post(post_target).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
}

pub async fn run_api_server(state: Arc<Pin<Box<MyState>>>) -> anyhow::Result<()> {
    loop {
        if *state.wifi_up.read().await {
            break;
        }
        sleep(Duration::from_secs(1)).await;
    }

    let listen = format!("0.0.0.0:{}", state.config.port);
    let addr = listen.parse::<net::SocketAddr>()?;

    let app = api_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening to {listen}");
    Ok(axum::serve(listener, app.into_make_service()).await?)
}

fn param_error(e: ParamError) -> Response<Body> {
    let status = match e {
        ParamError::Unknown { .. } => StatusCode::NOT_FOUND,
        ParamError::NoParameter | ParamError::Invalid { .. } => StatusCode::BAD_REQUEST,
    };
    warn!("Rejected request: {e:?}");
    (status, e.to_string()).into_response()
}

pub async fn not_found(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, &'static str) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} not_found()");
    (StatusCode::NOT_FOUND, "Not found")
}

pub async fn get_index(State(state): State<Arc<Pin<Box<MyState>>>>) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_index()");

    let snap = state.snapshot().await;
    let index = TemplateProcessor {
        config: &state.config,
        snap: &snap,
    }
    .render(INDEX_HTML);
    (StatusCode::OK, Html(index)).into_response()
}

pub async fn get_status(
    State(state): State<Arc<Pin<Box<MyState>>>>,
) -> (StatusCode, Json<StatusReport>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_status()");

    let snap = state.snapshot().await;
    (StatusCode::OK, Json(StatusReport::new(&state.config, &snap)))
}

pub async fn get_temperature(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, String) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_temperature()");

    let temperature = state.device.lock().await.temperature;
    (StatusCode::OK, format!("{temperature:.1}"))
}

pub async fn get_light(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, String) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_light()");

    let light = state.device.lock().await.light;
    (StatusCode::OK, light.to_string())
}

#[debug_handler]
pub async fn get_value(
    State(state): State<Arc<Pin<Box<MyState>>>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_value()");

    let fields = match parse_value_query(&params) {
        Err(e) => return param_error(e),
        Ok(f) => f,
    };
    let snap = state.snapshot().await;
    (StatusCode::OK, Json(ValueReply::new(&fields, &snap))).into_response()
}

#[debug_handler]
pub async fn get_set(
    State(state): State<Arc<Pin<Box<MyState>>>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_set()");

    // nothing is applied unless the whole query is valid
    let commands = match parse_set_query(&params) {
        Err(e) => return param_error(e),
        Ok(c) => c,
    };

    let mut device = state.device.lock().await;
    // switch the cooler first so a pin failure leaves the thresholds alone
    for cmd in &commands {
        if let SetCommand::Cool(on) = *cmd {
            if let Err(e) = device.set_cooler(on) {
                error!("Cooler output error: {e:?}");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Cooler output error").into_response();
            }
        }
    }
    for cmd in commands {
        match cmd {
            SetCommand::Cool(_) => {}
            SetCommand::HighThreshold(ht) => {
                info!("HT {} -> {ht}", device.high_threshold);
                device.high_threshold = ht;
            }
            SetCommand::LowThreshold(lt) => {
                info!("LT {} -> {lt}", device.low_threshold);
                device.low_threshold = lt;
            }
        }
    }
    (StatusCode::OK, "OK").into_response()
}

#[debug_handler]
pub async fn post_target(
    State(state): State<Arc<Pin<Box<MyState>>>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} post_target()");

    let update = match TargetForm::from_pairs(&pairs).validate() {
        Err(e) => return param_error(e),
        Ok(u) => u,
    };
    let target = {
        let mut target = state.target.write().await;
        target.apply(update);
        target.clone()
    };

    let page = TargetPage {
        ip: if target.is_set() {
            target.ip
        } else {
            "not set".into()
        },
        port: target.port,
        period: target.period,
    };
    match page.render() {
        Err(e) => {
            let err_msg = format!("Target template error: {e:?}\n");
            error!("{err_msg}");
            (StatusCode::INTERNAL_SERVER_ERROR, err_msg).into_response()
        }
        Ok(s) => (StatusCode::OK, Html(s)).into_response(),
    }
}

// EOF
