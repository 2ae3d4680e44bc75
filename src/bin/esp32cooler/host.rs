// bin/esp32cooler/host.rs

use std::{env, net::Ipv4Addr};

use esp32cooler::*;
use log::*;
use tracing_subscriber::EnvFilter;

const HOST_API_PORT: u16 = 8080;

/// Same HTTP surface as on the device, with simulated sensors and cooler.
pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("esp32cooler {FW_VERSION} host simulator starting.");

    let mut config = MyConfig::default();
    config.port = match env::var("API_PORT") {
        Ok(p) => p.parse()?,
        Err(_) => HOST_API_PORT,
    };
    config.delay = 2;
    info!("My config:\n{config:#?}");

    let state = Box::pin(MyState::new(config, Box::new(SimulatedCooler))?);
    let shared_state = Arc::new(state);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(Box::pin(async move {
            *shared_state.net.write().await = NetInfo {
                ssid: "host".into(),
                mac: [0; 6],
                ip: Ipv4Addr::LOCALHOST,
            };
            *shared_state.wifi_up.write().await = true;

            info!("Entering main loop...");
            tokio::select! {
                r = Box::pin(poll_sensors(shared_state.clone(), SimulatedSensors::default())) => { error!("poll_sensors() ended: {r:?}"); }
                r = Box::pin(run_api_server(shared_state.clone())) => { error!("run_api_server() ended: {r:?}"); }
            };
        }));

    Ok(())
}

// EOF
