// bin/esp32cooler/esp.rs

use anyhow::anyhow;
use esp32cooler::*;
use esp_idf_hal::{
    adc::{
        attenuation::DB_11,
        oneshot::{config::AdcChannelConfig, AdcChannelDriver, AdcDriver},
    },
    delay::FreeRtos,
    gpio::{AnyInputPin, IOPin, Input, InputPin, OutputPin, PinDriver, Pull},
    prelude::Peripherals,
};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs, timer::EspTaskTimerService, wifi::WifiDriver};
use esp_idf_sys::{esp, esp_app_desc};
use log::*;
use one_wire_bus::OneWire;

const CONFIG_RESET_COUNT: i32 = 9;

esp_app_desc!();

pub fn run() -> anyhow::Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    // eventfd is needed by our mio poll implementation.  Note you should set max_fds
    // higher if you have other code that may need eventfd.
    #[allow(clippy::needless_update)]
    let config = esp_idf_sys::esp_vfs_eventfd_config_t {
        max_fds: 1,
        ..Default::default()
    };
    esp! { unsafe { esp_idf_sys::esp_vfs_eventfd_register(&config) } }?;

    info!("esp32cooler {FW_VERSION} starting up.");

    let sysloop = EspSystemEventLoop::take()?;
    let timer = EspTaskTimerService::new()?;
    let nvs_default_partition = nvs::EspDefaultNvsPartition::take()?;

    let ns = env!("CARGO_BIN_NAME");
    let mut nvs = nvs::EspNvs::new(nvs_default_partition.clone(), ns, true)
        .map_err(|e| anyhow!("Could not get namespace {ns}: {e:?}"))?;
    info!("Got namespace {ns:?} from default partition");

    #[cfg(feature = "reset_settings")]
    let config = {
        let c = MyConfig::default();
        c.to_nvs(&mut nvs)?;
        c
    };

    #[cfg(not(feature = "reset_settings"))]
    let config = match MyConfig::from_nvs(&mut nvs) {
        None => {
            error!("Could not read nvs config, using defaults");
            let c = MyConfig::default();
            c.to_nvs(&mut nvs)?;
            info!("Successfully saved default config to nvs.");
            c
        }

        // using settings saved on nvs if we could find them
        Some(c) => c,
    };
    info!("My config:\n{config:#?}");

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;
    let button = PinDriver::input(pins.gpio0.downgrade_input())?;

    // cooler relay on the on-board led pin
    let cooler = PinDriver::output(pins.gpio2.downgrade_output())?;

    let mut onewire_pin = PinDriver::input_output_od(pins.gpio4.downgrade())?;
    onewire_pin.set_pull(Pull::Up)?;
    let one_wire = OneWire::new(onewire_pin).map_err(|e| anyhow!("1-wire init failed: {e:?}"))?;

    let adc = AdcDriver::new(peripherals.adc1)?;
    let adc_config = AdcChannelConfig {
        attenuation: DB_11,
        ..Default::default()
    };
    let light = AdcChannelDriver::new(adc, pins.gpio34, &adc_config)?;

    let sensors = EspSensors::new(one_wire, light, config.retries);

    let wifidriver = WifiDriver::new(peripherals.modem, sysloop.clone(), Some(nvs_default_partition))?;

    let state = Box::pin(MyState::new(config, Box::new(cooler))?);
    let shared_state = Arc::new(state);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(Box::pin(async move {
            let wifi_loop = WifiLoop {
                state: shared_state.clone(),
                wifi: None,
            };

            info!("Entering main loop...");
            tokio::select! {
                _ = Box::pin(poll_reset(nvs, button)) => { error!("poll_reset() ended."); }
                _ = Box::pin(poll_sensors(shared_state.clone(), sensors)) => { error!("poll_sensors() ended."); }
                _ = Box::pin(run_api_server(shared_state.clone())) => { error!("run_api_server() ended."); }
                _ = Box::pin(wifi_loop.run(wifidriver, sysloop, timer)) => { error!("wifi_loop.run() ended."); }
            };
        }));

    // not actually returning from main() but we reboot instead
    info!("main() finished, reboot.");
    FreeRtos::delay_ms(3000);
    esp_idf_hal::reset::restart();
}

async fn poll_reset(
    mut nvs: nvs::EspNvs<nvs::NvsDefault>,
    button: PinDriver<'_, AnyInputPin, Input>,
) -> anyhow::Result<()> {
    loop {
        sleep(Duration::from_secs(2)).await;

        if button.is_low() {
            Box::pin(reset_button(&mut nvs, &button)).await?;
        }
    }
}

async fn reset_button(
    nvs: &mut nvs::EspNvs<nvs::NvsDefault>,
    button: &PinDriver<'_, AnyInputPin, Input>,
) -> anyhow::Result<()> {
    let mut reset_cnt = CONFIG_RESET_COUNT;

    while button.is_low() {
        // button is pressed and kept down, countdown and factory reset if reach zero
        error!("Reset? {reset_cnt}");

        if reset_cnt == 0 {
            // okay do factory reset now
            error!("Factory resetting...");

            MyConfig::default().to_nvs(nvs)?;
            sleep(Duration::from_millis(2000)).await;
            esp_idf_hal::reset::restart();
        }

        reset_cnt -= 1;
        sleep(Duration::from_millis(500)).await;
    }
    Ok(())
}

// EOF
