// measure.rs

use log::*;

use crate::*;

/// Source of the two readings the device reports.
pub trait SensorReader {
    fn read_temperature(&mut self) -> anyhow::Result<f32>;
    fn read_light(&mut self) -> anyhow::Result<u16>;
}

/// Temperatures are kept with one decimal.
pub fn round_tenth(t: f32) -> f32 {
    (t * 10.0).round() / 10.0
}

/// Read both sensors and store the results. A failed read keeps the old value.
pub async fn refresh_readings<S: SensorReader>(state: &MyState, sensors: &mut S) {
    // sensor i/o is slow, do it before taking the lock
    let temperature = sensors.read_temperature();
    let light = sensors.read_light();

    let mut device = state.device.lock().await;
    match temperature {
        Ok(t) => device.temperature = round_tenth(t),
        Err(e) => error!("Temperature read failed: {e:?}"),
    }
    match light {
        Ok(l) => device.light = l,
        Err(e) => error!("Light read failed: {e:?}"),
    }
}

pub async fn poll_sensors<S: SensorReader>(state: Arc<Pin<Box<MyState>>>, mut sensors: S) -> anyhow::Result<()> {
    let delay = state.config.delay;
    loop {
        refresh_readings(&state, &mut sensors).await;
        {
            let device = state.device.lock().await;
            info!(
                "Temperature {t:.1} light {l}",
                t = device.temperature,
                l = device.light
            );
        }
        sleep(Duration::from_secs(delay)).await;
    }
}

/// Slowly drifting readings for running without hardware.
#[derive(Debug, Default)]
pub struct SimulatedSensors {
    step: u32,
}

impl SensorReader for SimulatedSensors {
    fn read_temperature(&mut self) -> anyhow::Result<f32> {
        self.step = self.step.wrapping_add(1);
        let phase = (self.step % 120) as f32 / 120.0 * std::f32::consts::TAU;
        Ok(24.0 + 4.0 * phase.sin())
    }

    fn read_light(&mut self) -> anyhow::Result<u16> {
        Ok(1500 + (self.step.wrapping_mul(37) % 600) as u16)
    }
}

#[cfg(target_os = "espidf")]
pub use esp::*;

#[cfg(target_os = "espidf")]
mod esp {
    use anyhow::anyhow;
    use ds18b20::{Ds18b20, Resolution};
    use esp_idf_hal::{
        adc::oneshot::{AdcChannelDriver, AdcDriver},
        delay::{Ets, FreeRtos},
        gpio::{ADCPin, AnyIOPin, InputOutput, PinDriver},
    };
    use log::*;
    use one_wire_bus::{Address, OneWire, OneWireError};

    use super::SensorReader;

    pub struct EspSensors<'d, T: ADCPin> {
        pub one_wire: OneWire<PinDriver<'d, AnyIOPin, InputOutput>>,
        pub probe: Option<Address>,
        pub light: AdcChannelDriver<'d, T, AdcDriver<'d, T::Adc>>,
        pub retries: u32,
        delay: Ets,
    }

    impl<'d, T: ADCPin> EspSensors<'d, T> {
        pub fn new(
            one_wire: OneWire<PinDriver<'d, AnyIOPin, InputOutput>>,
            light: AdcChannelDriver<'d, T, AdcDriver<'d, T::Adc>>,
            retries: u32,
        ) -> Self {
            let mut sensors = EspSensors {
                one_wire,
                probe: None,
                light,
                retries,
                delay: Ets,
            };
            sensors.probe = sensors.find_probe();
            sensors
        }

        // the first DS18B20 on the bus is the one we report
        fn find_probe(&mut self) -> Option<Address> {
            for addr in self.one_wire.devices(false, &mut self.delay) {
                match addr {
                    Ok(a) if a.family_code() == ds18b20::FAMILY_CODE => {
                        info!("DS18B20 found: {a:?}");
                        return Some(a);
                    }
                    Ok(a) => info!("Ignoring 1-wire device {a:?}"),
                    Err(e) => {
                        error!("1-wire search error: {e:?}");
                        break;
                    }
                }
            }
            error!("No DS18B20 on the 1-wire bus");
            None
        }

        fn measure_temperature(&mut self) -> Result<f32, MeasurementError> {
            let address = match self.probe {
                Some(a) => a,
                None => {
                    self.probe = self.find_probe();
                    self.probe.ok_or(MeasurementError::NoDeviceFound)?
                }
            };

            ds18b20::start_simultaneous_temp_measurement(&mut self.one_wire, &mut self.delay)?;
            Resolution::Bits12.delay_for_measurement_time(&mut FreeRtos);

            let sensor = Ds18b20::new::<core::convert::Infallible>(address)
                .map_err(|e| MeasurementError::OneWire(format!("{e:?}")))?;
            let data = sensor.read_data(&mut self.one_wire, &mut self.delay)?;
            Ok(data.temperature)
        }
    }

    impl<T: ADCPin> SensorReader for EspSensors<'_, T> {
        fn read_temperature(&mut self) -> anyhow::Result<f32> {
            let mut last_err = MeasurementError::NoDeviceFound;
            for attempt in 0..=self.retries {
                match self.measure_temperature() {
                    Ok(t) => return Ok(t),
                    Err(e) => {
                        error!("DS18B20 read #{attempt} failed: {e:?}");
                        self.probe = None;
                        last_err = e;
                    }
                }
                FreeRtos::delay_ms(100);
            }
            Err(anyhow!("DS18B20 read failed: {last_err:?}"))
        }

        fn read_light(&mut self) -> anyhow::Result<u16> {
            Ok(self.light.read_raw()?)
        }
    }

    // When performing a measurement it can happen that no device was found on the one-wire-bus
    // in addition to the bus errors. Therefore we extend the error cases for proper error handling.
    #[derive(Debug)]
    pub enum MeasurementError {
        OneWire(String),
        NoDeviceFound,
    }

    impl<E: core::fmt::Debug> From<OneWireError<E>> for MeasurementError {
        fn from(value: OneWireError<E>) -> Self {
            MeasurementError::OneWire(format!("{value:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        temps: Vec<anyhow::Result<f32>>,
        light: u16,
    }

    impl SensorReader for Scripted {
        fn read_temperature(&mut self) -> anyhow::Result<f32> {
            self.temps.remove(0)
        }

        fn read_light(&mut self) -> anyhow::Result<u16> {
            Ok(self.light)
        }
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round_tenth(21.34), 21.3);
        assert_eq!(round_tenth(21.36), 21.4);
        assert_eq!(round_tenth(-3.25), -3.3);
    }

    #[tokio::test]
    async fn failed_read_keeps_last_value() {
        let state = MyState::new(MyConfig::default(), Box::new(SimulatedCooler)).unwrap();
        let mut sensors = Scripted {
            temps: vec![Ok(22.46), Err(anyhow::anyhow!("crc mismatch"))],
            light: 900,
        };

        refresh_readings(&state, &mut sensors).await;
        assert_eq!(state.device.lock().await.temperature, 22.5);

        sensors.light = 950;
        refresh_readings(&state, &mut sensors).await;
        let device = state.device.lock().await;
        assert_eq!(device.temperature, 22.5);
        assert_eq!(device.light, 950);
    }
}

// EOF
