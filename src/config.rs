// config.rs

use std::net;

use anyhow::bail;
use crc::{Crc, CRC_32_ISCSI};
use log::*;
use serde::{Deserialize, Serialize};

pub const NVS_BUF_SIZE: usize = 512;

const DEFAULT_API_PORT: u16 = 80;
const DEFAULT_SENSOR_RETRIES: u32 = 4;
const DEFAULT_POLL_DELAY: u64 = 10;

const DEFAULT_LOW_THRESHOLD: f32 = 18.0;
const DEFAULT_HIGH_THRESHOLD: f32 = 30.0;
const DEFAULT_LIGHT_THRESHOLD: u16 = 1000;

const DEFAULT_REPORT_PORT: u16 = 8080;
const DEFAULT_REPORT_PERIOD: u32 = 60;

#[cfg(target_os = "espidf")]
const CONFIG_NAME: &str = "cfg";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MyConfig {
    pub port: u16,
    pub retries: u32,
    pub delay: u64,

    pub wifi_ssid: String,
    pub wifi_pass: String,

    pub v4dhcp: bool,
    pub v4addr: net::Ipv4Addr,
    pub v4mask: u8,
    pub v4gw: net::Ipv4Addr,

    // descriptive strings shown in status.json and on the index page
    pub ident: String,
    pub user: String,
    pub loc: String,
    pub room: String,
    pub address: String,
    pub where_: String,

    // runtime values start from these after every boot
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub light_threshold: u16,

    pub report_ip: String,
    pub report_port: u16,
    pub report_period: u32,
}

impl Default for MyConfig {
    fn default() -> Self {
        Self {
            port: option_env!("API_PORT")
                .unwrap_or("-")
                .parse()
                .unwrap_or(DEFAULT_API_PORT),
            retries: DEFAULT_SENSOR_RETRIES,
            delay: DEFAULT_POLL_DELAY,

            wifi_ssid: option_env!("WIFI_SSID").unwrap_or("internet").into(),
            wifi_pass: option_env!("WIFI_PASS").unwrap_or("password").into(),

            v4dhcp: true,
            v4addr: net::Ipv4Addr::new(0, 0, 0, 0),
            v4mask: 0,
            v4gw: net::Ipv4Addr::new(0, 0, 0, 0),

            ident: "esp32cooler".into(),
            user: "lab".into(),
            loc: "Lab bench".into(),
            room: "Server room".into(),
            address: "-".into(),
            where_: "ESP32 Lab HTTP".into(),

            low_threshold: DEFAULT_LOW_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            light_threshold: DEFAULT_LIGHT_THRESHOLD,

            report_ip: String::new(),
            report_port: DEFAULT_REPORT_PORT,
            report_period: DEFAULT_REPORT_PERIOD,
        }
    }
}

impl MyConfig {
    /// Decode a config blob written by [`MyConfig::to_blob`].
    /// Returns `None` when the blob is truncated or the CRC does not match.
    pub fn from_blob(b: &[u8]) -> Option<Self> {
        let crc = Crc::<u32>::new(&CRC_32_ISCSI);
        let digest = crc.digest();
        match postcard::from_bytes_crc32::<MyConfig>(b, digest) {
            Ok(c) => {
                info!("Successfully parsed config blob.");
                Some(c)
            }
            Err(e) => {
                error!("Cannot parse config blob: {e:?}");
                None
            }
        }
    }

    /// Encode into `buf` with a CRC-32 trailer, returning the used part.
    pub fn to_blob<'a>(&self, buf: &'a mut [u8]) -> anyhow::Result<&'a mut [u8]> {
        let crc = Crc::<u32>::new(&CRC_32_ISCSI);
        let digest = crc.digest();
        match postcard::to_slice_crc32(self, buf, digest) {
            Ok(d) => Ok(d),
            Err(e) => {
                let estr = format!("Cannot encode config to buffer {e:?}");
                bail!("{estr}");
            }
        }
    }
}

#[cfg(target_os = "espidf")]
impl MyConfig {
    pub fn from_nvs(nvs: &mut esp_idf_svc::nvs::EspNvs<esp_idf_svc::nvs::NvsDefault>) -> Option<Self> {
        let mut nvsbuf = [0u8; NVS_BUF_SIZE];
        info!("Reading up to {sz} bytes from nvs...", sz = NVS_BUF_SIZE);
        let b = match nvs.get_raw(CONFIG_NAME, &mut nvsbuf) {
            Err(e) => {
                error!("Nvs read error {e:?}");
                return None;
            }
            Ok(Some(b)) => b,
            _ => {
                error!("Nvs key not found");
                return None;
            }
        };
        info!("Got {sz} bytes from nvs. Parsing config...", sz = b.len());
        Self::from_blob(b)
    }

    pub fn to_nvs(&self, nvs: &mut esp_idf_svc::nvs::EspNvs<esp_idf_svc::nvs::NvsDefault>) -> anyhow::Result<()> {
        let mut nvsbuf = [0u8; NVS_BUF_SIZE];
        let nvsdata = self.to_blob(&mut nvsbuf)?;
        info!(
            "Encoded config to {sz} bytes. Saving to nvs...",
            sz = nvsdata.len()
        );

        match nvs.set_raw(CONFIG_NAME, nvsdata) {
            Ok(_) => {
                info!("Config saved.");
                Ok(())
            }
            Err(e) => {
                let estr = format!("Cannot save to nvs: {e:?}");
                bail!("{estr}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_survives_nvs_buffer() {
        let mut config = MyConfig::default();
        config.report_ip = "192.168.1.20".into();
        config.high_threshold = 27.5;

        let mut buf = [0u8; NVS_BUF_SIZE];
        let blob = config.to_blob(&mut buf).unwrap().to_vec();
        assert_eq!(MyConfig::from_blob(&blob), Some(config));
    }

    #[test]
    fn corrupted_blob_is_rejected() {
        let mut buf = [0u8; NVS_BUF_SIZE];
        let mut blob = MyConfig::default().to_blob(&mut buf).unwrap().to_vec();
        blob[3] ^= 0x5a;
        assert_eq!(MyConfig::from_blob(&blob), None);
        assert_eq!(MyConfig::from_blob(&[]), None);
    }

    #[test]
    fn defaults_match_boot_state() {
        let c = MyConfig::default();
        assert_eq!(c.low_threshold, 18.0);
        assert_eq!(c.high_threshold, 30.0);
        assert!(c.report_ip.is_empty());
    }
}

// EOF
