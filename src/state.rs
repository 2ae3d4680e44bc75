// state.rs

use std::{net::Ipv4Addr, time::Instant};

use log::*;

use crate::*;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportTarget {
    pub ip: String,
    pub port: u16,
    pub period: u32,
}

impl ReportTarget {
    pub fn new(config: &MyConfig) -> Self {
        ReportTarget {
            ip: config.report_ip.clone(),
            port: config.report_port,
            period: config.report_period,
        }
    }

    /// Empty address means reporting is not configured.
    pub fn is_set(&self) -> bool {
        !self.ip.is_empty()
    }

    /// Fields missing from the update keep their current value.
    pub fn apply(&mut self, update: TargetUpdate) {
        if let Some(ip) = update.ip {
            self.ip = ip;
        }
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(period) = update.period {
            self.period = period;
        }
        info!(
            "Reporting updated: ip={ip} port={port} sp={sp}",
            ip = self.ip,
            port = self.port,
            sp = self.period
        );
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NetInfo {
    pub ssid: String,
    pub mac: [u8; 6],
    pub ip: Ipv4Addr,
}

impl NetInfo {
    pub fn mac_string(&self) -> String {
        let mac = self.mac;
        format!(
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5],
        )
    }
}

impl Default for NetInfo {
    fn default() -> Self {
        NetInfo {
            ssid: String::new(),
            mac: [0; 6],
            ip: Ipv4Addr::new(0, 0, 0, 0),
        }
    }
}

pub struct DeviceState {
    pub temperature: f32,
    pub light: u16,
    pub fire_detected: bool,
    pub fan_speed: i32,
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub light_threshold: u16,
    // only changed together with the output, see set_cooler()
    cooler_on: bool,
    cooler: Box<dyn CoolerOutput + Send>,
}

impl DeviceState {
    /// Starts with the cooler switched off, driving the output accordingly.
    pub fn new(config: &MyConfig, mut cooler: Box<dyn CoolerOutput + Send>) -> anyhow::Result<Self> {
        cooler.set_cooler(false)?;
        Ok(DeviceState {
            temperature: 0.0,
            light: 0,
            fire_detected: false,
            fan_speed: 0,
            low_threshold: config.low_threshold,
            high_threshold: config.high_threshold,
            light_threshold: config.light_threshold,
            cooler_on: false,
            cooler,
        })
    }

    pub fn cooler_on(&self) -> bool {
        self.cooler_on
    }

    /// Drive the output first; the flag only follows a successful write.
    pub fn set_cooler(&mut self, on: bool) -> anyhow::Result<()> {
        self.cooler.set_cooler(on)?;
        if self.cooler_on != on {
            info!("Cooler switched {}", if on { "on" } else { "off" });
        }
        self.cooler_on = on;
        Ok(())
    }
}

/// Point-in-time copy of everything the status page and status.json show.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub uptime: u64,
    pub net: NetInfo,
    pub temperature: f32,
    pub light: u16,
    pub cooler_on: bool,
    pub fire_detected: bool,
    pub fan_speed: i32,
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub light_threshold: u16,
    pub target: ReportTarget,
}

pub struct MyState {
    pub config: MyConfig,
    pub started: Instant,
    pub api_cnt: AtomicU32,
    pub wifi_up: RwLock<bool>,
    pub net: RwLock<NetInfo>,
    pub device: Mutex<DeviceState>,
    pub target: RwLock<ReportTarget>,
}

impl MyState {
    pub fn new(config: MyConfig, cooler: Box<dyn CoolerOutput + Send>) -> anyhow::Result<Self> {
        let device = DeviceState::new(&config, cooler)?;
        let target = ReportTarget::new(&config);
        Ok(MyState {
            config,
            started: Instant::now(),
            api_cnt: AtomicU32::new(0),
            wifi_up: RwLock::new(false),
            net: RwLock::new(NetInfo::default()),
            device: Mutex::new(device),
            target: RwLock::new(target),
        })
    }

    pub fn uptime(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let net = self.net.read().await.clone();
        let target = self.target.read().await.clone();
        let device = self.device.lock().await;
        Snapshot {
            uptime: self.uptime(),
            net,
            temperature: device.temperature,
            light: device.light,
            cooler_on: device.cooler_on(),
            fire_detected: device.fire_detected,
            fan_speed: device.fan_speed,
            low_threshold: device.low_threshold,
            high_threshold: device.high_threshold,
            light_threshold: device.light_threshold,
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct FlakyPin {
        fail: Arc<AtomicBool>,
    }

    impl CoolerOutput for FlakyPin {
        fn set_cooler(&mut self, _on: bool) -> anyhow::Result<()> {
            if self.fail.load(Ordering::Relaxed) {
                bail!("stuck pin");
            }
            Ok(())
        }
    }

    #[test]
    fn cooler_flag_stays_put_when_pin_fails() {
        let fail = Arc::new(AtomicBool::new(false));
        let mut dev = DeviceState::new(
            &MyConfig::default(),
            Box::new(FlakyPin { fail: fail.clone() }),
        )
        .unwrap();

        dev.set_cooler(true).unwrap();
        assert!(dev.cooler_on());

        fail.store(true, Ordering::Relaxed);
        assert!(dev.set_cooler(false).is_err());
        assert!(dev.cooler_on());
    }

    #[test]
    fn partial_target_update_keeps_other_fields() {
        let mut target = ReportTarget {
            ip: "10.0.0.5".into(),
            port: 8080,
            period: 30,
        };
        target.apply(TargetUpdate {
            port: Some(9000),
            ..Default::default()
        });
        assert_eq!(
            target,
            ReportTarget {
                ip: "10.0.0.5".into(),
                port: 9000,
                period: 30,
            }
        );
        assert!(target.is_set());
    }

    #[test]
    fn mac_is_colon_separated_hex() {
        let net = NetInfo {
            mac: [0x24, 0x0a, 0xc4, 0x00, 0x01, 0xff],
            ..Default::default()
        };
        assert_eq!(net.mac_string(), "24:0A:C4:00:01:FF");
    }
}

// EOF
