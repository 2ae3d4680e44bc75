// lib.rs
#![warn(clippy::large_futures)]

pub use std::{
    net,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

pub use anyhow::bail;
pub use serde::{Deserialize, Serialize};
pub use tokio::{
    sync::{Mutex, RwLock},
    time::{Duration, sleep},
};

mod config;
pub use config::*;

mod actuator;
pub use actuator::*;

mod state;
pub use state::*;

mod params;
pub use params::*;

mod template;
pub use template::*;

mod measure;
pub use measure::*;

mod apiserver;
pub use apiserver::*;

#[cfg(target_os = "espidf")]
mod wifi;
#[cfg(target_os = "espidf")]
pub use wifi::*;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Debug, Serialize)]
pub struct StatusSection {
    pub temperature: f32,
    pub light: u16,
    #[serde(rename = "coolerState")]
    pub cooler_state: bool,
    #[serde(rename = "heaterState")]
    pub heater_state: bool,
    #[serde(rename = "fireDetected")]
    pub fire_detected: bool,
    #[serde(rename = "fanSpeed")]
    pub fan_speed: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct SensorsSection {
    pub temperature: f32,
    pub light: u16,
    pub light_threshold: u16,
    #[serde(rename = "fireDetected")]
    pub fire_detected: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegulSection {
    pub lt: f32,
    pub ht: f32,
    #[serde(rename = "fanSpeed")]
    pub fan_speed: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct InfoSection {
    pub ident: String,
    pub user: String,
    pub loc: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LocationSection {
    pub room: String,
    pub address: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct NetSection {
    pub uptime: u64,
    pub ssid: String,
    pub mac: String,
    pub ip: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReportHostSection {
    pub target_ip: String,
    pub target_port: u16,
    pub sp: u32,
}

/// Body of `/status.json`. Every section is always present.
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub status: StatusSection,
    pub sensors: SensorsSection,
    pub regul: RegulSection,
    pub info: InfoSection,
    pub location: LocationSection,
    pub net: NetSection,
    pub reporthost: ReportHostSection,
}

impl StatusReport {
    pub fn new(config: &MyConfig, snap: &Snapshot) -> Self {
        StatusReport {
            status: StatusSection {
                temperature: snap.temperature,
                light: snap.light,
                cooler_state: snap.cooler_on,
                // no heater on this board
                heater_state: false,
                fire_detected: snap.fire_detected,
                fan_speed: snap.fan_speed,
            },
            sensors: SensorsSection {
                temperature: snap.temperature,
                light: snap.light,
                light_threshold: snap.light_threshold,
                fire_detected: snap.fire_detected,
            },
            regul: RegulSection {
                lt: snap.low_threshold,
                ht: snap.high_threshold,
                fan_speed: snap.fan_speed,
            },
            info: InfoSection {
                ident: config.ident.clone(),
                user: config.user.clone(),
                loc: config.loc.clone(),
            },
            location: LocationSection {
                room: config.room.clone(),
                address: config.address.clone(),
            },
            net: NetSection {
                uptime: snap.uptime,
                ssid: snap.net.ssid.clone(),
                mac: snap.net.mac_string(),
                ip: snap.net.ip.to_string(),
            },
            reporthost: ReportHostSection {
                target_ip: snap.target.ip.clone(),
                target_port: snap.target.port,
                sp: snap.target.period,
            },
        }
    }
}

/// Body of `/value`, holding only the fields that were asked for.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValueReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fire: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ht: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<f32>,
}

impl ValueReply {
    pub fn new(fields: &[ValueField], snap: &Snapshot) -> Self {
        let mut reply = ValueReply::default();
        for field in fields {
            match field {
                ValueField::Temperature => reply.temperature = Some(snap.temperature),
                ValueField::Light => reply.light = Some(snap.light),
                ValueField::Fire => reply.fire = Some(snap.fire_detected),
                ValueField::HighThreshold => reply.ht = Some(snap.high_threshold),
                ValueField::LowThreshold => reply.lt = Some(snap.low_threshold),
            }
        }
        reply
    }
}

// EOF
