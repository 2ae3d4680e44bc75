// bin/esp32cooler/main.rs

#![warn(clippy::large_futures)]

#[cfg(target_os = "espidf")]
mod esp;
#[cfg(not(target_os = "espidf"))]
mod host;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    esp::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    host::run()
}

// EOF
