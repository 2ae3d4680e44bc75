// wifi.rs

use std::sync::Arc;

use anyhow::{anyhow, bail};
use embedded_svc::wifi::{ClientConfiguration, Configuration};
use esp_idf_svc::{
    eventloop::{EspEventLoop, System},
    ipv4,
    netif::{self, EspNetif},
    timer::{EspTimerService, Task},
    wifi::{AsyncWifi, EspWifi, WifiDriver},
};
use log::*;
use tokio::time::{sleep, Duration};

use crate::*;

pub struct WifiLoop<'a> {
    pub state: Arc<std::pin::Pin<Box<MyState>>>,
    pub wifi: Option<AsyncWifi<EspWifi<'a>>>,
}

impl<'a> WifiLoop<'a> {
    pub async fn run(
        mut self,
        wifidriver: WifiDriver<'a>,
        sysloop: EspEventLoop<System>,
        timer: EspTimerService<Task>,
    ) -> anyhow::Result<()> {
        info!("Initializing Wi-Fi...");

        let config = &self.state.config;
        let ipv4_config = if config.v4dhcp {
            ipv4::ClientConfiguration::DHCP(ipv4::DHCPClientSettings::default())
        } else {
            ipv4::ClientConfiguration::Fixed(ipv4::ClientSettings {
                ip: config.v4addr,
                subnet: ipv4::Subnet {
                    gateway: config.v4gw,
                    mask: ipv4::Mask(config.v4mask),
                },
                dns: None,
                secondary_dns: None,
            })
        };

        let net_if = EspNetif::new_with_conf(&netif::NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Client(ipv4_config)),
            ..netif::NetifConfiguration::wifi_default_client()
        })?;
        let mac = net_if.get_mac()?;

        let espwifi = EspWifi::wrap_all(wifidriver, net_if, EspNetif::new(netif::NetifStack::Ap)?)?;
        self.wifi = Some(AsyncWifi::wrap(espwifi, sysloop, timer)?);

        Box::pin(self.configure()).await?;

        if let Err(e) = Box::pin(self.initial_connect()).await {
            error!("WiFi connection failed: {e:?}");
            error!("Resetting...");
            sleep(Duration::from_secs(5)).await;
            esp_idf_hal::reset::restart();
        }

        let ip_info = self
            .wifi
            .as_ref()
            .ok_or_else(|| anyhow!("WiFi not initialized"))?
            .wifi()
            .sta_netif()
            .get_ip_info()?;
        info!("WiFi up, ip {}", ip_info.ip);

        *self.state.net.write().await = NetInfo {
            ssid: self.state.config.wifi_ssid.clone(),
            mac,
            ip: ip_info.ip,
        };
        *self.state.wifi_up.write().await = true;

        self.stay_connected().await
    }

    pub async fn configure(&mut self) -> anyhow::Result<()> {
        info!("WiFi setting credentials...");
        let config = &self.state.config;
        let wifi = self
            .wifi
            .as_mut()
            .ok_or_else(|| anyhow!("WiFi not initialized"))?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: config
                .wifi_ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("SSID too long"))?,
            password: config
                .wifi_pass
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("WiFi password too long"))?,
            ..Default::default()
        }))?;

        info!("WiFi driver starting...");
        Ok(Box::pin(wifi.start()).await?)
    }

    pub async fn initial_connect(&mut self) -> anyhow::Result<()> {
        self.do_connect_loop(true).await
    }

    pub async fn stay_connected(mut self) -> anyhow::Result<()> {
        self.do_connect_loop(false).await
    }

    async fn do_connect_loop(&mut self, initial: bool) -> anyhow::Result<()> {
        let state = self.state.clone();
        let wifi = self
            .wifi
            .as_mut()
            .ok_or_else(|| anyhow!("WiFi not initialized"))?;
        loop {
            // Wait for disconnect before trying to connect again.
            let timeout = if initial {
                Some(Duration::from_secs(30))
            } else {
                None
            };
            Box::pin(wifi.wifi_wait(|w| w.is_up(), timeout)).await.ok();
            *state.wifi_up.write().await = false;

            info!("WiFi connecting...");
            Box::pin(wifi.connect()).await.ok();

            info!("WiFi waiting for association...");
            match Box::pin(wifi.ip_wait_while(|w| w.is_up().map(|s| !s), None)).await {
                Ok(_) => {}
                Err(e) => {
                    error!("WiFi error: {e:?}");

                    // only exit here if this is initial connection
                    // otherwise, keep trying
                    if initial {
                        bail!(e);
                    }
                    continue;
                }
            }

            info!("WiFi connected.");
            if initial {
                return Ok(());
            }
            *state.wifi_up.write().await = true;
        }
    }
}

// EOF
