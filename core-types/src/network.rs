use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// One network adapter as the host reports it, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub ip: Option<String>,
    pub mac: Option<String>,
}

impl NetworkInterface {
    fn ip(&self) -> Option<&str> {
        self.ip.as_deref().filter(|s| !s.is_empty())
    }

    fn mac(&self) -> Option<&str> {
        self.mac.as_deref().filter(|s| !s.is_empty())
    }

    fn is_loopback(&self) -> bool {
        self.ip()
            .and_then(|ip| ip.parse::<IpAddr>().ok())
            .is_some_and(|ip| ip.is_loopback())
    }
}

/// Picks the MAC address recorded for the host.
///
/// 1. the first adapter whose IP equals `local_ip` and that has a MAC;
/// 2. otherwise the first non-loopback adapter with both IP and MAC;
/// 3. otherwise an empty string.
///
/// The result depends on the order of `interfaces`.
pub fn select_mac(interfaces: &[NetworkInterface], local_ip: Option<&str>) -> String {
    if let Some(local_ip) = local_ip.filter(|s| !s.is_empty()) {
        let matched = interfaces
            .iter()
            .filter(|iface| iface.ip() == Some(local_ip))
            .find_map(|iface| iface.mac());
        if let Some(mac) = matched {
            return mac.to_string();
        }
    }

    interfaces
        .iter()
        .filter(|iface| iface.ip().is_some() && !iface.is_loopback())
        .find_map(|iface| iface.mac())
        .unwrap_or_default()
        .to_string()
}
