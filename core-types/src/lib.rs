//! Shared data model: what one telemetry sample looks like, how it is judged
//! against the critical thresholds, and the row it becomes when it breaches.

mod incident;
mod network;
mod policy;

use serde::{Deserialize, Serialize};

pub use incident::{
    IncidentRecord, IncidentStatus, MAX_TEXT_LEN, MAX_WIDE_TEXT_LEN, TIMESTAMP_FORMAT,
    truncate_chars, truncate_metric,
};
pub use network::{NetworkInterface, select_mac};
pub use policy::{BreachKind, BreachReason, DEFAULT_THRESHOLD, ThresholdPolicy, Thresholds, evaluate};

/// Placeholder for a field the host could not report.
pub const UNAVAILABLE: &str = "unavailable";

/// Domain reported for machines that are not joined to a directory domain.
pub const LOCAL_DOMAIN: &str = "LOCAL";

/// One point-in-time reading of the workstation.
///
/// Built fresh for every request by a telemetry source. Collectors that fail
/// leave a sentinel behind ([`UNAVAILABLE`], [`LOCAL_DOMAIN`], `None`) instead
/// of failing the whole sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub hostname: String,
    pub serial_number: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub cpu_temperature: Option<f64>, // °C, None when no sensor is readable
    pub cpu_speed_mhz: Option<u64>,
    pub mac_address: String,
    pub manufacturer: String,
    pub model: String,
    pub os: String,
    pub domain: String,
    pub user: String,
    pub ip_public: String,
    pub ip_local: String,
    pub network_interfaces: Vec<NetworkInterface>,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            hostname: UNAVAILABLE.to_string(),
            serial_number: UNAVAILABLE.to_string(),
            cpu_percent: 0.0,
            memory_percent: 0.0,
            disk_percent: 0.0,
            cpu_temperature: None,
            cpu_speed_mhz: None,
            mac_address: String::new(),
            manufacturer: UNAVAILABLE.to_string(),
            model: UNAVAILABLE.to_string(),
            os: UNAVAILABLE.to_string(),
            domain: LOCAL_DOMAIN.to_string(),
            user: UNAVAILABLE.to_string(),
            ip_public: UNAVAILABLE.to_string(),
            ip_local: UNAVAILABLE.to_string(),
            network_interfaces: Vec::new(),
        }
    }
}
