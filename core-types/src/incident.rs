use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::TelemetrySnapshot;

/// Column width for public IP, MAC, manufacturer and model.
pub const MAX_TEXT_LEN: usize = 50;

/// Column width for host name, serial number, domain and user.
pub const MAX_WIDE_TEXT_LEN: usize = 100;

/// Layout of `FechaIncidente`, local wall-clock time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Lifecycle of a persisted incident. Stored as a TINYINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum IncidentStatus {
    Open = 0,
    Resolved = 1,
}

impl IncidentStatus {
    pub fn code(&self) -> i16 {
        *self as i16
    }

    /// Unknown codes are treated as resolved so they are never re-ticketed.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => IncidentStatus::Open,
            _ => IncidentStatus::Resolved,
        }
    }
}

/// A breach event as it is written to the incident and notification tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: Option<i64>, // assigned by the store
    pub host_name: String,
    pub serial_number: String,
    pub cpu_usage: i64,
    pub memory_usage: i64,
    pub disk_usage: i64,
    pub temperature: i64,
    pub incident_at: String,
    pub status: IncidentStatus,
    pub domain: String,
    pub public_ip: String,
    pub user: String,
    pub mac: String,
    pub manufacturer: String,
    pub model: String,
}

impl IncidentRecord {
    /// Builds a fresh, open record from a breaching snapshot taken at `at`.
    ///
    /// Percentages and temperature are truncated toward zero, never rounded.
    /// Text is cut to its column width: [`MAX_WIDE_TEXT_LEN`] characters for
    /// host name, serial, domain and user, [`MAX_TEXT_LEN`] for the rest.
    /// A missing temperature is stored as 0.
    pub fn from_snapshot(snapshot: &TelemetrySnapshot, at: NaiveDateTime) -> Self {
        Self {
            id: None,
            host_name: truncate_chars(&snapshot.hostname, MAX_WIDE_TEXT_LEN),
            serial_number: truncate_chars(&snapshot.serial_number, MAX_WIDE_TEXT_LEN),
            cpu_usage: truncate_metric(snapshot.cpu_percent),
            memory_usage: truncate_metric(snapshot.memory_percent),
            disk_usage: truncate_metric(snapshot.disk_percent),
            temperature: snapshot.cpu_temperature.map(truncate_metric).unwrap_or(0),
            incident_at: at.format(TIMESTAMP_FORMAT).to_string(),
            status: IncidentStatus::Open,
            domain: truncate_chars(&snapshot.domain, MAX_WIDE_TEXT_LEN),
            public_ip: truncate_chars(&snapshot.ip_public, MAX_TEXT_LEN),
            user: truncate_chars(&snapshot.user, MAX_WIDE_TEXT_LEN),
            mac: truncate_chars(&snapshot.mac_address, MAX_TEXT_LEN),
            manufacturer: truncate_chars(&snapshot.manufacturer, MAX_TEXT_LEN),
            model: truncate_chars(&snapshot.model, MAX_TEXT_LEN),
        }
    }
}

/// Drops the fractional part. NaN becomes 0, out-of-range values saturate.
pub fn truncate_metric(value: f64) -> i64 {
    value.trunc() as i64
}

/// Keeps at most `max` characters; the rest is silently dropped.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
