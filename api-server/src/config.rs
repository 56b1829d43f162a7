use std::time::Duration;

use core_types::{DEFAULT_THRESHOLD, Thresholds};
use telemetry::{DEFAULT_HOST_READ_TIMEOUT, DEFAULT_PUBLIC_IP_URL};
use tracing::warn;

/// Knobs read from the environment at start-up.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub thresholds: Thresholds,
    pub public_ip_url: String,
    pub public_ip_timeout: Duration,
    /// Bound on the blocking OS pass behind `/api/system-info`.
    pub host_read_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let thresholds = Thresholds {
            cpu: threshold(&lookup, "CRITICAL_CPU_THRESHOLD"),
            temperature: threshold(&lookup, "CRITICAL_TEMP_THRESHOLD"),
            memory: threshold(&lookup, "CRITICAL_MEMORY_THRESHOLD"),
        };

        let public_ip_url = lookup("PUBLIC_IP_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PUBLIC_IP_URL.to_string());

        let public_ip_timeout =
            seconds(&lookup, "PUBLIC_IP_TIMEOUT_SECS").unwrap_or(Duration::from_secs(3));
        let host_read_timeout =
            seconds(&lookup, "HOST_READ_TIMEOUT_SECS").unwrap_or(DEFAULT_HOST_READ_TIMEOUT);

        Self {
            thresholds,
            public_ip_url,
            public_ip_timeout,
            host_read_timeout,
        }
    }
}

fn seconds<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn threshold<F>(lookup: &F, key: &str) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return DEFAULT_THRESHOLD;
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            warn!("{key}={raw:?} is not a number, using {DEFAULT_THRESHOLD}");
            DEFAULT_THRESHOLD
        }
    }
}
