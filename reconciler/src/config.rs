use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "reconciler.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub schedule: ScheduleConfig,
    pub ticketing: TicketingConfig,
    pub sms: SmsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily cycle, `HH:MM`.
    pub run_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            run_at: "17:20".to_string(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TicketingConfig {
    /// Root of the service-desk API, e.g. `https://desk.example.com/api/v9`.
    pub base_url: String,
    pub user_name: String,
    pub password: Option<String>,
    pub provider_id: i64,
    pub console_type: i64,
    pub timeout_secs: u64,
    pub template: TicketTemplate,
}

impl Default for TicketingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090/api/v9".to_string(),
            user_name: String::new(),
            password: None,
            provider_id: 0,
            console_type: 1,
            timeout_secs: 10,
            template: TicketTemplate::default(),
        }
    }
}

impl fmt::Debug for TicketingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketingConfig")
            .field("base_url", &self.base_url)
            .field("user_name", &self.user_name)
            .field("password", &redacted(&self.password))
            .field("provider_id", &self.provider_id)
            .field("console_type", &self.console_type)
            .field("timeout_secs", &self.timeout_secs)
            .field("template", &self.template)
            .finish()
    }
}

impl TicketingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Fixed catalogue ids the service desk expects on every ticket.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TicketTemplate {
    pub subject_prefix: String,
    pub applicant_id: i64,
    pub customer_id: i64,
    pub category_id: i64,
    pub company_id: i64,
    pub contract_id: i64,
    pub group_id: i64,
    pub impact_id: i64,
    pub model_id: i64,
    pub project_id: i64,
    pub reason_id: i64,
    pub registry_type_id: i64,
    pub service_id: i64,
    pub state_id: i64,
    pub item_type: i64,
    pub instance: i64,
}

impl Default for TicketTemplate {
    fn default() -> Self {
        Self {
            subject_prefix: "Workstation incident".to_string(),
            applicant_id: 589722,
            customer_id: 589722,
            category_id: 6941,
            company_id: 20,
            contract_id: 20,
            group_id: 1172,
            impact_id: 13,
            model_id: 13,
            project_id: 17,
            reason_id: 483,
            registry_type_id: 73412,
            service_id: 256,
            state_id: 71,
            item_type: 4,
            instance: 1678298663558,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Comma separated list of destination numbers.
    pub numbers: String,
    pub country_code: String,
    pub message_prefix: String,
    pub timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8091".to_string(),
            api_key: None,
            numbers: String::new(),
            country_code: "52".to_string(),
            message_prefix: "Workstation incident ticketed".to_string(),
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .field("numbers", &self.numbers)
            .field("country_code", &self.country_code)
            .field("message_prefix", &self.message_prefix)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SmsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl ReconcilerConfig {
    /// Environment values win over the file; secrets normally only live there.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RECONCILER_RUN_AT") {
            self.schedule.run_at = v;
        }
        if let Some(v) = get("ITSM_BASE_URL") {
            self.ticketing.base_url = v;
        }
        if let Some(v) = get("ITSM_USER") {
            self.ticketing.user_name = v;
        }
        if let Some(v) = get("ITSM_PASSWORD") {
            self.ticketing.password = Some(v);
        }
        if let Some(v) = get("SMS_BASE_URL") {
            self.sms.base_url = v;
        }
        if let Some(v) = get("SMS_API_KEY") {
            self.sms.api_key = Some(v);
        }
        if let Some(v) = get("SMS_NUMBERS") {
            self.sms.numbers = v;
        }
    }
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

/// Reads the TOML file; a missing or unparsable file means defaults.
pub fn load_config(path: &Path) -> ReconcilerConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str::<ReconcilerConfig>(&content) {
            Ok(cfg) => {
                info!("loaded config file {}", path.display());
                cfg
            }
            Err(e) => {
                error!("failed to parse config file {}: {e}, using defaults", path.display());
                ReconcilerConfig::default()
            }
        },
        Err(_) => {
            info!("config file {} not found, using defaults", path.display());
            ReconcilerConfig::default()
        }
    }
}
