use serde::Serialize;

use crate::config::SmsConfig;
use crate::error::ServiceError;

const SERVICE: &str = "sms gateway";

/// Sends text alerts through the SMS gateway's `POST /sms/send`.
#[derive(Debug, Clone)]
pub struct SmsClient {
    http: reqwest::Client,
    config: SmsConfig,
}

#[derive(Serialize)]
struct SmsRequest<'a> {
    message: &'a str,
    numbers: &'a str,
    country_code: &'a str,
}

impl SmsClient {
    pub fn new(config: SmsConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ServiceError::transport(SERVICE, e))?;
        Ok(Self { http, config })
    }

    pub fn message_prefix(&self) -> &str {
        &self.config.message_prefix
    }

    pub async fn send(&self, message: &str) -> Result<(), ServiceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ServiceError::NotConfigured("sms api key"))?;
        if self.config.numbers.trim().is_empty() {
            return Err(ServiceError::NotConfigured("sms numbers"));
        }

        let url = format!("{}/sms/send", self.config.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .header("apikey", api_key)
            .json(&SmsRequest {
                message,
                numbers: &self.config.numbers,
                country_code: &self.config.country_code,
            })
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        if !res.status().is_success() {
            return Err(ServiceError::from_response(SERVICE, res).await);
        }
        Ok(())
    }
}
