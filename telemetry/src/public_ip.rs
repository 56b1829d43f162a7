use std::net::IpAddr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_PUBLIC_IP_URL: &str = "https://api.ipify.org";

/// Asks an echo service for the address the host is seen from.
#[derive(Debug, Clone)]
pub struct PublicIpLookup {
    client: reqwest::Client,
    url: String,
}

impl PublicIpLookup {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }

    /// `None` on timeout, non-2xx, or a body that is not an IP address.
    pub async fn fetch(&self) -> Option<String> {
        let res = match self.client.get(&self.url).send().await {
            Ok(res) => res,
            Err(e) => {
                warn!(url = %self.url, "public ip lookup failed: {e}");
                return None;
            }
        };

        if !res.status().is_success() {
            warn!(url = %self.url, status = %res.status(), "public ip lookup rejected");
            return None;
        }

        let body = res.text().await.ok()?;
        let candidate = body.trim();
        match candidate.parse::<IpAddr>() {
            Ok(_) => Some(candidate.to_string()),
            Err(_) => {
                warn!(url = %self.url, "public ip lookup returned garbage");
                None
            }
        }
    }
}

impl Default for PublicIpLookup {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_IP_URL, Duration::from_secs(3))
    }
}
