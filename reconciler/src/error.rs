use thiserror::Error;

/// Failure talking to the service desk or the SMS gateway. Always scoped to
/// one incident; the cycle carries on with the next one.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("{service} answered {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} sent an unexpected response: {detail}")]
    Malformed {
        service: &'static str,
        detail: String,
    },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl ServiceError {
    pub(crate) fn transport(service: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ServiceError::Timeout(service)
        } else {
            ServiceError::Transport { service, source }
        }
    }

    pub(crate) async fn from_response(service: &'static str, res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        ServiceError::Status {
            service,
            status,
            body: body.chars().take(512).collect(),
        }
    }
}
