use serde::{Deserialize, Serialize};

/// Bearer credentials returned by `POST /authentication/`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    #[serde(default)]
    pub renew_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketReceipt {
    pub status: u16,
    /// Not every deployment echoes the id back.
    pub ticket_id: Option<i64>,
}

/// Tally of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub polled: usize,
    pub ticketed: usize,
    pub resolved: usize,
    pub sms_sent: usize,
    pub failed: usize,
    /// The open-incident query itself failed; nothing was processed.
    pub poll_failed: bool,
}
