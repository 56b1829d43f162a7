use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use core_types::{BreachReason, IncidentRecord, TelemetrySnapshot};
use tracing::{error, info, warn};

use crate::IncidentStore;

/// Outcome of one [`IncidentRecorder::record`] call.
///
/// `ok` only reflects the incident write; a failed notification insert is
/// reported through `notification_saved` and `detail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordResult {
    pub ok: bool,
    pub notification_saved: bool,
    pub detail: String,
}

/// Turns a breaching snapshot into one incident row and one notification row.
///
/// The two writes are separate transactions: a notification failure never
/// undoes the incident. Nothing is retried here; a failed save surfaces to
/// the caller, which may try again with its next sample.
#[derive(Clone)]
pub struct IncidentRecorder {
    store: Arc<dyn IncidentStore>,
}

impl IncidentRecorder {
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, snapshot: &TelemetrySnapshot, reasons: &[BreachReason]) -> RecordResult {
        self.record_at(snapshot, reasons, Local::now().naive_local())
            .await
    }

    pub async fn record_at(
        &self,
        snapshot: &TelemetrySnapshot,
        reasons: &[BreachReason],
        at: NaiveDateTime,
    ) -> RecordResult {
        if reasons.is_empty() {
            return RecordResult {
                ok: true,
                notification_saved: false,
                detail: "no breach, nothing recorded".to_string(),
            };
        }

        let record = IncidentRecord::from_snapshot(snapshot, at);
        let kinds: Vec<&str> = reasons.iter().map(|r| r.kind.as_str()).collect();

        if let Err(e) = self.store.insert_incident(&record).await {
            error!(host = %record.host_name, breaches = ?kinds, "incident insert failed: {e}");
            return RecordResult {
                ok: false,
                notification_saved: false,
                detail: format!("incident not saved: {e}"),
            };
        }
        info!(host = %record.host_name, breaches = ?kinds, "incident recorded");

        match self.store.insert_notification(&record).await {
            Ok(()) => RecordResult {
                ok: true,
                notification_saved: true,
                detail: "incident and notification saved".to_string(),
            },
            Err(e) => {
                warn!(host = %record.host_name, "notification insert failed: {e}");
                RecordResult {
                    ok: true,
                    notification_saved: false,
                    detail: format!("incident saved, notification not saved: {e}"),
                }
            }
        }
    }
}
