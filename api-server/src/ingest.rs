use std::sync::Arc;

use core_types::{BreachKind, TelemetrySnapshot, ThresholdPolicy, Thresholds};
use serde::Serialize;
use storage::IncidentRecorder;
use telemetry::TelemetrySource;
use tracing::info;

/// Body of `GET /api/system-info`.
///
/// An empty `critical_conditions` means nothing breached; a non-empty list
/// with `saved_to_database == false` means the incident could not be saved.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfoResponse {
    #[serde(flatten)]
    pub snapshot: TelemetrySnapshot,
    pub critical_conditions: Vec<String>,
    pub breached_metrics: Vec<BreachKind>,
    pub saved_to_database: bool,
    pub notification_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_detail: Option<String>,
    pub thresholds: Thresholds,
}

/// Sample, judge, and record when something breached.
pub struct IncidentIngest {
    source: Arc<dyn TelemetrySource>,
    policy: ThresholdPolicy,
    recorder: IncidentRecorder,
}

impl IncidentIngest {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        policy: ThresholdPolicy,
        recorder: IncidentRecorder,
    ) -> Self {
        Self {
            source,
            policy,
            recorder,
        }
    }

    pub async fn handle(&self) -> SystemInfoResponse {
        let snapshot = self.source.sample().await;
        let reasons = self.policy.evaluate(&snapshot);

        let (saved_to_database, notification_saved, save_detail) = if reasons.is_empty() {
            (false, false, None)
        } else {
            info!(host = %snapshot.hostname, count = reasons.len(), "critical conditions detected");
            let result = self.recorder.record(&snapshot, &reasons).await;
            (result.ok, result.notification_saved, Some(result.detail))
        };

        SystemInfoResponse {
            critical_conditions: reasons.iter().map(|r| r.detail.clone()).collect(),
            breached_metrics: reasons.iter().map(|r| r.kind).collect(),
            saved_to_database,
            notification_saved,
            save_detail,
            thresholds: self.policy.thresholds(),
            snapshot,
        }
    }
}
