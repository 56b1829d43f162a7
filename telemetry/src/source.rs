use std::sync::Mutex;

use async_trait::async_trait;
use core_types::TelemetrySnapshot;

/// Produces a fresh snapshot on demand.
///
/// Never fails: a collector that cannot read a value leaves a sentinel in the
/// snapshot instead.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn sample(&self) -> TelemetrySnapshot;
}

/// Replays one snapshot. The snapshot can be swapped between samples.
#[derive(Debug, Default)]
pub struct StaticSource {
    snapshot: Mutex<TelemetrySnapshot>,
}

impl StaticSource {
    pub fn new(snapshot: TelemetrySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: TelemetrySnapshot) {
        match self.snapshot.lock() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

#[async_trait]
impl TelemetrySource for StaticSource {
    async fn sample(&self) -> TelemetrySnapshot {
        match self.snapshot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
