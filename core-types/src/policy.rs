use serde::{Deserialize, Serialize};

use crate::TelemetrySnapshot;

/// Used for every threshold that is not configured.
pub const DEFAULT_THRESHOLD: f64 = 90.0;

/// Critical thresholds. CPU and memory are percentages, temperature is °C.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub cpu: f64,
    pub temperature: f64,
    pub memory: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: DEFAULT_THRESHOLD,
            temperature: DEFAULT_THRESHOLD,
            memory: DEFAULT_THRESHOLD,
        }
    }
}

/// Which metric crossed its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BreachKind {
    Cpu,
    Temperature,
    Memory,
}

impl BreachKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreachKind::Cpu => "CPU",
            BreachKind::Temperature => "TEMPERATURE",
            BreachKind::Memory => "MEMORY",
        }
    }
}

impl std::fmt::Display for BreachKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single breached metric with a readable explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachReason {
    pub kind: BreachKind,
    pub detail: String,
}

/// Holds the configured thresholds and judges snapshots against them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdPolicy {
    thresholds: Thresholds,
}

impl ThresholdPolicy {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Vec<BreachReason> {
        evaluate(snapshot, &self.thresholds)
    }
}

/// Compares a snapshot against `thresholds`.
///
/// A metric equal to its threshold is a breach. Temperature is only judged
/// when the snapshot has a reading. Reasons always come out in the order
/// CPU, temperature, memory.
pub fn evaluate(snapshot: &TelemetrySnapshot, thresholds: &Thresholds) -> Vec<BreachReason> {
    let mut reasons = Vec::new();

    if snapshot.cpu_percent >= thresholds.cpu {
        reasons.push(BreachReason {
            kind: BreachKind::Cpu,
            detail: format!(
                "CPU usage {:.1}% reached the critical threshold of {:.1}%",
                snapshot.cpu_percent, thresholds.cpu
            ),
        });
    }

    if let Some(temp) = snapshot.cpu_temperature {
        if temp >= thresholds.temperature {
            reasons.push(BreachReason {
                kind: BreachKind::Temperature,
                detail: format!(
                    "CPU temperature {:.1}°C reached the critical threshold of {:.1}°C",
                    temp, thresholds.temperature
                ),
            });
        }
    }

    if snapshot.memory_percent >= thresholds.memory {
        reasons.push(BreachReason {
            kind: BreachKind::Memory,
            detail: format!(
                "Memory usage {:.1}% reached the critical threshold of {:.1}%",
                snapshot.memory_percent, thresholds.memory
            ),
        });
    }

    reasons
}
