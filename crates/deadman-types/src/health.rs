// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Health State
// ─────────────────────────────────────────────────────────────────────

use std::fmt;

use serde::{Deserialize, Serialize};

/// Gate health classification derived from the accumulated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Suspended,
    Stopped,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Suspended => "SUSPENDED",
            HealthStatus::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Anomaly accounting owned by the safety gate, exposed read-only.
///
/// The score only moves through the gate's own operations: down on
/// anomaly, up (capped) on anomaly-free recovery ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthState {
    pub score: f64,
    pub status: HealthStatus,
    pub last_anomaly_ms: Option<u64>,
    pub anomaly_count: u64,
    pub error_streak: u64,
}

impl HealthState {
    /// Fresh state: perfect score, no anomalies on record.
    pub fn pristine() -> Self {
        Self {
            score: 1.0,
            status: HealthStatus::Healthy,
            last_anomaly_ms: None,
            anomaly_count: 0,
            error_streak: 0,
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::pristine()
    }
}
