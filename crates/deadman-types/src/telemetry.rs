// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Telemetry Taxonomy
// ─────────────────────────────────────────────────────────────────────
//! System events emitted by the pipeline toward telemetry sinks.
//!
//! Telemetry is strictly downstream: sinks observe the decision stream
//! and never influence it.

use serde::{Deserialize, Serialize};

use crate::decision::{IntentDecision, SafetyDecision};
use crate::event::{AgentEvent, ExecutionResult};
use crate::health::HealthState;
use crate::state::ActivityState;

/// One telemetry record, tagged for JSONL sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemEvent {
    /// An input event entered the pipeline.
    AgentEvent { event: AgentEvent },

    /// The classified (mode, intensity) pair changed.
    StateChange {
        previous: ActivityState,
        current: ActivityState,
    },

    /// Intent derived for the event, with the gate's verdict.
    Intent {
        intent: IntentDecision,
        decision: SafetyDecision,
    },

    /// What execution did (or was prevented from doing).
    Execution { result: ExecutionResult },

    /// Gate health status moved.
    HealthChange {
        previous: HealthState,
        current: HealthState,
    },

    /// A pipeline stage faulted and was defensively replaced.
    Error { component: String, error: String },
}

impl SystemEvent {
    /// Tag string as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            SystemEvent::AgentEvent { .. } => "AGENT_EVENT",
            SystemEvent::StateChange { .. } => "STATE_CHANGE",
            SystemEvent::Intent { .. } => "INTENT",
            SystemEvent::Execution { .. } => "EXECUTION",
            SystemEvent::HealthChange { .. } => "HEALTH_CHANGE",
            SystemEvent::Error { .. } => "ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let record = SystemEvent::Error {
            component: "ActivityEngine".to_string(),
            error: "injected fault".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"kind\":\"ERROR\""));
        assert!(json.contains("ActivityEngine"));
    }

    #[test]
    fn test_kind_matches_wire_tag() {
        let record = SystemEvent::AgentEvent {
            event: AgentEvent::new(0, 10, 1, 5, 100),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(&format!("\"kind\":\"{}\"", record.kind())));
    }
}
