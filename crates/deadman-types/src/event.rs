// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Agent Events and Execution Results
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

/// One observation of agent activity, produced by the external source.
///
/// Immutable once constructed; the pipeline never writes back into an
/// event. Timestamps are monotonic milliseconds on the session clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub timestamp_ms: u64,
    pub token_count: u64,
    pub tool_calls: u32,
    pub latency_ms: u64,
    pub output_length: u64,
    /// Opaque fingerprint of the agent's output, when the source has one.
    pub output_hash: Option<String>,
}

impl AgentEvent {
    pub fn new(
        timestamp_ms: u64,
        token_count: u64,
        tool_calls: u32,
        latency_ms: u64,
        output_length: u64,
    ) -> Self {
        Self {
            timestamp_ms,
            token_count,
            tool_calls,
            latency_ms,
            output_length,
            output_hash: None,
        }
    }

    pub fn with_output_hash(mut self, hash: impl Into<String>) -> Self {
        self.output_hash = Some(hash.into());
        self
    }
}

/// Outcome classification reported by the execution adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Partial,
    Failed,
    Blocked,
}

/// What actually happened after a decision.
///
/// Produced by the external adapter for allowed decisions; synthesized
/// by the pipeline as BLOCKED (veto) or FAILED (adapter fault).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub executed: bool,
    pub status: ExecutionStatus,
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub timestamp_ms: u64,
}

impl ExecutionResult {
    /// Synthetic result for a vetoed decision; the adapter was never called.
    pub fn blocked(timestamp_ms: u64) -> Self {
        Self {
            executed: false,
            status: ExecutionStatus::Blocked,
            tokens_used: 0,
            latency_ms: 0,
            timestamp_ms,
        }
    }

    /// Synthetic result for an adapter fault on an allowed decision.
    pub fn failed(timestamp_ms: u64) -> Self {
        Self {
            executed: false,
            status: ExecutionStatus::Failed,
            tokens_used: 0,
            latency_ms: 0,
            timestamp_ms,
        }
    }
}
