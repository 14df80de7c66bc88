// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Execution Adapter Seam
// ─────────────────────────────────────────────────────────────────────
//! Boundary to the external executor. The adapter is contractually
//! called only for allowed decisions; it may block or fail, and the
//! pipeline degrades to a FAILED result on error.

use std::sync::Arc;

use deadman_types::{
    Clock, ExecutionResult, ExecutionStatus, KernelResult, SafetyDecision,
};

/// External execution boundary.
pub trait ExecutionAdapter: Send {
    fn execute(&mut self, decision: &SafetyDecision) -> KernelResult<ExecutionResult>;
}

/// Adapter that performs nothing and reports instant success.
///
/// Deterministic stand-in for tests and for hosts that only want the
/// decision stream.
pub struct NoopAdapter {
    clock: Arc<dyn Clock>,
}

impl NoopAdapter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl ExecutionAdapter for NoopAdapter {
    fn execute(&mut self, _decision: &SafetyDecision) -> KernelResult<ExecutionResult> {
        Ok(ExecutionResult {
            executed: true,
            status: ExecutionStatus::Success,
            tokens_used: 0,
            latency_ms: 0,
            timestamp_ms: self.clock.now_ms(),
        })
    }
}
