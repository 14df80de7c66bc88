// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Intent and Safety Decisions
// ─────────────────────────────────────────────────────────────────────

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to the nearest
/// bound.
#[inline]
pub fn clamp_unit(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_unit: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_unit: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Action the intent core wants taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Continue,
    Pause,
    Stop,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::Continue => "CONTINUE",
            Intent::Pause => "PAUSE",
            Intent::Stop => "STOP",
        };
        f.write_str(name)
    }
}

/// Intent core output: what to do, how sure, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDecision {
    pub intent: Intent,
    pub confidence: f64,
    pub reason: String,
    pub timestamp_ms: u64,
}

impl IntentDecision {
    /// Confidence is clamped into [0, 1]; NaN/Inf map to the bounds.
    /// An empty reason is a construction error.
    pub fn new(
        intent: Intent,
        confidence: f64,
        reason: impl Into<String>,
        timestamp_ms: u64,
    ) -> KernelResult<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(KernelError::Validation(
                "intent reason must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            intent,
            confidence: clamp_unit(confidence, 0.0, 1.0),
            reason,
            timestamp_ms,
        })
    }
}

/// Why the gate said no.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VetoReason {
    RunawayDetected,
    LoopDetected,
    TokenBudgetExceeded,
    RateLimitExceeded,
    CooldownActive,
    HealthDegraded,
}

impl fmt::Display for VetoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VetoReason::RunawayDetected => "RUNAWAY_DETECTED",
            VetoReason::LoopDetected => "LOOP_DETECTED",
            VetoReason::TokenBudgetExceeded => "TOKEN_BUDGET_EXCEEDED",
            VetoReason::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            VetoReason::CooldownActive => "COOLDOWN_ACTIVE",
            VetoReason::HealthDegraded => "HEALTH_DEGRADED",
        };
        f.write_str(name)
    }
}

/// Gate output; the final authority on whether anything executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyDecision {
    pub allowed: bool,
    pub remaining_budget: u64,
    pub reason: String,
    pub veto: Option<VetoReason>,
    pub timestamp_ms: u64,
}

impl SafetyDecision {
    pub fn allow(
        remaining_budget: u64,
        reason: impl Into<String>,
        timestamp_ms: u64,
    ) -> KernelResult<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(KernelError::Validation(
                "safety decision reason must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            allowed: true,
            remaining_budget,
            reason,
            veto: None,
            timestamp_ms,
        })
    }

    pub fn veto(
        veto: VetoReason,
        remaining_budget: u64,
        reason: impl Into<String>,
        timestamp_ms: u64,
    ) -> KernelResult<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(KernelError::Validation(
                "safety decision reason must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            allowed: false,
            remaining_budget,
            reason,
            veto: Some(veto),
            timestamp_ms,
        })
    }
}
