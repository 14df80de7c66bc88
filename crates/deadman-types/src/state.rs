// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Activity State
// ─────────────────────────────────────────────────────────────────────

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};

/// Quantitative classification of recent token consumption rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intensity {
    Low,
    Normal,
    High,
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intensity::Low => "LOW",
            Intensity::Normal => "NORMAL",
            Intensity::High => "HIGH",
        };
        f.write_str(name)
    }
}

/// Qualitative classification of agent behavior over the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityMode {
    Idle,
    Working,
    Looping,
    Runaway,
}

impl ActivityMode {
    /// LOOPING and RUNAWAY carry extra exit hysteresis and force vetoes.
    pub fn is_critical(&self) -> bool {
        matches!(self, ActivityMode::Looping | ActivityMode::Runaway)
    }
}

impl fmt::Display for ActivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityMode::Idle => "IDLE",
            ActivityMode::Working => "WORKING",
            ActivityMode::Looping => "LOOPING",
            ActivityMode::Runaway => "RUNAWAY",
        };
        f.write_str(name)
    }
}

/// Classifier output: behavioral mode plus intensity, with the moment
/// this (mode, intensity) pair was entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityState {
    pub intensity: Intensity,
    pub mode: ActivityMode,
    pub reason: String,
    pub since_ms: u64,
}

impl ActivityState {
    /// An empty reason is a construction error; every emitted state
    /// must be explainable.
    pub fn new(
        intensity: Intensity,
        mode: ActivityMode,
        reason: impl Into<String>,
        since_ms: u64,
    ) -> KernelResult<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(KernelError::Validation(
                "activity state reason must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            intensity,
            mode,
            reason,
            since_ms,
        })
    }
}
