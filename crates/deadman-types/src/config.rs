// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{KernelError, KernelResult};

/// Runtime configuration for the decision pipeline.
///
/// Frozen at construction: the pipeline holds one immutable copy and
/// no component mutates a threshold afterwards. Runtime adaptation
/// happens only by building a new pipeline from a new config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Token budget per window; at or above this the gate vetoes.
    pub max_tokens_per_minute: u64,

    /// Tool-call cap per window; at or above this the gate vetoes.
    pub max_tool_calls_per_minute: u32,

    /// Hash-window repetition ratio at or above which LOOPING fires.
    pub loop_similarity_threshold: f64,

    /// Number of output hashes in the loop-detection window.
    pub loop_window_size: usize,

    /// Recent inter-event mean below `ratio × earlier mean` means the
    /// agent is accelerating (RUNAWAY / rate veto signal).
    pub tempo_compression_ratio: f64,

    /// How long every decision is rejected after a behavioral veto.
    pub cooldown_duration_ms: u64,

    /// Minimum time a classified state is retained (mode hysteresis).
    pub min_state_duration_ms: u64,

    /// Extra hysteresis factor when leaving LOOPING or RUNAWAY.
    pub critical_exit_multiplier: u64,

    /// Tokens/minute below which intensity is LOW.
    pub intensity_low_threshold: f64,

    /// Tokens/minute above which intensity is HIGH.
    pub intensity_high_threshold: f64,

    /// Health score below which status is SUSPENDED.
    pub soft_suspend: f64,

    /// Health score below which status is STOPPED.
    pub hard_stop: f64,

    /// Health score regained per anomaly-free recovery tick.
    pub recovery_rate: f64,

    /// Ceiling on recovery; the gate never reports full healing.
    pub recovery_cap: f64,

    /// Intent confidence below which the gate rejects outright.
    pub confidence_minimum: f64,

    /// Intent confidence lost per second between decisions.
    pub confidence_decay_rate: f64,

    /// Health penalty for a soft anomaly.
    pub soft_anomaly_severity: f64,

    /// Health penalty for a hard anomaly.
    pub hard_anomaly_severity: f64,

    /// Classifier event FIFO capacity.
    pub event_buffer_size: usize,

    /// Silence longer than this classifies as IDLE.
    pub idle_timeout_ms: u64,

    /// Length of the token/rate budget window.
    pub budget_window_ms: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_minute: 50_000,
            max_tool_calls_per_minute: 60,
            loop_similarity_threshold: 0.9,
            loop_window_size: 5,
            tempo_compression_ratio: 0.3,
            cooldown_duration_ms: 60_000,
            min_state_duration_ms: 10_000,
            critical_exit_multiplier: 3,
            intensity_low_threshold: 5_000.0,
            intensity_high_threshold: 30_000.0,
            soft_suspend: 0.6,
            hard_stop: 0.3,
            recovery_rate: 0.01,
            recovery_cap: 0.8,
            confidence_minimum: 0.2,
            confidence_decay_rate: 0.0001,
            soft_anomaly_severity: 0.02,
            hard_anomaly_severity: 0.10,
            event_buffer_size: 100,
            idle_timeout_ms: 30_000,
            budget_window_ms: 60_000,
        }
    }
}

impl KernelConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> KernelResult<()> {
        if self.max_tokens_per_minute == 0 {
            return Err(KernelError::Config(
                "max_tokens_per_minute must be > 0".to_string(),
            ));
        }
        if self.max_tool_calls_per_minute == 0 {
            return Err(KernelError::Config(
                "max_tool_calls_per_minute must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.loop_similarity_threshold) {
            return Err(KernelError::Config(format!(
                "loop_similarity_threshold must be in [0, 1], got {}",
                self.loop_similarity_threshold
            )));
        }
        if self.loop_window_size < 2 {
            return Err(KernelError::Config(format!(
                "loop_window_size must be >= 2, got {}",
                self.loop_window_size
            )));
        }
        if !(0.0..1.0).contains(&self.tempo_compression_ratio) {
            return Err(KernelError::Config(format!(
                "tempo_compression_ratio must be in [0, 1), got {}",
                self.tempo_compression_ratio
            )));
        }
        if self.critical_exit_multiplier == 0 {
            return Err(KernelError::Config(
                "critical_exit_multiplier must be >= 1".to_string(),
            ));
        }
        if self.intensity_low_threshold <= 0.0
            || self.intensity_high_threshold <= self.intensity_low_threshold
        {
            return Err(KernelError::Config(format!(
                "intensity thresholds must satisfy 0 < low < high, got {} / {}",
                self.intensity_low_threshold, self.intensity_high_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.hard_stop)
            || !(0.0..=1.0).contains(&self.soft_suspend)
            || self.hard_stop >= self.soft_suspend
        {
            return Err(KernelError::Config(format!(
                "health cutoffs must satisfy 0 <= hard_stop < soft_suspend <= 1, got {} / {}",
                self.hard_stop, self.soft_suspend
            )));
        }
        if self.recovery_rate <= 0.0 {
            return Err(KernelError::Config(format!(
                "recovery_rate must be > 0, got {}",
                self.recovery_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.recovery_cap) {
            return Err(KernelError::Config(format!(
                "recovery_cap must be in [0, 1], got {}",
                self.recovery_cap
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_minimum) {
            return Err(KernelError::Config(format!(
                "confidence_minimum must be in [0, 1], got {}",
                self.confidence_minimum
            )));
        }
        if self.confidence_decay_rate < 0.0 {
            return Err(KernelError::Config(format!(
                "confidence_decay_rate must be >= 0, got {}",
                self.confidence_decay_rate
            )));
        }
        if self.soft_anomaly_severity <= 0.0 || self.hard_anomaly_severity <= 0.0 {
            return Err(KernelError::Config(
                "anomaly severities must be > 0".to_string(),
            ));
        }
        if self.event_buffer_size < self.loop_window_size {
            return Err(KernelError::Config(format!(
                "event_buffer_size must be >= loop_window_size, got {} < {}",
                self.event_buffer_size, self.loop_window_size
            )));
        }
        if self.budget_window_ms == 0 || self.min_state_duration_ms == 0 {
            return Err(KernelError::Config(
                "budget_window_ms and min_state_duration_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> KernelResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| KernelError::Config(format!("JSON parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// SHA-256 of the canonical JSON serialization.
    ///
    /// Written into telemetry log headers so a decision stream can be
    /// matched to the exact thresholds that produced it.
    pub fn fingerprint(&self) -> String {
        let canonical =
            serde_json::to_string(self).unwrap_or_else(|_| "<unserializable-config>".to_string());
        let digest = Sha256::digest(canonical.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}
