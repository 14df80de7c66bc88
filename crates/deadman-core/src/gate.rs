// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Safety Gate
// ─────────────────────────────────────────────────────────────────────
//! The single authoritative veto point.
//!
//! Five ordered concerns: system preconditions (confidence floor,
//! cooldown, health), behavioral modes (RUNAWAY / LOOPING / tempo),
//! absolute call rate, token budget, and health accounting. Every
//! rejection carries a veto tag; recoverable vetoes clear with time.

use std::sync::Arc;

use deadman_types::{
    ActivityMode, ActivityState, Clock, ExecutionResult, ExecutionStatus, HealthState,
    HealthStatus, IntentDecision, KernelConfig, KernelError, KernelResult, SafetyDecision,
    VetoReason,
};

/// Executions slower than this count as a soft anomaly.
const SLOW_EXECUTION_MS: u64 = 10_000;

/// Recovery only begins once this much time has passed anomaly-free.
const RECOVERY_GRACE_MS: u64 = 60_000;

/// Score below this (but above `soft_suspend`) reads as DEGRADED.
const HEALTHY_FLOOR: f64 = 0.8;

/// Tempo computation looks at most this many trailing intervals.
const INTERVAL_WINDOW: usize = 10;

/// Trailing intervals in the "recent" tempo mean.
const TEMPO_RECENT: usize = 3;

/// How hard an anomaly hits the health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalySeverity {
    Soft,
    Hard,
}

pub struct SafetyGate {
    config: KernelConfig,
    clock: Arc<dyn Clock>,
    tokens_used: u64,
    tool_calls: u32,
    window_start_ms: u64,
    intervals: Vec<u64>,
    last_event_ms: Option<u64>,
    cooldown_until_ms: Option<u64>,
    health: HealthState,
}

impl SafetyGate {
    pub fn new(config: KernelConfig, clock: Arc<dyn Clock>) -> Self {
        let window_start_ms = clock.now_ms();
        Self {
            config,
            clock,
            tokens_used: 0,
            tool_calls: 0,
            window_start_ms,
            intervals: Vec::new(),
            last_event_ms: None,
            cooldown_until_ms: None,
            health: HealthState::pristine(),
        }
    }

    /// Evaluate an intent against the current budgets, behavior, and
    /// health. Mutates cooldown state on behavioral vetoes.
    pub fn evaluate(
        &mut self,
        intent: &IntentDecision,
        state: &ActivityState,
    ) -> KernelResult<SafetyDecision> {
        let now_ms = self.clock.now_ms();
        self.roll_window(now_ms);

        if !intent.confidence.is_finite() {
            return Err(KernelError::Numerical(format!(
                "intent confidence is not finite: {}",
                intent.confidence
            )));
        }
        let remaining = self.remaining_budget();

        // System preconditions.
        if intent.confidence < self.config.confidence_minimum {
            return self.reject(
                VetoReason::HealthDegraded,
                format!(
                    "intent confidence {:.3} below minimum {:.3}",
                    intent.confidence, self.config.confidence_minimum
                ),
                remaining,
                now_ms,
            );
        }
        if let Some(until) = self.cooldown_until_ms {
            if now_ms < until {
                return self.reject(
                    VetoReason::CooldownActive,
                    format!("cooldown active for another {}ms", until - now_ms),
                    remaining,
                    now_ms,
                );
            }
        }
        if matches!(
            self.health.status,
            HealthStatus::Suspended | HealthStatus::Stopped
        ) {
            return self.reject(
                VetoReason::HealthDegraded,
                format!(
                    "health {} (score {:.2})",
                    self.health.status, self.health.score
                ),
                remaining,
                now_ms,
            );
        }

        // Behavioral vetoes. RUNAWAY and LOOPING also start a cooldown.
        if state.mode == ActivityMode::Runaway {
            self.start_cooldown(now_ms);
            return self.reject(
                VetoReason::RunawayDetected,
                format!("RUNAWAY activity: {}", state.reason),
                remaining,
                now_ms,
            );
        }
        if state.mode == ActivityMode::Looping {
            self.start_cooldown(now_ms);
            return self.reject(
                VetoReason::LoopDetected,
                format!("LOOPING activity: {}", state.reason),
                remaining,
                now_ms,
            );
        }
        if let Some((recent_mean, earlier_mean)) = self.tempo_compressed() {
            return self.reject(
                VetoReason::RateLimitExceeded,
                format!(
                    "event tempo compressed to {recent_mean:.0}ms from {earlier_mean:.0}ms"
                ),
                remaining,
                now_ms,
            );
        }
        if self.tool_calls >= self.config.max_tool_calls_per_minute {
            return self.reject(
                VetoReason::RateLimitExceeded,
                format!(
                    "{} tool calls in window (cap {})",
                    self.tool_calls, self.config.max_tool_calls_per_minute
                ),
                remaining,
                now_ms,
            );
        }

        // Token budget.
        if self.tokens_used >= self.config.max_tokens_per_minute {
            return self.reject(
                VetoReason::TokenBudgetExceeded,
                format!(
                    "{} tokens used in window (budget {})",
                    self.tokens_used, self.config.max_tokens_per_minute
                ),
                remaining,
                now_ms,
            );
        }

        SafetyDecision::allow(
            remaining,
            format!("all checks passed; {remaining} tokens remaining in window"),
            now_ms,
        )
    }

    /// Account an event against the budget window and tempo history.
    pub fn record_event(&mut self, tokens: u64, tool_calls: u32) {
        let now_ms = self.clock.now_ms();
        self.roll_window(now_ms);
        self.tokens_used += tokens;
        self.tool_calls += tool_calls;
        if let Some(prev) = self.last_event_ms {
            self.intervals.push(now_ms.saturating_sub(prev));
        }
        self.last_event_ms = Some(now_ms);
    }

    /// Host feedback: fold an execution outcome into health accounting.
    ///
    /// A refused execution after an allowed decision is the serious
    /// case; slow or partial executions degrade softly.
    pub fn record_execution_result(
        &mut self,
        result: &ExecutionResult,
        preceding: &SafetyDecision,
    ) {
        if result.executed && result.latency_ms > SLOW_EXECUTION_MS {
            self.record_anomaly(AnomalySeverity::Soft);
        }
        if result.executed && result.status == ExecutionStatus::Partial {
            self.record_anomaly(AnomalySeverity::Soft);
        }
        if !result.executed && preceding.allowed {
            self.record_anomaly(AnomalySeverity::Hard);
        }
    }

    /// Apply an anomaly penalty and reclassify health.
    ///
    /// After the first anomaly the score is capped at `recovery_cap`
    /// for the rest of the session; only `reset` restores 1.0.
    pub fn record_anomaly(&mut self, severity: AnomalySeverity) {
        let penalty = match severity {
            AnomalySeverity::Soft => self.config.soft_anomaly_severity,
            AnomalySeverity::Hard => self.config.hard_anomaly_severity,
        };
        self.health.score = (self.health.score - penalty)
            .max(0.0)
            .min(self.config.recovery_cap);
        self.health.last_anomaly_ms = Some(self.clock.now_ms());
        self.health.anomaly_count += 1;
        self.health.error_streak += 1;
        self.health.status = self.classify_health(self.health.score);
        log::warn!(
            "anomaly ({severity:?}): health score {:.3}, status {}",
            self.health.score,
            self.health.status
        );
    }

    /// One recovery step: inert while STOPPED or within the grace
    /// window of the last anomaly; otherwise clears the error streak
    /// and regains `recovery_rate`, capped at `recovery_cap`.
    pub fn tick_recovery(&mut self) {
        if self.health.status == HealthStatus::Stopped {
            return;
        }
        let Some(last_anomaly) = self.health.last_anomaly_ms else {
            return;
        };
        if self.clock.now_ms().saturating_sub(last_anomaly) < RECOVERY_GRACE_MS {
            return;
        }
        self.health.error_streak = 0;
        self.health.score = (self.health.score + self.config.recovery_rate)
            .min(self.config.recovery_cap);
        self.health.status = self.classify_health(self.health.score);
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    pub fn cooldown_until_ms(&self) -> Option<u64> {
        self.cooldown_until_ms
    }

    pub fn tokens_used(&self) -> u64 {
        self.tokens_used
    }

    pub fn reset(&mut self) {
        self.tokens_used = 0;
        self.tool_calls = 0;
        self.window_start_ms = self.clock.now_ms();
        self.intervals.clear();
        self.last_event_ms = None;
        self.cooldown_until_ms = None;
        self.health = HealthState::pristine();
    }

    fn roll_window(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.window_start_ms) >= self.config.budget_window_ms {
            self.tokens_used = 0;
            self.tool_calls = 0;
            self.window_start_ms = now_ms;
        }
    }

    fn remaining_budget(&self) -> u64 {
        self.config
            .max_tokens_per_minute
            .saturating_sub(self.tokens_used)
    }

    fn start_cooldown(&mut self, now_ms: u64) {
        self.cooldown_until_ms = Some(now_ms + self.config.cooldown_duration_ms);
        log::error!(
            "behavioral veto: cooldown until {}ms",
            now_ms + self.config.cooldown_duration_ms
        );
    }

    fn reject(
        &self,
        veto: VetoReason,
        reason: String,
        remaining: u64,
        now_ms: u64,
    ) -> KernelResult<SafetyDecision> {
        log::warn!("veto {veto}: {reason}");
        SafetyDecision::veto(veto, remaining, reason, now_ms)
    }

    /// Mean of the last 3 recorded intervals against the mean of the
    /// up-to-3 before them, over a 10-interval window. Fewer than 4
    /// intervals is not enough signal.
    fn tempo_compressed(&self) -> Option<(f64, f64)> {
        if self.intervals.len() < 4 {
            return None;
        }
        let start = self.intervals.len().saturating_sub(INTERVAL_WINDOW);
        let window = &self.intervals[start..];
        let split = window.len() - TEMPO_RECENT;
        let recent = &window[split..];
        let earlier = &window[split.saturating_sub(TEMPO_RECENT)..split];
        if earlier.is_empty() {
            return None;
        }
        let recent_mean = recent.iter().sum::<u64>() as f64 / recent.len() as f64;
        let earlier_mean = earlier.iter().sum::<u64>() as f64 / earlier.len() as f64;
        if earlier_mean > 0.0 && recent_mean < earlier_mean * self.config.tempo_compression_ratio {
            Some((recent_mean, earlier_mean))
        } else {
            None
        }
    }

    fn classify_health(&self, score: f64) -> HealthStatus {
        if score < self.config.hard_stop {
            HealthStatus::Stopped
        } else if score < self.config.soft_suspend {
            HealthStatus::Suspended
        } else if score < HEALTHY_FLOOR {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadman_types::{Intensity, Intent, ManualClock};

    fn working_state(since: u64) -> ActivityState {
        ActivityState::new(Intensity::Normal, ActivityMode::Working, "steady", since).unwrap()
    }

    fn critical_state(mode: ActivityMode, since: u64) -> ActivityState {
        ActivityState::new(Intensity::High, mode, "critical signal", since).unwrap()
    }

    fn continue_intent(ts: u64) -> IntentDecision {
        IntentDecision::new(Intent::Continue, 0.8, "steady work", ts).unwrap()
    }

    fn make_gate(clock: Arc<ManualClock>) -> SafetyGate {
        SafetyGate::new(KernelConfig::default(), clock)
    }

    #[test]
    fn test_allows_healthy_working_state() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        let decision = gate
            .evaluate(&continue_intent(0), &working_state(0))
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining_budget, 50_000);
        assert!(decision.veto.is_none());
    }

    #[test]
    fn test_budget_edge_strict_threshold() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));

        // Five events of 10 000 tokens at t = 0..4 s fill the window
        // exactly; the 5th decision still passes (threshold is >=).
        for i in 0..5u64 {
            clock.set(i * 1_000);
            let decision = gate
                .evaluate(&continue_intent(i * 1_000), &working_state(0))
                .unwrap();
            assert!(decision.allowed, "decision {i} should pass");
            gate.record_event(10_000, 0);
        }
        assert_eq!(gate.tokens_used(), 50_000);

        // One more token at t = 5 s trips the budget veto.
        clock.set(5_000);
        let decision = gate
            .evaluate(&continue_intent(5_000), &working_state(0))
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.veto, Some(VetoReason::TokenBudgetExceeded));
        assert_eq!(decision.remaining_budget, 0);
        gate.record_event(1, 0);

        // Past the window boundary the budget resets and flow resumes.
        clock.set(60_001);
        let decision = gate
            .evaluate(&continue_intent(60_001), &working_state(0))
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining_budget, 50_000);
    }

    #[test]
    fn test_runaway_vetoes_and_starts_cooldown() {
        let clock = Arc::new(ManualClock::new(10_000));
        let mut gate = make_gate(Arc::clone(&clock));
        let decision = gate
            .evaluate(
                &continue_intent(10_000),
                &critical_state(ActivityMode::Runaway, 10_000),
            )
            .unwrap();
        assert_eq!(decision.veto, Some(VetoReason::RunawayDetected));
        assert_eq!(gate.cooldown_until_ms(), Some(70_000));
    }

    #[test]
    fn test_looping_vetoes_and_starts_cooldown() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        let decision = gate
            .evaluate(
                &continue_intent(0),
                &critical_state(ActivityMode::Looping, 0),
            )
            .unwrap();
        assert_eq!(decision.veto, Some(VetoReason::LoopDetected));
        assert_eq!(gate.cooldown_until_ms(), Some(60_000));
    }

    #[test]
    fn test_cooldown_rejects_before_behavior() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        gate.evaluate(
            &continue_intent(0),
            &critical_state(ActivityMode::Runaway, 0),
        )
        .unwrap();

        clock.set(30_000);
        let decision = gate
            .evaluate(&continue_intent(30_000), &working_state(0))
            .unwrap();
        assert_eq!(decision.veto, Some(VetoReason::CooldownActive));

        clock.set(60_000);
        let decision = gate
            .evaluate(&continue_intent(60_000), &working_state(0))
            .unwrap();
        assert!(decision.allowed, "cooldown expired exactly at its bound");
    }

    #[test]
    fn test_tool_call_rate_cap() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        for i in 0..60u64 {
            clock.set(i * 500);
            gate.record_event(10, 1);
        }
        clock.set(30_500);
        let decision = gate
            .evaluate(&continue_intent(30_500), &working_state(0))
            .unwrap();
        assert_eq!(decision.veto, Some(VetoReason::RateLimitExceeded));
    }

    #[test]
    fn test_tempo_compression_rate_veto() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        // 4 events 5 s apart, then 3 bursts 100 ms apart.
        let mut ts = 0u64;
        for i in 0..7u64 {
            if i > 0 {
                ts += if i < 4 { 5_000 } else { 100 };
            }
            clock.set(ts);
            gate.record_event(10, 1);
        }
        let decision = gate.evaluate(&continue_intent(ts), &working_state(0)).unwrap();
        assert_eq!(decision.veto, Some(VetoReason::RateLimitExceeded));
    }

    #[test]
    fn test_low_confidence_rejected_as_health() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        let weak = IntentDecision::new(Intent::Continue, 0.1, "barely sure", 0).unwrap();
        let decision = gate.evaluate(&weak, &working_state(0)).unwrap();
        assert_eq!(decision.veto, Some(VetoReason::HealthDegraded));
    }

    #[test]
    fn test_non_finite_confidence_is_numerical_error() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        let broken = IntentDecision {
            intent: Intent::Continue,
            confidence: f64::NAN,
            reason: "corrupted".to_string(),
            timestamp_ms: 0,
        };
        let result = gate.evaluate(&broken, &working_state(0));
        assert!(matches!(result, Err(KernelError::Numerical(_))));
    }

    #[test]
    fn test_anomaly_capped_at_recovery_cap() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        gate.record_anomaly(AnomalySeverity::Soft);
        // After any anomaly the score cannot exceed the recovery cap.
        assert!(gate.health().score <= 0.8);
        assert_eq!(gate.health().anomaly_count, 1);
        assert_eq!(gate.health().error_streak, 1);
    }

    #[test]
    fn test_hard_anomalies_walk_down_statuses() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        for _ in 0..3 {
            gate.record_anomaly(AnomalySeverity::Hard);
        }
        // 0.8 cap, then -0.1 twice: 0.6 is SUSPENDED territory's edge.
        assert!((gate.health().score - 0.6).abs() < 1e-9);
        assert_eq!(gate.health().status, HealthStatus::Degraded);

        for _ in 0..3 {
            gate.record_anomaly(AnomalySeverity::Hard);
        }
        assert_eq!(gate.health().status, HealthStatus::Suspended);

        let decision = gate
            .evaluate(&continue_intent(0), &working_state(0))
            .unwrap();
        assert_eq!(decision.veto, Some(VetoReason::HealthDegraded));
    }

    #[test]
    fn test_stopped_is_permanent_until_reset() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        // Cap at 0.8, then -0.1 per hard anomaly; 0.2 is below hard_stop.
        for _ in 0..7 {
            gate.record_anomaly(AnomalySeverity::Hard);
        }
        assert_eq!(gate.health().status, HealthStatus::Stopped);

        clock.set(10_000_000);
        for _ in 0..1_000 {
            gate.tick_recovery();
        }
        assert_eq!(gate.health().status, HealthStatus::Stopped);

        gate.reset();
        assert_eq!(gate.health().status, HealthStatus::Healthy);
        assert_eq!(gate.health().score, 1.0);
    }

    #[test]
    fn test_recovery_waits_for_grace_then_climbs() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        for _ in 0..4 {
            gate.record_anomaly(AnomalySeverity::Hard);
        }
        let degraded_score = gate.health().score;
        assert_eq!(gate.health().status, HealthStatus::Suspended);

        // Inside the grace window nothing moves.
        clock.set(30_000);
        gate.tick_recovery();
        assert_eq!(gate.health().score, degraded_score);
        assert_eq!(gate.health().error_streak, 4);

        // Past the grace window the score climbs and the streak clears.
        clock.set(61_000);
        gate.tick_recovery();
        assert!(gate.health().score > degraded_score);
        assert_eq!(gate.health().error_streak, 0);

        for _ in 0..1_000 {
            gate.tick_recovery();
        }
        assert!((gate.health().score - 0.8).abs() < 1e-9, "capped at 0.8");
        assert_eq!(gate.health().status, HealthStatus::Healthy);
    }

    #[test]
    fn test_pristine_gate_never_ticks_upward() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut gate = make_gate(Arc::clone(&clock));
        gate.tick_recovery();
        assert_eq!(gate.health().score, 1.0);
    }

    #[test]
    fn test_execution_feedback_anomalies() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        let allowed = SafetyDecision::allow(50_000, "all checks passed", 0).unwrap();

        // Slow execution: soft.
        let slow = ExecutionResult {
            executed: true,
            status: ExecutionStatus::Success,
            tokens_used: 10,
            latency_ms: 12_000,
            timestamp_ms: 0,
        };
        gate.record_execution_result(&slow, &allowed);
        assert_eq!(gate.health().anomaly_count, 1);

        // Partial execution: soft.
        let partial = ExecutionResult {
            executed: true,
            status: ExecutionStatus::Partial,
            tokens_used: 10,
            latency_ms: 100,
            timestamp_ms: 0,
        };
        gate.record_execution_result(&partial, &allowed);
        assert_eq!(gate.health().anomaly_count, 2);

        // Allowed but never executed: hard.
        let refused = ExecutionResult::failed(0);
        let before = gate.health().score;
        gate.record_execution_result(&refused, &allowed);
        assert_eq!(gate.health().anomaly_count, 3);
        assert!((before - gate.health().score - 0.10).abs() < 1e-9);

        // Blocked after a veto is the contract working, not an anomaly.
        let vetoed =
            SafetyDecision::veto(VetoReason::LoopDetected, 0, "loop", 0).unwrap();
        gate.record_execution_result(&ExecutionResult::blocked(0), &vetoed);
        assert_eq!(gate.health().anomaly_count, 3);
    }

    #[test]
    fn test_window_reset_on_record_event() {
        let clock = Arc::new(ManualClock::new(0));
        let mut gate = make_gate(Arc::clone(&clock));
        gate.record_event(40_000, 10);
        clock.set(70_000);
        gate.record_event(100, 1);
        assert_eq!(gate.tokens_used(), 100);
    }
}
