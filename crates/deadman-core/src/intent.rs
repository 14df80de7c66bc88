// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Intent Core
// ─────────────────────────────────────────────────────────────────────
//! Maps a classified activity state to an action intent with a
//! confidence value, decaying confidence between decisions and
//! invalidating stale intents when the activity turns critical.

use std::collections::VecDeque;
use std::sync::Arc;

use deadman_types::{
    ActivityMode, ActivityState, AgentEvent, Clock, Intensity, Intent, IntentDecision,
    KernelConfig, KernelResult,
};

/// Most recent token counts retained for trend estimation.
const TOKEN_HISTORY_CAP: usize = 20;

/// Trend compares the mean of this many trailing samples against the
/// mean of the samples immediately before them.
const TREND_WINDOW: usize = 3;

/// Minimum history before a trend is estimated at all.
const TREND_MIN_SAMPLES: usize = 5;

pub struct IntentCore {
    config: KernelConfig,
    clock: Arc<dyn Clock>,
    last: Option<IntentDecision>,
    token_history: VecDeque<u64>,
}

impl IntentCore {
    pub fn new(config: KernelConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            last: None,
            token_history: VecDeque::with_capacity(TOKEN_HISTORY_CAP),
        }
    }

    /// Feed the event's token count into the trend history.
    pub fn update(&mut self, event: &AgentEvent) {
        self.token_history.push_back(event.token_count);
        if self.token_history.len() > TOKEN_HISTORY_CAP {
            self.token_history.pop_front();
        }
    }

    /// Produce the intent for the given state.
    ///
    /// A previous non-PAUSE intent whose decayed confidence is still
    /// positive is reused, unless the activity state invalidates it,
    /// in which case a fresh PAUSE takes its place.
    pub fn decide(&mut self, state: &ActivityState) -> KernelResult<IntentDecision> {
        let now_ms = self.clock.now_ms();

        if let Some(last) = &self.last {
            if last.intent != Intent::Pause {
                let elapsed_s = now_ms.saturating_sub(last.timestamp_ms) as f64 / 1_000.0;
                let decayed =
                    (last.confidence - elapsed_s * self.config.confidence_decay_rate).max(0.0);
                if decayed > 0.0 {
                    let critical_continue =
                        last.intent == Intent::Continue && state.mode.is_critical();
                    let hot_and_confident =
                        state.intensity == Intensity::High && last.confidence > 0.5;
                    if critical_continue || hot_and_confident {
                        let fresh = IntentDecision::new(
                            Intent::Pause,
                            0.5,
                            "Invalidated: activity mode critical",
                            now_ms,
                        )?;
                        self.last = Some(fresh.clone());
                        return Ok(fresh);
                    }
                    let reason = format!("{} (decayed)", last.reason);
                    return IntentDecision::new(last.intent, decayed, reason, last.timestamp_ms);
                }
            }
        }

        let fresh = self.generate(state, now_ms)?;
        self.last = Some(fresh.clone());
        Ok(fresh)
    }

    pub fn last(&self) -> Option<&IntentDecision> {
        self.last.as_ref()
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.token_history.clear();
    }

    /// Fixed priority ladder: RUNAWAY and LOOPING demand a stop, HIGH
    /// intensity a pause, IDLE and WORKING continue.
    fn generate(&self, state: &ActivityState, now_ms: u64) -> KernelResult<IntentDecision> {
        if state.mode == ActivityMode::Runaway {
            return IntentDecision::new(
                Intent::Stop,
                1.0,
                "RUNAWAY mode detected - uncontrolled activity",
                now_ms,
            );
        }
        if state.mode == ActivityMode::Looping {
            return IntentDecision::new(
                Intent::Stop,
                0.9,
                "LOOPING mode detected - repetitive behavior",
                now_ms,
            );
        }
        if state.intensity == Intensity::High {
            return IntentDecision::new(
                Intent::Pause,
                0.7,
                "HIGH intensity - approaching resource limits",
                now_ms,
            );
        }
        if state.mode == ActivityMode::Idle {
            return IntentDecision::new(
                Intent::Continue,
                0.3,
                "IDLE mode - waiting for activity",
                now_ms,
            );
        }
        IntentDecision::new(
            Intent::Continue,
            self.working_confidence(state.intensity),
            format!("WORKING mode: intensity={}", state.intensity),
            now_ms,
        )
    }

    /// Confidence for a WORKING continue, modulated by the token trend:
    /// a sharp ramp-up erodes confidence, a wind-down raises it.
    fn working_confidence(&self, intensity: Intensity) -> f64 {
        let base = match intensity {
            Intensity::Low => 0.8,
            Intensity::Normal => 0.6,
            Intensity::High => 0.3,
        };
        let trend = self.token_trend();
        let adjusted: f64 = if trend > 0.5 {
            base * 0.7
        } else if trend < -0.5 {
            base * 1.1
        } else {
            base
        };
        adjusted.clamp(0.1, 1.0)
    }

    /// Relative change of the recent token mean against the mean of
    /// the samples just before it. Zero when the history is short or
    /// the prior mean is zero.
    fn token_trend(&self) -> f64 {
        let len = self.token_history.len();
        if len < TREND_MIN_SAMPLES {
            return 0.0;
        }
        let samples: Vec<f64> = self.token_history.iter().map(|&t| t as f64).collect();
        let recent = &samples[len - TREND_WINDOW..];
        let prior = &samples[len.saturating_sub(2 * TREND_WINDOW)..len - TREND_WINDOW];
        let prior_mean = prior.iter().sum::<f64>() / prior.len() as f64;
        if prior_mean == 0.0 {
            return 0.0;
        }
        let recent_mean = recent.iter().sum::<f64>() / recent.len() as f64;
        (recent_mean - prior_mean) / prior_mean
    }
}
