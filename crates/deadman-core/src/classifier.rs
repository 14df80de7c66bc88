// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Activity Classifier
// ─────────────────────────────────────────────────────────────────────
//! Classifies the recent event stream into a behavioral mode and
//! intensity, with hysteresis so the state does not flap.
//!
//! Mode priority (first match wins): LOOPING, RUNAWAY, IDLE, WORKING.
//! Critical modes (LOOPING, RUNAWAY) carry extra exit hysteresis.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use deadman_types::{
    ActivityMode, ActivityState, AgentEvent, Clock, Intensity, KernelConfig, KernelResult,
};

/// Seam between the pipeline and activity classification.
///
/// The pipeline treats the engine as fallible and degrades to a
/// defensive RUNAWAY state when it errors; tests substitute faulting
/// engines through this trait.
pub trait ActivityEngine: Send {
    fn process(&mut self, event: &AgentEvent) -> KernelResult<ActivityState>;
    fn current(&self) -> Option<&ActivityState>;
    fn reset(&mut self);
}

/// Buffer-driven activity classifier.
///
/// Owns two bounded FIFOs: the raw event window and the output-hash
/// window used for loop detection. State is recomputed from the
/// buffers on every event and gated by hysteresis before replacing
/// the current classification.
pub struct ActivityClassifier {
    config: KernelConfig,
    clock: Arc<dyn Clock>,
    events: VecDeque<AgentEvent>,
    hashes: VecDeque<String>,
    current: Option<ActivityState>,
}

/// Intensity calc looks at most this many recent events.
const INTENSITY_WINDOW: usize = 10;

/// Minimum buffered events before tempo compression is meaningful.
const RUNAWAY_MIN_EVENTS: usize = 6;

/// Number of trailing inter-event intervals in the "recent" tempo mean.
const TEMPO_RECENT: usize = 3;

impl ActivityClassifier {
    pub fn new(config: KernelConfig, clock: Arc<dyn Clock>) -> Self {
        let event_capacity = config.event_buffer_size;
        let hash_capacity = config.loop_window_size;
        Self {
            config,
            clock,
            events: VecDeque::with_capacity(event_capacity),
            hashes: VecDeque::with_capacity(hash_capacity),
            current: None,
        }
    }

    /// Tokens per minute over the last up-to-10 events, and the
    /// intensity band it falls in. Fewer than 3 buffered events is not
    /// enough signal: NORMAL.
    fn classify_intensity(&self) -> (Intensity, f64) {
        if self.events.len() < 3 {
            return (Intensity::Normal, 0.0);
        }
        let start = self.events.len().saturating_sub(INTENSITY_WINDOW);
        let first_ts = self.events[start].timestamp_ms;
        let last_ts = self.events[self.events.len() - 1].timestamp_ms;
        let tokens: u64 = self
            .events
            .iter()
            .skip(start)
            .map(|event| event.token_count)
            .sum();

        let span_ms = last_ts.saturating_sub(first_ts);
        let tokens_per_minute = if span_ms == 0 {
            tokens as f64
        } else {
            tokens as f64 / span_ms as f64 * 60_000.0
        };

        let intensity = if tokens_per_minute < self.config.intensity_low_threshold {
            Intensity::Low
        } else if tokens_per_minute > self.config.intensity_high_threshold {
            Intensity::High
        } else {
            Intensity::Normal
        };
        (intensity, tokens_per_minute)
    }

    /// Repetition ratio of the hash window: 1.0 when every hash is
    /// identical, falling toward 0 as hashes diversify. Only defined
    /// on a full window.
    fn loop_repetition(&self) -> Option<f64> {
        if self.hashes.len() < self.config.loop_window_size {
            return None;
        }
        let distinct: HashSet<&str> = self.hashes.iter().map(String::as_str).collect();
        let window = self.config.loop_window_size as f64;
        Some(1.0 - (distinct.len() as f64 - 1.0) / window)
    }

    /// Whether the most recent inter-event intervals have collapsed
    /// relative to the older ones.
    fn tempo_compressed(&self) -> Option<(f64, f64)> {
        if self.events.len() < RUNAWAY_MIN_EVENTS {
            return None;
        }
        let intervals: Vec<u64> = self
            .events
            .iter()
            .zip(self.events.iter().skip(1))
            .map(|(a, b)| b.timestamp_ms.saturating_sub(a.timestamp_ms))
            .collect();
        let split = intervals.len() - TEMPO_RECENT;
        let recent = &intervals[split..];
        let earlier = &intervals[..split];
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

    fn classify_mode(&self, intensity: Intensity, now_ms: u64) -> (ActivityMode, String) {
        if let Some(repetition) = self.loop_repetition() {
            if repetition >= self.config.loop_similarity_threshold {
                return (
                    ActivityMode::Looping,
                    format!(
                        "output repetition {:.2} over {} hashes",
                        repetition, self.config.loop_window_size
                    ),
                );
            }
        }

        if intensity == Intensity::High {
            if let Some((recent_mean, earlier_mean)) = self.tempo_compressed() {
                return (
                    ActivityMode::Runaway,
                    format!("tempo compressed to {recent_mean:.0}ms from {earlier_mean:.0}ms"),
                );
            }
        }

        match self.events.back() {
            None => (ActivityMode::Idle, "no events observed".to_string()),
            Some(last) => {
                let silence_ms = now_ms.saturating_sub(last.timestamp_ms);
                if silence_ms > self.config.idle_timeout_ms {
                    (
                        ActivityMode::Idle,
                        format!("no activity for {silence_ms}ms"),
                    )
                } else {
                    (ActivityMode::Working, "steady event flow".to_string())
                }
            }
        }
    }

    /// Hysteresis gate: hold the current state for `min_state_duration_ms`,
    /// multiplied by the critical exit factor when leaving a critical
    /// mode, and never churn `since` on an identical classification.
    fn apply_transition(&mut self, candidate: ActivityState, now_ms: u64) -> ActivityState {
        let next = match self.current.take() {
            None => candidate,
            Some(current) => {
                let elapsed = now_ms.saturating_sub(current.since_ms);
                let min_hold = self.config.min_state_duration_ms;
                let critical_hold = min_hold * self.config.critical_exit_multiplier;

                if elapsed < min_hold {
                    current
                } else if current.mode.is_critical()
                    && !candidate.mode.is_critical()
                    && elapsed < critical_hold
                {
                    current
                } else if current.mode == candidate.mode
                    && current.intensity == candidate.intensity
                {
                    current
                } else {
                    candidate
                }
            }
        };
        self.current = Some(next.clone());
        next
    }
}

impl ActivityEngine for ActivityClassifier {
    /// Append the event, recompute a candidate classification from the
    /// buffers, and pass it through the hysteresis gate.
    fn process(&mut self, event: &AgentEvent) -> KernelResult<ActivityState> {
        self.events.push_back(event.clone());
        if self.events.len() > self.config.event_buffer_size {
            self.events.pop_front();
        }
        if let Some(hash) = &event.output_hash {
            self.hashes.push_back(hash.clone());
            if self.hashes.len() > self.config.loop_window_size {
                self.hashes.pop_front();
            }
        }

        let now_ms = self.clock.now_ms();
        let (intensity, tokens_per_minute) = self.classify_intensity();
        let (mode, detail) = self.classify_mode(intensity, now_ms);
        let reason = format!(
            "{mode} at {intensity} intensity ({tokens_per_minute:.0} tok/min): {detail}"
        );
        let candidate = ActivityState::new(intensity, mode, reason, now_ms)?;
        Ok(self.apply_transition(candidate, now_ms))
    }

    fn current(&self) -> Option<&ActivityState> {
        self.current.as_ref()
    }

    fn reset(&mut self) {
        self.events.clear();
        self.hashes.clear();
        self.current = None;
    }
}
