// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Core Decision Components
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! The three leaf components of the kill-switch decision pipeline:
//! activity classification, intent derivation, and the safety gate.
//!
//! # Safety Invariants
//!
//! 1. **The gate is the single veto point**: neither the classifier nor
//!    the intent core can allow anything; they only feed the gate, and
//!    every rejection carries a veto tag.
//!
//! 2. **Hysteresis keeps critical modes sticky**: once LOOPING or
//!    RUNAWAY is entered, the classifier holds it for at least
//!    `min_state_duration_ms × critical_exit_multiplier` of clock time
//!    even if the signal clears immediately. A one-event lull cannot
//!    reopen the gate.
//!
//! 3. **Bounded state, bounded cost**: every buffer is a fixed-capacity
//!    FIFO (tens of elements); each operation is O(buffer size) with no
//!    allocation beyond the records it returns.
//!
//! 4. **Health never fully heals**: after any anomaly the score is
//!    capped at `recovery_cap`; only an explicit reset restores 1.0.

pub mod classifier;
pub mod gate;
pub mod intent;

pub use classifier::{ActivityClassifier, ActivityEngine};
pub use gate::{AnomalySeverity, SafetyGate};
pub use intent::IntentCore;
