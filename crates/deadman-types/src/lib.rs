// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Shared Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! Deadman Kernel — the behavioral kill-switch for autonomous agents.

pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod event;
pub mod health;
pub mod state;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::KernelConfig;
pub use decision::{clamp_unit, Intent, IntentDecision, SafetyDecision, VetoReason};
pub use error::{KernelError, KernelResult};
pub use event::{AgentEvent, ExecutionResult, ExecutionStatus};
pub use health::{HealthState, HealthStatus};
pub use state::{ActivityMode, ActivityState, Intensity};
pub use telemetry::SystemEvent;
