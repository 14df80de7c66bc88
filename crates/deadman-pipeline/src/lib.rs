// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Pipeline Orchestrator
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! The synchronous decision pipeline: classifier, intent core, and
//! safety gate composed under a fixed stage order, with a SHA-256
//! replay fingerprint over the decision stream and telemetry emission
//! toward downstream sinks.
//!
//! # Safety Invariants
//!
//! 1. **No execution without permission**: the adapter is called only
//!    when the gate allowed the decision; vetoed events get a
//!    synthesized BLOCKED result.
//!
//! 2. **Stage faults never abort the loop**: a faulting stage is
//!    replaced by a lethal-safe substitute (RUNAWAY state, zero-
//!    confidence PAUSE, rejecting decision) plus an ERROR record, and
//!    processing continues with the next event.
//!
//! 3. **Replay parity**: the fingerprint folds every event, intent,
//!    decision, and result in stream order; identical inputs, config,
//!    and clock give byte-identical digests.

pub mod adapter;
pub mod fingerprint;
pub mod pipeline;
pub mod sink;

pub use adapter::{ExecutionAdapter, NoopAdapter};
pub use fingerprint::Fingerprint;
pub use pipeline::{Pipeline, ProcessOutcome, RunReport};
pub use sink::{JsonlSink, TelemetrySink};
