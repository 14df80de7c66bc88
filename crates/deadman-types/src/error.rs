// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Deadman Kernel failures.
#[derive(Error, Debug)]
pub enum KernelError {
    /// Configuration rejected at construction.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid input (event, reason string, parameters).
    #[error("validation error: {0}")]
    Validation(String),

    /// Numerical error (NaN/Inf in computation).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Activity classification failed unrecoverably.
    #[error("activity engine error: {0}")]
    Activity(String),

    /// Intent derivation failed unrecoverably.
    #[error("intent core error: {0}")]
    Intent(String),

    /// Safety gate evaluation failed unrecoverably.
    #[error("safety gate error: {0}")]
    Safety(String),

    /// Execution adapter failed or refused the call.
    #[error("adapter error: {0}")]
    Adapter(String),

    /// Telemetry sink or fingerprint serialization failed.
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

pub type KernelResult<T> = Result<T, KernelError>;
