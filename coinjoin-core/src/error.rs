//! Error kinds for the coordinator core (spec.md \S7).

use thiserror::Error;

/// A specialized `Result` type for coordinator core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Request arrived outside its permitted phase. Reject the single
    /// request; round state is untouched.
    #[error("wrong phase: {0}")]
    WrongPhase(&'static str),

    /// Lookup against the A-entry set failed.
    #[error("unknown participant id")]
    UnknownId,

    /// Amounts, script bytes, or witness signatures failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The fee estimator or exchange-rate provider failed; the caller
    /// falls back per \S4.3/\S4.4 rather than propagating this further.
    #[error("external collaborator unavailable: {0}")]
    ExternalUnavailable(String),

    /// Any uncaught failure inside the phase loop. The scheduler sets
    /// `fallback = true` and restarts at `InputRegistration` rather
    /// than letting this escape `run`.
    #[error("scheduler fault: {0}")]
    SchedulerFault(String),
}
