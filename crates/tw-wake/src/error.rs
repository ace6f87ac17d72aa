//! Error types for wake operations.

use thiserror::Error;

/// Errors raised by the wake lifecycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WakeError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-finite {what} during wake update at step {step}")]
    NonFinite { what: &'static str, step: usize },

    #[error("Wake invariant violated: {what}")]
    Invariant { what: String },

    #[error("Induction failed: {0}")]
    Induction(#[from] tw_induction::InductionError),

    #[error("Core error: {0}")]
    Core(#[from] tw_core::TwError),
}

pub type WakeResult<T> = Result<T, WakeError>;
