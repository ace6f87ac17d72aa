//! Error types for induced velocity evaluation.

use thiserror::Error;

/// Errors raised while selecting or running an induction backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InductionError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Accelerator device {index} not found ({available} available)")]
    DeviceNotFound { index: usize, available: usize },

    #[error("Device error: {message}")]
    Device { message: String },

    #[error("Thread pool error: {message}")]
    ThreadPool { message: String },

    #[error("Kernel returned {got} results for {expected} points")]
    ResultLength { expected: usize, got: usize },
}

pub type InductionResult<T> = Result<T, InductionError>;
