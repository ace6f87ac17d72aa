//! Error types for simulation setup and run-level failures.

use thiserror::Error;

/// Errors encountered while building or driving a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Non-finite {what} at step {step}")]
    NonFinite { what: &'static str, step: usize },

    #[error("Invalid driver state: {what}")]
    InvalidState { what: &'static str },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<tw_wake::WakeError> for SimError {
    fn from(e: tw_wake::WakeError) -> Self {
        match e {
            tw_wake::WakeError::NonFinite { what, step } => SimError::NonFinite { what, step },
            other => SimError::Backend {
                message: other.to_string(),
            },
        }
    }
}

impl From<tw_induction::InductionError> for SimError {
    fn from(e: tw_induction::InductionError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

impl From<tw_controls::ControlError> for SimError {
    fn from(e: tw_controls::ControlError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

impl From<tw_core::TwError> for SimError {
    fn from(e: tw_core::TwError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

/// How far a failure reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureCategory {
    /// Non-finite geometry or integration state; the run stops
    FatalToRun,
    /// Controller load, initialisation or fail flag; that controller stops
    FatalToController,
    /// Iteration cap reached; the best effort result is kept
    Soft,
    /// Missing or invalid inputs; the run never starts
    Configuration,
}

/// A failure with its category and a human readable reason.
#[derive(Clone, Debug, PartialEq)]
pub struct RunFailure {
    pub category: FailureCategory,
    pub reason: String,
}

impl RunFailure {
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            category: FailureCategory::FatalToRun,
            reason: reason.into(),
        }
    }

    pub fn controller(reason: impl Into<String>) -> Self {
        Self {
            category: FailureCategory::FatalToController,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.category, self.reason)
    }
}
