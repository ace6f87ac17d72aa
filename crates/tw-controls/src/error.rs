//! Error types for controller coupling.

use thiserror::Error;

/// Result type for controller operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while loading or driving an external controller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// The controller library could not be opened.
    #[error("Failed to load controller library {path}: {message}")]
    LibraryLoad { path: String, message: String },

    /// A required entry point is missing from the library.
    #[error("Controller entry point {symbol} not found: {message}")]
    MissingSymbol { symbol: String, message: String },

    /// The controller parameter file is missing or unreadable.
    #[error("Controller parameter file {path}: {message}")]
    ParameterFile { path: String, message: String },

    /// The controller reported a fatal fail flag.
    #[error("Controller failed (flag {code}): {message}")]
    FailFlag { code: i32, message: String },

    /// Controller state error.
    #[error("Controller state error: {what}")]
    StateError { what: String },
}
