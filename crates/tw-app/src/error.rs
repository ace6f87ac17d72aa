//! Error types for the tw-app service layer.

use std::path::PathBuf;

/// Unified error of the service layer, shared by every frontend.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Failed to read project file: {path}")]
    ProjectFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Project validation failed: {0}")]
    Validation(String),

    #[error("Turbine not found: {0}")]
    TurbineNotFound(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Induction device error: {0}")]
    Device(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write access refused while a run holds the project.
    #[error("simulation running")]
    Busy,

    #[error("Run worker failed: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<tw_project::ProjectError> for AppError {
    fn from(err: tw_project::ProjectError) -> Self {
        match err {
            tw_project::ProjectError::Validation(e) => AppError::Validation(e.to_string()),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<tw_sim::SimError> for AppError {
    fn from(err: tw_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<tw_induction::InductionError> for AppError {
    fn from(err: tw_induction::InductionError) -> Self {
        AppError::Device(err.to_string())
    }
}

impl From<tw_results::ResultsError> for AppError {
    fn from(err: tw_results::ResultsError) -> Self {
        match err {
            tw_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
