//! Shared application service layer for turbowake.
//!
//! Frontends go through this crate for project loading, run execution on a
//! worker thread, the run cache and result queries.

pub mod error;
pub mod lock;
pub mod progress;
pub mod project_service;
pub mod query;
pub mod run_service;

pub use error::{AppError, AppResult};
pub use lock::{ProjectLock, RunGuard};
pub use progress::{RunProgressEvent, RunStage, StepProgress};
pub use project_service::{TurbineSummary, get_turbine, list_turbines, load_project, save_project, validate_project};
pub use query::{RunSummary, extract_series, get_run_summary, list_channels, series_to_csv};
pub use run_service::{
    RunHandle, RunOptions, RunRequest, RunResponse, SOLVER_VERSION, delete_run, ensure_run, ensure_run_with_progress,
    list_runs, load_run, spawn_run,
};
