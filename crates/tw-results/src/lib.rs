//! tw-results: replay storage, replay archives and the run cache.

pub mod archive;
pub mod hash;
pub mod replay;
pub mod store;
pub mod types;

pub use archive::{CURRENT_ARCHIVE_VERSION, read_archive, write_archive, write_archive_version};
pub use hash::compute_run_id;
pub use replay::{ReplayStore, WakeFrame};
pub use store::RunStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },

    #[error("Duplicate channel: {name}")]
    DuplicateChannel { name: String },

    #[error("Expected {expected} channel values, got {got}")]
    ChannelCount { expected: usize, got: usize },

    #[error("Time {time} does not follow {last}")]
    TimeNotIncreasing { last: f64, time: f64 },

    #[error("Non-finite value in channel {channel}")]
    NonFinite { channel: String },

    #[error("Archive error: {what}")]
    Archive { what: String },

    #[error("Unsupported archive version: {version}")]
    UnsupportedVersion { version: u32 },
}
