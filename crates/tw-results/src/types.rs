//! Result data types.

use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: RunId,
    pub project_name: String,
    /// RFC 3339, UTC
    pub timestamp: String,
    pub solver_version: String,
    /// Induction device the run used
    pub device: String,
    pub timestep_s: f64,
    pub number_of_timesteps: usize,
    pub stored_steps: usize,
    pub outcome: RunStatus,
    /// First failure the run reported, e.g. a controller disabled mid-run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// How a run ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RunStatus {
    Finished,
    StoppedByUser { at_step: usize },
    Aborted { at_step: usize, reason: String },
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Finished)
    }
}
