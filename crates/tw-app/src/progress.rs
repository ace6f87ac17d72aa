#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStage {
    LoadingProject,
    CheckingCache,
    LoadingCachedResult,
    Preparing,
    Simulating,
    SavingResults,
    Completed,
}

impl RunStage {
    pub fn label(&self) -> &'static str {
        match self {
            RunStage::LoadingProject => "loading project",
            RunStage::CheckingCache => "checking cache",
            RunStage::LoadingCachedResult => "loading cached run",
            RunStage::Preparing => "preparing",
            RunStage::Simulating => "simulating",
            RunStage::SavingResults => "saving results",
            RunStage::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepProgress {
    pub step: usize,
    pub number_of_timesteps: usize,
    pub sim_time_s: f64,
    pub fraction_complete: f64,
    /// Entries in the replay store so far
    pub stored: usize,
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub step: Option<StepProgress>,
}

impl RunProgressEvent {
    pub fn stage(stage: RunStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
            step: None,
        }
    }
}
