//! Per-run context passed explicitly through the simulation.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tw_induction::{DeviceSelection, InductionSolver};

use crate::error::SimResult;

/// Cooperative stop request, polled once per timestep.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Diagnostic switches of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugToggles {
    /// Check wake referential integrity after every step
    pub check_wake_integrity: bool,
    /// Log every circulation iteration count
    pub log_circulation: bool,
}

pub struct SimulationContext {
    pub solver: InductionSolver,
    pub stop: StopHandle,
    pub debug: DebugToggles,
    /// Directory relative input files are resolved against
    pub project_dir: PathBuf,
}

impl SimulationContext {
    pub fn new(selection: &DeviceSelection, project_dir: impl Into<PathBuf>) -> SimResult<Self> {
        Ok(Self {
            solver: InductionSolver::from_selection(selection)?,
            stop: StopHandle::new(),
            debug: DebugToggles::default(),
            project_dir: project_dir.into(),
        })
    }

    /// CPU context, mostly for tests.
    pub fn cpu(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            solver: InductionSolver::cpu(),
            stop: StopHandle::new(),
            debug: DebugToggles::default(),
            project_dir: project_dir.into(),
        }
    }

    pub fn device(&self) -> DeviceSelection {
        self.solver.selection()
    }

    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}

impl std::fmt::Debug for SimulationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationContext")
            .field("backend", &self.solver.backend_name())
            .field("debug", &self.debug)
            .field("project_dir", &self.project_dir)
            .finish()
    }
}
