//! Run execution and caching service.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::{info, warn};
use tw_core::timing::{PerfStats, phase_timing};
use tw_induction::DeviceSelection;
use tw_project::schema::Project;
use tw_results::{ReplayStore, RunManifest, RunStore};
use tw_sim::{DebugToggles, Observer, SimConfig, SimulationContext, SimulationDriver, StopHandle};

use crate::error::{AppError, AppResult};
use crate::lock::{ProjectLock, RunGuard};
use crate::progress::{RunProgressEvent, RunStage, StepProgress};
use crate::project_service;

pub const SOLVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options for running simulations.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
    pub solver_version: String,
    pub device: DeviceSelection,
    pub debug: DebugToggles,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            solver_version: SOLVER_VERSION.to_string(),
            device: DeviceSelection::Cpu,
            debug: DebugToggles::default(),
        }
    }
}

/// Request to execute a run.
pub struct RunRequest<'a> {
    pub project_path: &'a Path,
    pub options: RunOptions,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    pub timing: PerfStats,
}

type ProgressCallback<'a> = Option<&'a mut dyn FnMut(RunProgressEvent)>;

fn emit_progress(progress_cb: &mut ProgressCallback<'_>, stage: RunStage, started: Instant, message: &str) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent::stage(
            stage,
            started.elapsed().as_secs_f64(),
            Some(message.to_string()),
        ));
    }
}

/// Forwards driver progress as [`RunProgressEvent`]s.
struct ProgressObserver<'a, 'b> {
    progress_cb: &'a mut ProgressCallback<'b>,
    started: Instant,
    number_of_timesteps: usize,
    timestep_s: f64,
    stored: usize,
}

impl Observer for ProgressObserver<'_, '_> {
    fn on_progress(&mut self, step: usize) {
        if let Some(cb) = self.progress_cb.as_deref_mut() {
            cb(RunProgressEvent {
                stage: RunStage::Simulating,
                elapsed_wall_s: self.started.elapsed().as_secs_f64(),
                message: None,
                step: Some(StepProgress {
                    step,
                    number_of_timesteps: self.number_of_timesteps,
                    sim_time_s: step as f64 * self.timestep_s,
                    fraction_complete: step as f64 / self.number_of_timesteps.max(1) as f64,
                    stored: self.stored,
                }),
            });
        }
    }

    fn on_graph_data_changed(&mut self, stored: usize) {
        self.stored = stored;
    }
}

/// Execute or load a run based on request.
pub fn ensure_run(request: &RunRequest) -> AppResult<RunResponse> {
    ensure_run_with_progress(request, None)
}

/// Execute or load a run and stream progress events.
pub fn ensure_run_with_progress(
    request: &RunRequest,
    progress_cb: ProgressCallback<'_>,
) -> AppResult<RunResponse> {
    execute(request.project_path, &request.options, progress_cb, StopHandle::new())
}

fn project_dir(project_path: &Path) -> PathBuf {
    match project_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn execute(
    project_path: &Path,
    options: &RunOptions,
    mut progress_cb: ProgressCallback<'_>,
    stop: StopHandle,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let mut timing = PerfStats::default();

    emit_progress(&mut progress_cb, RunStage::LoadingProject, started, "Loading project");
    let project = project_service::load_project(project_path)?;

    emit_progress(&mut progress_cb, RunStage::CheckingCache, started, "Checking run cache");
    let device = options.device.to_string();
    let run_id = tw_results::compute_run_id(&project, &device, &options.solver_version);
    let store = RunStore::for_project(project_path)?;

    // only finished runs count as cached; stopped or aborted ones are re-run
    if options.use_cache && store.has_run(&run_id) {
        let load_started = Instant::now();
        let manifest = store.load_manifest(&run_id)?;
        if manifest.outcome.is_finished() {
            emit_progress(
                &mut progress_cb,
                RunStage::LoadingCachedResult,
                started,
                "Loading cached run",
            );
            timing.load_time_s = load_started.elapsed().as_secs_f64();
            emit_progress(&mut progress_cb, RunStage::Completed, started, "Loaded cached run");
            return Ok(RunResponse {
                run_id,
                manifest,
                loaded_from_cache: true,
                timing,
            });
        }
    }

    emit_progress(&mut progress_cb, RunStage::Preparing, started, "Resolving inputs");
    let setup_started = Instant::now();
    let mut driver = build_driver(&project, project_path, options, stop)?;
    timing.setup_time_s = setup_started.elapsed().as_secs_f64();

    emit_progress(&mut progress_cb, RunStage::Simulating, started, "Simulating");
    phase_timing::reset_all();
    let run_started = Instant::now();
    let outcome = {
        let mut observer = ProgressObserver {
            progress_cb: &mut progress_cb,
            started,
            number_of_timesteps: driver.clock().number_of_timesteps,
            timestep_s: driver.clock().timestep_size,
            stored: 0,
        };
        driver.start(&mut observer)?
    };
    timing.run_time_s = run_started.elapsed().as_secs_f64();
    timing.steps = outcome.step;
    if let Some(failure) = &outcome.failure {
        warn!(%failure, "run reported a failure");
    }

    emit_progress(&mut progress_cb, RunStage::SavingResults, started, "Saving results");
    let save_started = Instant::now();
    let manifest = RunManifest {
        run_id: run_id.clone(),
        project_name: project.name.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        solver_version: options.solver_version.clone(),
        device,
        timestep_s: project.simulation.timestep_s,
        number_of_timesteps: project.simulation.number_of_timesteps,
        stored_steps: outcome.stored,
        outcome: outcome.to_status(),
        failure: outcome.failure.as_ref().map(|f| f.to_string()),
        channels: driver.replay().channel_names().to_vec(),
    };
    store.save_run(&manifest, driver.replay())?;
    timing.save_time_s = save_started.elapsed().as_secs_f64();
    info!(run_id = %run_id, outcome = ?manifest.outcome, "run saved");

    emit_progress(&mut progress_cb, RunStage::Completed, started, "Run completed");
    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        timing,
    })
}

fn build_driver(
    project: &Project,
    project_path: &Path,
    options: &RunOptions,
    stop: StopHandle,
) -> AppResult<SimulationDriver> {
    let dir = project_dir(project_path);
    let config = SimConfig::from_project(project, &dir)?;
    let mut context = SimulationContext::new(&options.device, dir)?;
    context.stop = stop;
    context.debug = options.debug;
    Ok(SimulationDriver::new(config, context)?)
}

/// A run executing on its own worker thread.
///
/// The project stays locked until the worker finishes. Progress events arrive
/// on [`RunHandle::events`]; dropping the receiver does not stop the run.
pub struct RunHandle {
    events: mpsc::Receiver<RunProgressEvent>,
    stop: StopHandle,
    worker: thread::JoinHandle<AppResult<RunResponse>>,
}

impl RunHandle {
    pub fn events(&self) -> &mpsc::Receiver<RunProgressEvent> {
        &self.events
    }

    /// Ask the driver to stop at its next checkpoint.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Block until the worker is done.
    pub fn wait(self) -> AppResult<RunResponse> {
        self.worker
            .join()
            .map_err(|_| AppError::Worker("run worker panicked".to_string()))?
    }
}

/// Start a run on a worker thread. Fails with [`AppError::Busy`] when the
/// project already has a run in flight.
pub fn spawn_run(project_path: PathBuf, options: RunOptions, lock: &ProjectLock) -> AppResult<RunHandle> {
    let guard: RunGuard = lock.acquire()?;
    let (tx, rx) = mpsc::channel();
    let stop = StopHandle::new();
    let worker_stop = stop.clone();
    let worker = thread::Builder::new()
        .name("tw-run".to_string())
        .spawn(move || {
            let _guard = guard;
            let mut forward = |event: RunProgressEvent| {
                let _ = tx.send(event);
            };
            execute(&project_path, &options, Some(&mut forward), worker_stop)
        })?;
    Ok(RunHandle {
        events: rx,
        stop,
        worker,
    })
}

/// Cached runs of a project, most recent first.
pub fn list_runs(project_path: &Path) -> AppResult<Vec<RunManifest>> {
    let store = RunStore::for_project(project_path)?;
    let mut runs = store.list_runs()?;
    runs.reverse();
    Ok(runs)
}

/// Load a specific run.
pub fn load_run(project_path: &Path, run_id: &str) -> AppResult<(RunManifest, ReplayStore)> {
    let store = RunStore::for_project(project_path)?;
    let manifest = store.load_manifest(run_id)?;
    let replay = store.load_replay(run_id)?;
    Ok((manifest, replay))
}

pub fn delete_run(project_path: &Path, run_id: &str, lock: &ProjectLock) -> AppResult<()> {
    lock.ensure_writable()?;
    let store = RunStore::for_project(project_path)?;
    if !store.has_run(run_id) {
        return Err(AppError::RunNotFound(run_id.to_string()));
    }
    store.delete_run(run_id)?;
    Ok(())
}
