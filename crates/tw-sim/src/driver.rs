//! The timestep loop.
//!
//! Per step, strictly in this order:
//!
//! 1. advance the clock and push the time into the structural models
//! 2. boundary conditions (the inflow is evaluated at the new time)
//! 3. rebuild every rotor from its structural state
//! 4. advance the free wake (skipped in steady polar mode)
//! 5. bound circulation iteration and loads
//! 6. store results
//! 7. ice throw
//! 8. notify the observer
//! 9. checkpoint: abort, then stop; otherwise controllers, actuators and
//!    structural dynamics advance by one step
//!
//! Non-finite geometry or wake state marks the run for abort. The rest of the
//! step is skipped, nothing is stored and the loop ends at the checkpoint.

use tracing::{debug, info, warn};
use tw_controls::{
    BridgeState, ControlCommands, ControllerBridge, ControllerConfig, ControllerPlugin, PitchActuator, TurbineInputs,
};
use tw_core::Vec3;
use tw_induction::{CutPlane, VolumeGrid, VortexField};
use tw_results::{ReplayStore, RunStatus};
use tw_wake::{FieldPart, SheddingInput, WakeConfig, WakeSystem};

use crate::aero::{CirculationSettings, RotorSolution, WakeCoupling, solve_rotor};
use crate::build::{SimConfig, TurbineSetup};
use crate::clock::SimulationClock;
use crate::context::{SimulationContext, StopHandle};
use crate::error::{RunFailure, SimError, SimResult};
use crate::ice::IceThrow;
use crate::inflow::Inflow;
use crate::observer::{GeometrySnapshot, Observer};
use crate::record::{TurbineRecord, build_row, channel_names, wake_frame};
use crate::rotor::{RotorDef, RotorGeometry};
use crate::structural::{ModalResult, StructuralControls, StructuralModel};

#[derive(Clone, Debug, PartialEq)]
pub enum DriverState {
    Idle,
    RampingUp,
    Running,
    Finished,
    Aborted { reason: String },
    StoppedByUser,
}

/// How a call to [`SimulationDriver::start`] or
/// [`SimulationDriver::continue_run`] ended.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub state: DriverState,
    /// Clock step when the loop ended
    pub step: usize,
    /// Entries in the replay store
    pub stored: usize,
    pub failure: Option<RunFailure>,
}

impl RunOutcome {
    pub fn is_finished(&self) -> bool {
        self.state == DriverState::Finished
    }

    pub fn to_status(&self) -> RunStatus {
        match &self.state {
            DriverState::Finished => RunStatus::Finished,
            DriverState::StoppedByUser => RunStatus::StoppedByUser { at_step: self.step },
            DriverState::Aborted { reason } => RunStatus::Aborted {
                at_step: self.step,
                reason: reason.clone(),
            },
            other => RunStatus::Aborted {
                at_step: self.step,
                reason: format!("run ended in state {other:?}"),
            },
        }
    }
}

#[derive(Debug)]
struct TurbineRuntime {
    id: String,
    rotor: RotorDef,
    structure: Box<dyn StructuralModel>,
    controller_config: Option<ControllerConfig>,
    /// Taken by the next `start` instead of loading `controller_config`
    prepared_controller: Option<ControllerBridge>,
    controller: ControllerBridge,
    actuator: Option<PitchActuator>,
    /// Bound circulation of the last solved step, `[blade][panel]`
    gamma: Vec<Vec<f64>>,
    geometry: Option<RotorGeometry>,
    solution: RotorSolution,
}

impl TurbineRuntime {
    fn new(setup: TurbineSetup) -> Self {
        let gamma = vec![vec![0.0; setup.rotor.panels_per_blade()]; setup.rotor.blade_count];
        Self {
            id: setup.id,
            rotor: setup.rotor,
            structure: setup.structure,
            controller_config: setup.controller,
            prepared_controller: None,
            controller: ControllerBridge::none(),
            actuator: setup.actuator,
            gamma,
            geometry: None,
            solution: RotorSolution::default(),
        }
    }

    fn reset(&mut self) {
        self.structure.reset();
        for g in self.gamma.iter_mut().flatten() {
            *g = 0.0;
        }
        self.geometry = None;
        self.solution = RotorSolution::default();
    }

    fn controller_inputs(&self, time: f64, dt: f64) -> TurbineInputs {
        let k = self.structure.kinematics();
        let d = self.structure.drivetrain();
        let loads = &self.solution.loads;
        TurbineInputs {
            time,
            dt,
            blade_count: self.rotor.blade_count,
            pitch: k.pitch,
            generator_speed: d.generator_speed,
            rotor_speed: k.rotor_speed,
            generator_torque: d.generator_torque,
            electrical_power: d.electrical_power,
            hub_wind_speed: loads.hub_wind_speed,
            azimuth: k.azimuth,
            yaw: k.yaw,
            out_of_plane_moments: loads.out_of_plane_moments,
            grid_connected: true,
            ..Default::default()
        }
    }
}

/// Owns every piece of mutable run state.
#[derive(Debug)]
pub struct SimulationDriver {
    name: String,
    clock: SimulationClock,
    context: SimulationContext,
    inflow: Inflow,
    circulation: CirculationSettings,
    precompute_time_s: f64,
    steady_polar_wake: bool,
    store_wake_frames: bool,
    wake: WakeSystem,
    turbines: Vec<TurbineRuntime>,
    replay: ReplayStore,
    ice: Option<IceThrow>,
    state: DriverState,
    failure: Option<RunFailure>,
    pending_abort: Option<String>,
}

impl SimulationDriver {
    pub fn new(config: SimConfig, context: SimulationContext) -> SimResult<Self> {
        if config.turbines.is_empty() {
            return Err(SimError::InvalidArg {
                what: "at least one turbine required",
            });
        }
        let blades: Vec<usize> = config.turbines.iter().map(|t| t.rotor.blade_count).collect();
        let hubs: Vec<Vec3> = config.turbines.iter().map(|t| t.structure.kinematics().hub).collect();
        let wake = WakeSystem::new(config.wake, &blades, &hubs)?;
        let replay = ReplayStore::new(channel_names(&blades, config.ice_throw.is_some())).map_err(|e| {
            SimError::Configuration {
                message: e.to_string(),
            }
        })?;
        let ice = config.ice_throw.map(|def| IceThrow::new(def, config.air_density));
        Ok(Self {
            name: config.name,
            clock: config.clock,
            context,
            inflow: config.inflow,
            circulation: config.circulation,
            precompute_time_s: config.precompute_time_s,
            steady_polar_wake: config.steady_polar_wake,
            store_wake_frames: config.store_wake_frames,
            wake,
            turbines: config.turbines.into_iter().map(TurbineRuntime::new).collect(),
            replay,
            ice,
            state: DriverState::Idle,
            failure: None,
            pending_abort: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn replay(&self) -> &ReplayStore {
        &self.replay
    }

    pub fn into_replay(self) -> ReplayStore {
        self.replay
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SimulationContext {
        &mut self.context
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.context.stop.clone()
    }

    pub fn wake(&self) -> &WakeSystem {
        &self.wake
    }

    pub fn wake_config(&self) -> &WakeConfig {
        self.wake.config()
    }

    pub fn turbine_count(&self) -> usize {
        self.turbines.len()
    }

    pub fn turbine_id(&self, index: usize) -> Option<&str> {
        self.turbines.get(index).map(|t| t.id.as_str())
    }

    pub fn controller_state(&self, index: usize) -> Option<&BridgeState> {
        self.turbines.get(index).map(|t| t.controller.state())
    }

    /// Last solved rotor of turbine `index`.
    pub fn solution(&self, index: usize) -> Option<&RotorSolution> {
        self.turbines.get(index).map(|t| &t.solution)
    }

    pub fn modal_results(&self, index: usize) -> Vec<ModalResult> {
        self.turbines
            .get(index)
            .map(|t| t.structure.modal_results())
            .unwrap_or_default()
    }

    pub fn ice_throw(&self) -> Option<&IceThrow> {
        self.ice.as_ref()
    }

    /// Swap the structural model of one turbine before a run starts.
    pub fn replace_structure(&mut self, index: usize, structure: Box<dyn StructuralModel>) -> SimResult<()> {
        if matches!(self.state, DriverState::RampingUp | DriverState::Running) {
            return Err(SimError::InvalidState {
                what: "cannot replace a structural model during a run",
            });
        }
        let turbine = self.turbines.get_mut(index).ok_or(SimError::InvalidArg {
            what: "turbine index out of range",
        })?;
        turbine.structure = structure;
        Ok(())
    }

    /// Drive turbine `index` with `plugin` for the next run instead of the
    /// configured controller library.
    pub fn replace_controller(&mut self, index: usize, plugin: Box<dyn ControllerPlugin>) -> SimResult<()> {
        if matches!(self.state, DriverState::RampingUp | DriverState::Running) {
            return Err(SimError::InvalidState {
                what: "cannot replace a controller during a run",
            });
        }
        let turbine = self.turbines.get_mut(index).ok_or(SimError::InvalidArg {
            what: "turbine index out of range",
        })?;
        turbine.prepared_controller = Some(ControllerBridge::new(plugin));
        Ok(())
    }

    /// Back to `Idle`: clock, wake, structures, results and controllers.
    pub fn reset(&mut self) -> SimResult<()> {
        if matches!(self.state, DriverState::RampingUp | DriverState::Running) {
            return Err(SimError::InvalidState {
                what: "cannot reset while running",
            });
        }
        let time = self.clock.current_time;
        let dt = self.clock.timestep_size;
        for t in &mut self.turbines {
            let inputs = t.controller_inputs(time, dt);
            t.controller.shutdown(&inputs);
            t.controller = ControllerBridge::none();
            t.reset();
        }
        self.clock.reset();
        self.wake.reset();
        self.replay.clear();
        if let Some(ice) = &mut self.ice {
            ice.reset();
        }
        self.context.stop.clear();
        self.failure = None;
        self.pending_abort = None;
        self.state = DriverState::Idle;
        Ok(())
    }

    /// Reset, load controllers, ramp up if needed and run the loop.
    pub fn start(&mut self, observer: &mut dyn Observer) -> SimResult<RunOutcome> {
        self.reset()?;
        for t in &mut self.turbines {
            t.controller = match (t.prepared_controller.take(), &t.controller_config) {
                (Some(bridge), _) => bridge,
                (None, Some(config)) => ControllerBridge::load(config),
                (None, None) => ControllerBridge::none(),
            };
            if let (Some(_), Some(reason)) = (&t.controller_config, t.controller.disabled_reason()) {
                self.failure
                    .get_or_insert(RunFailure::controller(format!("turbine {}: {reason}", t.id)));
            }
        }
        info!(
            project = %self.name,
            steps = self.clock.number_of_timesteps,
            backend = self.context.solver.backend_name(),
            "simulation started"
        );
        if self.needs_ramp_up() && !self.ramp_up()? {
            return Ok(self.outcome());
        }
        self.run_loop(observer)
    }

    /// Resume a run stopped by the user, without resetting anything.
    pub fn continue_run(&mut self, observer: &mut dyn Observer) -> SimResult<RunOutcome> {
        if self.state != DriverState::StoppedByUser {
            return Err(SimError::InvalidState {
                what: "only a stopped run can be continued",
            });
        }
        self.context.stop.clear();
        info!(step = self.clock.current_time_step, "simulation continued");
        self.run_loop(observer)
    }

    fn needs_ramp_up(&self) -> bool {
        self.precompute_time_s > 0.0 && self.turbines.iter().any(|t| t.structure.is_dynamic())
    }

    /// Load the structures with polar aerodynamics until the precompute time
    /// is used up. The main clock stays at zero. Returns `false` when the run
    /// ended during ramp-up.
    fn ramp_up(&mut self) -> SimResult<bool> {
        self.state = DriverState::RampingUp;
        let dt = self.clock.timestep_size;
        let steps = (self.precompute_time_s / dt).ceil() as usize;
        info!(steps, "ramping up structural dynamics");
        for _ in 0..steps {
            if self.context.stop.is_stop_requested() {
                self.state = DriverState::StoppedByUser;
                return Ok(false);
            }
            if let Some(reason) = self.ramp_up_step(dt) {
                self.abort(format!("ramp-up: {reason}"));
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn ramp_up_step(&mut self, dt: f64) -> Option<String> {
        for t in &mut self.turbines {
            let solution = RotorGeometry::build(&t.rotor, &t.structure.kinematics()).and_then(|g| {
                solve_rotor(
                    &t.rotor,
                    &g,
                    &self.inflow,
                    self.clock.current_time,
                    None,
                    &self.context.solver,
                    &self.circulation,
                    None,
                )
            });
            let result = solution.and_then(|s| {
                t.structure.apply_loads(&s.loads.as_aero_loads());
                t.structure.advance(dt)
            });
            if let Err(e) = result {
                return Some(format!("turbine {}: {}", t.id, describe(&e)));
            }
        }
        None
    }

    fn abort(&mut self, reason: String) {
        warn!(step = self.clock.current_time_step, reason = %reason, "simulation aborted");
        self.failure = Some(RunFailure::fatal(reason.clone()));
        self.state = DriverState::Aborted { reason };
    }

    fn outcome(&self) -> RunOutcome {
        RunOutcome {
            state: self.state.clone(),
            step: self.clock.current_time_step,
            stored: self.replay.len(),
            failure: self.failure.clone(),
        }
    }

    fn run_loop(&mut self, observer: &mut dyn Observer) -> SimResult<RunOutcome> {
        self.state = DriverState::Running;
        loop {
            if self.clock.is_finished() {
                self.finish();
                break;
            }
            self.step(observer);

            // 9. checkpoint
            if let Some(reason) = self.pending_abort.take() {
                self.abort(reason);
                break;
            }
            if self.context.stop.is_stop_requested() {
                info!(step = self.clock.current_time_step, "simulation stopped by user");
                self.state = DriverState::StoppedByUser;
                break;
            }
            self.advance_dynamics();
        }
        Ok(self.outcome())
    }

    fn finish(&mut self) {
        let time = self.clock.current_time;
        let dt = self.clock.timestep_size;
        for t in &mut self.turbines {
            let inputs = t.controller_inputs(time, dt);
            t.controller.shutdown(&inputs);
        }
        self.state = DriverState::Finished;
        info!(
            steps = self.clock.current_time_step,
            stored = self.replay.len(),
            "simulation finished"
        );
    }

    /// Steps 1-8 of one timestep.
    fn step(&mut self, observer: &mut dyn Observer) {
        // 1. time
        self.clock.advance();
        let step = self.clock.current_time_step;
        let time = self.clock.current_time;
        let dt = self.clock.timestep_size;
        for t in &mut self.turbines {
            t.structure.set_time(time);
        }
        // 2. boundary conditions are evaluated lazily at `time`

        // a failure from a previous checkpoint's dynamics update
        if self.pending_abort.is_some() {
            return;
        }

        // 3. geometry
        for t in &mut self.turbines {
            match RotorGeometry::build(&t.rotor, &t.structure.kinematics()) {
                Ok(g) => t.geometry = Some(g),
                Err(e) => {
                    self.pending_abort = Some(format!("turbine {}: {} at step {step}", t.id, describe(&e)));
                    return;
                }
            }
        }

        // 4. wake
        if !self.steady_polar_wake {
            let core = self.circulation.bound_core;
            let inputs: Vec<SheddingInput> = self
                .turbines
                .iter()
                .filter_map(|t| t.geometry.as_ref().map(|g| (t, g)))
                .map(|(t, g)| SheddingInput {
                    hub: g.hub,
                    bound: g.bound_field(&t.gamma, core),
                    trailing_edges: g.trailing_edge.clone(),
                    bound_gamma: t.gamma.clone(),
                })
                .collect();
            if let Err(e) = self
                .wake
                .advance(step, time, dt, &inputs, &self.inflow, &self.context.solver)
            {
                let reason = describe(&SimError::from(e));
                self.pending_abort = Some(format!("wake update: {reason} at step {step}"));
                return;
            }
            if self.context.debug.check_wake_integrity
                && let Some(e) = self.wake.turbines().iter().find_map(|w| w.check_integrity().err())
            {
                self.pending_abort = Some(format!("wake integrity: {e}"));
                return;
            }
        }

        // 5. bound circulation
        for (i, t) in self.turbines.iter_mut().enumerate() {
            let Some(geometry) = t.geometry.as_ref() else {
                continue;
            };
            let coupling = (!self.steady_polar_wake).then_some(WakeCoupling {
                system: &mut self.wake,
                turbine: i,
            });
            let result = solve_rotor(
                &t.rotor,
                geometry,
                &self.inflow,
                time,
                coupling,
                &self.context.solver,
                &self.circulation,
                Some(&t.gamma),
            );
            match result {
                Ok(solution) => {
                    if self.context.debug.log_circulation {
                        debug!(turbine = %t.id, step, iterations = solution.iterations, "bound circulation");
                    }
                    t.gamma = solution.gamma();
                    t.structure.apply_loads(&solution.loads.as_aero_loads());
                    t.solution = solution;
                }
                Err(e) => {
                    self.pending_abort = Some(format!("turbine {}: {} at step {step}", t.id, describe(&e)));
                    return;
                }
            }
        }

        // 6. store
        if self.clock.should_store() {
            let records: Vec<TurbineRecord<'_>> = self
                .turbines
                .iter()
                .enumerate()
                .map(|(i, t)| TurbineRecord {
                    solution: &t.solution,
                    kinematics: t.structure.kinematics(),
                    drivetrain: t.structure.drivetrain(),
                    blade_count: t.rotor.blade_count,
                    wake_lines: self.wake.turbine(i).map_or(0, |w| w.lines().len()),
                    wake_particles: self.wake.turbine(i).map_or(0, |w| w.particles().len()),
                })
                .collect();
            let row = build_row(time, &records, self.ice.as_ref());
            let frame = self.store_wake_frames.then(|| wake_frame(&self.wake));
            if let Err(e) = self.replay.append(time, row, frame) {
                self.pending_abort = Some(format!("results rejected at step {step}: {e}"));
                return;
            }
        }

        // 7. ice throw
        if let Some(ice) = &mut self.ice {
            let rotors: Vec<RotorGeometry> = self.turbines.iter().filter_map(|t| t.geometry.clone()).collect();
            ice.advance(time, dt, &rotors, &self.inflow);
        }

        // 8. observer
        observer.on_geometry_changed(&GeometrySnapshot {
            step,
            time,
            wake: wake_frame(&self.wake),
        });
        observer.on_progress(step);
        if self.clock.should_store() {
            observer.on_graph_data_changed(self.replay.len());
        }
    }

    /// Controllers, actuators and structural dynamics, after the checkpoint.
    fn advance_dynamics(&mut self) {
        let step = self.clock.current_time_step;
        let time = self.clock.current_time;
        let dt = self.clock.timestep_size;
        for t in &mut self.turbines {
            let inputs = t.controller_inputs(time, dt);
            let was_enabled = t.controller.is_enabled();
            let commands: ControlCommands = t.controller.advance(&inputs);
            if was_enabled && let Some(reason) = t.controller.disabled_reason() {
                // the run goes on with held commands
                self.failure
                    .get_or_insert(RunFailure::controller(format!("turbine {}: {reason} at step {step}", t.id)));
            }
            let pitch = match &t.actuator {
                Some(actuator) => actuator.step_all(&inputs.pitch, &commands.pitch, dt),
                None => commands.pitch,
            };
            t.structure.apply_controls(&StructuralControls {
                pitch,
                generator_torque: t.controller.is_enabled().then_some(commands.generator_torque),
                yaw_rate: commands.yaw_rate,
            });
            if let Err(e) = t.structure.advance(dt) {
                // picked up at the next checkpoint, before anything is stored
                self.pending_abort = Some(format!("turbine {}: structural update: {}", t.id, describe(&e)));
                return;
            }
        }
    }

    /// Velocity (free stream plus induced) at arbitrary points at the current
    /// time, including the bound vortices of the last solved step.
    pub fn probe_velocities(&self, points: &[Vec3]) -> SimResult<Vec<Vec3>> {
        let mut field = VortexField::new();
        for wake in self.wake.turbines() {
            wake.append_to_field(&mut field, FieldPart::All);
        }
        for t in &self.turbines {
            if let Some(g) = &t.geometry {
                field.extend_from(&g.bound_field(&t.gamma, self.circulation.bound_core));
            }
        }
        let induced = self.context.solver.induced_velocities(&field, points)?;
        let time = self.clock.current_time;
        Ok(points
            .iter()
            .zip(induced)
            .map(|(p, u)| u + self.inflow.velocity_at(p, time))
            .collect())
    }

    pub fn cut_plane_velocities(&self, plane: &CutPlane) -> SimResult<Vec<Vec3>> {
        self.probe_velocities(&plane.points()?)
    }

    pub fn volume_velocities(&self, grid: &VolumeGrid) -> SimResult<Vec<Vec3>> {
        self.probe_velocities(&grid.points()?)
    }
}

/// Reason text of a failed step. Callers add the turbine and step.
fn describe(error: &SimError) -> String {
    match error {
        SimError::NonFinite { what, .. } => format!("non-finite {what}"),
        SimError::Backend { message } | SimError::Configuration { message } => message.clone(),
        other => other.to_string(),
    }
}
