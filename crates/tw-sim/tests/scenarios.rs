//! End-to-end runs of the timestep loop.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use tw_controls::{BladedController, BladedLayout, BridgeState, ControllerConfig, ControllerKind, SwapEntryPoint};
use tw_project::{IntegrationDef, Project};
use tw_sim::{
    AeroLoads, DriverState, DrivetrainSignals, FailureCategory, HubHeightSeries, Inflow, ModalResult, NullObserver,
    Observer, RotorKinematics, SimConfig, SimResult, SimulationContext, SimulationDriver, StopHandle,
    StructuralControls, StructuralModel,
};
use tw_sim::inflow::HubHeightSample;

fn demo_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/projects")
}

fn single_turbine() -> Project {
    tw_project::from_yaml_str(include_str!("../../../demos/projects/single_turbine.yaml")).unwrap()
}

fn driver_for(project: &Project) -> SimulationDriver {
    let config = SimConfig::from_project(project, &demo_dir()).unwrap();
    SimulationDriver::new(config, SimulationContext::cpu(demo_dir())).unwrap()
}

fn steady(steps: usize) -> Project {
    let mut p = single_turbine();
    p.simulation.steady_polar_wake = true;
    p.simulation.number_of_timesteps = steps;
    p
}

fn free_wake(steps: usize) -> Project {
    let mut p = single_turbine();
    p.simulation.number_of_timesteps = steps;
    p.wake.max_age_s = Some(1.0);
    p.wake.near_wake_age_s = Some(0.5);
    p
}

#[test]
fn hundred_steps_finish_with_evenly_spaced_times() {
    let mut driver = driver_for(&steady(100));
    let outcome = driver.start(&mut NullObserver).unwrap();

    assert_eq!(outcome.state, DriverState::Finished);
    assert_eq!(outcome.step, 100);
    assert_eq!(outcome.stored, 100);
    let times = driver.replay().times();
    for (i, t) in times.iter().enumerate() {
        assert_eq!(*t, (i + 1) as f64 * 0.1);
    }
    let power = driver.replay().series("T1 power", 0).unwrap();
    assert!(power.iter().all(|p| p.is_finite() && *p > 0.0));
}

#[test]
fn free_wake_grows_and_couples() {
    let mut driver = driver_for(&free_wake(12));
    let outcome = driver.start(&mut NullObserver).unwrap();
    assert!(outcome.is_finished());

    let lines = driver.replay().series("T1 wake lines", 0).unwrap();
    assert_eq!(lines[0], 0.0);
    assert!(lines.last().copied().unwrap() > 0.0);
    let iterations = driver.replay().series("T1 gamma iterations", 0).unwrap();
    assert!(iterations.iter().skip(1).all(|n| *n >= 1.0));
    let thrust = driver.replay().series("T1 thrust", 0).unwrap();
    assert!(thrust.iter().all(|t| t.is_finite()));
    driver.wake().turbines()[0].check_integrity().unwrap();
}

#[test]
fn missing_controller_is_disabled_and_pitch_is_held() {
    let p = steady(20);
    let mut config = SimConfig::from_project(&p, &demo_dir()).unwrap();
    config.turbines[0].controller = Some(ControllerConfig {
        kind: ControllerKind::Bladed,
        library: PathBuf::from("/nonexistent/libdiscon.so"),
        parameter_file: PathBuf::from("/nonexistent/DISCON.IN"),
    });
    let mut driver = SimulationDriver::new(config, SimulationContext::cpu(demo_dir())).unwrap();
    let outcome = driver.start(&mut NullObserver).unwrap();

    assert_eq!(outcome.state, DriverState::Finished);
    assert!(matches!(driver.controller_state(0), Some(BridgeState::Disabled { .. })));
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.category, FailureCategory::FatalToController);
    let pitch = driver.replay().series("T1 pitch deg", 0).unwrap();
    assert_eq!(pitch.len(), 20);
    assert!(pitch.iter().all(|p| *p == 0.0));
}

#[test]
fn identical_runs_are_bit_identical() {
    let p = free_wake(8);
    let mut a = driver_for(&p);
    let mut b = driver_for(&p);
    a.start(&mut NullObserver).unwrap();
    b.start(&mut NullObserver).unwrap();
    assert_eq!(a.replay(), b.replay());
}

/// Prescribed rotation that reports a NaN azimuth from a given step on.
#[derive(Debug)]
struct PoisonedRotor {
    inner: Box<dyn StructuralModel>,
    poison_time: f64,
    poisoned: bool,
}

impl StructuralModel for PoisonedRotor {
    fn set_time(&mut self, time: f64) {
        self.poisoned = time >= self.poison_time;
        self.inner.set_time(time);
    }

    fn kinematics(&self) -> RotorKinematics {
        let mut k = self.inner.kinematics();
        if self.poisoned {
            k.azimuth = f64::NAN;
        }
        k
    }

    fn apply_loads(&mut self, loads: &AeroLoads) {
        self.inner.apply_loads(loads);
    }

    fn apply_controls(&mut self, controls: &StructuralControls) {
        self.inner.apply_controls(controls);
    }

    fn advance(&mut self, dt: f64) -> SimResult<()> {
        self.inner.advance(dt)
    }

    fn is_dynamic(&self) -> bool {
        false
    }

    fn modal_results(&self) -> Vec<ModalResult> {
        Vec::new()
    }

    fn drivetrain(&self) -> DrivetrainSignals {
        self.inner.drivetrain()
    }

    fn reset(&mut self) {
        self.poisoned = false;
        self.inner.reset();
    }
}

#[test]
fn non_finite_geometry_aborts_before_storing() {
    let k = 7;
    let p = free_wake(20);
    let mut config = SimConfig::from_project(&p, &demo_dir()).unwrap();
    let inner = config.turbines.remove(0).structure;
    let mut driver = driver_for(&p);
    driver
        .replace_structure(
            0,
            Box::new(PoisonedRotor {
                inner,
                poison_time: k as f64 * 0.1 - 1e-9,
                poisoned: false,
            }),
        )
        .unwrap();
    let outcome = driver.start(&mut NullObserver).unwrap();

    assert_eq!(outcome.step, k);
    assert_eq!(outcome.stored, k - 1);
    match &outcome.state {
        DriverState::Aborted { reason } => {
            assert!(reason.contains("non-finite"), "{reason}");
            assert!(reason.contains(&format!("step {k}")), "{reason}");
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(outcome.failure.unwrap().category, FailureCategory::FatalToRun);
}

/// Requests a stop once a given step has been reported.
struct StopAt {
    step: usize,
    handle: StopHandle,
    seen: Vec<usize>,
}

impl Observer for StopAt {
    fn on_progress(&mut self, step: usize) {
        self.seen.push(step);
        if step == self.step {
            self.handle.request_stop();
        }
    }
}

#[test]
fn stop_then_continue_completes_the_run() {
    let mut driver = driver_for(&steady(15));
    let mut observer = StopAt {
        step: 5,
        handle: driver.stop_handle(),
        seen: Vec::new(),
    };
    let first = driver.start(&mut observer).unwrap();
    assert_eq!(first.state, DriverState::StoppedByUser);
    assert_eq!(first.step, 5);
    assert_eq!(first.stored, 5);

    let second = driver.continue_run(&mut observer).unwrap();
    assert_eq!(second.state, DriverState::Finished);
    assert_eq!(second.step, 15);
    assert_eq!(driver.replay().len(), 15);
    assert_eq!(observer.seen, (1..=15).collect::<Vec<_>>());

    assert!(driver.continue_run(&mut NullObserver).is_err());
}

#[test]
fn start_after_finish_begins_a_fresh_run() {
    let mut driver = driver_for(&steady(10));
    driver.start(&mut NullObserver).unwrap();
    let first = driver.replay().clone();
    let outcome = driver.start(&mut NullObserver).unwrap();
    assert_eq!(outcome.step, 10);
    assert_eq!(driver.replay(), &first);
}

#[test]
fn drivetrain_demo_ramps_up_and_throws_ice() {
    let mut p: Project =
        tw_project::from_yaml_str(include_str!("../../../demos/projects/drivetrain_hub_height.yaml")).unwrap();
    p.simulation.number_of_timesteps = 20;
    p.wake.max_age_s = Some(1.0);
    p.wake.near_wake_age_s = Some(0.5);
    let mut driver = driver_for(&p);
    let outcome = driver.start(&mut NullObserver).unwrap();
    assert!(outcome.is_finished(), "{outcome:?}");

    let rpm = driver.replay().series("T1 rotor speed rpm", 0).unwrap();
    assert!(rpm.iter().all(|r| r.is_finite() && *r > 0.0));
    let gen_torque = driver.replay().series("T1 generator torque", 0).unwrap();
    assert!(gen_torque.iter().all(|t| t.is_finite()));

    let ice = driver.ice_throw().unwrap();
    assert!(!ice.airborne().is_empty() || !ice.landings().is_empty());
    let airborne = driver.replay().series("ice airborne", 0).unwrap();
    // nothing is released before one second
    assert!(airborne[..9].iter().all(|n| *n == 0.0));
}

#[test]
fn cut_plane_sees_the_wake_deficit() {
    let mut driver = driver_for(&free_wake(10));
    driver.start(&mut NullObserver).unwrap();
    let plane = tw_induction::CutPlane::cross_stream(5.0, 0.0, 90.0, 60.0, 60.0, 5, 5);
    let velocities = driver.cut_plane_velocities(&plane).unwrap();
    assert_eq!(velocities.len(), 25);
    assert!(velocities.iter().all(|v| v.iter().all(|c| c.is_finite())));
    let free = tw_core::vec3(8.0, 0.0, 0.0);
    assert!(velocities.iter().any(|v| (v - free).norm() > 1e-3));
}

#[test]
fn volume_probe_matches_point_probe() {
    let mut driver = driver_for(&free_wake(5));
    driver.start(&mut NullObserver).unwrap();
    let grid = tw_induction::VolumeGrid {
        min: tw_core::vec3(10.0, -20.0, 70.0),
        max: tw_core::vec3(30.0, 20.0, 110.0),
        counts: [2, 3, 2],
    };
    let volume = driver.volume_velocities(&grid).unwrap();
    assert_eq!(volume.len(), 12);
    let points = grid.points().unwrap();
    let direct = driver.probe_velocities(&points).unwrap();
    assert_eq!(volume, direct);
}

/// Bladed-style controller that raises its fail flag on call `fail_on`
/// (1-based) and echoes the swap array otherwise.
struct FailingDiscon {
    fail_on: usize,
    calls: usize,
}

impl SwapEntryPoint for FailingDiscon {
    fn call(&mut self, _swap: &mut [f32], _infile: &CString, _outname: &CString, message: &mut [u8]) -> i32 {
        self.calls += 1;
        if self.calls == self.fail_on {
            let text = b"pitch sensor fault";
            message[..text.len()].copy_from_slice(text);
            -1
        } else {
            0
        }
    }
}

#[test]
fn controller_failing_mid_run_is_reported() {
    let mut driver = driver_for(&steady(10));
    let discon = FailingDiscon { fail_on: 4, calls: 0 };
    let controller = BladedController::new(discon, BladedLayout::Standard, "DISCON.IN", "tw").unwrap();
    driver.replace_controller(0, Box::new(controller)).unwrap();
    let outcome = driver.start(&mut NullObserver).unwrap();

    // the run goes on with held commands
    assert_eq!(outcome.state, DriverState::Finished);
    assert_eq!(outcome.stored, 10);
    assert!(matches!(driver.controller_state(0), Some(BridgeState::Disabled { .. })));
    let failure = outcome.failure.expect("controller failure recorded");
    assert_eq!(failure.category, FailureCategory::FatalToController);
    assert!(failure.reason.contains("turbine T1"), "{}", failure.reason);
    assert!(failure.reason.contains("flag -1"), "{}", failure.reason);
    assert!(failure.reason.contains("pitch sensor fault"), "{}", failure.reason);
    assert!(failure.reason.contains("step 4"), "{}", failure.reason);
}

#[test]
fn healthy_controller_leaves_no_failure() {
    let mut driver = driver_for(&steady(5));
    let discon = FailingDiscon { fail_on: 0, calls: 0 };
    let controller = BladedController::new(discon, BladedLayout::Standard, "DISCON.IN", "tw").unwrap();
    driver.replace_controller(0, Box::new(controller)).unwrap();
    let outcome = driver.start(&mut NullObserver).unwrap();
    assert!(outcome.is_finished());
    assert_eq!(outcome.failure, None);
}

#[test]
fn non_finite_wake_convection_aborts_before_storing() {
    let k = 5;
    let mut p = free_wake(20);
    p.wake.integration = IntegrationDef::Euler;
    let mut config = SimConfig::from_project(&p, &demo_dir()).unwrap();
    let dt = config.clock.timestep_size;
    let hub = config.turbines[0].structure.kinematics().hub;
    let steady_8 = |time: f64| HubHeightSample {
        time,
        speed: 8.0,
        ..HubHeightSample::default()
    };
    // finite up to step k - 1, NaN from step k on
    let samples = vec![
        steady_8(0.0),
        steady_8((k as f64 - 0.5) * dt),
        HubHeightSample {
            speed: f64::NAN,
            ..steady_8((k as f64 + 1.0) * dt)
        },
    ];
    config.inflow = Inflow::HubHeight(HubHeightSeries::new(samples, hub, 100.0).unwrap());
    let mut driver = SimulationDriver::new(config, SimulationContext::cpu(demo_dir())).unwrap();
    let outcome = driver.start(&mut NullObserver).unwrap();

    assert_eq!(outcome.step, k);
    assert_eq!(outcome.stored, k - 1);
    let last = driver.replay().last_time().unwrap();
    assert!((last - (k - 1) as f64 * dt).abs() < 1e-9);
    match &outcome.state {
        DriverState::Aborted { reason } => {
            assert!(reason.contains("wake"), "{reason}");
            assert!(reason.contains("non-finite"), "{reason}");
            assert!(reason.contains(&format!("step {k}")), "{reason}");
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(outcome.failure.unwrap().category, FailureCategory::FatalToRun);
}
