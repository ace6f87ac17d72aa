use std::path::PathBuf;

use tw_app::{
    AppError, ProjectLock, RunOptions, RunRequest, RunStage, ensure_run, ensure_run_with_progress, list_runs,
    load_run, project_service, query, run_service,
};
use tw_induction::DeviceSelection;
use tw_results::RunStatus;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("{prefix}_{}_{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    dir
}

/// Short steady copy of the single turbine demo in its own directory.
fn demo_project(prefix: &str) -> PathBuf {
    let mut project =
        tw_project::from_yaml_str(include_str!("../../../demos/projects/single_turbine.yaml")).expect("demo project");
    project.simulation.number_of_timesteps = 10;
    project.simulation.steady_polar_wake = true;
    let path = unique_temp_dir(prefix).join("project.yaml");
    tw_project::save_yaml(&path, &project).expect("save project");
    path
}

#[test]
fn run_is_cached_and_listed() {
    let path = demo_project("tw_app_cache");
    let request = RunRequest {
        project_path: &path,
        options: RunOptions::default(),
    };

    let mut events = Vec::new();
    let first = ensure_run_with_progress(&request, Some(&mut |e| events.push(e))).expect("first run");
    assert!(!first.loaded_from_cache);
    assert_eq!(first.manifest.outcome, RunStatus::Finished);
    assert_eq!(first.manifest.stored_steps, 10);
    assert_eq!(first.manifest.device, "cpu");
    assert!(events.iter().any(|e| e.stage == RunStage::Simulating && e.step.is_some()));
    assert!(matches!(events.last().map(|e| &e.stage), Some(RunStage::Completed)));
    let last_step = events.iter().filter_map(|e| e.step.as_ref()).last().expect("step events");
    assert_eq!(last_step.step, 10);
    assert_eq!(last_step.fraction_complete, 1.0);

    let second = ensure_run(&request).expect("second run");
    assert!(second.loaded_from_cache);
    assert_eq!(second.run_id, first.run_id);

    let runs = list_runs(&path).expect("list runs");
    assert_eq!(runs.len(), 1);

    let (manifest, replay) = load_run(&path, &first.run_id).expect("load run");
    assert_eq!(manifest.channels, replay.channel_names());
    let summary = query::get_run_summary(&replay).expect("summary");
    assert_eq!(summary.record_count, 10);
    assert_eq!(summary.turbine_count, 1);
    let power = query::extract_series(&replay, "T1 power", 0).expect("power");
    assert_eq!(power.len(), 10);
}

#[test]
fn device_is_part_of_the_run_id() {
    let path = demo_project("tw_app_device");
    let cpu = ensure_run(&RunRequest {
        project_path: &path,
        options: RunOptions::default(),
    })
    .expect("cpu run");
    let accel = ensure_run(&RunRequest {
        project_path: &path,
        options: RunOptions {
            device: DeviceSelection::from_flags(Some(1), Some(64)).expect("flags"),
            ..RunOptions::default()
        },
    })
    .expect("accelerator run");
    assert_ne!(cpu.run_id, accel.run_id);
    assert!(!accel.loaded_from_cache);
    assert_eq!(list_runs(&path).expect("list").len(), 2);
}

#[test]
fn worker_run_holds_the_project_lock() {
    let path = demo_project("tw_app_worker");
    let project = project_service::load_project(&path).expect("load");
    let lock = ProjectLock::new();

    let held = lock.acquire().expect("manual guard");
    assert!(matches!(
        run_service::spawn_run(path.clone(), RunOptions::default(), &lock),
        Err(AppError::Busy)
    ));
    assert!(matches!(
        project_service::save_project(&path, &project, &lock),
        Err(AppError::Busy)
    ));
    drop(held);

    let handle = run_service::spawn_run(path.clone(), RunOptions::default(), &lock).expect("spawn");
    let response = handle.wait().expect("worker run");
    assert_eq!(response.manifest.outcome, RunStatus::Finished);
    assert!(!lock.is_running());
    project_service::save_project(&path, &project, &lock).expect("writable after run");

    run_service::delete_run(&path, &response.run_id, &lock).expect("delete");
    assert!(matches!(
        load_run(&path, &response.run_id),
        Err(AppError::RunNotFound(_))
    ));
}

#[test]
fn worker_events_arrive_in_order() {
    let path = demo_project("tw_app_events");
    let lock = ProjectLock::new();
    let handle = run_service::spawn_run(
        path,
        RunOptions {
            use_cache: false,
            ..RunOptions::default()
        },
        &lock,
    )
    .expect("spawn");
    let steps: Vec<usize> = handle
        .events()
        .iter()
        .filter_map(|e| e.step.map(|s| s.step))
        .collect();
    handle.wait().expect("worker run");
    assert_eq!(steps, (1..=10).collect::<Vec<_>>());
}
