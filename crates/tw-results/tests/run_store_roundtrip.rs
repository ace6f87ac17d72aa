use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tw_results::{ReplayStore, RunManifest, RunStatus, RunStore};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    dir
}

fn manifest(run_id: &str, timestamp: &str, outcome: RunStatus) -> RunManifest {
    RunManifest {
        run_id: run_id.to_string(),
        project_name: "test".to_string(),
        timestamp: timestamp.to_string(),
        solver_version: "0.1.0".to_string(),
        device: "cpu".to_string(),
        timestep_s: 0.1,
        number_of_timesteps: 3,
        stored_steps: 3,
        outcome,
        failure: None,
        channels: vec!["time".to_string(), "T1 power".to_string()],
    }
}

fn replay() -> ReplayStore {
    let mut store = ReplayStore::new(vec!["time".into(), "T1 power".into()]).expect("store");
    for k in 1..=3 {
        let t = 0.1 * k as f64;
        store
            .append(t, vec![vec![t as f32], vec![1000.0 * k as f32]], None)
            .expect("append");
    }
    store
}

#[test]
fn save_list_load_roundtrip() {
    let project_dir = unique_temp_dir("tw_results_project");
    fs::create_dir_all(&project_dir).expect("failed to create temp project dir");
    let project_path = project_dir.join("project.yaml");
    fs::write(&project_path, "version: 2\nname: test\n").expect("failed to write project file");

    let store = RunStore::for_project(&project_path).expect("failed to create run store");
    let replay = replay();
    store
        .save_run(
            &manifest("run-b", "2026-02-27T00:00:00Z", RunStatus::Finished),
            &replay,
        )
        .expect("failed to save run");
    store
        .save_run(
            &manifest(
                "run-a",
                "2026-02-26T00:00:00Z",
                RunStatus::Aborted {
                    at_step: 2,
                    reason: "non-finite geometry".to_string(),
                },
            ),
            &replay,
        )
        .expect("failed to save run");

    let runs = store.list_runs().expect("failed to list runs");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, "run-a");
    assert!(runs[1].outcome.is_finished());
    assert!(store.has_run("run-b"));

    let loaded = store.load_replay("run-b").expect("failed to load replay");
    assert_eq!(loaded, replay);

    store.delete_run("run-b").expect("failed to delete run");
    assert!(!store.has_run("run-b"));
    assert!(store.load_manifest("run-b").is_err());

    fs::remove_dir_all(&project_dir).ok();
}

#[test]
fn unknown_run_is_not_found() {
    let store = RunStore::new(unique_temp_dir("tw_results_empty")).expect("store");
    assert!(matches!(
        store.load_replay("nope"),
        Err(tw_results::ResultsError::RunNotFound { .. })
    ));
    fs::remove_dir_all(store.root_dir()).ok();
}

#[test]
fn controller_failure_survives_in_manifest() {
    let store = RunStore::new(unique_temp_dir("tw_results_failure")).expect("store");
    let mut finished = manifest("run-c", "2026-03-01T00:00:00Z", RunStatus::Finished);
    finished.failure = Some("FatalToController: turbine T1: Controller failed (flag -1): fault at step 4".to_string());
    store.save_run(&finished, &replay()).expect("failed to save run");

    let loaded = store.load_manifest("run-c").expect("failed to load manifest");
    assert!(loaded.outcome.is_finished());
    assert!(loaded.failure.as_deref().is_some_and(|f| f.contains("flag -1")));

    // manifests written before the field existed
    let json = serde_json::to_value(&manifest("run-d", "2026-03-01T00:00:00Z", RunStatus::Finished)).unwrap();
    assert!(json.get("failure").is_none());
    let parsed: RunManifest = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.failure, None);
    fs::remove_dir_all(store.root_dir()).ok();
}
