use tw_project::{ProjectError, ValidationError, from_yaml_str};

const BASE: &str = r#"
version: 2
name: v
simulation:
  timestep_s: 0.1
  number_of_timesteps: 10
inflow:
  type: Uniform
  speed_m_s: 8.0
airfoils:
  - id: a
    polar:
      - { alpha_deg: -5.0, cl: -0.5, cd: 0.01 }
      - { alpha_deg: 5.0, cl: 0.5, cd: 0.01 }
turbines:
  - id: t1
    name: T1
    hub_height_m: 50.0
    blades:
      count: 3
      stations:
        - { radius_m: 1.0, chord_m: 1.0, airfoil: a }
        - { radius_m: 10.0, chord_m: 0.5, airfoil: a }
    operation:
      rotor_speed_rpm: 20.0
"#;

fn validation_error(yaml: &str) -> ValidationError {
    match from_yaml_str(yaml) {
        Err(ProjectError::Validation(e)) => e,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn minimal_project_uses_defaults() {
    let project = from_yaml_str(BASE).expect("base project");
    assert_eq!(project.simulation.circulation.max_iterations, 100);
    assert!(!project.wake.wake_interaction);
    assert_eq!(project.wake.remesh.period, 10);
    assert!(matches!(
        project.turbines[0].structure,
        tw_project::StructureDef::Prescribed
    ));
}

#[test]
fn version_one_file_is_migrated() {
    let yaml = BASE
        .replace("version: 2", "version: 1")
        .replace("airfoils:", "wake:\n  predictor_corrector: false\nairfoils:");
    let project = from_yaml_str(&yaml).expect("v1 project");
    assert_eq!(project.version, 2);
    assert_eq!(project.wake.integration, tw_project::IntegrationDef::Euler);
}

#[test]
fn future_version_is_rejected() {
    let yaml = BASE.replace("version: 2", "version: 9");
    assert!(matches!(
        validation_error(&yaml),
        ValidationError::UnsupportedVersion { version: 9 }
    ));
}

#[test]
fn unknown_airfoil_is_a_missing_reference() {
    let yaml = BASE.replace("chord_m: 0.5, airfoil: a", "chord_m: 0.5, airfoil: b");
    match validation_error(&yaml) {
        ValidationError::MissingReference { id, .. } => assert_eq!(id, "b"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn stations_must_increase() {
    let yaml = BASE.replace("radius_m: 10.0", "radius_m: 0.5");
    assert!(matches!(
        validation_error(&yaml),
        ValidationError::InvalidValue { .. }
    ));
}

#[test]
fn non_positive_timestep_is_rejected() {
    let yaml = BASE.replace("timestep_s: 0.1", "timestep_s: 0.0");
    assert!(matches!(
        validation_error(&yaml),
        ValidationError::InvalidValue { .. }
    ));
}

#[test]
fn duplicate_turbine_ids_are_rejected() {
    let turbine = &BASE[BASE.find("  - id: t1").unwrap()..];
    let yaml = format!("{BASE}{turbine}");
    match validation_error(&yaml) {
        ValidationError::DuplicateId { id, context } => {
            assert_eq!(id, "t1");
            assert_eq!(context, "turbines");
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn controller_limits_blade_count() {
    let yaml = BASE.replace("count: 3", "count: 4").replace(
        "    operation:",
        "    controller:\n      kind: Bladed\n      library: ctrl.so\n      parameter_file: ctrl.in\n    operation:",
    );
    assert!(matches!(
        validation_error(&yaml),
        ValidationError::Unsupported { .. }
    ));
}
