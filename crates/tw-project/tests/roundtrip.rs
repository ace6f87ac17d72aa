use tw_project::schema::*;
use tw_project::{load_json, load_yaml, save_json, save_yaml, validate_project};

fn airfoil() -> AirfoilDef {
    AirfoilDef {
        id: "flat".to_string(),
        polar: vec![
            PolarPointDef {
                alpha_deg: -10.0,
                cl: -1.0,
                cd: 0.02,
            },
            PolarPointDef {
                alpha_deg: 10.0,
                cl: 1.0,
                cd: 0.02,
            },
        ],
    }
}

fn turbine(id: &str) -> TurbineDef {
    TurbineDef {
        id: id.to_string(),
        name: format!("Turbine {id}"),
        position_m: [0.0, 0.0, 0.0],
        hub_height_m: 50.0,
        blades: BladeDef {
            count: 2,
            stations: vec![
                StationDef {
                    radius_m: 2.0,
                    chord_m: 1.0,
                    twist_deg: 5.0,
                    airfoil: "flat".to_string(),
                },
                StationDef {
                    radius_m: 20.0,
                    chord_m: 0.5,
                    twist_deg: 0.0,
                    airfoil: "flat".to_string(),
                },
            ],
        },
        struts: vec![],
        operation: OperationDef {
            rotor_speed_rpm: 20.0,
            pitch_deg: 1.0,
            yaw_deg: 0.0,
            initial_azimuth_deg: 0.0,
        },
        structure: StructureDef::RigidDrivetrain {
            rotor_inertia_kg_m2: 1.0e5,
            gearbox_ratio: 50.0,
            loss_nm_s_per_rad: 0.0,
            generator_efficiency: 0.9,
        },
        controller: Some(ControllerDef {
            kind: ControllerKindDef::Dtu,
            library: "ctrl/libdtu.so".into(),
            parameter_file: "ctrl/dtu.prm".into(),
        }),
        actuator: None,
    }
}

fn project() -> Project {
    Project {
        version: 2,
        name: "Roundtrip".to_string(),
        simulation: SimulationDef {
            timestep_s: 0.05,
            number_of_timesteps: 40,
            store_output_from: 5,
            precompute_time_s: 1.0,
            steady_polar_wake: false,
            circulation: CirculationDef::default(),
            store_wake_frames: true,
        },
        inflow: InflowDef::WindField {
            file: "wind/field.json".into(),
        },
        wake: WakeDef {
            integration: IntegrationDef::PC2B,
            max_age_s: Some(10.0),
            wake_interaction: true,
            ..Default::default()
        },
        airfoils: vec![airfoil()],
        turbines: vec![turbine("a"), turbine("b")],
        ice_throw: None,
    }
}

#[test]
fn roundtrip_yaml_two_turbines() {
    let project = project();
    validate_project(&project).unwrap();

    let path = std::env::temp_dir().join("tw_project_roundtrip_two.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();
    assert_eq!(project, loaded);
    std::fs::remove_file(&path).ok();
}

#[test]
fn roundtrip_json_two_turbines() {
    let project = project();
    let path = std::env::temp_dir().join("tw_project_roundtrip_two.json");
    save_json(&path, &project).unwrap();
    let loaded = load_json(&path).unwrap();
    assert_eq!(project, loaded);
    std::fs::remove_file(&path).ok();
}

#[test]
fn legacy_flag_is_not_written_back() {
    let yaml = serde_yaml::to_string(&project()).unwrap();
    assert!(!yaml.contains("predictor_corrector"));
}
