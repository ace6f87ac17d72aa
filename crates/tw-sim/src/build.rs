//! Resolve a validated project into simulation inputs.

use std::path::Path;

use tw_controls::{ControllerConfig, ControllerKind, PitchActuator};
use tw_core::units::constants::{AIR_DENSITY, AIR_KINEMATIC_VISCOSITY};
use tw_core::units::{deg_to_rad, rpm_to_rad_s};
use tw_core::vec3;
use tw_project::schema::{
    ControllerKindDef, IceThrowDef, InflowDef, IntegrationDef, Project, StructureDef, TurbineDef, WakeDef,
};
use tw_wake::{CoreModel, IntegrationScheme, RemeshConfig, WakeConfig};

use crate::aero::CirculationSettings;
use crate::airfoil::Polar;
use crate::clock::SimulationClock;
use crate::error::{SimError, SimResult};
use crate::inflow::{HubHeightSeries, Inflow, UniformInflow, WindField, read_input_file};
use crate::rotor::RotorDef;
use crate::structural::{InitialPose, PrescribedRotor, RigidDrivetrain, StructuralModel};

/// Everything one turbine brings into the run.
#[derive(Debug)]
pub struct TurbineSetup {
    pub id: String,
    pub name: String,
    pub rotor: RotorDef,
    pub structure: Box<dyn StructuralModel>,
    pub controller: Option<ControllerConfig>,
    pub actuator: Option<PitchActuator>,
}

/// Resolved, unit-converted run inputs.
#[derive(Debug)]
pub struct SimConfig {
    pub name: String,
    pub clock: SimulationClock,
    pub precompute_time_s: f64,
    pub steady_polar_wake: bool,
    pub store_wake_frames: bool,
    pub inflow: Inflow,
    pub wake: WakeConfig,
    pub circulation: CirculationSettings,
    pub air_density: f64,
    pub turbines: Vec<TurbineSetup>,
    pub ice_throw: Option<IceThrowDef>,
}

impl SimConfig {
    /// Relative input files are resolved against `project_dir`. Missing or
    /// unreadable inflow files are configuration errors.
    pub fn from_project(project: &Project, project_dir: &Path) -> SimResult<Self> {
        let sim = &project.simulation;
        let clock = SimulationClock::new(sim.timestep_s, sim.number_of_timesteps, sim.store_output_from)?;
        let polars = project
            .airfoils
            .iter()
            .map(Polar::from_def)
            .collect::<SimResult<Vec<_>>>()?;
        let turbines = project
            .turbines
            .iter()
            .map(|t| turbine_setup(t, &polars, project_dir))
            .collect::<SimResult<Vec<_>>>()?;
        let first = project.turbines.first().ok_or(SimError::InvalidArg {
            what: "project has no turbines",
        })?;
        let wake = wake_config(&project.wake);
        Ok(Self {
            name: project.name.clone(),
            clock,
            precompute_time_s: sim.precompute_time_s,
            steady_polar_wake: sim.steady_polar_wake,
            store_wake_frames: sim.store_wake_frames,
            inflow: inflow(&project.inflow, first, &turbines[0].rotor, project_dir)?,
            circulation: CirculationSettings {
                max_iterations: sim.circulation.max_iterations,
                relaxation: sim.circulation.relaxation,
                tolerance: sim.circulation.tolerance,
                bound_core: wake.core.initial_core,
                density: AIR_DENSITY,
            },
            wake,
            air_density: AIR_DENSITY,
            turbines,
            ice_throw: project.ice_throw.clone(),
        })
    }
}

fn hub_of(def: &TurbineDef) -> tw_core::Vec3 {
    let [x, y, z] = def.position_m;
    vec3(x, y, z + def.hub_height_m)
}

fn turbine_setup(def: &TurbineDef, polars: &[Polar], project_dir: &Path) -> SimResult<TurbineSetup> {
    let rotor = RotorDef::from_def(def, polars)?;
    let op = &def.operation;
    let pose = InitialPose {
        azimuth: deg_to_rad(op.initial_azimuth_deg),
        rotor_speed: rpm_to_rad_s(op.rotor_speed_rpm),
        pitch: deg_to_rad(op.pitch_deg),
        yaw: deg_to_rad(op.yaw_deg),
        hub: hub_of(def),
    };
    let structure: Box<dyn StructuralModel> = match &def.structure {
        StructureDef::Prescribed => Box::new(PrescribedRotor::new(pose)),
        StructureDef::RigidDrivetrain {
            rotor_inertia_kg_m2,
            gearbox_ratio,
            loss_nm_s_per_rad,
            generator_efficiency,
        } => Box::new(RigidDrivetrain::new(
            pose,
            *rotor_inertia_kg_m2,
            *gearbox_ratio,
            *loss_nm_s_per_rad,
            *generator_efficiency,
        )?),
    };
    let resolve = |p: &Path| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            project_dir.join(p)
        }
    };
    let controller = def.controller.as_ref().map(|c| ControllerConfig {
        kind: match c.kind {
            ControllerKindDef::Bladed => ControllerKind::Bladed,
            ControllerKindDef::Dtu => ControllerKind::Dtu,
            ControllerKindDef::BladedExtended => ControllerKind::BladedExtended,
        },
        library: resolve(&c.library),
        parameter_file: resolve(&c.parameter_file),
    });
    let actuator = def
        .actuator
        .as_ref()
        .map(|a| {
            PitchActuator::new(
                a.tau_s,
                deg_to_rad(a.rate_limit_deg_s),
                deg_to_rad(a.min_pitch_deg),
                deg_to_rad(a.max_pitch_deg),
            )
        })
        .transpose()?;
    Ok(TurbineSetup {
        id: def.id.clone(),
        name: def.name.clone(),
        rotor,
        structure,
        controller,
        actuator,
    })
}

pub fn wake_config(def: &WakeDef) -> WakeConfig {
    WakeConfig {
        integration: match def.integration {
            IntegrationDef::Euler => IntegrationScheme::Euler,
            IntegrationDef::PC => IntegrationScheme::PredictorCorrector,
            IntegrationDef::PC2B => IntegrationScheme::PredictorCorrector2B,
        },
        max_age_s: def.max_age_s,
        far_field_distance: def.far_field_distance_m,
        near_wake_age_s: def.near_wake_age_s,
        reduction_threshold: def.reduction_threshold,
        particle_overlap: def.particle_overlap,
        core: CoreModel {
            initial_core: def.initial_core_m,
            turbulent_viscosity: def.turbulent_viscosity,
            kinematic_viscosity: AIR_KINEMATIC_VISCOSITY,
            strain_correction: def.strain_correction,
        },
        remesh: RemeshConfig {
            enabled: def.remesh.enabled,
            period: def.remesh.period,
            grid_spacing: def.remesh.grid_spacing_m,
            filter_ratio: def.remesh.filter_ratio,
        },
        stretching: def.stretching,
        wake_interaction: def.wake_interaction,
    }
}

fn inflow(def: &InflowDef, first: &TurbineDef, rotor: &RotorDef, project_dir: &Path) -> SimResult<Inflow> {
    match def {
        InflowDef::Uniform {
            speed_m_s,
            direction_deg,
            shear_exponent,
            reference_height_m,
        } => Ok(Inflow::Uniform(UniformInflow {
            speed: *speed_m_s,
            direction: deg_to_rad(*direction_deg),
            shear_exponent: *shear_exponent,
            reference_height: *reference_height_m,
        })),
        InflowDef::HubHeight { file } => {
            let text = read_input_file(&project_dir.join(file))?;
            let samples = HubHeightSeries::parse(&text)?;
            Ok(Inflow::HubHeight(HubHeightSeries::new(
                samples,
                hub_of(first),
                2.0 * rotor.tip_radius(),
            )?))
        }
        InflowDef::WindField { file } => {
            let text = read_input_file(&project_dir.join(file))?;
            Ok(Inflow::WindField(WindField::from_json(&text)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        tw_project::from_yaml_str(include_str!("../../../demos/projects/single_turbine.yaml")).unwrap()
    }

    #[test]
    fn resolves_demo_project() {
        let p = project();
        let cfg = SimConfig::from_project(&p, Path::new("../../demos/projects")).unwrap();
        assert_eq!(cfg.turbines.len(), 1);
        assert_eq!(cfg.clock.number_of_timesteps, 100);
        assert!(!cfg.turbines[0].structure.is_dynamic());
        assert!(cfg.turbines[0].controller.is_none());
        assert!(matches!(cfg.inflow, Inflow::Uniform(_)));
    }

    #[test]
    fn missing_inflow_file_is_configuration_error() {
        let mut p = project();
        p.inflow = InflowDef::HubHeight {
            file: "does_not_exist.hh".into(),
        };
        assert!(matches!(
            SimConfig::from_project(&p, Path::new("/nonexistent")),
            Err(SimError::Configuration { .. })
        ));
    }
}
