//! Project validation logic.
//!
//! Validation is structural only. Whether referenced files exist is checked
//! when a run is built.

use crate::schema::{
    AirfoilDef, IceThrowDef, InflowDef, Project, SimulationDef, StructureDef, StrutDef,
    TurbineDef, WakeDef,
};
use std::collections::HashSet;

/// Blade count limit imposed by the controller exchange layouts.
pub const MAX_CONTROLLED_BLADES: usize = 3;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported feature: {feature} - {reason}")]
    Unsupported { feature: String, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    validate_simulation(&project.simulation)?;
    validate_inflow(&project.inflow)?;
    validate_wake(&project.wake)?;

    let mut airfoil_ids = HashSet::new();
    for airfoil in &project.airfoils {
        if !airfoil_ids.insert(airfoil.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: airfoil.id.clone(),
                context: "airfoils".to_string(),
            });
        }
        validate_airfoil(airfoil)?;
    }

    if project.turbines.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "turbines".to_string(),
            value: "0".to_string(),
            reason: "at least one turbine is required".to_string(),
        });
    }
    let mut turbine_ids = HashSet::new();
    for turbine in &project.turbines {
        if !turbine_ids.insert(turbine.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: turbine.id.clone(),
                context: "turbines".to_string(),
            });
        }
        validate_turbine(turbine, &airfoil_ids)?;
    }

    if let Some(ice) = &project.ice_throw {
        validate_ice_throw(ice)?;
    }

    Ok(())
}

fn validate_simulation(sim: &SimulationDef) -> Result<(), ValidationError> {
    validate_positive_finite("timestep_s", sim.timestep_s, "simulation")?;
    if sim.number_of_timesteps == 0 {
        return Err(ValidationError::InvalidValue {
            field: "simulation number_of_timesteps".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    validate_non_negative_finite("precompute_time_s", sim.precompute_time_s, "simulation")?;
    if sim.circulation.max_iterations == 0 {
        return Err(ValidationError::InvalidValue {
            field: "simulation circulation max_iterations".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let relax = sim.circulation.relaxation;
    if !(relax > 0.0 && relax <= 1.0) {
        return Err(ValidationError::InvalidValue {
            field: "simulation circulation relaxation".to_string(),
            value: relax.to_string(),
            reason: "must be in (0, 1]".to_string(),
        });
    }
    validate_positive_finite("circulation tolerance", sim.circulation.tolerance, "simulation")?;
    Ok(())
}

fn validate_inflow(inflow: &InflowDef) -> Result<(), ValidationError> {
    match inflow {
        InflowDef::Uniform {
            speed_m_s,
            direction_deg,
            shear_exponent,
            reference_height_m,
        } => {
            validate_non_negative_finite("speed_m_s", *speed_m_s, "inflow")?;
            validate_finite("direction_deg", *direction_deg, "inflow")?;
            validate_finite("shear_exponent", *shear_exponent, "inflow")?;
            validate_positive_finite("reference_height_m", *reference_height_m, "inflow")?;
        }
        InflowDef::HubHeight { file } | InflowDef::WindField { file } => {
            if file.as_os_str().is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "inflow file".to_string(),
                    value: String::new(),
                    reason: "path must not be empty".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_wake(wake: &WakeDef) -> Result<(), ValidationError> {
    for (field, value) in [
        ("max_age_s", wake.max_age_s),
        ("far_field_distance_m", wake.far_field_distance_m),
        ("near_wake_age_s", wake.near_wake_age_s),
    ] {
        if let Some(v) = value {
            validate_positive_finite(field, v, "wake")?;
        }
    }
    if !(0.0..1.0).contains(&wake.reduction_threshold) {
        return Err(ValidationError::InvalidValue {
            field: "wake reduction_threshold".to_string(),
            value: wake.reduction_threshold.to_string(),
            reason: "must be in [0, 1)".to_string(),
        });
    }
    validate_positive_finite("particle_overlap", wake.particle_overlap, "wake")?;
    validate_positive_finite("initial_core_m", wake.initial_core_m, "wake")?;
    validate_non_negative_finite("turbulent_viscosity", wake.turbulent_viscosity, "wake")?;
    if wake.remesh.period == 0 {
        return Err(ValidationError::InvalidValue {
            field: "wake remesh period".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    validate_positive_finite("remesh grid_spacing_m", wake.remesh.grid_spacing_m, "wake")?;
    validate_non_negative_finite("remesh filter_ratio", wake.remesh.filter_ratio, "wake")?;
    Ok(())
}

fn validate_airfoil(airfoil: &AirfoilDef) -> Result<(), ValidationError> {
    let context = format!("airfoil '{}'", airfoil.id);
    if airfoil.polar.len() < 2 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} polar"),
            value: airfoil.polar.len().to_string(),
            reason: "needs at least two points".to_string(),
        });
    }
    for point in &airfoil.polar {
        validate_finite("alpha_deg", point.alpha_deg, &context)?;
        validate_finite("cl", point.cl, &context)?;
        validate_non_negative_finite("cd", point.cd, &context)?;
    }
    if airfoil.polar.windows(2).any(|w| w[1].alpha_deg <= w[0].alpha_deg) {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} polar"),
            value: "alpha_deg".to_string(),
            reason: "angles of attack must be strictly increasing".to_string(),
        });
    }
    Ok(())
}

fn validate_turbine(turbine: &TurbineDef, airfoil_ids: &HashSet<&str>) -> Result<(), ValidationError> {
    let context = format!("turbine '{}'", turbine.name);
    for v in turbine.position_m {
        validate_finite("position_m", v, &context)?;
    }
    validate_positive_finite("hub_height_m", turbine.hub_height_m, &context)?;

    let blades = &turbine.blades;
    if blades.count == 0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} blades count"),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if blades.stations.len() < 2 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} blades stations"),
            value: blades.stations.len().to_string(),
            reason: "needs at least two stations".to_string(),
        });
    }
    for station in &blades.stations {
        validate_non_negative_finite("station radius_m", station.radius_m, &context)?;
        validate_positive_finite("station chord_m", station.chord_m, &context)?;
        validate_finite("station twist_deg", station.twist_deg, &context)?;
        if !airfoil_ids.contains(station.airfoil.as_str()) {
            return Err(ValidationError::MissingReference {
                id: station.airfoil.clone(),
                context: format!("{context} station airfoil"),
            });
        }
    }
    if blades
        .stations
        .windows(2)
        .any(|w| w[1].radius_m <= w[0].radius_m)
    {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} blades stations"),
            value: "radius_m".to_string(),
            reason: "radii must be strictly increasing".to_string(),
        });
    }

    for strut in &turbine.struts {
        validate_strut(strut, &context)?;
    }

    let op = &turbine.operation;
    validate_finite("rotor_speed_rpm", op.rotor_speed_rpm, &context)?;
    validate_finite("pitch_deg", op.pitch_deg, &context)?;
    validate_finite("yaw_deg", op.yaw_deg, &context)?;
    validate_finite("initial_azimuth_deg", op.initial_azimuth_deg, &context)?;

    if let StructureDef::RigidDrivetrain {
        rotor_inertia_kg_m2,
        gearbox_ratio,
        loss_nm_s_per_rad,
        generator_efficiency,
    } = &turbine.structure
    {
        validate_positive_finite("rotor_inertia_kg_m2", *rotor_inertia_kg_m2, &context)?;
        validate_positive_finite("gearbox_ratio", *gearbox_ratio, &context)?;
        validate_non_negative_finite("loss_nm_s_per_rad", *loss_nm_s_per_rad, &context)?;
        if !(*generator_efficiency > 0.0 && *generator_efficiency <= 1.0) {
            return Err(ValidationError::InvalidValue {
                field: format!("{context} generator_efficiency"),
                value: generator_efficiency.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
    }

    if turbine.controller.is_some() && blades.count > MAX_CONTROLLED_BLADES {
        return Err(ValidationError::Unsupported {
            feature: format!("{context} controller"),
            reason: format!("controllers support at most {MAX_CONTROLLED_BLADES} blades"),
        });
    }

    if let Some(act) = &turbine.actuator {
        validate_positive_finite("actuator tau_s", act.tau_s, &context)?;
        validate_positive_finite("actuator rate_limit_deg_s", act.rate_limit_deg_s, &context)?;
        if !(act.min_pitch_deg <= act.max_pitch_deg) {
            return Err(ValidationError::InvalidValue {
                field: format!("{context} actuator pitch limits"),
                value: format!("{}..{}", act.min_pitch_deg, act.max_pitch_deg),
                reason: "minimum must not exceed maximum".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_strut(strut: &StrutDef, context: &str) -> Result<(), ValidationError> {
    let context = format!("{context} strut '{}'", strut.name);
    validate_non_negative_finite("root_radius_m", strut.root_radius_m, &context)?;
    validate_positive_finite("chord_m", strut.chord_m, &context)?;
    validate_non_negative_finite("drag_coefficient", strut.drag_coefficient, &context)?;
    if !(strut.tip_radius_m > strut.root_radius_m) {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} tip_radius_m"),
            value: strut.tip_radius_m.to_string(),
            reason: "must exceed root_radius_m".to_string(),
        });
    }
    if strut.panels == 0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} panels"),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_ice_throw(ice: &IceThrowDef) -> Result<(), ValidationError> {
    validate_non_negative_finite("start_time_s", ice.start_time_s, "ice_throw")?;
    validate_positive_finite("min_mass_kg", ice.min_mass_kg, "ice_throw")?;
    validate_positive_finite("density_kg_m3", ice.density_kg_m3, "ice_throw")?;
    validate_non_negative_finite("drag_coefficient", ice.drag_coefficient, "ice_throw")?;
    if !(ice.max_mass_kg >= ice.min_mass_kg) || !ice.max_mass_kg.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: "ice_throw max_mass_kg".to_string(),
            value: ice.max_mass_kg.to_string(),
            reason: "must be finite and not below min_mass_kg".to_string(),
        });
    }
    Ok(())
}

fn validate_finite(field: &str, value: f64, context: &str) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: format!("{} {}", context, field),
            value: value.to_string(),
            reason: "must be finite".to_string(),
        });
    }
    Ok(())
}

fn validate_positive_finite(field: &str, value: f64, context: &str) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{} {}", context, field),
            value: value.to_string(),
            reason: "must be positive and finite".to_string(),
        });
    }
    Ok(())
}

fn validate_non_negative_finite(
    field: &str,
    value: f64,
    context: &str,
) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{} {}", context, field),
            value: value.to_string(),
            reason: "must be non-negative and finite".to_string(),
        });
    }
    Ok(())
}
