//! Project schema definitions.
//!
//! Quantities carry their unit in the field name. Angles in the file are in
//! degrees and rotor speeds in rpm; the simulation converts on load.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    pub simulation: SimulationDef,
    pub inflow: InflowDef,
    #[serde(default)]
    pub wake: WakeDef,
    #[serde(default)]
    pub airfoils: Vec<AirfoilDef>,
    #[serde(default)]
    pub turbines: Vec<TurbineDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_throw: Option<IceThrowDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationDef {
    pub timestep_s: f64,
    pub number_of_timesteps: usize,
    /// First timestep whose results are stored
    #[serde(default)]
    pub store_output_from: usize,
    /// Structural ramp-up before the main loop (dynamic structure only)
    #[serde(default)]
    pub precompute_time_s: f64,
    /// Skip the free wake and use polar aerodynamics only
    #[serde(default)]
    pub steady_polar_wake: bool,
    #[serde(default)]
    pub circulation: CirculationDef,
    /// Store wake geometry with every stored step
    #[serde(default)]
    pub store_wake_frames: bool,
}

/// Bound circulation fixed-point iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CirculationDef {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_relaxation")]
    pub relaxation: f64,
    /// Relative change in circulation that counts as converged
    #[serde(default = "default_circulation_tolerance")]
    pub tolerance: f64,
}

impl Default for CirculationDef {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            relaxation: default_relaxation(),
            tolerance: default_circulation_tolerance(),
        }
    }
}

fn default_max_iterations() -> usize {
    100
}

fn default_relaxation() -> f64 {
    0.3
}

fn default_circulation_tolerance() -> f64 {
    1e-4
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum InflowDef {
    Uniform {
        speed_m_s: f64,
        /// Horizontal inflow direction, 0 = along +x
        #[serde(default)]
        direction_deg: f64,
        /// Power-law shear exponent
        #[serde(default)]
        shear_exponent: f64,
        /// Height at which `speed_m_s` applies
        #[serde(default = "default_reference_height")]
        reference_height_m: f64,
    },
    /// Time series at hub height, relative to the project file
    HubHeight { file: PathBuf },
    /// Frozen turbulent wind field, relative to the project file
    WindField { file: PathBuf },
}

fn default_reference_height() -> f64 {
    100.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum IntegrationDef {
    Euler,
    #[default]
    PC,
    PC2B,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WakeDef {
    #[serde(default)]
    pub integration: IntegrationDef,
    /// Version 1 scheme flag, replaced by `integration`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictor_corrector: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub far_field_distance_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub near_wake_age_s: Option<f64>,
    #[serde(default = "default_reduction_threshold")]
    pub reduction_threshold: f64,
    #[serde(default = "default_one")]
    pub particle_overlap: f64,
    #[serde(default = "default_initial_core")]
    pub initial_core_m: f64,
    #[serde(default = "default_turbulent_viscosity")]
    pub turbulent_viscosity: f64,
    #[serde(default = "default_true")]
    pub strain_correction: bool,
    #[serde(default)]
    pub remesh: RemeshDef,
    #[serde(default)]
    pub stretching: bool,
    #[serde(default)]
    pub wake_interaction: bool,
}

impl Default for WakeDef {
    fn default() -> Self {
        Self {
            integration: IntegrationDef::default(),
            predictor_corrector: None,
            max_age_s: None,
            far_field_distance_m: None,
            near_wake_age_s: None,
            reduction_threshold: default_reduction_threshold(),
            particle_overlap: default_one(),
            initial_core_m: default_initial_core(),
            turbulent_viscosity: default_turbulent_viscosity(),
            strain_correction: true,
            remesh: RemeshDef::default(),
            stretching: false,
            wake_interaction: false,
        }
    }
}

fn default_reduction_threshold() -> f64 {
    1e-4
}

fn default_one() -> f64 {
    1.0
}

fn default_initial_core() -> f64 {
    0.05
}

fn default_turbulent_viscosity() -> f64 {
    100.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemeshDef {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_remesh_period")]
    pub period: usize,
    #[serde(default = "default_one")]
    pub grid_spacing_m: f64,
    #[serde(default = "default_filter_ratio")]
    pub filter_ratio: f64,
}

impl Default for RemeshDef {
    fn default() -> Self {
        Self {
            enabled: false,
            period: default_remesh_period(),
            grid_spacing_m: default_one(),
            filter_ratio: default_filter_ratio(),
        }
    }
}

fn default_remesh_period() -> usize {
    10
}

fn default_filter_ratio() -> f64 {
    1e-3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AirfoilDef {
    pub id: String,
    /// Polar sorted by angle of attack
    pub polar: Vec<PolarPointDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PolarPointDef {
    pub alpha_deg: f64,
    pub cl: f64,
    pub cd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurbineDef {
    pub id: String,
    pub name: String,
    /// Tower base position
    #[serde(default)]
    pub position_m: [f64; 3],
    pub hub_height_m: f64,
    pub blades: BladeDef,
    #[serde(default)]
    pub struts: Vec<StrutDef>,
    pub operation: OperationDef,
    #[serde(default)]
    pub structure: StructureDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<ControllerDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actuator: Option<ActuatorDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BladeDef {
    pub count: usize,
    /// Span stations from root to tip; panels lie between neighbours
    pub stations: Vec<StationDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationDef {
    pub radius_m: f64,
    pub chord_m: f64,
    #[serde(default)]
    pub twist_deg: f64,
    pub airfoil: String,
}

/// Drag-only member rotating with the rotor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrutDef {
    pub name: String,
    pub root_radius_m: f64,
    pub tip_radius_m: f64,
    pub chord_m: f64,
    pub drag_coefficient: f64,
    /// Azimuth relative to blade 1
    #[serde(default)]
    pub azimuth_offset_deg: f64,
    /// Offset along the rotor axis from the blade plane
    #[serde(default)]
    pub axial_offset_m: f64,
    #[serde(default = "default_strut_panels")]
    pub panels: usize,
}

fn default_strut_panels() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationDef {
    pub rotor_speed_rpm: f64,
    #[serde(default)]
    pub pitch_deg: f64,
    #[serde(default)]
    pub yaw_deg: f64,
    #[serde(default)]
    pub initial_azimuth_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type")]
pub enum StructureDef {
    /// Rotor turns at the prescribed speed
    #[default]
    Prescribed,
    /// Single torsional degree of freedom driven by aero and generator torque
    RigidDrivetrain {
        rotor_inertia_kg_m2: f64,
        #[serde(default = "default_one")]
        gearbox_ratio: f64,
        /// Viscous loss on the low speed shaft
        #[serde(default)]
        loss_nm_s_per_rad: f64,
        #[serde(default = "default_one")]
        generator_efficiency: f64,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControllerKindDef {
    Bladed,
    Dtu,
    BladedExtended,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerDef {
    pub kind: ControllerKindDef,
    /// Relative to the project file
    pub library: PathBuf,
    /// Relative to the project file
    pub parameter_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuatorDef {
    pub tau_s: f64,
    pub rate_limit_deg_s: f64,
    #[serde(default = "default_min_pitch")]
    pub min_pitch_deg: f64,
    #[serde(default = "default_max_pitch")]
    pub max_pitch_deg: f64,
}

fn default_min_pitch() -> f64 {
    -5.0
}

fn default_max_pitch() -> f64 {
    90.0
}

/// Ice fragments released from the blades.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceThrowDef {
    #[serde(default)]
    pub start_time_s: f64,
    pub fragments_per_step: usize,
    pub min_mass_kg: f64,
    pub max_mass_kg: f64,
    #[serde(default = "default_ice_density")]
    pub density_kg_m3: f64,
    #[serde(default = "default_one")]
    pub drag_coefficient: f64,
    #[serde(default)]
    pub seed: u64,
}

fn default_ice_density() -> f64 {
    900.0
}
