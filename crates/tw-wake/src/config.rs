//! Resolved wake model settings.
//!
//! All lengths of time are already in seconds here; revolution or timestep
//! based project settings are converted by the caller.

use crate::error::{WakeError, WakeResult};

/// Time integration scheme for wake convection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegrationScheme {
    /// Explicit Euler, one induction evaluation per step.
    Euler,
    /// Euler predictor followed by a trapezoidal corrector.
    #[default]
    PredictorCorrector,
    /// Second order Adams-Bashforth predictor followed by a trapezoidal
    /// corrector. Falls back to Euler while no previous rate exists.
    PredictorCorrector2B,
}

impl IntegrationScheme {
    pub fn has_corrector(self) -> bool {
        !matches!(self, IntegrationScheme::Euler)
    }
}

/// Viscous core growth model (Ramasamy-Leishman).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoreModel {
    /// Core radius of a freshly shed filament (m)
    pub initial_core: f64,
    /// Turbulent viscosity coefficient (delta)
    pub turbulent_viscosity: f64,
    /// Kinematic viscosity of air (m^2/s)
    pub kinematic_viscosity: f64,
    /// Scale core radius with filament stretching
    pub strain_correction: bool,
}

impl Default for CoreModel {
    fn default() -> Self {
        Self {
            initial_core: 0.05,
            turbulent_viscosity: 100.0,
            kinematic_viscosity: tw_core::units::constants::AIR_KINEMATIC_VISCOSITY,
            strain_correction: true,
        }
    }
}

/// Particle remeshing settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RemeshConfig {
    pub enabled: bool,
    /// Remesh when `step % period == 0`
    pub period: usize,
    /// Grid spacing (m)
    pub grid_spacing: f64,
    /// Remeshed particles weaker than this fraction of the reference
    /// magnitude are dropped
    pub filter_ratio: f64,
}

impl Default for RemeshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: 10,
            grid_spacing: 1.0,
            filter_ratio: 1e-3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WakeConfig {
    pub integration: IntegrationScheme,
    /// Elements older than this are truncated
    pub max_age_s: Option<f64>,
    /// Elements farther than this from their turbine's hub are truncated
    pub far_field_distance: Option<f64>,
    /// Filaments older than this are converted to particles
    pub near_wake_age_s: Option<f64>,
    /// Elements weaker than this fraction of the current maximum are dropped
    pub reduction_threshold: f64,
    /// Particle core size relative to the length of the converted filament
    pub particle_overlap: f64,
    pub core: CoreModel,
    pub remesh: RemeshConfig,
    /// Evolve particle strength with vortex stretching
    pub stretching: bool,
    /// Turbines see each other's wakes
    pub wake_interaction: bool,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            integration: IntegrationScheme::default(),
            max_age_s: None,
            far_field_distance: None,
            near_wake_age_s: None,
            reduction_threshold: 1e-4,
            particle_overlap: 1.0,
            core: CoreModel::default(),
            remesh: RemeshConfig::default(),
            stretching: false,
            wake_interaction: false,
        }
    }
}

impl WakeConfig {
    pub fn validate(&self) -> WakeResult<()> {
        let positive = |v: Option<f64>| v.is_none_or(|x| x.is_finite() && x > 0.0);
        if !positive(self.max_age_s) {
            return Err(WakeError::InvalidArg {
                what: "max wake age must be positive",
            });
        }
        if !positive(self.far_field_distance) {
            return Err(WakeError::InvalidArg {
                what: "far field distance must be positive",
            });
        }
        if !positive(self.near_wake_age_s) {
            return Err(WakeError::InvalidArg {
                what: "near wake age must be positive",
            });
        }
        if !(0.0..1.0).contains(&self.reduction_threshold) {
            return Err(WakeError::InvalidArg {
                what: "reduction threshold must be in [0, 1)",
            });
        }
        if !(self.particle_overlap > 0.0) {
            return Err(WakeError::InvalidArg {
                what: "particle overlap must be positive",
            });
        }
        if !(self.core.initial_core >= 0.0) || !(self.core.turbulent_viscosity >= 0.0) {
            return Err(WakeError::InvalidArg {
                what: "core model parameters must be non-negative",
            });
        }
        if self.remesh.enabled {
            if self.remesh.period == 0 {
                return Err(WakeError::InvalidArg {
                    what: "remesh period must be positive",
                });
            }
            if !(self.remesh.grid_spacing > 0.0) {
                return Err(WakeError::InvalidArg {
                    what: "remesh grid spacing must be positive",
                });
            }
            if !(0.0..1.0).contains(&self.remesh.filter_ratio) {
                return Err(WakeError::InvalidArg {
                    what: "remesh filter ratio must be in [0, 1)",
                });
            }
        }
        Ok(())
    }
}
