//! Named-field controller exchange values.
//!
//! These are the only shapes the simulation sees. The fixed-index ABI buffers
//! are built from and parsed into them at the library boundary.

use serde::{Deserialize, Serialize};

/// Maximum number of blades the controller ABIs carry.
pub const MAX_BLADES: usize = 3;

/// Measured turbine state handed to the controller for one call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurbineInputs {
    /// Simulation time (s)
    pub time: f64,
    /// Controller call interval (s)
    pub dt: f64,
    pub blade_count: usize,
    /// Current blade pitch angles (rad)
    pub pitch: [f64; MAX_BLADES],
    /// Generator speed (rad/s)
    pub generator_speed: f64,
    /// Rotor speed (rad/s)
    pub rotor_speed: f64,
    /// Measured generator torque (Nm)
    pub generator_torque: f64,
    /// Electrical power (W)
    pub electrical_power: f64,
    /// Hub height horizontal wind speed (m/s)
    pub hub_wind_speed: f64,
    /// Rotor azimuth (rad)
    pub azimuth: f64,
    /// Nacelle yaw angle (rad)
    pub yaw: f64,
    /// Blade root out-of-plane bending moments (Nm)
    pub out_of_plane_moments: [f64; MAX_BLADES],
    pub grid_connected: bool,
    /// Forward-looking wave elevation predictions
    pub wave_predictions: Vec<f64>,
    /// Smart actuator states per blade (extended Bladed ABI only)
    pub actuator_states: Vec<Vec<f64>>,
}

/// Demands returned by the controller for one call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlCommands {
    /// Pitch demand per blade (rad)
    pub pitch: [f64; MAX_BLADES],
    /// Generator torque demand (Nm)
    pub generator_torque: f64,
    /// Nacelle yaw rate demand (rad/s)
    pub yaw_rate: f64,
    /// Shaft brake engaged
    pub brake: bool,
    /// Smart actuator demands per blade (extended Bladed ABI only)
    pub actuator_demands: Vec<Vec<f64>>,
}

impl ControlCommands {
    /// Commands that keep the turbine exactly where it is.
    pub fn hold(inputs: &TurbineInputs) -> Self {
        Self {
            pitch: inputs.pitch,
            generator_torque: inputs.generator_torque,
            yaw_rate: 0.0,
            brake: false,
            actuator_demands: inputs.actuator_states.clone(),
        }
    }
}
