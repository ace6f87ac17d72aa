//! DTU-style controller arrays.
//!
//! Two plain 0-based double arrays: `array1` carries measurements into the
//! controller, `array2` carries demands back. Unlike the Bladed-style ABIs no
//! index shift is applied.

use crate::error::{ControlError, ControlResult};
use crate::signals::{ControlCommands, MAX_BLADES, TurbineInputs};

/// Length of both exchange arrays.
pub const DTU_ARRAY_LEN: usize = 100;

/// 0-based `array1` slots.
pub mod input {
    pub const TIME: usize = 0;
    pub const GENERATOR_SPEED: usize = 1;
    pub const PITCH_1: usize = 2;
    pub const HUB_WIND_X: usize = 5;
    pub const ELECTRICAL_POWER: usize = 8;
    pub const GRID_FLAG: usize = 9;
}

/// 0-based `array2` slots.
pub mod output {
    pub const GENERATOR_TORQUE: usize = 0;
    pub const PITCH_1: usize = 1;
    pub const BRAKE: usize = 8;
}

/// Measurements for one update call.
pub fn build_array1(inputs: &TurbineInputs) -> Vec<f64> {
    let mut a = vec![0.0; DTU_ARRAY_LEN];
    a[input::TIME] = inputs.time;
    a[input::GENERATOR_SPEED] = inputs.generator_speed;
    for b in 0..MAX_BLADES {
        a[input::PITCH_1 + b] = inputs.pitch[b];
    }
    // hub wind as a vector; the wind runs along +x
    a[input::HUB_WIND_X] = inputs.hub_wind_speed;
    a[input::HUB_WIND_X + 1] = 0.0;
    a[input::HUB_WIND_X + 2] = 0.0;
    a[input::ELECTRICAL_POWER] = inputs.electrical_power;
    a[input::GRID_FLAG] = if inputs.grid_connected { 0.0 } else { 1.0 };
    a
}

/// Interpret `array2`.
pub fn parse_array2(array2: &[f64], held: &ControlCommands) -> ControlCommands {
    let get = |i: usize| array2.get(i).copied();
    let mut out = held.clone();
    if let Some(t) = get(output::GENERATOR_TORQUE) {
        out.generator_torque = t;
    }
    for b in 0..MAX_BLADES {
        if let Some(p) = get(output::PITCH_1 + b) {
            out.pitch[b] = p;
        }
    }
    out.brake = get(output::BRAKE).is_some_and(|v| v > 0.5);
    out
}

/// Parse a DTU parameter file into the init array.
///
/// Each parameter line reads `constant <n> <value> ;` with `n` 1-based;
/// anything after `;` and every other line is ignored.
pub fn parse_parameters(text: &str) -> ControlResult<Vec<f64>> {
    let mut init = vec![0.0; DTU_ARRAY_LEN];
    for (lineno, line) in text.lines().enumerate() {
        let body = line.split(';').next().unwrap_or("").trim();
        let mut words = body.split_whitespace();
        if !words
            .next()
            .is_some_and(|w| w.eq_ignore_ascii_case("constant"))
        {
            continue;
        }
        let bad = || ControlError::ParameterFile {
            path: String::new(),
            message: format!("malformed constant on line {}", lineno + 1),
        };
        let n: usize = words.next().and_then(|w| w.parse().ok()).ok_or_else(bad)?;
        let value: f64 = words.next().and_then(|w| w.parse().ok()).ok_or_else(bad)?;
        if n == 0 || n > DTU_ARRAY_LEN {
            return Err(ControlError::ParameterFile {
                path: String::new(),
                message: format!("constant index {n} out of range on line {}", lineno + 1),
            });
        }
        init[n - 1] = value;
    }
    Ok(init)
}
