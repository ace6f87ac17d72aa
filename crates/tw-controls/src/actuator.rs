//! Blade pitch actuator dynamics.
//!
//! First-order lag with rate limiting between the controller's pitch demand
//! and the blade pitch the aerodynamics sees:
//! `dpitch/dt = (demand - pitch) / tau`, clamped to `[-rate_limit, rate_limit]`,
//! with the result clamped to `[min_pitch, max_pitch]`.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};
use crate::signals::MAX_BLADES;

/// Pitch actuator parameters. Angles in rad, rates in rad/s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PitchActuator {
    /// Time constant (s), must be positive
    pub tau: f64,
    /// Rate limit (rad/s), must be positive
    pub rate_limit: f64,
    pub min_pitch: f64,
    pub max_pitch: f64,
}

impl Default for PitchActuator {
    fn default() -> Self {
        Self {
            tau: 0.1,
            rate_limit: 10_f64.to_radians(),
            min_pitch: -5_f64.to_radians(),
            max_pitch: 90_f64.to_radians(),
        }
    }
}

impl PitchActuator {
    pub fn new(tau: f64, rate_limit: f64, min_pitch: f64, max_pitch: f64) -> ControlResult<Self> {
        if !(tau > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "tau must be positive",
            });
        }
        if !(rate_limit > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "rate_limit must be positive",
            });
        }
        if !(min_pitch <= max_pitch) {
            return Err(ControlError::InvalidArg {
                what: "min_pitch must not exceed max_pitch",
            });
        }
        Ok(Self {
            tau,
            rate_limit,
            min_pitch,
            max_pitch,
        })
    }

    /// Pitch rate toward `demand`, rate limited.
    pub fn rate(&self, pitch: f64, demand: f64) -> f64 {
        ((demand - pitch) / self.tau).clamp(-self.rate_limit, self.rate_limit)
    }

    /// Advance one blade by `dt` (explicit Euler).
    pub fn step(&self, pitch: f64, demand: f64, dt: f64) -> f64 {
        let next = pitch + self.rate(pitch, demand) * dt;
        next.clamp(self.min_pitch, self.max_pitch)
    }

    /// Advance every blade by `dt`.
    pub fn step_all(&self, pitch: &[f64; MAX_BLADES], demand: &[f64; MAX_BLADES], dt: f64) -> [f64; MAX_BLADES] {
        std::array::from_fn(|b| self.step(pitch[b], demand[b], dt))
    }
}
