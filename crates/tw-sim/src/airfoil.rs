//! Tabulated airfoil polars.

use std::f64::consts::PI;

use tw_core::interp_clamped;
use tw_core::units::deg_to_rad;
use tw_project::schema::AirfoilDef;

use crate::error::{SimError, SimResult};

/// Lift and drag coefficient against angle of attack (rad), clamped at the
/// table ends.
#[derive(Clone, Debug, PartialEq)]
pub struct Polar {
    pub id: String,
    alpha: Vec<f64>,
    cl: Vec<f64>,
    cd: Vec<f64>,
}

impl Polar {
    pub fn new(id: impl Into<String>, alpha: Vec<f64>, cl: Vec<f64>, cd: Vec<f64>) -> SimResult<Self> {
        if alpha.len() < 2 || alpha.len() != cl.len() || alpha.len() != cd.len() {
            return Err(SimError::InvalidArg {
                what: "polar needs at least two points of equal length columns",
            });
        }
        if alpha.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::InvalidArg {
                what: "polar angles must be strictly increasing",
            });
        }
        Ok(Self {
            id: id.into(),
            alpha,
            cl,
            cd,
        })
    }

    pub fn from_def(def: &AirfoilDef) -> SimResult<Self> {
        Self::new(
            def.id.clone(),
            def.polar.iter().map(|p| deg_to_rad(p.alpha_deg)).collect(),
            def.polar.iter().map(|p| p.cl).collect(),
            def.polar.iter().map(|p| p.cd).collect(),
        )
    }

    /// `(cl, cd)` at `alpha`, wrapped into [-pi, pi) first.
    pub fn coefficients(&self, alpha: f64) -> (f64, f64) {
        let a = wrap_angle(alpha);
        let cl = interp_clamped(&self.alpha, &self.cl, a).unwrap_or(0.0);
        let cd = interp_clamped(&self.alpha, &self.cd, a).unwrap_or(0.0);
        (cl, cd)
    }
}

pub fn wrap_angle(a: f64) -> f64 {
    (a + PI).rem_euclid(2.0 * PI) - PI
}
