//! Viscous core growth of wake vortices.

use crate::config::CoreModel;
use crate::state::WakeState;

/// Lamb-Oseen constant.
pub const OSEEN_ALPHA: f64 = 1.25643;

impl CoreModel {
    /// Core radius after `age_s` seconds, before any strain correction.
    pub fn grown_core(&self, initial_core: f64, age_s: f64) -> f64 {
        let diffusion = 4.0 * OSEEN_ALPHA * self.turbulent_viscosity * self.kinematic_viscosity * age_s.max(0.0);
        (initial_core * initial_core + diffusion).sqrt()
    }

    /// Strain factor for a filament stretched from `initial_length` to
    /// `length`. Volume conservation of the core gives `sqrt(l0 / l)`.
    pub fn strain_factor(&self, initial_length: f64, length: f64) -> f64 {
        if !self.strain_correction || initial_length <= 0.0 || length <= 0.0 {
            return 1.0;
        }
        let f = (initial_length / length).sqrt();
        if f.is_finite() { f } else { 1.0 }
    }
}

/// Phase 8: age every element by `dt` and regrow its core.
pub fn update_cores(state: &mut WakeState, model: &CoreModel, dt: f64) {
    let lengths: Vec<Option<f64>> = state
        .lines()
        .iter()
        .map(|l| state.line_endpoints(l).map(|(a, b)| (b - a).norm()))
        .collect();
    for (line, length) in state.lines_mut().iter_mut().zip(lengths) {
        line.age_s += dt;
        let grown = model.grown_core(line.initial_core_radius, line.age_s);
        let strain = length.map_or(1.0, |l| model.strain_factor(line.initial_length, l));
        line.core_radius = grown * strain;
    }
    for p in state.particles_mut().iter_mut() {
        p.age_s += dt;
        p.core_size = p.core_size.max(model.grown_core(p.initial_core_size, p.age_s));
    }
}
