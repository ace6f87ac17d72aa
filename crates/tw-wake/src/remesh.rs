//! Particle remeshing onto a uniform grid (VPML style).
//!
//! Settled particles are interpolated onto grid nodes with the M4' kernel,
//! sub-threshold nodes are filtered out, and the remaining strengths are
//! rescaled so the total vorticity magnitude matches the input.

use std::collections::BTreeMap;

use tw_core::{Vec3, vec3};

use crate::config::RemeshConfig;
use crate::elements::WakeParticle;

/// Monaghan's M4' interpolation kernel.
pub fn m4_prime(x: f64) -> f64 {
    let a = x.abs();
    if a < 1.0 {
        1.0 - 2.5 * a * a + 1.5 * a * a * a
    } else if a < 2.0 {
        0.5 * (2.0 - a) * (2.0 - a) * (1.0 - a)
    } else {
        0.0
    }
}

#[derive(Default)]
struct Cell {
    alpha: Vec3,
    weight: f64,
    weighted_age: f64,
}

/// Remeshing state for one group of turbines sharing a particle field.
#[derive(Clone, Debug, PartialEq)]
pub struct Remesher {
    spacing: f64,
    filter_ratio: f64,
    /// Maximum particle strength seen at the first non-empty remesh
    reference: Option<f64>,
}

impl Remesher {
    pub fn new(config: &RemeshConfig) -> Self {
        Self {
            spacing: config.grid_spacing,
            filter_ratio: config.filter_ratio,
            reference: None,
        }
    }

    pub fn reference_magnitude(&self) -> Option<f64> {
        self.reference
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Remesh the settled particles among `particles`.
    ///
    /// Returns `None` when there is nothing to remesh, in which case the
    /// caller must leave its particle lists untouched. Otherwise returns the
    /// replacement for the settled particles; new particles are not part of
    /// the input set and must be kept by the caller.
    pub fn remesh<'a, I>(&mut self, particles: I) -> Option<Vec<WakeParticle>>
    where
        I: IntoIterator<Item = &'a WakeParticle>,
    {
        let settled: Vec<&WakeParticle> = particles.into_iter().filter(|p| !p.is_new).collect();
        if settled.is_empty() || !(self.spacing > 0.0) {
            return None;
        }
        let total_before: f64 = settled.iter().map(|p| p.strength()).sum();
        if !(total_before > 0.0) {
            return None;
        }
        let reference = *self.reference.get_or_insert_with(|| {
            settled.iter().map(|p| p.strength()).fold(0.0, f64::max)
        });

        let h = self.spacing;
        let mut cells: BTreeMap<(i64, i64, i64), Cell> = BTreeMap::new();
        for p in &settled {
            let g = p.position / h;
            let base = (g.x.floor() as i64, g.y.floor() as i64, g.z.floor() as i64);
            let weights = |b: i64, c: f64| -> [(i64, f64); 4] {
                let mut w = [(0, 0.0); 4];
                for (k, slot) in w.iter_mut().enumerate() {
                    let i = b - 1 + k as i64;
                    *slot = (i, m4_prime(c - i as f64));
                }
                w
            };
            let wx = weights(base.0, g.x);
            let wy = weights(base.1, g.y);
            let wz = weights(base.2, g.z);
            for &(i, fx) in &wx {
                for &(j, fy) in &wy {
                    for &(k, fz) in &wz {
                        let w = fx * fy * fz;
                        if w == 0.0 {
                            continue;
                        }
                        let cell = cells.entry((i, j, k)).or_default();
                        cell.alpha += p.alpha * w;
                        cell.weight += w.abs();
                        cell.weighted_age += w.abs() * p.age_s;
                    }
                }
            }
        }

        let threshold = self.filter_ratio * reference;
        let volume = h * h * h;
        let mut out: Vec<WakeParticle> = cells
            .into_iter()
            .filter(|(_, c)| c.alpha.norm() >= threshold && c.alpha.norm() > 0.0)
            .map(|((i, j, k), c)| {
                let age = if c.weight > 0.0 { c.weighted_age / c.weight } else { 0.0 };
                let mut p = WakeParticle::new(
                    vec3(i as f64 * h, j as f64 * h, k as f64 * h),
                    c.alpha,
                    h,
                    volume,
                    age,
                );
                p.is_new = false;
                p
            })
            .collect();

        let total_after: f64 = out.iter().map(|p| p.strength()).sum();
        if !(total_after > 0.0) {
            return None;
        }
        let scale = total_before / total_after;
        for p in &mut out {
            p.alpha *= scale;
            p.initial_alpha = p.alpha;
        }
        Some(out)
    }
}
