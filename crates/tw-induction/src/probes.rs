//! Query point generators for flow-field probes.

use tw_core::Vec3;

use crate::error::{InductionError, InductionResult};

/// Rectangular plane of probe points.
///
/// The plane is centred on `centre` and spanned by the unit directions `u_dir`
/// and `v_dir`, sampled with `nu * nv` points (row-major in `v`).
#[derive(Clone, Debug, PartialEq)]
pub struct CutPlane {
    pub centre: Vec3,
    pub u_dir: Vec3,
    pub v_dir: Vec3,
    pub width: f64,
    pub height: f64,
    pub nu: usize,
    pub nv: usize,
}

impl CutPlane {
    /// Plane normal to the wind (x) direction at streamwise position `x`.
    pub fn cross_stream(x: f64, y: f64, z: f64, width: f64, height: f64, nu: usize, nv: usize) -> Self {
        Self {
            centre: Vec3::new(x, y, z),
            u_dir: Vec3::y(),
            v_dir: Vec3::z(),
            width,
            height,
            nu,
            nv,
        }
    }

    /// Horizontal plane through height `z`, aligned with the wind.
    pub fn horizontal(x: f64, y: f64, z: f64, length: f64, width: f64, nu: usize, nv: usize) -> Self {
        Self {
            centre: Vec3::new(x, y, z),
            u_dir: Vec3::x(),
            v_dir: Vec3::y(),
            width: length,
            height: width,
            nu,
            nv,
        }
    }

    pub fn point_count(&self) -> usize {
        self.nu * self.nv
    }

    pub fn points(&self) -> InductionResult<Vec<Vec3>> {
        if self.nu == 0 || self.nv == 0 {
            return Err(InductionError::InvalidArg {
                what: "cut plane needs at least one point per direction",
            });
        }
        let u = self.u_dir.try_normalize(1e-12).ok_or(InductionError::InvalidArg {
            what: "cut plane direction must be non-zero",
        })?;
        let v = self.v_dir.try_normalize(1e-12).ok_or(InductionError::InvalidArg {
            what: "cut plane direction must be non-zero",
        })?;
        let mut out = Vec::with_capacity(self.point_count());
        for j in 0..self.nv {
            let fv = axis_fraction(j, self.nv);
            for i in 0..self.nu {
                let fu = axis_fraction(i, self.nu);
                out.push(self.centre + u * (fu * self.width) + v * (fv * self.height));
            }
        }
        Ok(out)
    }
}

/// Position in `[-0.5, 0.5]` of sample `i` of `n`.
fn axis_fraction(i: usize, n: usize) -> f64 {
    if n == 1 {
        0.0
    } else {
        i as f64 / (n - 1) as f64 - 0.5
    }
}

/// Axis-aligned box of probe points.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeGrid {
    pub min: Vec3,
    pub max: Vec3,
    pub counts: [usize; 3],
}

impl VolumeGrid {
    pub fn points(&self) -> InductionResult<Vec<Vec3>> {
        if self.counts.iter().any(|&n| n == 0) {
            return Err(InductionError::InvalidArg {
                what: "volume grid needs at least one point per axis",
            });
        }
        let [nx, ny, nz] = self.counts;
        let step = |k: usize, n: usize, lo: f64, hi: f64| {
            if n == 1 {
                0.5 * (lo + hi)
            } else {
                lo + (hi - lo) * k as f64 / (n - 1) as f64
            }
        };
        let mut out = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    out.push(Vec3::new(
                        step(i, nx, self.min.x, self.max.x),
                        step(j, ny, self.min.y, self.max.y),
                        step(k, nz, self.min.z, self.max.z),
                    ));
                }
            }
        }
        Ok(out)
    }
}
