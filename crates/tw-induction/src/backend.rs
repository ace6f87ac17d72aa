//! Backend trait and the multi-threaded CPU evaluation.

use rayon::prelude::*;
use tw_core::Vec3;

use crate::error::{InductionError, InductionResult};
use crate::field::VortexField;
use crate::kernel::field_velocity;

/// Backend-agnostic induced velocity evaluation.
///
/// Implementations must return one velocity per query point, in query order,
/// and must never emit non-finite values.
pub trait InductionBackend: Send + Sync {
    /// Short human readable backend name for logs.
    fn name(&self) -> &str;

    /// Evaluate the field at every query point.
    fn induced_velocities(
        &self,
        field: &VortexField,
        points: &[Vec3],
    ) -> InductionResult<Vec<Vec3>>;

    /// Whether the backend runs on an accelerator device.
    fn is_accelerated(&self) -> bool {
        false
    }
}

/// Minimum points handed to one rayon task.
const MIN_POINTS_PER_TASK: usize = 8;

/// Fork-join evaluation over query points. Each point is computed by one task
/// and written exactly once, so results do not depend on scheduling.
pub struct CpuBackend {
    pool: Option<rayon::ThreadPool>,
}

impl CpuBackend {
    /// Use rayon's global pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Use a dedicated pool with a fixed number of worker threads.
    pub fn with_threads(threads: usize) -> InductionResult<Self> {
        if threads == 0 {
            return Err(InductionError::InvalidArg {
                what: "thread count must be positive",
            });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tw-induction-{i}"))
            .build()
            .map_err(|e| InductionError::ThreadPool {
                message: e.to_string(),
            })?;
        Ok(Self { pool: Some(pool) })
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InductionBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn induced_velocities(
        &self,
        field: &VortexField,
        points: &[Vec3],
    ) -> InductionResult<Vec<Vec3>> {
        if field.is_empty() {
            return Ok(vec![Vec3::zeros(); points.len()]);
        }
        let eval = || -> Vec<Vec3> {
            points
                .par_iter()
                .with_min_len(MIN_POINTS_PER_TASK)
                .map(|p| field_velocity(p, field))
                .collect()
        };
        Ok(match &self.pool {
            Some(pool) => pool.install(eval),
            None => eval(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::VortexSegment;
    use tw_core::vec3;

    fn ring_field() -> VortexField {
        let mut field = VortexField::new();
        let n = 12;
        for i in 0..n {
            let a0 = i as f64 / n as f64 * std::f64::consts::TAU;
            let a1 = (i + 1) as f64 / n as f64 * std::f64::consts::TAU;
            field.push_segment(VortexSegment {
                start: vec3(0.0, a0.cos(), a0.sin()),
                end: vec3(0.0, a1.cos(), a1.sin()),
                gamma: 1.0,
                core: 0.05,
            });
        }
        field
    }

    #[test]
    fn empty_field_gives_zero_velocities() {
        let backend = CpuBackend::new();
        let out = backend
            .induced_velocities(&VortexField::new(), &[vec3(1.0, 2.0, 3.0)])
            .unwrap();
        assert_eq!(out, vec![Vec3::zeros()]);
    }

    #[test]
    fn dedicated_pool_matches_global_pool() {
        let field = ring_field();
        let points: Vec<Vec3> = (0..50).map(|i| vec3(i as f64 * 0.05 - 1.0, 0.1, 0.2)).collect();
        let a = CpuBackend::new().induced_velocities(&field, &points).unwrap();
        let b = CpuBackend::with_threads(3)
            .unwrap()
            .induced_velocities(&field, &points)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ring_induces_axial_velocity_at_centre() {
        let field = ring_field();
        let u = CpuBackend::new()
            .induced_velocities(&field, &[Vec3::zeros()])
            .unwrap()[0];
        // counter-clockwise ring about +x pushes fluid along +x at its centre
        assert!(u.x > 0.0);
        assert!(u.y.abs() < 1e-12 && u.z.abs() < 1e-12);
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(CpuBackend::with_threads(0).is_err());
    }
}
