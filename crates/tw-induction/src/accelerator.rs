//! Accelerator-kernel backend.
//!
//! The kernel contract is fixed: query points, segments and particles are
//! uploaded as float4 buffers expressed relative to a host-side origin, one
//! work item computes one query point, and each work group walks the element
//! arrays in tiles of `work_group_size` staged through local memory. The
//! device returns one float4 per query point (`w` unused).

use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tracing::debug;
use tw_core::{Vec3, vec3};

use crate::backend::InductionBackend;
use crate::device::{DeviceInfo, enumerate_devices};
use crate::error::{InductionError, InductionResult};
use crate::field::VortexField;
use crate::kernel::{particle_velocity_f32, segment_velocity_f32};

/// Packed buffers for one blocking kernel launch.
#[derive(Clone, Debug, Default)]
pub struct KernelLaunch {
    /// `(x, y, z, 0)`
    pub points: Vec<[f32; 4]>,
    /// Pairs `(ax, ay, az, gamma)`, `(bx, by, bz, core)`
    pub segments: Vec<[[f32; 4]; 2]>,
    /// Pairs `(x, y, z, core)`, `(alpha_x, alpha_y, alpha_z, 0)`
    pub particles: Vec<[[f32; 4]; 2]>,
    pub work_group_size: usize,
}

impl KernelLaunch {
    /// Pack a field and its query points relative to `origin`.
    pub fn pack(field: &VortexField, points: &[Vec3], origin: &Vec3, work_group_size: usize) -> Self {
        let rel = |v: &Vec3| -> [f32; 3] {
            let d = v - origin;
            [d.x as f32, d.y as f32, d.z as f32]
        };
        let points = points
            .iter()
            .map(|p| {
                let [x, y, z] = rel(p);
                [x, y, z, 0.0]
            })
            .collect();
        let segments = field
            .segments
            .iter()
            .map(|s| {
                let [ax, ay, az] = rel(&s.start);
                let [bx, by, bz] = rel(&s.end);
                [[ax, ay, az, s.gamma as f32], [bx, by, bz, s.core as f32]]
            })
            .collect();
        let particles = field
            .particles
            .iter()
            .map(|p| {
                let [x, y, z] = rel(&p.position);
                [
                    [x, y, z, p.core as f32],
                    [p.alpha.x as f32, p.alpha.y as f32, p.alpha.z as f32, 0.0],
                ]
            })
            .collect();
        Self {
            points,
            segments,
            particles,
            work_group_size,
        }
    }
}

/// A device able to execute the induction kernel.
pub trait AcceleratorDevice: Send + Sync {
    fn info(&self) -> &DeviceInfo;

    /// Execute one launch to completion. Must return exactly one float4 per
    /// query point, in query order.
    fn launch(&self, launch: &KernelLaunch) -> InductionResult<Vec<[f32; 4]>>;
}

/// Executes the kernel's work-group contract on the host in single precision.
///
/// Always enumerated as device 1, so accelerator code paths can be exercised
/// on any machine.
pub struct HostKernelDevice {
    info: DeviceInfo,
}

impl HostKernelDevice {
    pub fn new() -> Self {
        let info = enumerate_devices()
            .into_iter()
            .find(|d| d.index == 1)
            .unwrap_or(DeviceInfo {
                index: 1,
                name: "host kernel emulation".to_string(),
                compute_units: 1,
                max_work_group_size: 1024,
            });
        Self { info }
    }

    fn run_group(launch: &KernelLaunch, group: &[[f32; 4]], out: &mut [[f32; 4]]) {
        let tile = launch.work_group_size.max(1);
        let mut acc = vec![[0.0_f32; 3]; group.len()];

        // segments, staged tile by tile as the device does through local memory
        for chunk in launch.segments.chunks(tile) {
            for (p, u) in group.iter().zip(acc.iter_mut()) {
                for [a, b] in chunk {
                    let du = segment_velocity_f32(*p, *a, *b);
                    u[0] += du[0];
                    u[1] += du[1];
                    u[2] += du[2];
                }
            }
        }
        for chunk in launch.particles.chunks(tile) {
            for (p, u) in group.iter().zip(acc.iter_mut()) {
                for [pos, alpha] in chunk {
                    let du = particle_velocity_f32(*p, *pos, *alpha);
                    u[0] += du[0];
                    u[1] += du[1];
                    u[2] += du[2];
                }
            }
        }
        for (o, u) in out.iter_mut().zip(acc) {
            *o = [u[0], u[1], u[2], 0.0];
        }
    }
}

impl Default for HostKernelDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceleratorDevice for HostKernelDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn launch(&self, launch: &KernelLaunch) -> InductionResult<Vec<[f32; 4]>> {
        if launch.work_group_size == 0 {
            return Err(InductionError::InvalidArg {
                what: "work group size must be positive",
            });
        }
        if launch.work_group_size > self.info.max_work_group_size {
            return Err(InductionError::Device {
                message: format!(
                    "work group size {} exceeds device maximum {}",
                    launch.work_group_size, self.info.max_work_group_size
                ),
            });
        }
        let mut out = vec![[0.0_f32; 4]; launch.points.len()];
        out.par_chunks_mut(launch.work_group_size)
            .zip(launch.points.par_chunks(launch.work_group_size))
            .for_each(|(o, group)| Self::run_group(launch, group, o));
        Ok(out)
    }
}

/// Induction backend dispatching to an [`AcceleratorDevice`].
///
/// Launches are serialised: a second caller blocks until the first launch
/// has returned.
pub struct AcceleratorBackend {
    device: Arc<dyn AcceleratorDevice>,
    work_group_size: usize,
    launch_lock: Mutex<()>,
    name: String,
}

impl AcceleratorBackend {
    pub fn new(device: Arc<dyn AcceleratorDevice>, work_group_size: usize) -> InductionResult<Self> {
        if work_group_size == 0 {
            return Err(InductionError::InvalidArg {
                what: "work group size must be positive",
            });
        }
        let name = format!("accelerator:{}", device.info().name);
        Ok(Self {
            device,
            work_group_size,
            launch_lock: Mutex::new(()),
            name,
        })
    }

    pub fn work_group_size(&self) -> usize {
        self.work_group_size
    }

    pub fn device_info(&self) -> &DeviceInfo {
        self.device.info()
    }
}

impl InductionBackend for AcceleratorBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_accelerated(&self) -> bool {
        true
    }

    fn induced_velocities(
        &self,
        field: &VortexField,
        points: &[Vec3],
    ) -> InductionResult<Vec<Vec3>> {
        let Some(origin) = field.centroid() else {
            return Ok(vec![Vec3::zeros(); points.len()]);
        };
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let launch = KernelLaunch::pack(field, points, &origin, self.work_group_size);

        let raw = {
            let _guard = self.launch_lock.lock().map_err(|_| InductionError::Device {
                message: "launch lock poisoned".to_string(),
            })?;
            debug!(
                points = launch.points.len(),
                segments = launch.segments.len(),
                particles = launch.particles.len(),
                "kernel launch"
            );
            self.device.launch(&launch)?
        };

        if raw.len() != points.len() {
            return Err(InductionError::ResultLength {
                expected: points.len(),
                got: raw.len(),
            });
        }
        Ok(raw
            .into_iter()
            .map(|[x, y, z, _]| {
                let u = vec3(x as f64, y as f64, z as f64);
                if tw_core::is_finite_vec(&u) { u } else { Vec3::zeros() }
            })
            .collect())
    }
}
