//! Backend-agnostic entry point.

use std::sync::Arc;

use tracing::info;
use tw_core::Vec3;
use tw_core::timing::{Timer, phase_timing};

use crate::accelerator::{AcceleratorBackend, HostKernelDevice};
use crate::backend::{CpuBackend, InductionBackend};
use crate::device::{DeviceSelection, enumerate_devices};
use crate::error::{InductionError, InductionResult};
use crate::field::VortexField;
use crate::probes::CutPlane;

/// Evaluates induced velocities through whichever backend the run selected.
pub struct InductionSolver {
    backend: Box<dyn InductionBackend>,
    selection: DeviceSelection,
}

impl InductionSolver {
    /// Build the backend for a device selection.
    pub fn from_selection(selection: &DeviceSelection) -> InductionResult<Self> {
        let backend: Box<dyn InductionBackend> = match *selection {
            DeviceSelection::Cpu => Box::new(CpuBackend::new()),
            DeviceSelection::Accelerator {
                index,
                work_group_size,
            } => {
                let devices = enumerate_devices();
                if index >= devices.len() {
                    return Err(InductionError::DeviceNotFound {
                        index,
                        available: devices.len().saturating_sub(1),
                    });
                }
                Box::new(AcceleratorBackend::new(
                    Arc::new(HostKernelDevice::new()),
                    work_group_size,
                )?)
            }
        };
        info!(backend = backend.name(), selection = %selection, "induction backend ready");
        Ok(Self {
            backend,
            selection: *selection,
        })
    }

    /// Wrap an explicit backend, e.g. a custom accelerator device.
    pub fn with_backend(backend: Box<dyn InductionBackend>, selection: DeviceSelection) -> Self {
        Self { backend, selection }
    }

    pub fn cpu() -> Self {
        Self {
            backend: Box::new(CpuBackend::new()),
            selection: DeviceSelection::Cpu,
        }
    }

    pub fn selection(&self) -> DeviceSelection {
        self.selection
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn induced_velocities(
        &self,
        field: &VortexField,
        points: &[Vec3],
    ) -> InductionResult<Vec<Vec3>> {
        let timer = Timer::start();
        let out = self.backend.induced_velocities(field, points)?;
        timer.stop_into(&phase_timing::INDUCTION);
        if out.len() != points.len() {
            return Err(InductionError::ResultLength {
                expected: points.len(),
                got: out.len(),
            });
        }
        Ok(out)
    }

    /// Induced velocities at every point of a cut plane.
    pub fn cut_plane(&self, field: &VortexField, plane: &CutPlane) -> InductionResult<Vec<Vec3>> {
        let points = plane.points()?;
        self.induced_velocities(field, &points)
    }
}

impl std::fmt::Debug for InductionSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InductionSolver")
            .field("backend", &self.backend.name())
            .field("selection", &self.selection)
            .finish()
    }
}
