//! Induced velocity evaluation for vortex wakes.
//!
//! Given a [`VortexField`] (straight filaments and regularised particles) and
//! a set of query points, returns the induced velocity at every point. Two
//! interchangeable backends exist:
//! - a rayon fork-join CPU evaluation
//! - an accelerator-kernel evaluation behind the [`AcceleratorDevice`] trait
//!
//! Which backend runs is decided once from a [`DeviceSelection`]; callers only
//! ever talk to [`InductionSolver`].

pub mod accelerator;
pub mod backend;
pub mod device;
pub mod error;
pub mod field;
pub mod kernel;
pub mod probes;
pub mod solver;

pub use accelerator::{AcceleratorBackend, AcceleratorDevice, HostKernelDevice, KernelLaunch};
pub use backend::{CpuBackend, InductionBackend};
pub use device::{DEFAULT_WORK_GROUP_SIZE, DeviceInfo, DeviceSelection, enumerate_devices};
pub use error::{InductionError, InductionResult};
pub use field::{VortexField, VortexParticle, VortexSegment};
pub use probes::{CutPlane, VolumeGrid};
pub use solver::InductionSolver;
