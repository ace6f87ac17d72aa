//! Lagrangian free-vortex wake.
//!
//! A turbine's wake is a lattice of vortex filaments between nodes shed from
//! the blade trailing edges, plus free vortex particles that old filaments are
//! converted into. [`WakeSystem`] runs the per-timestep lifecycle for all
//! turbines in lockstep:
//!
//! 1. truncate by age and far-field distance
//! 2. reduce insignificant elements
//! 3. clear per-step scratch
//! 4. store the predictor base state
//! 5. gather the global vortex field
//! 6. predictor
//! 7. corrector (PC / PC2B)
//! 8. core growth
//! 9. shed a new trailing edge row
//! 10. Kutta condition
//! 11. filament to particle conversion
//! 12. periodic remeshing

pub mod config;
pub mod core_model;
pub mod elements;
pub mod error;
pub mod integrate;
pub mod remesh;
pub mod state;
pub mod system;

pub use config::{CoreModel, IntegrationScheme, RemeshConfig, WakeConfig};
pub use elements::{LineKind, NodeOrigin, WakeLine, WakeNode, WakeParticle};
pub use error::{WakeError, WakeResult};
pub use remesh::Remesher;
pub use state::{FieldPart, WakeState};
pub use system::{FreeStream, SheddingInput, WakeStepStats, WakeSystem};
