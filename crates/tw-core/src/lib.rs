//! tw-core: stable foundation for turbowake.
//!
//! Contains:
//! - units (uom SI types + constructors)
//! - numeric (table interpolation)
//! - ids (stable compact IDs for wake nodes and lines)
//! - vec3 (3D vector alias + helpers)
//! - timing (opt-in phase timers)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;
pub mod units;
pub mod vec3;

// Re-exports: nice ergonomics for downstream crates
pub use error::{TwError, TwResult};
pub use ids::*;
pub use numeric::*;
pub use vec3::*;
