//! External controller coupling for turbowake.
//!
//! Each turbine drives at most one external control law through
//! [`ControllerBridge`]. Three ABI families are supported, each behind the
//! [`ControllerPlugin`] trait:
//! - Bladed-style swap array (`DISCON`)
//! - extended Bladed-style swap array with a smart-actuator block
//! - DTU-style input/output arrays
//!
//! The simulation only ever sees [`TurbineInputs`] and [`ControlCommands`];
//! fixed-index buffers exist only inside the ABI serializers.

pub mod actuator;
pub mod bladed;
pub mod bridge;
pub mod dtu;
pub mod error;
pub mod library;
pub mod params;
pub mod plugin;
pub mod signals;

pub use actuator::PitchActuator;
pub use bladed::{BladedLayout, CallStatus, SWAP_LEN};
pub use bridge::{BridgeState, ControllerBridge};
pub use error::{ControlError, ControlResult};
pub use library::{LibraryDtuEntry, LibrarySwapEntry};
pub use params::{ControllerConfig, load_plugin};
pub use plugin::{
    BladedController, ControllerKind, ControllerPlugin, DtuController, DtuEntryPoints,
    SwapEntryPoint,
};
pub use signals::{ControlCommands, MAX_BLADES, TurbineInputs};
