//! Time-marching simulation of wind turbines in a free vortex wake.
//!
//! A [`SimConfig`] is resolved from a validated project, then a
//! [`SimulationDriver`] owns the clock, the inflow, every turbine's structure,
//! controller and bound circulation, the shared [`tw_wake::WakeSystem`] and
//! the replay store, and advances them one timestep at a time.

pub mod aero;
pub mod airfoil;
pub mod build;
pub mod clock;
pub mod context;
pub mod driver;
pub mod error;
pub mod ice;
pub mod inflow;
pub mod observer;
pub mod record;
pub mod rotor;
pub mod structural;

pub use aero::{CirculationSettings, PanelSolution, RotorLoads, RotorSolution, WakeCoupling, solve_rotor};
pub use airfoil::Polar;
pub use build::{SimConfig, TurbineSetup};
pub use clock::SimulationClock;
pub use context::{DebugToggles, SimulationContext, StopHandle};
pub use driver::{DriverState, RunOutcome, SimulationDriver};
pub use error::{FailureCategory, RunFailure, SimError, SimResult};
pub use ice::{IceThrow, Landing};
pub use inflow::{HubHeightSeries, Inflow, UniformInflow, WindField};
pub use observer::{
    Delivery, GeometrySnapshot, NullObserver, Observer, ObserverEvent, ObserverPublisher, ObserverReceiver,
    observer_channel,
};
pub use record::channel_names;
pub use rotor::{RotorDef, RotorGeometry};
pub use structural::{
    AeroLoads, DrivetrainSignals, InitialPose, ModalResult, PrescribedRotor, RigidDrivetrain, RotorKinematics,
    StructuralControls, StructuralModel,
};
