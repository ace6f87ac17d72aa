//! Lagrangian wake elements.

use tw_core::{LineId, NodeId, Vec3};

/// Where a node was shed: wake row (timestep), blade and span station.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeOrigin {
    pub row: usize,
    pub blade: usize,
    pub station: usize,
}

/// A point shed from a trailing edge.
///
/// `id` and `origin` never change after creation; the position is convected
/// by the integrator.
#[derive(Clone, Debug, PartialEq)]
pub struct WakeNode {
    pub id: NodeId,
    pub origin: NodeOrigin,
    pub position: Vec3,
    /// Position at the start of the current step (predictor base)
    pub initial_position: Vec3,
    pub velocity: Vec3,
    /// Convection velocity of the previous step, if any
    pub previous_velocity: Option<Vec3>,
}

impl WakeNode {
    pub fn new(id: NodeId, origin: NodeOrigin, position: Vec3) -> Self {
        Self {
            id,
            origin,
            position,
            initial_position: position,
            velocity: Vec3::zeros(),
            previous_velocity: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Runs downstream from a trailing edge station
    Trailing,
    /// Runs spanwise, root to tip
    Shed,
}

/// Directed vortex filament between two wake nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct WakeLine {
    pub id: LineId,
    pub start: NodeId,
    pub end: NodeId,
    pub gamma: f64,
    pub core_radius: f64,
    pub initial_core_radius: f64,
    /// Length when shed, for the strain correction
    pub initial_length: f64,
    pub age_s: f64,
    pub kind: LineKind,
    pub blade: usize,
    /// Still tied to the bound circulation through the Kutta condition
    pub attached: bool,
}

/// Regularised vortex particle.
#[derive(Clone, Debug, PartialEq)]
pub struct WakeParticle {
    pub position: Vec3,
    pub alpha: Vec3,
    pub core_size: f64,
    pub initial_core_size: f64,
    pub volume: f64,
    pub age_s: f64,
    /// Created this step; excluded from remeshing until the flag clears
    pub is_new: bool,
    pub initial_position: Vec3,
    pub initial_alpha: Vec3,
    pub velocity: Vec3,
    pub previous_velocity: Option<Vec3>,
    pub alpha_rate: Vec3,
}

impl WakeParticle {
    pub fn new(position: Vec3, alpha: Vec3, core_size: f64, volume: f64, age_s: f64) -> Self {
        Self {
            position,
            alpha,
            core_size,
            initial_core_size: core_size,
            volume,
            age_s,
            is_new: true,
            initial_position: position,
            initial_alpha: alpha,
            velocity: Vec3::zeros(),
            previous_velocity: None,
            alpha_rate: Vec3::zeros(),
        }
    }

    pub fn strength(&self) -> f64 {
        self.alpha.norm()
    }
}
