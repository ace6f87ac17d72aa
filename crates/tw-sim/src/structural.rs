//! Structural bridge: where the rotor is and how it responds to loads.

use tw_controls::MAX_BLADES;
use tw_core::Vec3;

use crate::error::{SimError, SimResult};

/// Rigid rotor pose handed to the geometry reconstruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotorKinematics {
    /// Azimuth of blade 1 (rad)
    pub azimuth: f64,
    /// Rotor speed (rad/s)
    pub rotor_speed: f64,
    /// Blade pitch (rad)
    pub pitch: [f64; MAX_BLADES],
    /// Nacelle yaw about +z (rad)
    pub yaw: f64,
    pub hub: Vec3,
}

/// Integrated aerodynamic loads of one rotor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AeroLoads {
    /// Driving torque about the rotor axis (Nm)
    pub aero_torque: f64,
    /// Force along the rotor axis (N)
    pub thrust: f64,
    /// Blade root out-of-plane bending moments (Nm)
    pub out_of_plane_moments: [f64; MAX_BLADES],
}

/// Actuated quantities applied after the controller step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StructuralControls {
    pub pitch: [f64; MAX_BLADES],
    /// `None` keeps the current generator torque
    pub generator_torque: Option<f64>,
    pub yaw_rate: f64,
}

/// Measured drivetrain state for the controller and the results.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DrivetrainSignals {
    /// Generator speed (rad/s)
    pub generator_speed: f64,
    /// Generator torque (Nm, high speed side)
    pub generator_torque: f64,
    /// Electrical power (W)
    pub electrical_power: f64,
}

/// Summary of one structural mode.
#[derive(Clone, Debug, PartialEq)]
pub struct ModalResult {
    pub label: String,
    pub frequency_hz: f64,
    /// Exponential decay rate of the free response (1/s)
    pub decay_rate_per_s: f64,
}

/// What the driver needs from a structural model.
///
/// Dynamic models integrate their own state in [`advance`](Self::advance);
/// kinematic models only follow the clock.
pub trait StructuralModel: Send + std::fmt::Debug {
    fn set_time(&mut self, time: f64);
    fn kinematics(&self) -> RotorKinematics;
    fn apply_loads(&mut self, loads: &AeroLoads);
    fn apply_controls(&mut self, controls: &StructuralControls);
    fn advance(&mut self, dt: f64) -> SimResult<()>;
    fn is_dynamic(&self) -> bool;
    fn modal_results(&self) -> Vec<ModalResult>;
    fn drivetrain(&self) -> DrivetrainSignals;
    /// Back to the initial state of the run.
    fn reset(&mut self);
}

/// Initial pose shared by the structural models.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitialPose {
    pub azimuth: f64,
    pub rotor_speed: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub hub: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pose {
    azimuth: f64,
    rotor_speed: f64,
    pitch: [f64; MAX_BLADES],
    yaw: f64,
}

impl Pose {
    fn initial(p: &InitialPose) -> Self {
        Self {
            azimuth: p.azimuth,
            rotor_speed: p.rotor_speed,
            pitch: [p.pitch; MAX_BLADES],
            yaw: p.yaw,
        }
    }
}

/// Rotor turning at a prescribed constant speed.
#[derive(Clone, Debug)]
pub struct PrescribedRotor {
    initial: InitialPose,
    pose: Pose,
    yaw_rate: f64,
    aero_torque: f64,
}

impl PrescribedRotor {
    pub fn new(initial: InitialPose) -> Self {
        Self {
            initial,
            pose: Pose::initial(&initial),
            yaw_rate: 0.0,
            aero_torque: 0.0,
        }
    }
}

impl StructuralModel for PrescribedRotor {
    fn set_time(&mut self, time: f64) {
        self.pose.azimuth = self.initial.azimuth + self.initial.rotor_speed * time;
    }

    fn kinematics(&self) -> RotorKinematics {
        RotorKinematics {
            azimuth: self.pose.azimuth,
            rotor_speed: self.pose.rotor_speed,
            pitch: self.pose.pitch,
            yaw: self.pose.yaw,
            hub: self.initial.hub,
        }
    }

    fn apply_loads(&mut self, loads: &AeroLoads) {
        self.aero_torque = loads.aero_torque;
    }

    fn apply_controls(&mut self, controls: &StructuralControls) {
        self.pose.pitch = controls.pitch;
        self.yaw_rate = controls.yaw_rate;
    }

    fn advance(&mut self, dt: f64) -> SimResult<()> {
        self.pose.yaw += self.yaw_rate * dt;
        Ok(())
    }

    fn is_dynamic(&self) -> bool {
        false
    }

    fn modal_results(&self) -> Vec<ModalResult> {
        Vec::new()
    }

    fn drivetrain(&self) -> DrivetrainSignals {
        DrivetrainSignals {
            generator_speed: self.pose.rotor_speed,
            generator_torque: self.aero_torque,
            electrical_power: self.aero_torque * self.pose.rotor_speed,
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.initial);
    }
}

/// Rigid rotor on a geared drivetrain with one torsional degree of freedom.
///
/// ```text
/// I * dω/dt = Q_aero - N * Q_gen - c * ω
/// ```
///
/// where:
/// - I is the rotor inertia (kg·m²)
/// - N the gearbox ratio, Q_gen the generator torque on the high speed side
/// - c the viscous loss coefficient of the low speed shaft (N·m·s/rad)
///
/// Without a controller the generator torque is set once, on the first
/// loads, so that the drivetrain starts in equilibrium.
#[derive(Clone, Debug)]
pub struct RigidDrivetrain {
    initial: InitialPose,
    pose: Pose,
    pub inertia: f64,
    pub gearbox_ratio: f64,
    pub loss_coeff: f64,
    pub generator_efficiency: f64,
    aero_torque: f64,
    generator_torque: Option<f64>,
    yaw_rate: f64,
}

impl RigidDrivetrain {
    pub fn new(
        initial: InitialPose,
        inertia: f64,
        gearbox_ratio: f64,
        loss_coeff: f64,
        generator_efficiency: f64,
    ) -> SimResult<Self> {
        if !(inertia > 0.0) {
            return Err(SimError::InvalidArg {
                what: "rotor inertia must be positive",
            });
        }
        if !(gearbox_ratio > 0.0) {
            return Err(SimError::InvalidArg {
                what: "gearbox ratio must be positive",
            });
        }
        if loss_coeff < 0.0 {
            return Err(SimError::InvalidArg {
                what: "loss coefficient cannot be negative",
            });
        }
        if !(generator_efficiency > 0.0 && generator_efficiency <= 1.0) {
            return Err(SimError::InvalidArg {
                what: "generator efficiency must be in (0, 1]",
            });
        }
        Ok(Self {
            initial,
            pose: Pose::initial(&initial),
            inertia,
            gearbox_ratio,
            loss_coeff,
            generator_efficiency,
            aero_torque: 0.0,
            generator_torque: None,
            yaw_rate: 0.0,
        })
    }

    /// Angular acceleration of the rotor (rad/s²).
    pub fn angular_acceleration(&self, omega: f64) -> f64 {
        let q_gen = self.generator_torque.unwrap_or(0.0) * self.gearbox_ratio;
        (self.aero_torque - q_gen - self.loss_coeff * omega) / self.inertia
    }
}

impl StructuralModel for RigidDrivetrain {
    fn set_time(&mut self, _time: f64) {}

    fn kinematics(&self) -> RotorKinematics {
        RotorKinematics {
            azimuth: self.pose.azimuth,
            rotor_speed: self.pose.rotor_speed,
            pitch: self.pose.pitch,
            yaw: self.pose.yaw,
            hub: self.initial.hub,
        }
    }

    fn apply_loads(&mut self, loads: &AeroLoads) {
        self.aero_torque = loads.aero_torque;
        if self.generator_torque.is_none() {
            let balance = (loads.aero_torque - self.loss_coeff * self.pose.rotor_speed) / self.gearbox_ratio;
            self.generator_torque = Some(balance);
        }
    }

    fn apply_controls(&mut self, controls: &StructuralControls) {
        self.pose.pitch = controls.pitch;
        self.yaw_rate = controls.yaw_rate;
        if let Some(q) = controls.generator_torque {
            self.generator_torque = Some(q);
        }
    }

    fn advance(&mut self, dt: f64) -> SimResult<()> {
        if !(dt > 0.0) {
            return Err(SimError::InvalidArg {
                what: "timestep must be positive",
            });
        }
        // Heun on ω, trapezoidal azimuth
        let w0 = self.pose.rotor_speed;
        let a0 = self.angular_acceleration(w0);
        let w_star = w0 + dt * a0;
        let w1 = w0 + 0.5 * dt * (a0 + self.angular_acceleration(w_star));
        if !w1.is_finite() {
            return Err(SimError::NonFinite {
                what: "rotor speed",
                step: 0,
            });
        }
        self.pose.azimuth += 0.5 * dt * (w0 + w1);
        self.pose.rotor_speed = w1;
        self.pose.yaw += self.yaw_rate * dt;
        Ok(())
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn modal_results(&self) -> Vec<ModalResult> {
        vec![ModalResult {
            label: "drivetrain rigid body".to_string(),
            frequency_hz: 0.0,
            decay_rate_per_s: self.loss_coeff / self.inertia,
        }]
    }

    fn drivetrain(&self) -> DrivetrainSignals {
        let q = self.generator_torque.unwrap_or(0.0);
        let speed = self.pose.rotor_speed * self.gearbox_ratio;
        DrivetrainSignals {
            generator_speed: speed,
            generator_torque: q,
            electrical_power: q * speed * self.generator_efficiency,
        }
    }

    fn reset(&mut self) {
        self.pose = Pose::initial(&self.initial);
        self.aero_torque = 0.0;
        self.generator_torque = None;
        self.yaw_rate = 0.0;
    }
}
