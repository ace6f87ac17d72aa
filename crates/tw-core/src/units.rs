// tw-core/src/units.rs

use uom::si::f64::{Angle as UomAngle, AngularVelocity as UomAngularVelocity};

pub type Angle = UomAngle;
pub type AngularVelocity = UomAngularVelocity;

#[inline]
pub fn deg(v: f64) -> Angle {
    use uom::si::angle::degree;
    Angle::new::<degree>(v)
}

#[inline]
pub fn rad(v: f64) -> Angle {
    use uom::si::angle::radian;
    Angle::new::<radian>(v)
}

#[inline]
pub fn rpm(v: f64) -> AngularVelocity {
    use uom::si::angular_velocity::revolution_per_minute;
    AngularVelocity::new::<revolution_per_minute>(v)
}

#[inline]
pub fn rad_per_s(v: f64) -> AngularVelocity {
    use uom::si::angular_velocity::radian_per_second;
    AngularVelocity::new::<radian_per_second>(v)
}

/// Degrees to radians through the unit system.
#[inline]
pub fn deg_to_rad(v: f64) -> f64 {
    use uom::si::angle::radian;
    deg(v).get::<radian>()
}

#[inline]
pub fn rad_to_deg(v: f64) -> f64 {
    use uom::si::angle::degree;
    rad(v).get::<degree>()
}

#[inline]
pub fn rpm_to_rad_s(v: f64) -> f64 {
    use uom::si::angular_velocity::radian_per_second;
    rpm(v).get::<radian_per_second>()
}

#[inline]
pub fn rad_s_to_rpm(v: f64) -> f64 {
    use uom::si::angular_velocity::revolution_per_minute;
    rad_per_s(v).get::<revolution_per_minute>()
}

pub mod constants {
    pub const G0_MPS2: f64 = 9.806_65;

    /// Sea-level standard air density (kg/m^3).
    pub const AIR_DENSITY: f64 = 1.225;

    /// Kinematic viscosity of air at 15 C (m^2/s).
    pub const AIR_KINEMATIC_VISCOSITY: f64 = 1.647e-5;
}
