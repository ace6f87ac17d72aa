//! 3D vector type shared by geometry, wake and induction code.

use nalgebra::Vector3;

use crate::error::TwError;

pub type Vec3 = Vector3<f64>;

#[inline]
pub fn vec3(x: f64, y: f64, z: f64) -> Vec3 {
    Vec3::new(x, y, z)
}

#[inline]
pub fn is_finite_vec(v: &Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

pub fn ensure_finite_vec(v: &Vec3, what: &'static str) -> Result<Vec3, TwError> {
    for c in v.iter() {
        if !c.is_finite() {
            return Err(TwError::NonFinite { what, value: *c });
        }
    }
    Ok(*v)
}

/// Plain array form used at storage and accelerator boundaries.
#[inline]
pub fn to_array_f32(v: &Vec3) -> [f32; 3] {
    [v.x as f32, v.y as f32, v.z as f32]
}
