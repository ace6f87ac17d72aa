//! Biot-Savart kernels.
//!
//! Filaments use the straight-segment law with a core cut-off in the
//! denominator; particles use the Winckelmans-Leonard high-order algebraic
//! kernel. A contribution that is not finite (coincident points, zero-length
//! segments, zero cores) counts as zero.

use std::f64::consts::PI;

use tw_core::{Vec3, is_finite_vec};

use crate::field::{VortexField, VortexParticle, VortexSegment};

/// Distances below this are treated as coincident.
pub const COINCIDENT_EPS: f64 = 1e-10;

const INV_FOUR_PI: f64 = 1.0 / (4.0 * PI);

/// Velocity induced at `p` by one straight filament.
pub fn segment_velocity(p: &Vec3, seg: &VortexSegment) -> Vec3 {
    let r1 = p - seg.start;
    let r2 = p - seg.end;
    let r0 = seg.end - seg.start;

    let l1 = r1.norm();
    let l2 = r2.norm();
    let r0_sq = r0.norm_squared();
    if l1 < COINCIDENT_EPS || l2 < COINCIDENT_EPS || r0_sq < COINCIDENT_EPS * COINCIDENT_EPS {
        return Vec3::zeros();
    }

    let cross = r1.cross(&r2);
    let denom = cross.norm_squared() + seg.core * seg.core * r0_sq;
    if denom <= 0.0 {
        return Vec3::zeros();
    }

    let k = seg.gamma * INV_FOUR_PI * r0.dot(&(r1 / l1 - r2 / l2)) / denom;
    let u = cross * k;
    if is_finite_vec(&u) { u } else { Vec3::zeros() }
}

/// Velocity induced at `p` by one regularised particle.
pub fn particle_velocity(p: &Vec3, part: &VortexParticle) -> Vec3 {
    let r = p - part.position;
    let r_sq = r.norm_squared();
    let s_sq = part.core * part.core;
    let base = r_sq + s_sq;
    if base < COINCIDENT_EPS * COINCIDENT_EPS {
        return Vec3::zeros();
    }
    let denom = base * base * base.sqrt();
    let k = INV_FOUR_PI * (r_sq + 2.5 * s_sq) / denom;
    let u = part.alpha.cross(&r) * k;
    if is_finite_vec(&u) { u } else { Vec3::zeros() }
}

/// Sum over the whole field. The summation order is fixed (segments, then
/// particles, in array order) so a point's result is reproducible bit for bit.
pub fn field_velocity(p: &Vec3, field: &VortexField) -> Vec3 {
    let mut u = Vec3::zeros();
    for seg in &field.segments {
        u += segment_velocity(p, seg);
    }
    for part in &field.particles {
        u += particle_velocity(p, part);
    }
    u
}

// Single precision variants used by the accelerator kernel contract.

const INV_FOUR_PI_F32: f32 = 1.0 / (4.0 * std::f32::consts::PI);
const COINCIDENT_EPS_F32: f32 = 1e-7;

#[inline]
fn sub3(a: [f32; 4], b: [f32; 4]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Filament kernel on packed float4 data: `a = (ax, ay, az, gamma)`,
/// `b = (bx, by, bz, core)`.
pub fn segment_velocity_f32(p: [f32; 4], a: [f32; 4], b: [f32; 4]) -> [f32; 3] {
    let r1 = sub3(p, a);
    let r2 = sub3(p, b);
    let r0 = sub3(b, a);
    let l1 = dot3(r1, r1).sqrt();
    let l2 = dot3(r2, r2).sqrt();
    let r0_sq = dot3(r0, r0);
    if l1 < COINCIDENT_EPS_F32 || l2 < COINCIDENT_EPS_F32 || r0_sq < COINCIDENT_EPS_F32 * COINCIDENT_EPS_F32
    {
        return [0.0; 3];
    }
    let c = cross3(r1, r2);
    let core = b[3];
    let denom = dot3(c, c) + core * core * r0_sq;
    if denom <= 0.0 {
        return [0.0; 3];
    }
    let diff = [r1[0] / l1 - r2[0] / l2, r1[1] / l1 - r2[1] / l2, r1[2] / l1 - r2[2] / l2];
    let k = a[3] * INV_FOUR_PI_F32 * dot3(r0, diff) / denom;
    let u = [c[0] * k, c[1] * k, c[2] * k];
    if u.iter().all(|v| v.is_finite()) { u } else { [0.0; 3] }
}

/// Particle kernel on packed float4 data: `pos = (x, y, z, core)`,
/// `alpha = (ax, ay, az, _)`.
pub fn particle_velocity_f32(p: [f32; 4], pos: [f32; 4], alpha: [f32; 4]) -> [f32; 3] {
    let r = sub3(p, pos);
    let r_sq = dot3(r, r);
    let s_sq = pos[3] * pos[3];
    let base = r_sq + s_sq;
    if base < COINCIDENT_EPS_F32 * COINCIDENT_EPS_F32 {
        return [0.0; 3];
    }
    let denom = base * base * base.sqrt();
    let k = INV_FOUR_PI_F32 * (r_sq + 2.5 * s_sq) / denom;
    let c = cross3([alpha[0], alpha[1], alpha[2]], r);
    let u = [c[0] * k, c[1] * k, c[2] * k];
    if u.iter().all(|v| v.is_finite()) { u } else { [0.0; 3] }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use tw_core::vec3;

    proptest! {
        #[test]
        fn segment_velocity_is_always_finite(
            ax in -5.0_f64..5.0, ay in -5.0_f64..5.0, az in -5.0_f64..5.0,
            bx in -5.0_f64..5.0, by in -5.0_f64..5.0, bz in -5.0_f64..5.0,
            px in -5.0_f64..5.0, py in -5.0_f64..5.0, pz in -5.0_f64..5.0,
            core in 0.0_f64..0.5,
        ) {
            let seg = VortexSegment { start: vec3(ax, ay, az), end: vec3(bx, by, bz), gamma: 1.0, core };
            let u = segment_velocity(&vec3(px, py, pz), &seg);
            prop_assert!(is_finite_vec(&u));
            // degenerate query at an endpoint is defined as zero
            let at_end = segment_velocity(&vec3(ax, ay, az), &seg);
            prop_assert_eq!(at_end, Vec3::zeros());
        }

        #[test]
        fn reversing_a_segment_flips_velocity(
            px in -3.0_f64..3.0, py in -3.0_f64..3.0, pz in 0.5_f64..3.0,
        ) {
            let fwd = VortexSegment { start: vec3(-1.0, 0.0, 0.0), end: vec3(1.0, 0.0, 0.0), gamma: 1.5, core: 0.1 };
            let rev = VortexSegment { start: fwd.end, end: fwd.start, ..fwd };
            let p = vec3(px, py, pz);
            let u = segment_velocity(&p, &fwd) + segment_velocity(&p, &rev);
            prop_assert!(u.norm() < 1e-12);
        }
    }
}
