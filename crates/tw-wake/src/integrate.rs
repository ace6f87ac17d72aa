//! Explicit update formulas for the wake integration schemes.

use tw_core::Vec3;

use crate::config::IntegrationScheme;

/// Predictor step from `x0` with rate `u0`.
///
/// Euler and PC take an Euler step; PC2B takes an Adams-Bashforth 2 step
/// when the previous rate is known.
pub fn predict(scheme: IntegrationScheme, x0: &Vec3, u0: &Vec3, u_prev: Option<&Vec3>, dt: f64) -> Vec3 {
    match (scheme, u_prev) {
        (IntegrationScheme::PredictorCorrector2B, Some(u_prev)) => x0 + (3.0 * u0 - u_prev) * (0.5 * dt),
        _ => x0 + u0 * dt,
    }
}

/// Trapezoidal corrector combining the initial rate and the rate at the
/// predicted state.
pub fn correct(x0: &Vec3, u0: &Vec3, u_star: &Vec3, dt: f64) -> Vec3 {
    x0 + (u0 + u_star) * (0.5 * dt)
}

/// Effective rate over the step, stored as the next step's previous rate.
pub fn effective_rate(scheme: IntegrationScheme, u0: &Vec3, u_star: Option<&Vec3>) -> Vec3 {
    match (scheme.has_corrector(), u_star) {
        (true, Some(u_star)) => 0.5 * (u0 + u_star),
        _ => *u0,
    }
}

/// Rate of change of a particle strength from vortex stretching, by central
/// differences of the velocity along the strength direction:
/// `(alpha . grad) u ~ |alpha| (u(x + eps a) - u(x - eps a)) / (2 eps)`.
pub fn stretching_rate(alpha: &Vec3, u_plus: &Vec3, u_minus: &Vec3, eps: f64) -> Vec3 {
    let strength = alpha.norm();
    if strength == 0.0 || eps <= 0.0 {
        return Vec3::zeros();
    }
    (u_plus - u_minus) * (strength / (2.0 * eps))
}

/// Probe offset for the stretching differences of one particle.
pub fn stretching_offset(alpha: &Vec3, core: f64) -> (Vec3, f64) {
    let eps = (0.1 * core).max(1e-4);
    match alpha.try_normalize(1e-300) {
        Some(dir) => (dir * eps, eps),
        None => (Vec3::zeros(), 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_core::vec3;

    #[test]
    fn euler_and_pc_predict_alike() {
        let x0 = vec3(1.0, 0.0, 0.0);
        let u0 = vec3(2.0, 0.0, 0.0);
        let prev = vec3(100.0, 0.0, 0.0);
        let euler = predict(IntegrationScheme::Euler, &x0, &u0, Some(&prev), 0.1);
        let pc = predict(IntegrationScheme::PredictorCorrector, &x0, &u0, Some(&prev), 0.1);
        assert_eq!(euler, pc);
        assert!((euler.x - 1.2).abs() < 1e-12);
    }

    #[test]
    fn ab2_uses_previous_rate_when_available() {
        let x0 = Vec3::zeros();
        let u0 = vec3(1.0, 0.0, 0.0);
        let x_first = predict(IntegrationScheme::PredictorCorrector2B, &x0, &u0, None, 1.0);
        assert_eq!(x_first, u0);
        let x_ab2 = predict(IntegrationScheme::PredictorCorrector2B, &x0, &u0, Some(&vec3(0.0, 0.0, 0.0)), 1.0);
        assert!((x_ab2.x - 1.5).abs() < 1e-12);
    }

    #[test]
    fn corrector_is_exact_for_linear_rate() {
        // u(x) = c (constant): trapezoid reproduces x0 + c dt
        let x0 = vec3(0.0, 1.0, 0.0);
        let c = vec3(0.5, -0.25, 2.0);
        let x1 = correct(&x0, &c, &c, 0.2);
        assert!((x1 - (x0 + c * 0.2)).norm() < 1e-15);
    }

    #[test]
    fn stretching_of_uniform_flow_is_zero() {
        let u = vec3(8.0, 0.0, 0.0);
        let (_, eps) = stretching_offset(&vec3(0.0, 1.0, 0.0), 0.5);
        assert_eq!(stretching_rate(&vec3(0.0, 1.0, 0.0), &u, &u, eps), Vec3::zeros());
    }
}
