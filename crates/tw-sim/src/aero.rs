//! Bound circulation fixed point and integrated rotor loads.
//!
//! Blade panels follow lifting line theory: the circulation of a panel is
//! `gamma = 0.5 * c * |W_perp| * Cl(alpha)` with `W` the relative velocity
//! at its control point. Induction from the attached wake and the bound
//! vortices themselves depends on `gamma`, so the two are iterated with
//! under-relaxation until the largest change drops below the tolerance.
//! Hitting the iteration cap keeps the last iterate.

use tracing::debug;
use tw_core::Vec3;
use tw_core::timing::{Timer, phase_timing};
use tw_controls::MAX_BLADES;
use tw_induction::InductionSolver;
use tw_wake::WakeSystem;

use crate::error::SimResult;
use crate::inflow::Inflow;
use crate::rotor::{PanelKind, RotorDef, RotorGeometry};
use crate::structural::AeroLoads;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CirculationSettings {
    pub max_iterations: usize,
    pub relaxation: f64,
    pub tolerance: f64,
    /// Core radius of the bound vortices (m)
    pub bound_core: f64,
    /// Air density (kg/m^3)
    pub density: f64,
}

/// Wake of the rotor being solved, when the free wake is active.
pub struct WakeCoupling<'a> {
    pub system: &'a mut WakeSystem,
    pub turbine: usize,
}

/// Aerodynamic state of one blade panel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PanelSolution {
    pub gamma: f64,
    /// Angle of attack (rad)
    pub alpha: f64,
    pub cl: f64,
    pub cd: f64,
    /// Relative velocity at the control point
    pub velocity: Vec3,
    pub force: Vec3,
}

/// Integrated loads and coefficients.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RotorLoads {
    pub power: f64,
    pub aero_torque: f64,
    pub thrust: f64,
    pub tsr: f64,
    pub cp: f64,
    pub ct: f64,
    /// Horizontal inflow speed at the hub
    pub hub_wind_speed: f64,
    pub out_of_plane_moments: [f64; MAX_BLADES],
}

impl RotorLoads {
    pub fn as_aero_loads(&self) -> AeroLoads {
        AeroLoads {
            aero_torque: self.aero_torque,
            thrust: self.thrust,
            out_of_plane_moments: self.out_of_plane_moments,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RotorSolution {
    /// `[blade][panel]`
    pub blades: Vec<Vec<PanelSolution>>,
    pub loads: RotorLoads,
    pub iterations: usize,
    pub converged: bool,
}

impl RotorSolution {
    /// Bound circulation per blade and panel.
    pub fn gamma(&self) -> Vec<Vec<f64>> {
        self.blades.iter().map(|b| b.iter().map(|p| p.gamma).collect()).collect()
    }
}

/// Relative flow quantities of one panel.
struct PanelFlow {
    alpha: f64,
    w_perp: Vec3,
    speed: f64,
}

fn panel_flow(geometry: &RotorGeometry, span: &Vec3, theta: f64, w: &Vec3) -> PanelFlow {
    let w_perp = w - span * w.dot(span);
    let e_t = geometry.axis.cross(span);
    let w_ax = w_perp.dot(&geometry.axis);
    let w_tan = -w_perp.dot(&e_t);
    let phi = w_ax.atan2(w_tan);
    PanelFlow {
        alpha: phi - theta,
        w_perp,
        speed: w_perp.norm(),
    }
}

/// Solve the bound circulation of one rotor at `time`.
///
/// Without a wake coupling no induction is evaluated and the polar solution
/// is returned after one pass; this is the steady polar mode.
#[allow(clippy::too_many_arguments)]
pub fn solve_rotor(
    def: &RotorDef,
    geometry: &RotorGeometry,
    inflow: &Inflow,
    time: f64,
    mut wake: Option<WakeCoupling<'_>>,
    solver: &InductionSolver,
    settings: &CirculationSettings,
    initial_gamma: Option<&[Vec<f64>]>,
) -> SimResult<RotorSolution> {
    let timer = Timer::start();
    let points = geometry.control_points();
    let free: Vec<Vec3> = points.iter().map(|p| inflow.velocity_at(p, time)).collect();
    let n_blades = geometry.blade_count();
    let n_panels = geometry.panels_per_blade();

    let mut gamma: Vec<Vec<f64>> = match initial_gamma {
        Some(g) if g.len() == n_blades && g.iter().all(|b| b.len() == n_panels) => g.to_vec(),
        _ => vec![vec![0.0; n_panels]; n_blades],
    };

    let frozen = match &wake {
        Some(w) => solver.induced_velocities(&w.system.frozen_field(w.turbine), &points)?,
        None => vec![Vec3::zeros(); points.len()],
    };

    let mut induced = frozen.clone();
    let mut iterations = 0;
    let mut converged = wake.is_none();
    let max_iterations = if wake.is_some() { settings.max_iterations.max(1) } else { 1 };

    while iterations < max_iterations {
        iterations += 1;
        if let Some(w) = &wake {
            induced = coupled_induction(w, geometry, &gamma, &frozen, &points, solver, settings.bound_core)?;
        }

        let mut delta: f64 = 0.0;
        let mut scale: f64 = 0.0;
        for (b, blade_gamma) in gamma.iter_mut().enumerate() {
            for (j, g) in blade_gamma.iter_mut().enumerate() {
                let i = b * n_panels + j;
                let panel = &geometry.panels[i];
                let w = free[i] + induced[i] - panel.motion;
                let flow = panel_flow(geometry, &panel.span, panel.theta, &w);
                let (cl, _) = def.panel_coefficients(j, flow.alpha);
                let target = 0.5 * panel.chord * flow.speed * cl;
                let change = target - *g;
                delta = delta.max(change.abs());
                *g = if wake.is_some() { *g + settings.relaxation * change } else { target };
                scale = scale.max(g.abs());
            }
        }
        if let Some(w) = wake.as_mut() {
            for (b, g) in gamma.iter().enumerate() {
                w.system.apply_kutta(w.turbine, b, g)?;
            }
        }
        if wake.is_some() && delta <= settings.tolerance * scale.max(f64::MIN_POSITIVE) {
            converged = true;
            break;
        }
    }
    if !converged {
        debug!(iterations, "bound circulation hit the iteration cap");
    }
    // loads use the induction of the final relaxed circulation
    if let Some(w) = &wake {
        induced = coupled_induction(w, geometry, &gamma, &frozen, &points, solver, settings.bound_core)?;
    }

    let solution = integrate_loads(
        def,
        geometry,
        inflow,
        time,
        &free,
        &induced,
        &gamma,
        settings.density,
        iterations,
        converged,
    );
    timer.stop_into(&phase_timing::BOUND_CIRCULATION);
    Ok(solution)
}

/// Frozen plus attached wake and bound induction for `gamma`.
fn coupled_induction(
    wake: &WakeCoupling<'_>,
    geometry: &RotorGeometry,
    gamma: &[Vec<f64>],
    frozen: &[Vec3],
    points: &[Vec3],
    solver: &InductionSolver,
    bound_core: f64,
) -> SimResult<Vec<Vec3>> {
    let mut field = wake.system.attached_field(wake.turbine);
    field.extend_from(&geometry.bound_field(gamma, bound_core));
    let attached = solver.induced_velocities(&field, points)?;
    Ok(frozen.iter().zip(&attached).map(|(a, b)| a + b).collect())
}

#[allow(clippy::too_many_arguments)]
fn integrate_loads(
    def: &RotorDef,
    geometry: &RotorGeometry,
    inflow: &Inflow,
    time: f64,
    free: &[Vec3],
    induced: &[Vec3],
    gamma: &[Vec<f64>],
    density: f64,
    iterations: usize,
    converged: bool,
) -> RotorSolution {
    let n_panels = geometry.panels_per_blade();
    let mut blades = vec![vec![PanelSolution::default(); n_panels]; geometry.blade_count()];
    let mut loads = RotorLoads::default();

    for (i, panel) in geometry.panels.iter().enumerate() {
        let w = free[i] + induced[i] - panel.motion;
        let flow = panel_flow(geometry, &panel.span, panel.theta, &w);
        let w_hat = if flow.speed > 0.0 { flow.w_perp / flow.speed } else { Vec3::zeros() };
        let q = 0.5 * density * flow.speed * flow.speed * panel.chord * panel.width;
        let force = match panel.kind {
            PanelKind::Blade { blade, index } => {
                let (cl, cd) = def.panel_coefficients(index, flow.alpha);
                let force = w_hat.cross(&panel.span) * (q * cl) + w_hat * (q * cd);
                blades[blade][index] = PanelSolution {
                    gamma: gamma[blade][index],
                    alpha: flow.alpha,
                    cl,
                    cd,
                    velocity: w,
                    force,
                };
                let arm = (panel.control_point - geometry.hub).norm();
                loads.out_of_plane_moments[blade] += arm * force.dot(&geometry.axis);
                force
            }
            PanelKind::Strut { .. } => w_hat * (q * panel.drag_coefficient),
        };
        loads.aero_torque += (panel.control_point - geometry.hub).cross(&force).dot(&geometry.axis);
        loads.thrust += force.dot(&geometry.axis);
    }

    let hub_flow = inflow.velocity_at(&geometry.hub, time);
    let v = (hub_flow.x * hub_flow.x + hub_flow.y * hub_flow.y).sqrt();
    loads.hub_wind_speed = v;
    loads.power = loads.aero_torque * geometry.rotor_speed;
    if v > 0.0 {
        let area = def.swept_area();
        loads.tsr = geometry.rotor_speed * def.tip_radius() / v;
        loads.cp = loads.power / (0.5 * density * area * v.powi(3));
        loads.ct = loads.thrust / (0.5 * density * area * v * v);
    }

    RotorSolution {
        blades,
        loads,
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airfoil::Polar;
    use crate::inflow::UniformInflow;
    use crate::rotor::Station;
    use crate::structural::RotorKinematics;
    use tw_core::vec3;
    use tw_wake::WakeConfig;

    fn def() -> RotorDef {
        let polar = Polar::new(
            "thin",
            vec![-0.3, 0.3],
            vec![-0.3 * std::f64::consts::TAU, 0.3 * std::f64::consts::TAU],
            vec![0.01, 0.01],
        )
        .unwrap();
        RotorDef {
            blade_count: 3,
            stations: (0..6)
                .map(|i| {
                    let r = 5.0 + 7.0 * i as f64;
                    Station {
                        radius: r,
                        chord: 3.0 - 0.04 * r,
                        twist: (0.12 - 0.003 * r).max(0.0),
                        polar: 0,
                    }
                })
                .collect(),
            struts: Vec::new(),
            polars: vec![polar],
        }
    }

    fn geometry() -> RotorGeometry {
        RotorGeometry::build(
            &def(),
            &RotorKinematics {
                azimuth: 0.0,
                rotor_speed: 1.6,
                pitch: [0.0; MAX_BLADES],
                yaw: 0.0,
                hub: vec3(0.0, 0.0, 90.0),
            },
        )
        .unwrap()
    }

    fn inflow() -> Inflow {
        Inflow::Uniform(UniformInflow {
            speed: 8.0,
            direction: 0.0,
            shear_exponent: 0.0,
            reference_height: 90.0,
        })
    }

    fn settings() -> CirculationSettings {
        CirculationSettings {
            max_iterations: 200,
            relaxation: 0.3,
            tolerance: 1e-6,
            bound_core: 0.05,
            density: 1.225,
        }
    }

    #[test]
    fn polar_mode_produces_driving_torque_and_thrust() {
        let s = solve_rotor(&def(), &geometry(), &inflow(), 0.0, None, &InductionSolver::cpu(), &settings(), None)
            .unwrap();
        assert_eq!(s.iterations, 1);
        assert!(s.converged);
        assert!(s.loads.aero_torque > 0.0, "torque {}", s.loads.aero_torque);
        assert!(s.loads.thrust > 0.0);
        assert!((s.loads.tsr - 1.6 * 40.0 / 8.0).abs() < 1e-12);
        assert!(s.blades[0].iter().all(|p| p.gamma > 0.0));
    }

    #[test]
    fn coupled_iteration_converges() {
        let g = geometry();
        let mut wake = WakeSystem::new(WakeConfig::default(), &[3], &[g.hub]).unwrap();
        let solver = InductionSolver::cpu();
        let polar = solve_rotor(&def(), &g, &inflow(), 0.0, None, &solver, &settings(), None).unwrap();
        let coupled = solve_rotor(
            &def(),
            &g,
            &inflow(),
            0.0,
            Some(WakeCoupling {
                system: &mut wake,
                turbine: 0,
            }),
            &solver,
            &settings(),
            Some(&polar.gamma()),
        )
        .unwrap();
        assert!(coupled.converged, "{} iterations", coupled.iterations);
        assert!(coupled.iterations > 1);
        assert!(coupled.loads.power.is_finite());
    }

    #[test]
    fn iteration_cap_keeps_best_effort() {
        let g = geometry();
        let mut wake = WakeSystem::new(WakeConfig::default(), &[3], &[g.hub]).unwrap();
        let mut capped = settings();
        capped.max_iterations = 2;
        capped.tolerance = 0.0;
        let s = solve_rotor(
            &def(),
            &g,
            &inflow(),
            0.0,
            Some(WakeCoupling {
                system: &mut wake,
                turbine: 0,
            }),
            &InductionSolver::cpu(),
            &capped,
            None,
        )
        .unwrap();
        assert_eq!(s.iterations, 2);
        assert!(!s.converged);
        assert!(s.blades.iter().flatten().all(|p| p.gamma.is_finite()));
    }

    #[test]
    fn capped_loads_use_final_circulation() {
        let g = geometry();
        let mut wake = WakeSystem::new(WakeConfig::default(), &[3], &[g.hub]).unwrap();
        let solver = InductionSolver::cpu();
        let mut capped = settings();
        capped.max_iterations = 2;
        capped.tolerance = 0.0;
        let s = solve_rotor(
            &def(),
            &g,
            &inflow(),
            0.0,
            Some(WakeCoupling {
                system: &mut wake,
                turbine: 0,
            }),
            &solver,
            &capped,
            None,
        )
        .unwrap();

        let points = g.control_points();
        let mut field = wake.frozen_field(0);
        field.extend_from(&wake.attached_field(0));
        field.extend_from(&g.bound_field(&s.gamma(), capped.bound_core));
        let induced = solver.induced_velocities(&field, &points).unwrap();
        let n_panels = g.panels_per_blade();
        for (b, blade) in s.blades.iter().enumerate() {
            for (j, panel) in blade.iter().enumerate() {
                let i = b * n_panels + j;
                let expected = inflow().velocity_at(&points[i], 0.0) + induced[i] - g.panels[i].motion;
                assert!((panel.velocity - expected).norm() < 1e-9, "blade {b} panel {j}");
            }
        }
    }
}
