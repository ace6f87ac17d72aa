//! Wakes of all turbines, advanced in lockstep.

use tracing::debug;
use tw_core::timing::{Timer, phase_timing};
use tw_core::{Vec3, ensure_finite_vec, is_finite_vec};
use tw_induction::{InductionSolver, VortexField};

use crate::config::WakeConfig;
use crate::core_model::update_cores;
use crate::error::{WakeError, WakeResult};
use crate::integrate::{correct, effective_rate, predict, stretching_offset, stretching_rate};
use crate::remesh::Remesher;
use crate::state::{FieldPart, WakeState};

/// Undisturbed inflow seen by the wake.
pub trait FreeStream: Sync {
    fn velocity_at(&self, position: &Vec3, time: f64) -> Vec3;
}

impl<F> FreeStream for F
where
    F: Fn(&Vec3, f64) -> Vec3 + Sync,
{
    fn velocity_at(&self, position: &Vec3, time: f64) -> Vec3 {
        self(position, time)
    }
}

/// What one turbine's rotor hands to its wake each step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheddingInput {
    pub hub: Vec3,
    /// Bound vortices and chordwise legs of all blades
    pub bound: VortexField,
    /// Trailing edge point per blade and span station
    pub trailing_edges: Vec<Vec<Vec3>>,
    /// Bound circulation per blade and panel
    pub bound_gamma: Vec<Vec<f64>>,
}

/// Element counts after one lifecycle pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WakeStepStats {
    pub lines: usize,
    pub particles: usize,
    pub truncated: usize,
    pub reduced: usize,
    pub converted: usize,
    pub remeshed: bool,
}

/// Positions (and particle strengths) at a trial state of one turbine.
#[derive(Clone, Debug, Default)]
struct TrialState {
    nodes: Vec<Vec3>,
    particles: Vec<(Vec3, Vec3)>,
}

/// Rates of change of one turbine's wake.
#[derive(Clone, Debug, Default)]
struct Rates {
    nodes: Vec<Vec3>,
    particles: Vec<Vec3>,
    alphas: Vec<Vec3>,
}

#[derive(Debug)]
pub struct WakeSystem {
    config: WakeConfig,
    turbines: Vec<WakeState>,
    /// One remesher per turbine, or a single shared one with wake interaction
    remeshers: Vec<Remesher>,
}

impl WakeSystem {
    pub fn new(config: WakeConfig, blades: &[usize], hubs: &[Vec3]) -> WakeResult<Self> {
        config.validate()?;
        if blades.len() != hubs.len() {
            return Err(WakeError::InvalidArg {
                what: "one hub per turbine required",
            });
        }
        for hub in hubs {
            ensure_finite_vec(hub, "hub position")?;
        }
        let turbines = blades
            .iter()
            .zip(hubs)
            .map(|(&b, &hub)| WakeState::new(b, hub))
            .collect();
        let groups = if config.wake_interaction { 1 } else { blades.len() };
        let remeshers = (0..groups).map(|_| Remesher::new(&config.remesh)).collect();
        Ok(Self {
            config,
            turbines,
            remeshers,
        })
    }

    pub fn config(&self) -> &WakeConfig {
        &self.config
    }

    pub fn turbine_count(&self) -> usize {
        self.turbines.len()
    }

    pub fn turbine(&self, index: usize) -> Option<&WakeState> {
        self.turbines.get(index)
    }

    pub fn turbines(&self) -> &[WakeState] {
        &self.turbines
    }

    /// Empty every wake and forget remesh references.
    pub fn reset(&mut self) {
        for t in &mut self.turbines {
            *t = WakeState::new(t.blade_count(), t.hub());
        }
        for r in &mut self.remeshers {
            *r = Remesher::new(&self.config.remesh);
        }
    }

    /// Turbines whose wakes induce velocity at turbine `index`.
    fn visible(&self, index: usize) -> Vec<usize> {
        if self.config.wake_interaction {
            (0..self.turbines.len()).collect()
        } else {
            vec![index]
        }
    }

    /// Wake filaments that no longer change during the bound circulation
    /// iteration, plus all particles, as seen by turbine `index`.
    pub fn frozen_field(&self, index: usize) -> VortexField {
        let mut field = VortexField::new();
        for v in self.visible(index) {
            self.turbines[v].append_to_field(&mut field, FieldPart::Frozen);
        }
        field
    }

    /// Filaments tied to the current bound circulation, as seen by turbine
    /// `index`.
    pub fn attached_field(&self, index: usize) -> VortexField {
        let mut field = VortexField::new();
        for v in self.visible(index) {
            self.turbines[v].append_to_field(&mut field, FieldPart::Attached);
        }
        field
    }

    /// Kutta condition for one blade of one turbine.
    pub fn apply_kutta(&mut self, turbine: usize, blade: usize, gamma: &[f64]) -> WakeResult<()> {
        self.turbines
            .get_mut(turbine)
            .ok_or(WakeError::InvalidArg {
                what: "turbine index out of range",
            })?
            .apply_kutta(blade, gamma)
    }

    /// Run lifecycle phases 1-12 for every turbine.
    ///
    /// On error nothing after the failing phase is applied; a convection
    /// failure leaves all positions at their start-of-step values.
    pub fn advance(
        &mut self,
        step: usize,
        time: f64,
        dt: f64,
        inputs: &[SheddingInput],
        free_stream: &dyn FreeStream,
        solver: &InductionSolver,
    ) -> WakeResult<WakeStepStats> {
        if inputs.len() != self.turbines.len() {
            return Err(WakeError::InvalidArg {
                what: "one shedding input per turbine required",
            });
        }
        if !(dt > 0.0) {
            return Err(WakeError::InvalidArg {
                what: "timestep must be positive",
            });
        }
        let timer = Timer::start();
        let mut stats = WakeStepStats::default();

        for (wake, input) in self.turbines.iter_mut().zip(inputs) {
            wake.set_hub(input.hub);
            stats.truncated += wake.truncate(self.config.max_age_s, self.config.far_field_distance);
            stats.reduced += wake.reduce(self.config.reduction_threshold);
            wake.clear_scratch();
            wake.store_initial_state();
        }

        self.convect(step, time, dt, inputs, free_stream, solver)?;

        for (wake, input) in self.turbines.iter_mut().zip(inputs) {
            update_cores(wake, &self.config.core, dt);
            wake.shed_row(&input.trailing_edges, &input.bound_gamma, self.config.core.initial_core)?;
            for (blade, gamma) in input.bound_gamma.iter().enumerate() {
                wake.apply_kutta(blade, gamma)?;
            }
            if let Some(age) = self.config.near_wake_age_s {
                stats.converted += wake.convert_to_particles(age, self.config.particle_overlap);
            }
        }

        if self.config.remesh.enabled && step % self.config.remesh.period == 0 {
            stats.remeshed = self.remesh();
        }
        for wake in &mut self.turbines {
            wake.clear_new_flags();
        }

        stats.lines = self.turbines.iter().map(|w| w.lines().len()).sum();
        stats.particles = self.turbines.iter().map(|w| w.particles().len()).sum();
        timer.stop_into(&phase_timing::WAKE_LIFECYCLE);
        debug!(
            step,
            lines = stats.lines,
            particles = stats.particles,
            converted = stats.converted,
            remeshed = stats.remeshed,
            "wake advanced"
        );
        Ok(stats)
    }

    fn gather(&self, index: usize, inputs: &[SheddingInput], trial: Option<&[TrialState]>) -> VortexField {
        let mut field = VortexField::new();
        for v in self.visible(index) {
            match trial {
                Some(trial) => self.turbines[v].append_trial_field(&mut field, &trial[v].nodes, &trial[v].particles),
                None => self.turbines[v].append_to_field(&mut field, FieldPart::All),
            }
            field.extend_from(&inputs[v].bound);
        }
        field
    }

    /// Convection velocities (free stream plus induced) and stretching rates
    /// of turbine `index` at the current or a trial state.
    fn rates(
        &self,
        index: usize,
        field: &VortexField,
        trial: Option<&TrialState>,
        time: f64,
        free_stream: &dyn FreeStream,
        solver: &InductionSolver,
    ) -> WakeResult<Rates> {
        let wake = &self.turbines[index];
        let mut points: Vec<Vec3> = match trial {
            Some(t) => t.nodes.clone(),
            None => wake.nodes().iter().map(|n| n.position).collect(),
        };
        let states: Vec<(Vec3, Vec3)> = match trial {
            Some(t) => t.particles.clone(),
            None => wake.particles().iter().map(|p| (p.position, p.alpha)).collect(),
        };
        let n_nodes = points.len();
        points.extend(states.iter().map(|(x, _)| *x));

        let mut eps = Vec::new();
        if self.config.stretching {
            for ((x, alpha), p) in states.iter().zip(wake.particles()) {
                let (offset, e) = stretching_offset(alpha, p.core_size);
                points.push(x + offset);
                points.push(x - offset);
                eps.push(e);
            }
        }

        let induced = solver.induced_velocities(field, &points)?;
        let u: Vec<Vec3> = points
            .iter()
            .zip(&induced)
            .map(|(x, ui)| ui + free_stream.velocity_at(x, time))
            .collect();

        let n_particles = states.len();
        let nodes = u[..n_nodes].to_vec();
        let particles = u[n_nodes..n_nodes + n_particles].to_vec();
        let alphas = if self.config.stretching {
            let probes = &u[n_nodes + n_particles..];
            states
                .iter()
                .enumerate()
                .map(|(i, (_, alpha))| stretching_rate(alpha, &probes[2 * i], &probes[2 * i + 1], eps[i]))
                .collect()
        } else {
            vec![Vec3::zeros(); n_particles]
        };
        Ok(Rates {
            nodes,
            particles,
            alphas,
        })
    }

    /// Phases 5-7: gather, predictor, corrector. The new state is validated
    /// before anything is written back.
    fn convect(
        &mut self,
        step: usize,
        time: f64,
        dt: f64,
        inputs: &[SheddingInput],
        free_stream: &dyn FreeStream,
        solver: &InductionSolver,
    ) -> WakeResult<()> {
        let scheme = self.config.integration;
        let n = self.turbines.len();

        let mut rates0 = Vec::with_capacity(n);
        for t in 0..n {
            let field = self.gather(t, inputs, None);
            rates0.push(self.rates(t, &field, None, time, free_stream, solver)?);
        }

        let predicted: Vec<TrialState> = self
            .turbines
            .iter()
            .zip(&rates0)
            .map(|(wake, r)| TrialState {
                nodes: wake
                    .nodes()
                    .iter()
                    .zip(&r.nodes)
                    .map(|(node, u)| predict(scheme, &node.initial_position, u, node.previous_velocity.as_ref(), dt))
                    .collect(),
                particles: wake
                    .particles()
                    .iter()
                    .zip(r.particles.iter().zip(&r.alphas))
                    .map(|(p, (u, da))| {
                        (
                            predict(scheme, &p.initial_position, u, p.previous_velocity.as_ref(), dt),
                            p.initial_alpha + da * dt,
                        )
                    })
                    .collect(),
            })
            .collect();

        let (finals, rates1) = if scheme.has_corrector() {
            ensure_trial_finite(&predicted, step)?;
            let mut rates1 = Vec::with_capacity(n);
            for t in 0..n {
                let field = self.gather(t, inputs, Some(&predicted));
                rates1.push(self.rates(t, &field, Some(&predicted[t]), time + dt, free_stream, solver)?);
            }
            let finals: Vec<TrialState> = self
                .turbines
                .iter()
                .zip(rates0.iter().zip(&rates1))
                .map(|(wake, (r0, r1))| TrialState {
                    nodes: wake
                        .nodes()
                        .iter()
                        .enumerate()
                        .map(|(i, node)| correct(&node.initial_position, &r0.nodes[i], &r1.nodes[i], dt))
                        .collect(),
                    particles: wake
                        .particles()
                        .iter()
                        .enumerate()
                        .map(|(i, p)| {
                            (
                                correct(&p.initial_position, &r0.particles[i], &r1.particles[i], dt),
                                correct(&p.initial_alpha, &r0.alphas[i], &r1.alphas[i], dt),
                            )
                        })
                        .collect(),
                })
                .collect();
            (finals, Some(rates1))
        } else {
            (predicted, None)
        };
        ensure_trial_finite(&finals, step)?;

        for (t, (wake, fin)) in self.turbines.iter_mut().zip(finals).enumerate() {
            let r0 = &rates0[t];
            let r1 = rates1.as_ref().map(|r| &r[t]);
            for (i, (node, x)) in wake.nodes_mut().iter_mut().zip(fin.nodes).enumerate() {
                let u = effective_rate(scheme, &r0.nodes[i], r1.map(|r| &r.nodes[i]));
                node.position = x;
                node.velocity = u;
                node.previous_velocity = Some(u);
            }
            for (i, (p, (x, alpha))) in wake.particles_mut().iter_mut().zip(fin.particles).enumerate() {
                let u = effective_rate(scheme, &r0.particles[i], r1.map(|r| &r.particles[i]));
                p.position = x;
                p.alpha = alpha;
                p.velocity = u;
                p.previous_velocity = Some(u);
                p.alpha_rate = effective_rate(scheme, &r0.alphas[i], r1.map(|r| &r.alphas[i]));
            }
        }
        Ok(())
    }

    /// Phase 12. Returns whether any group was remeshed.
    fn remesh(&mut self) -> bool {
        let timer = Timer::start();
        let groups: Vec<Vec<usize>> = if self.config.wake_interaction {
            vec![(0..self.turbines.len()).collect()]
        } else {
            (0..self.turbines.len()).map(|t| vec![t]).collect()
        };

        let mut any = false;
        for (group, remesher) in groups.iter().zip(self.remeshers.iter_mut()) {
            let turbines = &self.turbines;
            let Some(remeshed) =
                remesher.remesh(group.iter().flat_map(|&t| turbines[t].particles().iter()))
            else {
                continue;
            };
            any = true;

            for &t in group {
                self.turbines[t].particles_mut().retain(|p| p.is_new);
            }
            for p in remeshed {
                let nearest = group
                    .iter()
                    .copied()
                    .min_by(|&a, &b| {
                        let da = (p.position - self.turbines[a].hub()).norm_squared();
                        let db = (p.position - self.turbines[b].hub()).norm_squared();
                        da.total_cmp(&db)
                    })
                    .unwrap_or(group[0]);
                self.turbines[nearest].particles_mut().push(p);
            }
            for &t in group {
                self.turbines[t].sort_particles_by_hub_distance();
            }
        }
        timer.stop_into(&phase_timing::REMESH);
        any
    }
}

fn ensure_trial_finite(states: &[TrialState], step: usize) -> WakeResult<()> {
    let finite = states.iter().all(|s| {
        s.nodes.iter().all(is_finite_vec)
            && s.particles
                .iter()
                .all(|(x, a)| is_finite_vec(x) && is_finite_vec(a))
    });
    if finite {
        Ok(())
    } else {
        Err(WakeError::NonFinite {
            what: "wake convection",
            step,
        })
    }
}
