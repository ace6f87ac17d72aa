//! Per-turbine Lagrangian wake representation and its bookkeeping.

use tw_core::{IdAllocator, NodeId, Vec3, is_finite_vec};
use tw_induction::{VortexField, VortexParticle, VortexSegment};

use crate::elements::{LineKind, NodeOrigin, WakeLine, WakeNode, WakeParticle};
use crate::error::{WakeError, WakeResult};

/// Which wake filaments to gather into an induction field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldPart {
    /// Every line and particle
    All,
    /// Lines whose strength no longer follows the bound circulation, plus
    /// all particles
    Frozen,
    /// Only the lines still tied to the bound circulation
    Attached,
}

impl FieldPart {
    fn includes(self, line: &WakeLine) -> bool {
        match self {
            FieldPart::All => true,
            FieldPart::Frozen => !line.attached,
            FieldPart::Attached => line.attached,
        }
    }

    fn includes_particles(self) -> bool {
        !matches!(self, FieldPart::Attached)
    }
}

/// Wake of one turbine.
///
/// Nodes are kept sorted by id (ids are allocated monotonically and removal
/// preserves order), so node lookup is a binary search and iteration order is
/// deterministic.
#[derive(Clone, Debug, PartialEq)]
pub struct WakeState {
    hub: Vec3,
    nodes: Vec<WakeNode>,
    lines: Vec<WakeLine>,
    particles: Vec<WakeParticle>,
    node_ids: IdAllocator,
    line_ids: IdAllocator,
    /// Newest trailing edge row per blade, one node per span station
    last_row: Vec<Vec<NodeId>>,
    /// Strength of the newest (attached) wake ring per blade and panel
    ring_gamma: Vec<Vec<f64>>,
    /// Strength of the ring behind it, fixed when the ring was frozen
    frozen_ring_gamma: Vec<Vec<f64>>,
    rows_shed: usize,
}

impl WakeState {
    pub fn new(blades: usize, hub: Vec3) -> Self {
        Self {
            hub,
            nodes: Vec::new(),
            lines: Vec::new(),
            particles: Vec::new(),
            node_ids: IdAllocator::new(),
            line_ids: IdAllocator::new(),
            last_row: vec![Vec::new(); blades],
            ring_gamma: vec![Vec::new(); blades],
            frozen_ring_gamma: vec![Vec::new(); blades],
            rows_shed: 0,
        }
    }

    pub fn hub(&self) -> Vec3 {
        self.hub
    }

    pub fn set_hub(&mut self, hub: Vec3) {
        self.hub = hub;
    }

    pub fn blade_count(&self) -> usize {
        self.last_row.len()
    }

    pub fn nodes(&self) -> &[WakeNode] {
        &self.nodes
    }

    pub fn lines(&self) -> &[WakeLine] {
        &self.lines
    }

    pub fn particles(&self) -> &[WakeParticle] {
        &self.particles
    }

    pub fn rows_shed(&self) -> usize {
        self.rows_shed
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [WakeNode] {
        &mut self.nodes
    }

    pub(crate) fn lines_mut(&mut self) -> &mut [WakeLine] {
        &mut self.lines
    }

    pub(crate) fn particles_mut(&mut self) -> &mut Vec<WakeParticle> {
        &mut self.particles
    }

    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.nodes.binary_search_by_key(&id, |n| n.id).ok()
    }

    pub fn node(&self, id: NodeId) -> Option<&WakeNode> {
        self.node_index(id).map(|i| &self.nodes[i])
    }

    /// Current start and end positions of a line.
    pub fn line_endpoints(&self, line: &WakeLine) -> Option<(Vec3, Vec3)> {
        Some((self.node(line.start)?.position, self.node(line.end)?.position))
    }

    /// Strength of the attached wake ring of one blade.
    pub fn ring_gamma(&self, blade: usize) -> &[f64] {
        self.ring_gamma.get(blade).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn element_count(&self) -> usize {
        self.lines.len() + self.particles.len()
    }

    /// Phase 1: drop elements older than `max_age_s` or farther than
    /// `far_field` from the hub. Attached lines are never truncated.
    pub fn truncate(&mut self, max_age_s: Option<f64>, far_field: Option<f64>) -> usize {
        let before = self.element_count();
        let hub = self.hub;
        let too_old = |age: f64| max_age_s.is_some_and(|m| age > m);
        let too_far = |p: &Vec3| far_field.is_some_and(|d| (p - hub).norm() > d);

        let nodes = &self.nodes;
        let pos = |id: NodeId| {
            nodes
                .binary_search_by_key(&id, |n| n.id)
                .ok()
                .map(|i| nodes[i].position)
        };
        self.lines.retain(|l| {
            if l.attached {
                return true;
            }
            if too_old(l.age_s) {
                return false;
            }
            match (pos(l.start), pos(l.end)) {
                (Some(a), Some(b)) => !too_far(&(0.5 * (a + b))),
                _ => false,
            }
        });
        self.particles
            .retain(|p| !too_old(p.age_s) && !too_far(&p.position));
        self.collect_garbage();
        before - self.element_count()
    }

    /// Phase 2: drop elements weaker than `threshold` times the current
    /// maximum strength of their kind.
    pub fn reduce(&mut self, threshold: f64) -> usize {
        if threshold <= 0.0 {
            return 0;
        }
        let before = self.element_count();
        let max_gamma = self
            .lines
            .iter()
            .map(|l| l.gamma.abs())
            .fold(0.0, f64::max);
        let max_alpha = self
            .particles
            .iter()
            .map(WakeParticle::strength)
            .fold(0.0, f64::max);
        let line_cut = threshold * max_gamma;
        let particle_cut = threshold * max_alpha;
        self.lines
            .retain(|l| l.attached || l.gamma.abs() >= line_cut);
        self.particles.retain(|p| p.strength() >= particle_cut);
        self.collect_garbage();
        before - self.element_count()
    }

    /// Phase 3: forget per-step rates.
    pub fn clear_scratch(&mut self) {
        for n in &mut self.nodes {
            n.velocity = Vec3::zeros();
        }
        for p in &mut self.particles {
            p.velocity = Vec3::zeros();
            p.alpha_rate = Vec3::zeros();
        }
    }

    /// Phase 4: remember the state the predictor starts from.
    pub fn store_initial_state(&mut self) {
        for n in &mut self.nodes {
            n.initial_position = n.position;
        }
        for p in &mut self.particles {
            p.initial_position = p.position;
            p.initial_alpha = p.alpha;
        }
    }

    /// Gather elements into an induction field using current positions.
    pub fn append_to_field(&self, field: &mut VortexField, part: FieldPart) {
        for line in self.lines.iter().filter(|l| part.includes(l)) {
            if let Some((start, end)) = self.line_endpoints(line) {
                field.push_segment(VortexSegment {
                    start,
                    end,
                    gamma: line.gamma,
                    core: line.core_radius,
                });
            }
        }
        if part.includes_particles() {
            for p in &self.particles {
                field.push_particle(VortexParticle {
                    position: p.position,
                    alpha: p.alpha,
                    core: p.core_size,
                });
            }
        }
    }

    /// Gather elements at trial positions. `node_positions` and
    /// `particle_states` are aligned with [`Self::nodes`] and
    /// [`Self::particles`].
    pub(crate) fn append_trial_field(
        &self,
        field: &mut VortexField,
        node_positions: &[Vec3],
        particle_states: &[(Vec3, Vec3)],
    ) {
        for line in &self.lines {
            let (Some(a), Some(b)) = (self.node_index(line.start), self.node_index(line.end))
            else {
                continue;
            };
            field.push_segment(VortexSegment {
                start: node_positions[a],
                end: node_positions[b],
                gamma: line.gamma,
                core: line.core_radius,
            });
        }
        for (p, (position, alpha)) in self.particles.iter().zip(particle_states) {
            field.push_particle(VortexParticle {
                position: *position,
                alpha: *alpha,
                core: p.core_size,
            });
        }
    }

    /// Phase 9: shed a new trailing edge row.
    ///
    /// `trailing_edges[b]` holds the trailing edge point of every span station
    /// of blade `b`; `bound_gamma[b]` the bound circulation of every panel
    /// between them. From the second row on this creates trailing lines from
    /// each new node to its predecessor and shed lines along the previous row,
    /// all attached to the bound circulation. Previously attached lines of the
    /// blade are frozen.
    pub fn shed_row(
        &mut self,
        trailing_edges: &[Vec<Vec3>],
        bound_gamma: &[Vec<f64>],
        initial_core: f64,
    ) -> WakeResult<()> {
        if trailing_edges.len() != self.blade_count() || bound_gamma.len() != self.blade_count() {
            return Err(WakeError::Invariant {
                what: format!(
                    "shedding input for {} blades, wake has {}",
                    trailing_edges.len(),
                    self.blade_count()
                ),
            });
        }
        for (blade, (te, gamma)) in trailing_edges.iter().zip(bound_gamma).enumerate() {
            let previous = &self.last_row[blade];
            if !previous.is_empty() && previous.len() != te.len() {
                return Err(WakeError::Invariant {
                    what: format!(
                        "blade {blade} changed from {} to {} stations",
                        previous.len(),
                        te.len()
                    ),
                });
            }
            if previous.iter().any(|&id| self.node(id).is_none()) {
                return Err(WakeError::Invariant {
                    what: "trailing edge row references a missing node".to_string(),
                });
            }
            if te.len() != gamma.len() + 1 {
                return Err(WakeError::Invariant {
                    what: format!(
                        "{} trailing edge stations for {} panels",
                        te.len(),
                        gamma.len()
                    ),
                });
            }
            if !te.iter().all(is_finite_vec) || !gamma.iter().all(|g| g.is_finite()) {
                return Err(WakeError::NonFinite {
                    what: "shed geometry",
                    step: self.rows_shed,
                });
            }
        }

        for line in self.lines.iter_mut().rev().take_while(|l| l.attached) {
            line.attached = false;
        }

        let row = self.rows_shed;
        for blade in 0..self.blade_count() {
            let te = &trailing_edges[blade];
            let gamma = &bound_gamma[blade];
            let panels = gamma.len();

            let new_row: Vec<NodeId> = te
                .iter()
                .enumerate()
                .map(|(station, &position)| {
                    let id = self.node_ids.allocate();
                    self.nodes.push(WakeNode::new(
                        id,
                        NodeOrigin {
                            row,
                            blade,
                            station,
                        },
                        position,
                    ));
                    id
                })
                .collect();

            let old_row = std::mem::replace(&mut self.last_row[blade], new_row.clone());
            if old_row.is_empty() {
                self.ring_gamma[blade] = vec![0.0; panels];
                self.frozen_ring_gamma[blade] = vec![0.0; panels];
                continue;
            }
            let previous_ring = std::mem::replace(&mut self.ring_gamma[blade], gamma.clone());
            let previous_ring = if previous_ring.len() == panels {
                previous_ring
            } else {
                vec![0.0; panels]
            };

            for station in 0..=panels {
                let (start, end) = (new_row[station], old_row[station]);
                let length = self.segment_length(start, end)?;
                let id = self.line_ids.allocate();
                self.lines.push(WakeLine {
                    id,
                    start,
                    end,
                    gamma: trailing_strength(gamma, station),
                    core_radius: initial_core,
                    initial_core_radius: initial_core,
                    initial_length: length,
                    age_s: 0.0,
                    kind: LineKind::Trailing,
                    blade,
                    attached: true,
                });
            }
            for panel in 0..panels {
                let (start, end) = (old_row[panel], old_row[panel + 1]);
                let length = self.segment_length(start, end)?;
                let id = self.line_ids.allocate();
                self.lines.push(WakeLine {
                    id,
                    start,
                    end,
                    gamma: previous_ring[panel] - gamma[panel],
                    core_radius: initial_core,
                    initial_core_radius: initial_core,
                    initial_length: length,
                    age_s: 0.0,
                    kind: LineKind::Shed,
                    blade,
                    attached: true,
                });
            }
            self.frozen_ring_gamma[blade] = previous_ring;
        }
        self.rows_shed += 1;
        Ok(())
    }

    fn segment_length(&self, a: NodeId, b: NodeId) -> WakeResult<f64> {
        match (self.node(a), self.node(b)) {
            (Some(a), Some(b)) => Ok((b.position - a.position).norm()),
            _ => Err(WakeError::Invariant {
                what: "trailing edge row references a missing node".to_string(),
            }),
        }
    }

    /// Phase 10 (and every bound circulation iteration): set the attached
    /// lines of `blade` from the current bound circulation.
    pub fn apply_kutta(&mut self, blade: usize, gamma: &[f64]) -> WakeResult<()> {
        let panels = match self.ring_gamma.get(blade) {
            Some(r) => r.len(),
            None => {
                return Err(WakeError::InvalidArg {
                    what: "blade index out of range",
                });
            }
        };
        if self.lines.last().is_none_or(|l| !l.attached) {
            return Ok(());
        }
        if gamma.len() != panels {
            return Err(WakeError::Invariant {
                what: format!("{} circulation values for {panels} panels", gamma.len()),
            });
        }

        let nodes = &self.nodes;
        let frozen = &self.frozen_ring_gamma[blade];
        for line in self
            .lines
            .iter_mut()
            .rev()
            .take_while(|l| l.attached)
            .filter(|l| l.blade == blade)
        {
            let Ok(i) = nodes.binary_search_by_key(&line.start, |n| n.id) else {
                continue;
            };
            let station = nodes[i].origin.station;
            line.gamma = match line.kind {
                LineKind::Trailing => trailing_strength(gamma, station),
                LineKind::Shed => frozen.get(station).copied().unwrap_or(0.0) - gamma[station],
            };
        }
        self.ring_gamma[blade] = gamma.to_vec();
        Ok(())
    }

    /// Phase 11: replace filaments older than `near_wake_age_s` with one
    /// particle each at the filament midpoint.
    pub fn convert_to_particles(&mut self, near_wake_age_s: f64, overlap: f64) -> usize {
        let mut converted = Vec::new();
        let nodes = &self.nodes;
        let pos = |id: NodeId| {
            nodes
                .binary_search_by_key(&id, |n| n.id)
                .ok()
                .map(|i| nodes[i].position)
        };
        self.lines.retain(|l| {
            if l.attached || l.age_s <= near_wake_age_s {
                return true;
            }
            let (Some(a), Some(b)) = (pos(l.start), pos(l.end)) else {
                return false;
            };
            let d = b - a;
            let length = d.norm();
            let core = l.core_radius.max(overlap * length);
            converted.push(WakeParticle::new(
                0.5 * (a + b),
                d * l.gamma,
                core,
                std::f64::consts::PI * core * core * length,
                l.age_s,
            ));
            false
        });
        let n = converted.len();
        self.particles.extend(converted);
        self.collect_garbage();
        n
    }

    /// Drop nodes no line references. Nodes of the newest row are kept.
    pub fn collect_garbage(&mut self) {
        let mut live: Vec<NodeId> = self
            .lines
            .iter()
            .flat_map(|l| [l.start, l.end])
            .chain(self.last_row.iter().flatten().copied())
            .collect();
        live.sort_unstable();
        live.dedup();
        self.nodes.retain(|n| live.binary_search(&n.id).is_ok());
    }

    pub fn clear_new_flags(&mut self) {
        for p in &mut self.particles {
            p.is_new = false;
        }
    }

    /// Stable full resort of particles by ascending distance from the hub.
    pub fn sort_particles_by_hub_distance(&mut self) {
        let hub = self.hub;
        self.particles.sort_by(|a, b| {
            (a.position - hub)
                .norm_squared()
                .total_cmp(&(b.position - hub).norm_squared())
        });
    }

    /// Whether particles are in ascending hub-distance order.
    pub fn particles_sorted_by_hub_distance(&self) -> bool {
        let hub = self.hub;
        self.particles.windows(2).all(|w| {
            (w[0].position - hub).norm_squared() <= (w[1].position - hub).norm_squared()
        })
    }

    /// Every line references live nodes; every particle has non-negative
    /// core size and volume; every position is finite.
    pub fn check_integrity(&self) -> WakeResult<()> {
        if self.nodes.windows(2).any(|w| w[0].id >= w[1].id) {
            return Err(WakeError::Invariant {
                what: "nodes out of id order".to_string(),
            });
        }
        for line in &self.lines {
            if self.node_index(line.start).is_none() || self.node_index(line.end).is_none() {
                return Err(WakeError::Invariant {
                    what: format!("line {:?} references a destroyed node", line.id),
                });
            }
        }
        for p in &self.particles {
            if !(p.core_size >= 0.0) || !(p.volume >= 0.0) {
                return Err(WakeError::Invariant {
                    what: "particle with negative core size or volume".to_string(),
                });
            }
        }
        if !self.nodes.iter().all(|n| is_finite_vec(&n.position))
            || !self.particles.iter().all(|p| is_finite_vec(&p.position))
        {
            return Err(WakeError::Invariant {
                what: "non-finite wake position".to_string(),
            });
        }
        Ok(())
    }
}

/// Strength of the trailing line at span station `station`:
/// `gamma[station - 1] - gamma[station]`, zero beyond either tip.
pub fn trailing_strength(gamma: &[f64], station: usize) -> f64 {
    let inboard = if station == 0 { 0.0 } else { gamma.get(station - 1).copied().unwrap_or(0.0) };
    let outboard = gamma.get(station).copied().unwrap_or(0.0);
    inboard - outboard
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_core::vec3;

    fn te_row(x: f64, stations: usize) -> Vec<Vec3> {
        (0..stations).map(|s| vec3(x, 0.0, 1.0 + s as f64)).collect()
    }

    fn shed_two_rows(state: &mut WakeState, gamma: &[f64]) {
        state
            .shed_row(&[te_row(0.0, gamma.len() + 1)], &[gamma.to_vec()], 0.01)
            .unwrap();
        for n in state.nodes_mut() {
            n.position.x += 1.0;
        }
        state
            .shed_row(&[te_row(0.0, gamma.len() + 1)], &[gamma.to_vec()], 0.01)
            .unwrap();
    }

    #[test]
    fn trailing_strength_closes_at_tips() {
        let g = [1.0, 3.0, 2.0];
        let total: f64 = (0..=3).map(|s| trailing_strength(&g, s)).sum();
        assert_eq!(trailing_strength(&g, 0), -1.0);
        assert_eq!(trailing_strength(&g, 3), 2.0);
        assert!(total.abs() < 1e-15);
    }

    #[test]
    fn first_row_creates_only_nodes() {
        let mut state = WakeState::new(1, Vec3::zeros());
        state.shed_row(&[te_row(0.0, 4)], &[vec![1.0; 3]], 0.01).unwrap();
        assert_eq!(state.nodes().len(), 4);
        assert!(state.lines().is_empty());
        state.check_integrity().unwrap();
    }

    #[test]
    fn second_row_creates_attached_ring() {
        let mut state = WakeState::new(1, Vec3::zeros());
        shed_two_rows(&mut state, &[1.0, 2.0, 1.5]);
        let trailing = state.lines().iter().filter(|l| l.kind == LineKind::Trailing).count();
        let shed: Vec<&WakeLine> = state.lines().iter().filter(|l| l.kind == LineKind::Shed).collect();
        assert_eq!(trailing, 4);
        assert_eq!(shed.len(), 3);
        assert!(state.lines().iter().all(|l| l.attached));
        // starting vortex: nothing behind the first ring
        assert_eq!(shed[1].gamma, -2.0);
        state.check_integrity().unwrap();
    }

    #[test]
    fn kutta_updates_only_attached_lines() {
        let mut state = WakeState::new(1, Vec3::zeros());
        shed_two_rows(&mut state, &[1.0, 1.0]);
        state.shed_row(&[te_row(0.0, 3)], &[vec![1.0, 1.0]], 0.01).unwrap();
        let frozen_before: Vec<f64> = state.lines().iter().filter(|l| !l.attached).map(|l| l.gamma).collect();
        state.apply_kutta(0, &[2.0, 3.0]).unwrap();
        let frozen_after: Vec<f64> = state.lines().iter().filter(|l| !l.attached).map(|l| l.gamma).collect();
        assert_eq!(frozen_before, frozen_after);

        let shed: Vec<f64> = state
            .lines()
            .iter()
            .filter(|l| l.attached && l.kind == LineKind::Shed)
            .map(|l| l.gamma)
            .collect();
        // previous ring was 1.0 on both panels
        assert_eq!(shed, vec![1.0 - 2.0, 1.0 - 3.0]);
        assert_eq!(state.ring_gamma(0), &[2.0, 3.0]);
    }

    #[test]
    fn truncation_keeps_referential_integrity() {
        let mut state = WakeState::new(1, Vec3::zeros());
        shed_two_rows(&mut state, &[1.0, 1.0]);
        for _ in 0..4 {
            for l in state.lines_mut() {
                l.age_s += 1.0;
            }
            state.shed_row(&[te_row(0.0, 3)], &[vec![1.0, 1.0]], 0.01).unwrap();
        }
        let removed = state.truncate(Some(2.5), None);
        assert!(removed > 0);
        state.check_integrity().unwrap();
        assert!(state.lines().iter().all(|l| l.age_s <= 2.5));
    }

    #[test]
    fn conversion_produces_midpoint_particles() {
        let mut state = WakeState::new(1, Vec3::zeros());
        shed_two_rows(&mut state, &[1.0, 2.0]);
        state.shed_row(&[te_row(0.0, 3)], &[vec![1.0, 2.0]], 0.01).unwrap();
        for l in state.lines_mut() {
            if !l.attached {
                l.age_s = 10.0;
            }
        }
        let frozen = state.lines().iter().filter(|l| !l.attached).count();
        let n = state.convert_to_particles(5.0, 1.0);
        assert_eq!(n, frozen);
        assert!(state.particles().iter().all(|p| p.is_new && p.core_size > 0.0));
        state.check_integrity().unwrap();
    }

    #[test]
    fn mismatched_station_count_is_rejected() {
        let mut state = WakeState::new(1, Vec3::zeros());
        let err = state.shed_row(&[te_row(0.0, 3)], &[vec![1.0; 3]], 0.01);
        assert!(err.is_err());
    }

    #[test]
    fn rejected_row_leaves_every_blade_untouched() {
        let mut state = WakeState::new(2, Vec3::zeros());
        let gamma = vec![vec![1.0, 2.0], vec![1.0, 2.0]];
        state.shed_row(&[te_row(0.0, 3), te_row(0.0, 3)], &gamma, 0.01).unwrap();
        state.shed_row(&[te_row(1.0, 3), te_row(1.0, 3)], &gamma, 0.01).unwrap();
        let before = state.clone();

        // blade 0 is fine, blade 1 changed its station count
        let err = state.shed_row(&[te_row(2.0, 3), te_row(2.0, 4)], &[vec![1.0, 2.0], vec![1.0, 2.0, 3.0]], 0.01);
        assert!(matches!(err, Err(WakeError::Invariant { .. })));
        assert_eq!(state, before);
        assert!(state.lines().iter().all(|l| l.attached));
        state.check_integrity().unwrap();
    }
}
