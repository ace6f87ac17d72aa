//! Flat vortex element arrays handed to the induction backends.

use tw_core::Vec3;

/// Straight vortex filament from `start` to `end` carrying circulation
/// `gamma`, regularised with core radius `core`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VortexSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub gamma: f64,
    pub core: f64,
}

/// Regularised vortex particle with vector vorticity moment `alpha`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VortexParticle {
    pub position: Vec3,
    pub alpha: Vec3,
    pub core: f64,
}

/// Everything that induces velocity, gathered into contiguous arrays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VortexField {
    pub segments: Vec<VortexSegment>,
    pub particles: Vec<VortexParticle>,
}

impl VortexField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(segments: usize, particles: usize) -> Self {
        Self {
            segments: Vec::with_capacity(segments),
            particles: Vec::with_capacity(particles),
        }
    }

    pub fn push_segment(&mut self, segment: VortexSegment) {
        self.segments.push(segment);
    }

    pub fn push_particle(&mut self, particle: VortexParticle) {
        self.particles.push(particle);
    }

    /// Append all elements of another field.
    pub fn extend_from(&mut self, other: &VortexField) {
        self.segments.extend_from_slice(&other.segments);
        self.particles.extend_from_slice(&other.particles);
    }

    pub fn element_count(&self) -> usize {
        self.segments.len() + self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element_count() == 0
    }

    /// Mean element location, used as a packing origin for reduced-precision
    /// backends. `None` for an empty field.
    pub fn centroid(&self) -> Option<Vec3> {
        let n = self.element_count();
        if n == 0 {
            return None;
        }
        let mut sum = Vec3::zeros();
        for s in &self.segments {
            sum += 0.5 * (s.start + s.end);
        }
        for p in &self.particles {
            sum += p.position;
        }
        Some(sum / n as f64)
    }
}
