use super::attributes::AttributeMap;
use super::particle::Particle;
use crate::core::math::geometry::Vector3;
use std::ops::Index;
use thiserror::Error;

/// Well-known frame-level attribute names.
pub mod keys {
    pub const STEP: &str = "step";
    pub const TIME: &str = "time";
    pub const LAMBDA: &str = "lambda";
    pub const COMMENT: &str = "comment";
    pub const NON_ORTHOGONAL_BOX: &str = "non_orthogonal_box";
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BoundaryCondition {
    #[default]
    Unlimited,
    /// Rectangular periodic cell with fixed 90° angles.
    CuboidalPeriodic { width: Vector3 },
}

impl BoundaryCondition {
    pub fn is_periodic(&self) -> bool {
        matches!(self, BoundaryCondition::CuboidalPeriodic { .. })
    }

    pub fn width(&self) -> Option<Vector3> {
        match self {
            BoundaryCondition::CuboidalPeriodic { width } => Some(*width),
            BoundaryCondition::Unlimited => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Particle count mismatch: expected {expected}, found {found}")]
pub struct ParticleCountMismatch {
    pub expected: usize,
    pub found: usize,
}

/// One time frame: an ordered, fixed-size sequence of particles.
///
/// The particle count is set at construction; afterwards particles can be
/// modified in place but never appended or removed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    particles: Vec<Particle>,
    pub boundary: BoundaryCondition,
    pub attributes: AttributeMap,
}

impl Snapshot {
    pub fn new(particles: Vec<Particle>) -> Self {
        Self {
            particles,
            boundary: BoundaryCondition::Unlimited,
            attributes: AttributeMap::new(),
        }
    }

    pub fn from_positions(positions: &[Vector3]) -> Self {
        Self::new(positions.iter().copied().map(Particle::new).collect())
    }

    pub fn with_boundary(mut self, boundary: BoundaryCondition) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    pub fn into_particles(self) -> Vec<Particle> {
        self.particles
    }

    pub fn positions(&self) -> Vec<Vector3> {
        self.particles.iter().map(|p| p.position).collect()
    }

    pub fn set_positions(&mut self, positions: &[Vector3]) -> Result<(), ParticleCountMismatch> {
        self.check_len(positions.len())?;
        for (particle, position) in self.particles.iter_mut().zip(positions) {
            particle.position = *position;
        }
        Ok(())
    }

    /// Fills in per-particle attributes missing here from the particle at the
    /// same index in `reference`. Positions are left untouched.
    pub fn merge_particle_attributes_from(
        &mut self,
        reference: &Snapshot,
    ) -> Result<(), ParticleCountMismatch> {
        self.check_len(reference.len())?;
        for (particle, source) in self.particles.iter_mut().zip(reference.iter()) {
            particle.attributes.merge_missing_from(&source.attributes);
        }
        Ok(())
    }

    fn check_len(&self, found: usize) -> Result<(), ParticleCountMismatch> {
        if found != self.particles.len() {
            return Err(ParticleCountMismatch {
                expected: self.particles.len(),
                found,
            });
        }
        Ok(())
    }
}

impl Index<usize> for Snapshot {
    type Output = Particle;

    fn index(&self, index: usize) -> &Self::Output {
        &self.particles[index]
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Particle;
    type IntoIter = std::slice::Iter<'a, Particle>;

    fn into_iter(self) -> Self::IntoIter {
        self.particles.iter()
    }
}
