use super::attributes::{AttributeMap, AttributeValue};
use crate::core::math::geometry::Vector3;

/// Well-known per-particle attribute names shared by the codecs.
pub mod keys {
    pub const RECORD: &str = "record";
    pub const SERIAL: &str = "serial";
    pub const NAME: &str = "name";
    pub const ALT_LOC: &str = "alt_loc";
    pub const RESIDUE_NAME: &str = "residue_name";
    pub const RESIDUE_CODE: &str = "residue_code";
    /// Set on coarse-grained beads whose residue is a DNA base.
    pub const DNA: &str = "dna";
    pub const CHAIN_ID: &str = "chain_id";
    pub const RESIDUE_SEQUENCE: &str = "residue_sequence";
    pub const INSERTION_CODE: &str = "insertion_code";
    pub const OCCUPANCY: &str = "occupancy";
    pub const TEMPERATURE_FACTOR: &str = "temperature_factor";
    pub const ELEMENT: &str = "element";
    pub const CHARGE: &str = "charge";
    pub const VELOCITY: &str = "velocity";
    pub const FORCE: &str = "force";
}

/// A point in space plus an open-ended set of named attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vector3,
    pub attributes: AttributeMap,
}

impl Particle {
    pub fn new(position: Vector3) -> Self {
        Self {
            position,
            attributes: AttributeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.attributes.try_string(keys::NAME)
    }

    pub fn element(&self) -> Option<&str> {
        self.attributes.try_string(keys::ELEMENT)
    }

    pub fn velocity(&self) -> Option<Vector3> {
        self.attributes.try_vector(keys::VELOCITY)
    }

    pub fn force(&self) -> Option<Vector3> {
        self.attributes.try_vector(keys::FORCE)
    }
}
