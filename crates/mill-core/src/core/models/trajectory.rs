use super::attributes::AttributeMap;
use super::snapshot::{ParticleCountMismatch, Snapshot};
use std::ops::Index;
use tracing::warn;

/// Well-known trajectory-level attribute names.
pub mod keys {
    /// `"CORD"` or `"VELD"` for DCD.
    pub const SIGNATURE: &str = "signature";
    /// Number of snapshots.
    pub const NSET: &str = "nset";
    /// Step of the first snapshot.
    pub const ISTART: &str = "istart";
    /// Steps between saved snapshots.
    pub const NSTEP_SAVE: &str = "nstep_save";
    /// Total number of simulation steps.
    pub const NSTEP: &str = "nstep";
    /// Number of units (chains).
    pub const NUNIT: &str = "nunit";
    pub const NPARTICLE: &str = "nparticle";
    pub const DELTA_T: &str = "delta_t";
    pub const VER_CHARMM: &str = "verCHARMM";
    /// Free-text comment lines.
    pub const COMMENT: &str = "comment";
    /// Whether every snapshot carries a periodic unit cell.
    pub const HAS_UNIT_CELL: &str = "has_unit_cell";
}

/// An ordered sequence of snapshots plus trajectory-level metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub header: AttributeMap,
    snapshots: Vec<Snapshot>,
}

impl Trajectory {
    pub fn new(header: AttributeMap) -> Self {
        Self {
            header,
            snapshots: Vec::new(),
        }
    }

    pub fn from_snapshots(header: AttributeMap, snapshots: Vec<Snapshot>) -> Self {
        Self { header, snapshots }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn snapshots_mut(&mut self) -> &mut [Snapshot] {
        &mut self.snapshots
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }

    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.snapshots
    }

    pub fn nset(&self) -> Option<usize> {
        self.header.try_integer(keys::NSET).map(|n| n.max(0) as usize)
    }

    pub fn nparticle(&self) -> Option<usize> {
        self.header
            .try_integer(keys::NPARTICLE)
            .map(|n| n.max(0) as usize)
            .or_else(|| self.snapshots.first().map(Snapshot::len))
    }

    /// Makes `nset` and `nparticle` agree with the actual content.
    ///
    /// Returns `true` if the header had to be changed. Snapshots with differing
    /// particle counts cannot be repaired and are reported as an error.
    pub fn repair_header(&mut self) -> Result<bool, ParticleCountMismatch> {
        let header = self.repaired_header()?;
        let repaired = header != self.header;
        self.header = header;
        Ok(repaired)
    }

    /// A copy of the header with `nset` and `nparticle` taken from the
    /// snapshots, leaving `self` untouched.
    pub fn repaired_header(&self) -> Result<AttributeMap, ParticleCountMismatch> {
        let nparticle = self.snapshots.first().map_or(0, Snapshot::len);
        if let Some(bad) = self.snapshots.iter().find(|s| s.len() != nparticle) {
            return Err(ParticleCountMismatch {
                expected: nparticle,
                found: bad.len(),
            });
        }

        let mut header = self.header.clone();
        if self.nset() != Some(self.snapshots.len()) {
            if let Some(declared) = self.nset() {
                warn!(
                    declared,
                    actual = self.snapshots.len(),
                    "Trajectory header nset disagrees with snapshot count; repairing."
                );
            }
            header.insert(keys::NSET, self.snapshots.len());
        }
        let declared_nparticle = self.header.try_integer(keys::NPARTICLE);
        if !self.snapshots.is_empty() && declared_nparticle != Some(nparticle as i64) {
            if let Some(declared) = declared_nparticle {
                warn!(
                    declared,
                    actual = nparticle,
                    "Trajectory header nparticle disagrees with snapshot size; repairing."
                );
            }
            header.insert(keys::NPARTICLE, nparticle);
        }
        Ok(header)
    }
}

impl Index<usize> for Trajectory {
    type Output = Snapshot;

    fn index(&self, index: usize) -> &Self::Output {
        &self.snapshots[index]
    }
}

impl IntoIterator for Trajectory {
    type Item = Snapshot;
    type IntoIter = std::vec::IntoIter<Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.into_iter()
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::geometry::Vector3;

    fn snapshot(n: usize) -> Snapshot {
        Snapshot::from_positions(&vec![Vector3::zeros(); n])
    }

    #[test]
    fn repair_header_fills_missing_counts() {
        let mut traj = Trajectory::new(AttributeMap::new());
        traj.push(snapshot(3));
        traj.push(snapshot(3));
        assert!(traj.repair_header().unwrap());
        assert_eq!(traj.nset(), Some(2));
        assert_eq!(traj.nparticle(), Some(3));
        assert!(!traj.repair_header().unwrap());
    }

    #[test]
    fn repair_header_overwrites_inconsistent_counts() {
        let header = AttributeMap::new()
            .with(keys::NSET, 10usize)
            .with(keys::NPARTICLE, 7usize);
        let mut traj = Trajectory::from_snapshots(header, vec![snapshot(4)]);
        assert!(traj.repair_header().unwrap());
        assert_eq!(traj.nset(), Some(1));
        assert_eq!(traj.nparticle(), Some(4));
    }

    #[test]
    fn repair_header_rejects_ragged_snapshots() {
        let mut traj =
            Trajectory::from_snapshots(AttributeMap::new(), vec![snapshot(4), snapshot(5)]);
        assert_eq!(
            traj.repair_header().unwrap_err(),
            ParticleCountMismatch { expected: 4, found: 5 }
        );
    }

    #[test]
    fn nparticle_falls_back_to_first_snapshot() {
        let traj = Trajectory::from_snapshots(AttributeMap::new(), vec![snapshot(6)]);
        assert_eq!(traj.nparticle(), Some(6));
        assert_eq!(traj.nset(), None);
    }
}
