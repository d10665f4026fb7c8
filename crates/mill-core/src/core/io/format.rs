//! Extension-based selection of a concrete codec.
//!
//! The set of formats is closed: [`TrajectoryReader`] and [`TrajectoryWriter`]
//! hold one variant per codec and dispatch statically.

use super::dcd::{DcdReader, DcdWriter};
use super::error::TrajectoryIoError;
use super::pdb::{PdbFlavor, PdbReader, PdbWriter};
use super::traits::{ReadTrajectory, WriteTrajectory};
use super::trr::{TrrPrecision, TrrReader, TrrWriter};
use super::xyz::{XyzReader, XyzWriter};
use crate::core::models::attributes::AttributeMap;
use crate::core::models::snapshot::Snapshot;
use crate::core::models::trajectory::Trajectory;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrajectoryFormat {
    Dcd,
    Pdb,
    /// Coarse-grained PDB: one bead per residue.
    CgPdb,
    Xyz,
    Trr,
}

impl TrajectoryFormat {
    pub const ALL: [TrajectoryFormat; 5] = [
        TrajectoryFormat::Dcd,
        TrajectoryFormat::Pdb,
        TrajectoryFormat::CgPdb,
        TrajectoryFormat::Xyz,
        TrajectoryFormat::Trr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TrajectoryFormat::Dcd => "dcd",
            TrajectoryFormat::Pdb => "pdb",
            TrajectoryFormat::CgPdb => "cgpdb",
            TrajectoryFormat::Xyz => "xyz",
            TrajectoryFormat::Trr => "trr",
        }
    }

    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            TrajectoryFormat::CgPdb => "pdb",
            other => other.name(),
        }
    }

    /// Selects the format from the file extension (case-insensitive).
    ///
    /// `.pdb` always maps to the standard flavor; coarse-grained files are
    /// selected by name or by a `.cgpdb` extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TrajectoryIoError> {
        let path = path.as_ref();
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .ok_or_else(|| TrajectoryIoError::UnknownFormat {
                path: path.to_path_buf(),
            })
    }

    fn pdb_flavor(self) -> PdbFlavor {
        match self {
            TrajectoryFormat::CgPdb => PdbFlavor::CoarseGrained,
            _ => PdbFlavor::Standard,
        }
    }
}

impl FromStr for TrajectoryFormat {
    type Err = TrajectoryIoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        TrajectoryFormat::ALL
            .into_iter()
            .find(|format| format.name() == lowered)
            .ok_or_else(|| TrajectoryIoError::UnknownFormatName(s.to_string()))
    }
}

impl fmt::Display for TrajectoryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn open_file(path: &Path) -> Result<BufReader<File>, TrajectoryIoError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TrajectoryIoError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn create_file(path: &Path) -> Result<BufWriter<File>, TrajectoryIoError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| TrajectoryIoError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// A file reader for any supported format.
pub enum TrajectoryReader {
    Dcd(DcdReader<BufReader<File>>),
    Pdb(PdbReader<BufReader<File>>),
    Xyz(XyzReader<BufReader<File>>),
    Trr(TrrReader<BufReader<File>>),
}

impl TrajectoryReader {
    /// Opens `path` with the codec selected by its extension.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrajectoryIoError> {
        let path = path.as_ref();
        Self::open_as(path, TrajectoryFormat::from_path(path)?)
    }

    pub fn open_as(
        path: impl AsRef<Path>,
        format: TrajectoryFormat,
    ) -> Result<Self, TrajectoryIoError> {
        let file = open_file(path.as_ref())?;
        Ok(match format {
            TrajectoryFormat::Dcd => TrajectoryReader::Dcd(DcdReader::new(file)),
            TrajectoryFormat::Pdb | TrajectoryFormat::CgPdb => {
                TrajectoryReader::Pdb(PdbReader::new(file, format.pdb_flavor()))
            }
            TrajectoryFormat::Xyz => TrajectoryReader::Xyz(XyzReader::new(file)),
            TrajectoryFormat::Trr => TrajectoryReader::Trr(TrrReader::new(file)),
        })
    }

    /// Makes non-orthogonal TRR boxes an error. Other formats are unaffected.
    pub fn with_strict_box(self, strict: bool) -> Self {
        match self {
            TrajectoryReader::Trr(reader) => {
                TrajectoryReader::Trr(reader.with_strict_box(strict))
            }
            other => other,
        }
    }

    pub fn format(&self) -> TrajectoryFormat {
        match self {
            TrajectoryReader::Dcd(_) => TrajectoryFormat::Dcd,
            TrajectoryReader::Pdb(reader) => match reader.flavor() {
                PdbFlavor::Standard => TrajectoryFormat::Pdb,
                PdbFlavor::CoarseGrained => TrajectoryFormat::CgPdb,
            },
            TrajectoryReader::Xyz(_) => TrajectoryFormat::Xyz,
            TrajectoryReader::Trr(_) => TrajectoryFormat::Trr,
        }
    }
}

macro_rules! dispatch {
    ($value:expr, $inner:ident => $call:expr) => {
        match $value {
            Self::Dcd($inner) => Ok($call?),
            Self::Pdb($inner) => Ok($call?),
            Self::Xyz($inner) => Ok($call?),
            Self::Trr($inner) => Ok($call?),
        }
    };
}

impl ReadTrajectory for TrajectoryReader {
    type Error = TrajectoryIoError;

    fn read_header(&mut self) -> Result<AttributeMap, TrajectoryIoError> {
        dispatch!(self, r => r.read_header())
    }

    fn read_frame(&mut self) -> Result<Option<Snapshot>, TrajectoryIoError> {
        dispatch!(self, r => r.read_frame())
    }

    fn read_frame_at(&mut self, index: usize) -> Result<Option<Snapshot>, TrajectoryIoError> {
        dispatch!(self, r => r.read_frame_at(index))
    }

    fn rewind(&mut self) -> Result<(), TrajectoryIoError> {
        dispatch!(self, r => r.rewind())
    }

    fn is_eof(&mut self) -> Result<bool, TrajectoryIoError> {
        dispatch!(self, r => r.is_eof())
    }
}

/// A file writer for any supported format.
pub enum TrajectoryWriter {
    Dcd(DcdWriter<BufWriter<File>>),
    Pdb(PdbWriter<BufWriter<File>>),
    Xyz(XyzWriter<BufWriter<File>>),
    Trr(TrrWriter<BufWriter<File>>),
}

impl TrajectoryWriter {
    /// Creates `path` with the codec selected by its extension.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TrajectoryIoError> {
        let path = path.as_ref();
        Self::create_as(path, TrajectoryFormat::from_path(path)?)
    }

    /// Creates `path` for `format`. TRR files are written in single precision.
    pub fn create_as(
        path: impl AsRef<Path>,
        format: TrajectoryFormat,
    ) -> Result<Self, TrajectoryIoError> {
        let file = create_file(path.as_ref())?;
        Ok(match format {
            TrajectoryFormat::Dcd => TrajectoryWriter::Dcd(DcdWriter::new(file)),
            TrajectoryFormat::Pdb | TrajectoryFormat::CgPdb => {
                TrajectoryWriter::Pdb(PdbWriter::new(file, format.pdb_flavor()))
            }
            TrajectoryFormat::Xyz => TrajectoryWriter::Xyz(XyzWriter::new(file)),
            TrajectoryFormat::Trr => {
                TrajectoryWriter::Trr(TrrWriter::new(file, TrrPrecision::Single))
            }
        })
    }
}

impl WriteTrajectory for TrajectoryWriter {
    type Error = TrajectoryIoError;

    fn write_header(&mut self, header: &AttributeMap) -> Result<(), TrajectoryIoError> {
        dispatch!(self, w => w.write_header(header))
    }

    fn write_frame(&mut self, snapshot: &Snapshot) -> Result<(), TrajectoryIoError> {
        dispatch!(self, w => w.write_frame(snapshot))
    }

    fn frames_written(&self) -> usize {
        match self {
            Self::Dcd(w) => w.frames_written(),
            Self::Pdb(w) => w.frames_written(),
            Self::Xyz(w) => w.frames_written(),
            Self::Trr(w) => w.frames_written(),
        }
    }

    fn finish(&mut self) -> Result<(), TrajectoryIoError> {
        dispatch!(self, w => w.finish())
    }
}

/// Reads a whole file, repairing `nset` and `nparticle` in its header.
pub fn read_trajectory(path: impl AsRef<Path>) -> Result<Trajectory, TrajectoryIoError> {
    let path = path.as_ref();
    let mut trajectory = TrajectoryReader::open(path)?.read_trajectory()?;
    trajectory.repair_header()?;
    info!(
        path = %path.display(),
        frames = trajectory.len(),
        "Read trajectory."
    );
    Ok(trajectory)
}

/// Writes a whole trajectory with a repaired header; the format follows the
/// extension of `path`.
pub fn write_trajectory(
    path: impl AsRef<Path>,
    trajectory: &Trajectory,
) -> Result<(), TrajectoryIoError> {
    let path = path.as_ref();
    let header = trajectory.repaired_header()?;
    let mut writer = TrajectoryWriter::create(path)?;
    writer.write_header(&header)?;
    for snapshot in trajectory {
        writer.write_frame(snapshot)?;
    }
    writer.finish()?;
    info!(
        path = %path.display(),
        frames = trajectory.len(),
        "Wrote trajectory."
    );
    Ok(())
}
