use super::dcd::DcdError;
use super::pdb::PdbError;
use super::trr::TrrError;
use super::xyz::XyzError;
use crate::core::models::snapshot::ParticleCountMismatch;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors of the format-polymorphic reader and writer.
#[derive(Debug, Error)]
pub enum TrajectoryIoError {
    #[error("Unrecognized trajectory file extension: '{}'", .path.display())]
    UnknownFormat { path: PathBuf },
    #[error("Unknown trajectory format '{0}' (expected one of dcd, pdb, cgpdb, xyz, trr)")]
    UnknownFormatName(String),
    #[error("Failed to open '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("DCD error: {0}")]
    Dcd(#[from] DcdError),
    #[error("PDB error: {0}")]
    Pdb(#[from] PdbError),
    #[error("XYZ error: {0}")]
    Xyz(#[from] XyzError),
    #[error("TRR error: {0}")]
    Trr(#[from] TrrError),
    #[error("Inconsistent trajectory: {0}")]
    ParticleCount(#[from] ParticleCountMismatch),
}
