use super::config::ConfigError;
use crate::core::io::error::TrajectoryIoError;
use crate::core::math::error::MathError;
use crate::core::models::snapshot::ParticleCountMismatch;
use crate::core::utils::LookupError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Trajectory I/O failed: {0}")]
    Io(#[from] TrajectoryIoError),

    #[error("Superposition failed: {0}")]
    Math(#[from] MathError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("'{}' has {found} particles per frame, expected {expected}", .path.display())]
    ParticleCountMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("'{}' contains no frames", .path.display())]
    EmptyTrajectory { path: PathBuf },

    #[error("Failed to write table: {0}")]
    Csv(#[from] csv::Error),
}

impl WorkflowError {
    pub(crate) fn particle_count(
        path: impl Into<PathBuf>,
        mismatch: ParticleCountMismatch,
    ) -> Self {
        WorkflowError::ParticleCountMismatch {
            path: path.into(),
            expected: mismatch.expected,
            found: mismatch.found,
        }
    }
}
