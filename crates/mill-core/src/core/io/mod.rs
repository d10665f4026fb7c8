//! Trajectory file formats.
//!
//! Each codec reads and writes one frame at a time through the
//! [`traits::ReadTrajectory`] and [`traits::WriteTrajectory`] capabilities;
//! [`format`] selects a codec from a file extension.

pub mod binary;
pub mod dcd;
pub mod error;
pub mod format;
pub mod pdb;
mod text;
pub mod traits;
pub mod trr;
pub mod xyz;
