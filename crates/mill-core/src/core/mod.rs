//! # Core Module
//!
//! Building blocks shared by every trajectory operation.
//!
//! - **Math** ([`math`]) - Vector/matrix helpers, the symmetric Jacobi
//!   eigen-solver and quaternion best-fit superposition
//! - **Data model** ([`models`]) - Particles, snapshots and trajectories with
//!   open-ended attribute maps
//! - **File I/O** ([`io`]) - Frame-at-a-time codecs behind a common reader and
//!   writer interface, selected by file extension
//! - **Lookup tables** ([`utils`]) - Residue codes and element masses

pub mod io;
pub mod math;
pub mod models;
pub mod utils;
