//! # mill
//!
//! Reading, writing and rigid-body manipulation of molecular-dynamics
//! trajectories.
//!
//! The library has two layers:
//!
//! - **[`core`]: The Foundation.** Geometry, the Jacobi eigen-solver and the
//!   best-fit engine ([`core::math`]), the particle/snapshot/trajectory data
//!   model ([`core::models`]), the DCD, PDB, XYZ and TRR codecs
//!   ([`core::io`]) and static lookup tables ([`core::utils`]).
//!
//! - **[`workflows`]: The Public API.** Trajectory-level operations such as
//!   conversion, superposition, splitting and averaging, each streaming
//!   frames from a reader to a writer.

pub mod core;
pub mod workflows;
