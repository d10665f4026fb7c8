//! # Core Models Module
//!
//! The in-memory trajectory model shared by every codec and workflow.
//!
//! - [`attributes`] - Dynamically typed, optional attributes with "try" accessors
//! - [`particle`] - A position plus per-particle attributes (names, residues, velocities, ...)
//! - [`snapshot`] - One time frame: a fixed-size particle list, boundary and frame metadata
//! - [`trajectory`] - An ordered list of snapshots plus file-level metadata
//!
//! Readers construct snapshots and hand ownership to the caller frame by frame;
//! nothing in these types is shared between frames.

pub mod attributes;
pub mod particle;
pub mod snapshot;
pub mod trajectory;
