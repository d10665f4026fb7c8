//! Geometry primitives, the symmetric Jacobi eigen-solver and the best-fit
//! superposition engine built on top of them.

pub mod bestfit;
pub mod error;
pub mod geometry;
pub mod jacobi;
