use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MathError {
    #[error("Matrix is not symmetric: element ({row}, {col}) differs from its transpose")]
    NotSymmetric { row: usize, col: usize },

    #[error("Jacobi eigen-solver did not converge after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("Point cloud size mismatch: expected {expected} points, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("Point cloud is empty")]
    EmptyPointCloud,

    #[error("No reference structure has been set")]
    NoReference,

    #[error("Matrix is singular (determinant = {determinant})")]
    SingularMatrix { determinant: f64 },
}
