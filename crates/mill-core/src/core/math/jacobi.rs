//! Cyclic Jacobi eigen-solver for small real symmetric matrices.
//!
//! Each iteration zeroes the largest off-diagonal element with a plane rotation
//! `P^T A P` and accumulates the rotations into the eigenvector matrix. The
//! solver is used on the 4x4 quaternion score matrix of the best-fit engine, but
//! works for any fixed dimension.

use super::error::MathError;
use nalgebra::{SMatrix, SVector};

pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;
pub const DEFAULT_ABSOLUTE_TOLERANCE: f64 = 1e-14;
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-14;
const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// One eigenvalue and its (unit) eigenvector.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenPair<const N: usize> {
    pub value: f64,
    pub vector: SVector<f64, N>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobiSolver {
    pub max_iterations: usize,
    /// Off-diagonal magnitude below which the matrix counts as diagonal.
    pub absolute_tolerance: f64,
    /// Largest relative change of the diagonal between iterations that still
    /// counts as progress.
    pub relative_tolerance: f64,
}

impl Default for JacobiSolver {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            absolute_tolerance: DEFAULT_ABSOLUTE_TOLERANCE,
            relative_tolerance: DEFAULT_RELATIVE_TOLERANCE,
        }
    }
}

impl JacobiSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Computes all eigenpairs of `matrix`.
    ///
    /// The pairs are returned in diagonal order of the converged matrix; no
    /// sorting is applied, so callers that need the extremal pair scan for it.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::NotSymmetric`] if the input is not symmetric within a
    /// relative tolerance, and [`MathError::NoConvergence`] if the iteration cap
    /// is exhausted.
    pub fn solve<const N: usize>(
        &self,
        matrix: &SMatrix<f64, N, N>,
    ) -> Result<Vec<EigenPair<N>>, MathError> {
        check_symmetric(matrix)?;

        let mut a = *matrix;
        let mut eigenvectors = SMatrix::<f64, N, N>::identity();
        let mut previous_diagonal = a.diagonal();

        for _ in 0..self.max_iterations {
            let Some((i, j)) = largest_off_diagonal(&a, self.absolute_tolerance) else {
                return Ok(collect_pairs(&a, &eigenvectors));
            };

            let rotation = jacobi_rotation(&a, i, j);
            a = rotation.transpose() * a * rotation;
            a[(i, j)] = 0.0;
            a[(j, i)] = 0.0;
            eigenvectors *= rotation;

            let diagonal = a.diagonal();
            if max_relative_change(&previous_diagonal, &diagonal) < self.relative_tolerance {
                return Ok(collect_pairs(&a, &eigenvectors));
            }
            previous_diagonal = diagonal;
        }

        Err(MathError::NoConvergence {
            iterations: self.max_iterations,
        })
    }
}

/// Solves with the default iteration cap and tolerances.
pub fn eigen_pairs<const N: usize>(
    matrix: &SMatrix<f64, N, N>,
) -> Result<Vec<EigenPair<N>>, MathError> {
    JacobiSolver::default().solve(matrix)
}

fn check_symmetric<const N: usize>(matrix: &SMatrix<f64, N, N>) -> Result<(), MathError> {
    for row in 0..N {
        for col in (row + 1)..N {
            let upper = matrix[(row, col)];
            let lower = matrix[(col, row)];
            let scale = upper.abs().max(lower.abs());
            if (upper - lower).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(MathError::NotSymmetric { row, col });
            }
        }
    }
    Ok(())
}

fn largest_off_diagonal<const N: usize>(
    a: &SMatrix<f64, N, N>,
    tolerance: f64,
) -> Option<(usize, usize)> {
    let mut largest = 0.0;
    let mut position = None;
    for row in 0..N {
        for col in (row + 1)..N {
            let magnitude = a[(row, col)].abs();
            if magnitude > largest {
                largest = magnitude;
                position = Some((row, col));
            }
        }
    }
    if largest < tolerance { None } else { position }
}

fn jacobi_rotation<const N: usize>(
    a: &SMatrix<f64, N, N>,
    i: usize,
    j: usize,
) -> SMatrix<f64, N, N> {
    let alpha = (a[(i, i)] - a[(j, j)]) / 2.0;
    let beta = -a[(i, j)];
    let gamma = alpha.abs() / (alpha * alpha + beta * beta).sqrt();

    // sign(0) is taken as +1 so that equal diagonal entries still rotate by 45°.
    let sign = if alpha * beta < 0.0 { -1.0 } else { 1.0 };
    let cos_t = (0.5 + 0.5 * gamma).sqrt();
    let sin_t = sign * (0.5 - 0.5 * gamma).sqrt();

    let mut rotation = SMatrix::<f64, N, N>::identity();
    rotation[(i, i)] = cos_t;
    rotation[(j, j)] = cos_t;
    rotation[(i, j)] = sin_t;
    rotation[(j, i)] = -sin_t;
    rotation
}

fn max_relative_change<const N: usize>(
    previous: &SVector<f64, N>,
    current: &SVector<f64, N>,
) -> f64 {
    previous
        .iter()
        .zip(current.iter())
        .map(|(&old, &new)| {
            if old == 0.0 {
                (new - old).abs()
            } else {
                ((new - old) / old).abs()
            }
        })
        .fold(0.0, f64::max)
}

fn collect_pairs<const N: usize>(
    diagonalized: &SMatrix<f64, N, N>,
    eigenvectors: &SMatrix<f64, N, N>,
) -> Vec<EigenPair<N>> {
    (0..N)
        .map(|k| EigenPair {
            value: diagonalized[(k, k)],
            vector: eigenvectors.column(k).into_owned(),
        })
        .collect()
}
