//! Rigid-body superposition by the quaternion method of Kearsley.
//!
//! Both clouds are moved onto their centroids, a symmetric 4x4 score matrix is
//! built from the sums and differences of corresponding points, and the
//! eigenvector of its smallest eigenvalue is the unit quaternion of the
//! rotation that minimizes the RMSD. The smallest eigenvalue itself is the
//! squared RMSD after superposition.

use super::error::MathError;
use super::geometry::{Matrix3, Matrix4, Vector3};
use super::jacobi::eigen_pairs;

/// A rotation about one centroid followed by a move onto another.
///
/// `apply(p) = rotation * (p - source_centroid) + target_centroid`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Superposition {
    pub rotation: Matrix3,
    pub source_centroid: Vector3,
    pub target_centroid: Vector3,
}

impl Superposition {
    pub fn apply(&self, point: &Vector3) -> Vector3 {
        self.rotation * (point - self.source_centroid) + self.target_centroid
    }

    pub fn apply_all(&self, points: &[Vector3]) -> Vec<Vector3> {
        points.iter().map(|p| self.apply(p)).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Reference {
    centered: Vec<Vector3>,
    centroid: Vector3,
}

/// Best-fit engine holding an optional reference structure.
///
/// The reference is copied in and stored centered on its own centroid; every
/// later fit reads it without modification until [`BestFit::set_reference`]
/// replaces it.
#[derive(Debug, Clone, Default)]
pub struct BestFit {
    reference: Option<Reference>,
}

impl BestFit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(points: &[Vector3]) -> Result<Self, MathError> {
        let mut best_fit = Self::new();
        best_fit.set_reference(points)?;
        Ok(best_fit)
    }

    pub fn set_reference(&mut self, points: &[Vector3]) -> Result<(), MathError> {
        let centroid = zeroing_vector(points)?;
        self.reference = Some(Reference {
            centered: translate_all(points, &(-centroid)),
            centroid,
        });
        Ok(())
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference_centroid(&self) -> Option<Vector3> {
        self.reference.as_ref().map(|r| r.centroid)
    }

    /// Rotation that best superimposes `points` (about their own centroid)
    /// onto the stored reference.
    pub fn rotational_matrix(&self, points: &[Vector3]) -> Result<Matrix3, MathError> {
        let reference = self.reference()?;
        check_sizes(points, &reference.centered)?;
        let centered = translate_all(points, &(-zeroing_vector(points)?));
        optimal_rotation(&centered, &reference.centered).map(|(rotation, _)| rotation)
    }

    pub fn superposition(&self, points: &[Vector3]) -> Result<Superposition, MathError> {
        let rotation = self.rotational_matrix(points)?;
        Ok(Superposition {
            rotation,
            source_centroid: zeroing_vector(points)?,
            target_centroid: self.reference()?.centroid,
        })
    }

    /// `points` rotated onto the reference and moved back into the reference's
    /// original frame.
    pub fn fit(&self, points: &[Vector3]) -> Result<Vec<Vector3>, MathError> {
        Ok(self.superposition(points)?.apply_all(points))
    }

    /// RMSD between `points` and the reference after optimal superposition.
    pub fn rmsd(&self, points: &[Vector3]) -> Result<f64, MathError> {
        let reference = self.reference()?;
        check_sizes(points, &reference.centered)?;
        let centered = translate_all(points, &(-zeroing_vector(points)?));
        let (_, min_eigenvalue) = optimal_rotation(&centered, &reference.centered)?;
        Ok(min_eigenvalue.max(0.0).sqrt())
    }

    fn reference(&self) -> Result<&Reference, MathError> {
        self.reference.as_ref().ok_or(MathError::NoReference)
    }
}

/// Rotation that best superimposes `points` onto `reference`; both clouds are
/// centered internally.
pub fn rotational_matrix(points: &[Vector3], reference: &[Vector3]) -> Result<Matrix3, MathError> {
    check_sizes(points, reference)?;
    let centered = translate_all(points, &(-zeroing_vector(points)?));
    let centered_reference = translate_all(reference, &(-zeroing_vector(reference)?));
    optimal_rotation(&centered, &centered_reference).map(|(rotation, _)| rotation)
}

/// `points` superimposed onto `reference`, placed at the reference centroid.
pub fn fit(points: &[Vector3], reference: &[Vector3]) -> Result<Vec<Vector3>, MathError> {
    let rotation = rotational_matrix(points, reference)?;
    let superposition = Superposition {
        rotation,
        source_centroid: zeroing_vector(points)?,
        target_centroid: zeroing_vector(reference)?,
    };
    Ok(superposition.apply_all(points))
}

/// Arithmetic mean of the point cloud.
pub fn zeroing_vector(points: &[Vector3]) -> Result<Vector3, MathError> {
    super::geometry::centroid(points).ok_or(MathError::EmptyPointCloud)
}

fn check_sizes(points: &[Vector3], reference: &[Vector3]) -> Result<(), MathError> {
    if points.is_empty() || reference.is_empty() {
        return Err(MathError::EmptyPointCloud);
    }
    if points.len() != reference.len() {
        return Err(MathError::SizeMismatch {
            expected: reference.len(),
            found: points.len(),
        });
    }
    Ok(())
}

fn translate_all(points: &[Vector3], offset: &Vector3) -> Vec<Vector3> {
    points.iter().map(|p| p + offset).collect()
}

/// Kearsley score matrix for centered clouds, normalized by point count.
fn score_matrix(target: &[Vector3], reference: &[Vector3]) -> Matrix4 {
    let mut m = Matrix4::zeros();
    for (a, b) in target.iter().zip(reference.iter()) {
        let p = b + a;
        let d = b - a;
        let (xp, yp, zp) = (p.x, p.y, p.z);
        let (xm, ym, zm) = (d.x, d.y, d.z);

        m[(0, 0)] += xm * xm + ym * ym + zm * zm;
        m[(0, 1)] += yp * zm - ym * zp;
        m[(0, 2)] += xm * zp - xp * zm;
        m[(0, 3)] += xp * ym - xm * yp;
        m[(1, 1)] += yp * yp + zp * zp + xm * xm;
        m[(1, 2)] += xm * ym - xp * yp;
        m[(1, 3)] += xm * zm - xp * zp;
        m[(2, 2)] += xp * xp + zp * zp + ym * ym;
        m[(2, 3)] += ym * zm - yp * zp;
        m[(3, 3)] += xp * xp + yp * yp + zm * zm;
    }
    for row in 0..4 {
        for col in 0..row {
            m[(row, col)] = m[(col, row)];
        }
    }
    m / target.len() as f64
}

fn optimal_rotation(
    target: &[Vector3],
    reference: &[Vector3],
) -> Result<(Matrix3, f64), MathError> {
    let pairs = eigen_pairs(&score_matrix(target, reference))?;

    // First minimum found wins; near-degenerate ties are not disambiguated.
    let mut minimum = &pairs[0];
    for pair in &pairs[1..] {
        if pair.value < minimum.value {
            minimum = pair;
        }
    }

    let q = &minimum.vector;
    Ok((quaternion_to_matrix(q[0], q[1], q[2], q[3]), minimum.value))
}

fn quaternion_to_matrix(q0: f64, q1: f64, q2: f64, q3: f64) -> Matrix3 {
    Matrix3::new(
        q0 * q0 + q1 * q1 - q2 * q2 - q3 * q3,
        2.0 * (q1 * q2 + q0 * q3),
        2.0 * (q1 * q3 - q0 * q2),
        2.0 * (q1 * q2 - q0 * q3),
        q0 * q0 - q1 * q1 + q2 * q2 - q3 * q3,
        2.0 * (q2 * q3 + q0 * q1),
        2.0 * (q1 * q3 + q0 * q2),
        2.0 * (q2 * q3 - q0 * q1),
        q0 * q0 - q1 * q1 - q2 * q2 + q3 * q3,
    )
}
