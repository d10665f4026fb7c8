use super::error::MathError;
use nalgebra::{Rotation3, Unit};

pub type Vector3 = nalgebra::Vector3<f64>;
pub type Matrix3 = nalgebra::Matrix3<f64>;
pub type Matrix4 = nalgebra::Matrix4<f64>;

pub fn dot_product(lhs: &Vector3, rhs: &Vector3) -> f64 {
    lhs.x * rhs.x + lhs.y * rhs.y + lhs.z * rhs.z
}

pub fn cross_product(lhs: &Vector3, rhs: &Vector3) -> Vector3 {
    Vector3::new(
        lhs.y * rhs.z - lhs.z * rhs.y,
        lhs.z * rhs.x - lhs.x * rhs.z,
        lhs.x * rhs.y - lhs.y * rhs.x,
    )
}

pub fn scalar_triple_product(a: &Vector3, b: &Vector3, c: &Vector3) -> f64 {
    dot_product(a, &cross_product(b, c))
}

pub fn length_sq(v: &Vector3) -> f64 {
    dot_product(v, v)
}

pub fn length(v: &Vector3) -> f64 {
    length_sq(v).sqrt()
}

/// Returns `v` scaled to unit length. A zero vector yields NaN components.
pub fn normalize(v: &Vector3) -> Vector3 {
    v / length(v)
}

/// Angle between two vectors in radians.
///
/// The cosine is clamped into `[-1, 1]` before `acos`, since rounding can push
/// the normalized dot product of (anti)parallel vectors slightly past ±1.
pub fn angle(lhs: &Vector3, rhs: &Vector3) -> f64 {
    let cos = dot_product(lhs, rhs) / (length(lhs) * length(rhs));
    cos.clamp(-1.0, 1.0).acos()
}

pub fn determinant(m: &Matrix3) -> f64 {
    m[(0, 0)] * m[(1, 1)] * m[(2, 2)]
        + m[(1, 0)] * m[(2, 1)] * m[(0, 2)]
        + m[(2, 0)] * m[(0, 1)] * m[(1, 2)]
        - m[(2, 0)] * m[(1, 1)] * m[(0, 2)]
        - m[(1, 0)] * m[(0, 1)] * m[(2, 2)]
        - m[(0, 0)] * m[(2, 1)] * m[(1, 2)]
}

/// Inverse of a 3x3 matrix by the explicit cofactor (adjugate) formula.
///
/// No pivoting is performed; only an exactly zero determinant is rejected.
pub fn inverse(m: &Matrix3) -> Result<Matrix3, MathError> {
    let det = determinant(m);
    if det == 0.0 {
        return Err(MathError::SingularMatrix { determinant: det });
    }
    let inv_det = 1.0 / det;
    let adjugate = Matrix3::new(
        m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
        m[(0, 2)] * m[(2, 1)] - m[(0, 1)] * m[(2, 2)],
        m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
        m[(1, 2)] * m[(2, 0)] - m[(1, 0)] * m[(2, 2)],
        m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
        m[(0, 2)] * m[(1, 0)] - m[(0, 0)] * m[(1, 2)],
        m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
        m[(0, 1)] * m[(2, 0)] - m[(0, 0)] * m[(2, 1)],
        m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
    );
    Ok(adjugate * inv_det)
}

pub fn rotation_from_axis_angle(axis: &Vector3, angle_degrees: f64) -> Matrix3 {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
        .into_inner()
}

pub fn centroid(points: &[Vector3]) -> Option<Vector3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p);
    Some(sum / points.len() as f64)
}

pub fn calculate_rmsd(coords1: &[Vector3], coords2: &[Vector3]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn cross_product_is_orthogonal_to_both_operands() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(-4.0, 0.5, 2.5);
        let c = cross_product(&a, &b);
        assert!(f64_approx_equal(dot_product(&a, &c), 0.0));
        assert!(f64_approx_equal(dot_product(&b, &c), 0.0));
        assert_eq!(c, a.cross(&b));
    }

    #[test]
    fn scalar_triple_product_of_unit_axes_is_one() {
        let v = scalar_triple_product(&Vector3::x(), &Vector3::y(), &Vector3::z());
        assert!(f64_approx_equal(v, 1.0));
    }

    #[test]
    fn angle_of_vector_with_itself_is_zero() {
        assert_eq!(angle(&Vector3::x(), &Vector3::x()), 0.0);
        let v = Vector3::new(0.3, -1.7, 2.9);
        assert!(angle(&v, &v) < 1e-7);
        assert!(!angle(&(v * 1e8), &(v * 1e8)).is_nan());
    }

    #[test]
    fn angle_of_antiparallel_vectors_is_pi() {
        let v = Vector3::new(1.0, 1.0, 1.0);
        assert!(f64_approx_equal(angle(&v, &(-v)), std::f64::consts::PI));
    }

    #[test]
    fn normalize_yields_unit_length() {
        let v = Vector3::new(3.0, -4.0, 12.0);
        assert!(f64_approx_equal(length(&normalize(&v)), 1.0));
        assert!(f64_approx_equal(length_sq(&v), 169.0));
    }

    #[test]
    fn determinant_matches_known_value() {
        let m = Matrix3::new(2.0, 0.0, 1.0, 1.0, 3.0, 2.0, 1.0, 1.0, 2.0);
        assert!(f64_approx_equal(determinant(&m), 6.0));
        assert!(f64_approx_equal(determinant(&m), m.determinant()));
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let m = Matrix3::new(4.0, 7.0, 2.0, 3.0, 6.0, 1.0, 2.0, 5.0, 3.0);
        let inv = inverse(&m).unwrap();
        let product = m * inv;
        for i in 0..9 {
            let expected = if i % 4 == 0 { 1.0 } else { 0.0 };
            assert!((product[i] - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn inverse_of_singular_matrix_is_an_error() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0);
        assert_eq!(
            inverse(&m),
            Err(MathError::SingularMatrix { determinant: 0.0 })
        );
    }

    #[test]
    fn element_access_by_row_col_and_linear_index_agree() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        // Linear indexing is column-major.
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[3], 2.0);
        assert_eq!(m.transpose()[(1, 0)], 2.0);
    }

    #[test]
    fn rotation_about_z_maps_x_to_y() {
        let r = rotation_from_axis_angle(&Vector3::z(), 90.0);
        let rotated = r * Vector3::x();
        assert!((rotated - Vector3::y()).norm() < 1e-12);
        assert!(f64_approx_equal(determinant(&r), 1.0));
    }

    #[test]
    fn centroid_of_empty_cloud_is_none() {
        assert!(centroid(&[]).is_none());
        let c = centroid(&[Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 4.0, 6.0)]).unwrap();
        assert_eq!(c, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn rmsd_returns_none_for_mismatched_lengths() {
        let a = vec![Vector3::zeros()];
        let b = vec![Vector3::zeros(), Vector3::x()];
        assert!(calculate_rmsd(&a, &b).is_none());
        let shifted = vec![Vector3::new(1.0, 0.0, 0.0)];
        assert!(f64_approx_equal(calculate_rmsd(&a, &shifted).unwrap(), 1.0));
    }
}
