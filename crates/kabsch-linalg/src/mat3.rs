//! Helpers for the 3x3 matrices used across the alignment pipeline.
//!
//! Matrices are [`glam::DMat3`] values. glam stores them column-major, so the
//! helpers here that talk in rows (`from_rows`, `to_rows`) exist to keep the
//! row/column convention in one place.

use glam::{DMat3, DVec3};

/// Build a matrix from row-major rows.
///
/// ```
/// use kabsch_linalg::mat3::from_rows;
///
/// let m = from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
/// assert_eq!(m.row(0).x, 1.0);
/// assert_eq!(m.col(0).y, 4.0);
/// ```
pub fn from_rows(rows: &[[f64; 3]; 3]) -> DMat3 {
    DMat3::from_cols_array_2d(rows).transpose()
}

/// Copy a matrix out as row-major rows.
pub fn to_rows(m: &DMat3) -> [[f64; 3]; 3] {
    m.transpose().to_cols_array_2d()
}

/// Outer product `a * b^T`.
#[inline]
pub fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// Symmetric product `A * A^T`.
#[inline]
pub fn aat(a: &DMat3) -> DMat3 {
    a.mul_mat3(&a.transpose())
}

/// Symmetric product `A^T * A`.
#[inline]
pub fn ata(a: &DMat3) -> DMat3 {
    a.transpose().mul_mat3(a)
}

/// Sum of the diagonal elements.
#[inline]
pub fn trace(m: &DMat3) -> f64 {
    m.x_axis.x + m.y_axis.y + m.z_axis.z
}

/// Frobenius norm, the square root of the sum of squared elements.
pub fn frobenius_norm(m: &DMat3) -> f64 {
    (m.x_axis.length_squared() + m.y_axis.length_squared() + m.z_axis.length_squared()).sqrt()
}

/// Largest absolute element-wise difference between two matrices.
pub fn max_abs_diff(a: &DMat3, b: &DMat3) -> f64 {
    let d = *a - *b;
    d.x_axis
        .abs()
        .max(d.y_axis.abs())
        .max(d.z_axis.abs())
        .max_element()
}

/// Frobenius norm of `R * R^T - I`.
///
/// Zero for an orthogonal matrix.
pub fn orthogonality_residual(r: &DMat3) -> f64 {
    frobenius_norm(&(aat(r) - DMat3::IDENTITY))
}

/// Check that `r` is a proper rotation: orthogonal within `tolerance` and with
/// a determinant of +1.
pub fn is_rotation(r: &DMat3, tolerance: f64) -> bool {
    orthogonality_residual(r) < tolerance && (r.determinant() - 1.0).abs() < tolerance
}

/// Check that every element of the matrix is finite.
#[inline]
pub fn is_finite(m: &DMat3) -> bool {
    m.is_finite()
}

/// Convert a matrix to an owned faer matrix.
pub fn to_faer(m: &DMat3) -> faer::Mat<f64> {
    faer::Mat::<f64>::from_fn(3, 3, |i, j| m.col(j)[i])
}

/// Convert the top-left 3x3 block of a faer matrix.
///
/// PRECONDITION: `m` is at least 3x3.
pub fn from_faer(m: &faer::Mat<f64>) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]),
        DVec3::new(m[(0, 1)], m[(1, 1)], m[(2, 1)]),
        DVec3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rows_roundtrip() {
        let rows = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 10.0]];
        let m = from_rows(&rows);
        assert_eq!(m.row(1), DVec3::new(4.0, 5.0, 6.0));
        assert_eq!(m.col(2), DVec3::new(3.0, 6.0, 10.0));
        assert_eq!(to_rows(&m), rows);
    }

    #[test]
    fn test_outer() {
        let m = outer(DVec3::new(1.0, 2.0, 3.0), DVec3::new(4.0, 5.0, 6.0));
        // element (a, b) is a[a] * b[b]
        assert_eq!(
            to_rows(&m),
            [[4.0, 5.0, 6.0], [8.0, 10.0, 12.0], [12.0, 15.0, 18.0]]
        );
    }

    #[test]
    fn test_symmetric_products() {
        let h = from_rows(&[[1.0, 2.0, 0.0], [0.0, 1.0, 3.0], [4.0, 0.0, 1.0]]);
        let aat = aat(&h);
        let ata = ata(&h);

        assert_eq!(aat, aat.transpose());
        assert_eq!(ata, ata.transpose());

        // the two products share the trace ||H||_F^2
        assert_relative_eq!(trace(&aat), trace(&ata), epsilon = 1e-12);
        assert_relative_eq!(trace(&aat), frobenius_norm(&h).powi(2), epsilon = 1e-12);

        assert_eq!(to_rows(&aat)[0], [5.0, 2.0, 4.0]);
        assert_eq!(to_rows(&ata)[0], [17.0, 2.0, 4.0]);
    }

    #[test]
    fn test_is_rotation() {
        let r = DMat3::from_rotation_z(0.3);
        assert!(is_rotation(&r, 1e-12));
        assert_relative_eq!(orthogonality_residual(&r), 0.0, epsilon = 1e-12);

        let reflection = DMat3::from_diagonal(DVec3::new(1.0, 1.0, -1.0));
        assert!(!is_rotation(&reflection, 1e-12));
        assert_relative_eq!(orthogonality_residual(&reflection), 0.0, epsilon = 1e-12);

        let scaled = DMat3::from_diagonal(DVec3::splat(2.0));
        assert!(!is_rotation(&scaled, 1e-6));
    }

    #[test]
    fn test_faer_roundtrip() {
        let m = from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        let f = to_faer(&m);
        assert_eq!(f[(0, 1)], 2.0);
        assert_eq!(f[(2, 0)], 7.0);
        assert_eq!(from_faer(&f), m);
    }

    #[test]
    fn test_max_abs_diff() {
        let a = DMat3::IDENTITY;
        let b = from_rows(&[[1.0, 0.0, 0.0], [0.0, 1.0, -0.5], [0.0, 0.0, 1.0]]);
        assert_eq!(max_abs_diff(&a, &b), 0.5);
    }
}
