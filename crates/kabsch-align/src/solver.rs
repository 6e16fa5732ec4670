//! Closed-form rigid transform from the aggregate cross-covariance.
//!
//! With `H = U S V^T` the rotation that best maps the "before" cloud onto the
//! "after" cloud is `R = U V^T`. `U` and `V` come from two independent Jacobi
//! solves, of `H H^T` and `H^T H`. Both eigenbases are sorted by descending
//! eigenvalue so their columns line up, and by default the columns of `U` are
//! then re-derived from `V` as `H v_i / |H v_i|`, which fixes the sign and the
//! choice of basis inside repeated eigenspaces. The translation follows from
//! the centroids: `t = c_after - R c_before`.

use glam::{DMat3, DVec3};
use thiserror::Error;

use kabsch_3d::linalg::transform_point;
use kabsch_linalg::{
    jacobi::{jacobi_eigen3, JacobiError, JacobiParams, SymmetricEigen3},
    mat3,
};

/// `|H v_i|` below this fraction of `|H|_F` is treated as a null direction.
const PAIRING_EPSILON: f64 = 1e-12;

/// Residual norm below which a candidate column is considered dependent.
const DEPENDENCE_EPSILON: f64 = 1e-6;

/// The symmetric product an eigensolve was run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    /// `H H^T`, whose eigenvectors are the left singular vectors `U`.
    Aat,
    /// `H^T H`, whose eigenvectors are the right singular vectors `V`.
    Ata,
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Product::Aat => write!(f, "H*H^T"),
            Product::Ata => write!(f, "H^T*H"),
        }
    }
}

/// Error types for the rotation and translation solver.
#[derive(Debug, Error, PartialEq)]
pub enum SolveError {
    /// The cross-covariance holds NaN or infinite values.
    #[error("cross-covariance contains non-finite values")]
    NonFiniteCovariance,

    /// One of the two eigensolves failed.
    #[error("eigen-decomposition of {product} failed")]
    Eigensolve {
        /// The product being decomposed.
        product: Product,
        /// The eigensolver error.
        #[source]
        source: JacobiError,
    },
}

/// How the columns of `U` are matched with the columns of `V`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnPairing {
    /// Rebuild every column of `U` as `H v_i / |H v_i|`.
    ///
    /// Null directions of `H` fall back to the `H H^T` eigenvectors,
    /// orthogonalized against the columns already fixed.
    #[default]
    Aligned,

    /// Use the two sorted eigenbases as they come out of the solver.
    ///
    /// Only reliable when the eigenvalues are distinct and the eigenvector
    /// signs happen to agree, e.g. for near-identity rotations.
    Independent,
}

/// What to do when `det(U V^T) = -1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReflectionPolicy {
    /// Negate the last column of `U` so the result is a proper rotation.
    #[default]
    Correct,

    /// Keep the reflection.
    Preserve,
}

/// Parameters of the rotation solver.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverParams {
    /// Parameters of both Jacobi eigensolves.
    pub jacobi: JacobiParams,
    /// Column correspondence between `U` and `V`.
    pub pairing: ColumnPairing,
    /// Reflection handling.
    pub reflection: ReflectionPolicy,
}

/// A rotation followed by a translation, `p' = R p + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Rotation matrix.
    pub rotation: DMat3,
    /// Translation vector.
    pub translation: DVec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self {
            rotation: DMat3::IDENTITY,
            translation: DVec3::ZERO,
        }
    }
}

impl RigidTransform {
    /// Transform a single point.
    #[inline]
    pub fn apply(&self, point: DVec3) -> DVec3 {
        transform_point(point, &self.rotation, self.translation)
    }

    /// The rotation as row-major rows.
    pub fn rotation_rows(&self) -> [[f64; 3]; 3] {
        mat3::to_rows(&self.rotation)
    }
}

/// Output of [`solve_rotation`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationEstimate {
    /// The rotation `U V^T`.
    pub rotation: DMat3,
    /// Left singular vectors after pairing and reflection handling.
    pub left: DMat3,
    /// Sorted eigen-decomposition of `H H^T`.
    pub aat: SymmetricEigen3,
    /// Sorted eigen-decomposition of `H^T H`.
    pub ata: SymmetricEigen3,
    /// Whether the raw product had a negative determinant.
    pub reflection_detected: bool,
}

/// Run the two eigensolves on `H H^T` and `H^T H`.
pub fn decompose(
    h: &DMat3,
    params: &JacobiParams,
) -> Result<(SymmetricEigen3, SymmetricEigen3), SolveError> {
    if !mat3::is_finite(h) {
        return Err(SolveError::NonFiniteCovariance);
    }

    let aat = jacobi_eigen3(&mat3::aat(h), params).map_err(|source| SolveError::Eigensolve {
        product: Product::Aat,
        source,
    })?;
    let ata = jacobi_eigen3(&mat3::ata(h), params).map_err(|source| SolveError::Eigensolve {
        product: Product::Ata,
        source,
    })?;

    log::debug!(
        "eigensolves converged in {} and {} rotations, eigenvalues {:?} / {:?}",
        aat.iterations,
        ata.iterations,
        aat.eigenvalues,
        ata.eigenvalues
    );

    Ok((aat, ata))
}

/// Unit component of `candidate` orthogonal to the orthonormal `basis`.
fn orthogonal_component(candidate: DVec3, basis: &[DVec3]) -> Option<DVec3> {
    let norm = candidate.length();
    if !(norm.is_finite() && norm > 0.0) {
        return None;
    }
    let mut residual = candidate / norm;
    for b in basis {
        residual -= *b * b.dot(residual);
    }
    (residual.length() > DEPENDENCE_EPSILON).then(|| residual.normalize())
}

/// Build the columns of `U` that belong to the columns of `V`.
fn pair_columns(h: &DMat3, u: &DMat3, v: &DMat3) -> DMat3 {
    let threshold = PAIRING_EPSILON * mat3::frobenius_norm(h);
    let mut cols = [DVec3::ZERO; 3];

    for i in 0..3 {
        let hv = h.mul_vec3(v.col(i));
        let preferred = match hv.length() > threshold {
            true => hv,
            false => u.col(i),
        };

        cols[i] = std::iter::once(preferred)
            .chain((0..3).map(|k| u.col(k)))
            .find_map(|c| orthogonal_component(c, &cols[..i]))
            .unwrap_or_else(|| u.col(i));
    }

    DMat3::from_cols(cols[0], cols[1], cols[2])
}

/// Estimate the rotation that maps the "before" cloud onto the "after" cloud.
///
/// # Arguments
///
/// * `h` - Aggregate cross-covariance, `H[a][b] = mean(after[a] * before[b])`.
/// * `params` - Eigensolver, pairing and reflection parameters.
///
/// # Errors
///
/// Fails when either eigensolve does not converge. There is no fallback.
pub fn solve_rotation(h: &DMat3, params: &SolverParams) -> Result<RotationEstimate, SolveError> {
    let (aat, ata) = decompose(h, &params.jacobi)?;
    let v = ata.eigenvectors;

    let mut left = match params.pairing {
        ColumnPairing::Aligned => pair_columns(h, &aat.eigenvectors, &v),
        ColumnPairing::Independent => aat.eigenvectors,
    };

    let mut rotation = left * v.transpose();
    let reflection_detected = rotation.determinant() < 0.0;

    if reflection_detected {
        match params.reflection {
            ReflectionPolicy::Correct => {
                log::debug!("det(U V^T) < 0, flipping the last left singular vector");
                left.z_axis = -left.z_axis;
                rotation = left * v.transpose();
            }
            ReflectionPolicy::Preserve => {
                log::warn!("estimated transform is a reflection, det(U V^T) < 0");
            }
        }
    }

    log::debug!(
        "rotation orthogonality residual {:e}",
        mat3::orthogonality_residual(&rotation)
    );

    Ok(RotationEstimate {
        rotation,
        left,
        aat,
        ata,
        reflection_detected,
    })
}

/// Translation that carries the rotated "before" centroid onto the "after" centroid.
#[inline]
pub fn solve_translation(rotation: &DMat3, centroid_before: DVec3, centroid_after: DVec3) -> DVec3 {
    centroid_after - rotation.mul_vec3(centroid_before)
}

/// Estimate the full rigid transform from the cross-covariance and the centroids.
pub fn estimate_transform(
    h: &DMat3,
    centroid_before: DVec3,
    centroid_after: DVec3,
    params: &SolverParams,
) -> Result<RigidTransform, SolveError> {
    let estimate = solve_rotation(h, params)?;
    Ok(RigidTransform {
        rotation: estimate.rotation,
        translation: solve_translation(&estimate.rotation, centroid_before, centroid_after),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kabsch_linalg::mat3::{from_rows, is_rotation, max_abs_diff, outer};

    /// Cross-covariance of a cloud mapped by `r`, with per-axis spreads.
    fn covariance_of(r: &DMat3, points: &[DVec3]) -> DMat3 {
        let h = points
            .iter()
            .fold(DMat3::ZERO, |h, p| h + outer(*r * *p, *p));
        h * (1.0 / points.len() as f64)
    }

    fn anisotropic_points() -> Vec<DVec3> {
        let mut points = Vec::new();
        for (i, s) in [3.0, 2.0, 1.0].iter().enumerate() {
            let mut axis = DVec3::ZERO;
            axis[i] = *s;
            points.push(axis);
            points.push(-axis);
        }
        points.push(DVec3::new(0.3, -0.2, 0.1));
        points.push(DVec3::new(-0.3, 0.2, -0.1));
        points
    }

    #[test]
    fn test_solve_rotation_identity() -> Result<(), SolveError> {
        let h = covariance_of(&DMat3::IDENTITY, &anisotropic_points());
        for pairing in [ColumnPairing::Aligned, ColumnPairing::Independent] {
            let params = SolverParams {
                pairing,
                ..Default::default()
            };
            let estimate = solve_rotation(&h, &params)?;
            assert!(max_abs_diff(&estimate.rotation, &DMat3::IDENTITY) < 1e-12);
            assert!(!estimate.reflection_detected);
        }
        Ok(())
    }

    #[test]
    fn test_solve_rotation_recovers_known() -> Result<(), Box<dyn std::error::Error>> {
        let r0 = DMat3::from_axis_angle(DVec3::new(0.2, -1.0, 0.7).normalize(), 2.1);
        let h = covariance_of(&r0, &anisotropic_points());
        let estimate = solve_rotation(&h, &SolverParams::default())?;
        assert!(max_abs_diff(&estimate.rotation, &r0) < 1e-10);
        assert!(is_rotation(&estimate.rotation, 1e-10));
        Ok(())
    }

    #[test]
    fn test_solve_rotation_isotropic_cloud() -> Result<(), SolveError> {
        // H^T H is a multiple of the identity, every basis is an eigenbasis
        let r0 = DMat3::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let points = [
            DVec3::X,
            -DVec3::X,
            DVec3::Y,
            -DVec3::Y,
            DVec3::Z,
            -DVec3::Z,
        ];
        let h = covariance_of(&r0, &points);
        let estimate = solve_rotation(&h, &SolverParams::default())?;
        assert!(max_abs_diff(&estimate.rotation, &r0) < 1e-12);
        Ok(())
    }

    #[test]
    fn test_solve_rotation_planar_cloud() -> Result<(), Box<dyn std::error::Error>> {
        // rank 2 covariance, the third column comes from the H H^T solve
        let r0 = DMat3::from_axis_angle(DVec3::new(1.0, 1.0, 0.0).normalize(), 0.6);
        let points = [
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(-2.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, -1.0, 0.0),
            DVec3::new(0.5, 0.5, 0.0),
            DVec3::new(-0.5, -0.5, 0.0),
        ];
        let h = covariance_of(&r0, &points);
        let estimate = solve_rotation(&h, &SolverParams::default())?;
        assert!(is_rotation(&estimate.rotation, 1e-10));
        assert!(max_abs_diff(&estimate.rotation, &r0) < 1e-9);
        Ok(())
    }

    #[test]
    fn test_reflection_policy() -> Result<(), SolveError> {
        // a mirrored cloud: "after" is "before" with z negated
        let mirror = DMat3::from_diagonal(DVec3::new(1.0, 1.0, -1.0));
        let h = covariance_of(&mirror, &anisotropic_points());

        let corrected = solve_rotation(&h, &SolverParams::default())?;
        assert!(corrected.reflection_detected);
        assert_relative_eq!(corrected.rotation.determinant(), 1.0, epsilon = 1e-12);

        let preserved = solve_rotation(
            &h,
            &SolverParams {
                reflection: ReflectionPolicy::Preserve,
                ..Default::default()
            },
        )?;
        assert!(preserved.reflection_detected);
        assert_relative_eq!(preserved.rotation.determinant(), -1.0, epsilon = 1e-12);
        assert!(max_abs_diff(&preserved.rotation, &mirror) < 1e-12);
        Ok(())
    }

    #[test]
    fn test_zero_covariance_gives_identity() -> Result<(), SolveError> {
        let estimate = solve_rotation(&DMat3::ZERO, &SolverParams::default())?;
        assert_eq!(estimate.rotation, DMat3::IDENTITY);
        Ok(())
    }

    #[test]
    fn test_eigensolve_failure_propagates() {
        let h = from_rows(&[[1.0, 2.0, 0.5], [0.3, 1.0, 2.0], [4.0, 0.2, 1.0]]);
        let params = SolverParams {
            jacobi: JacobiParams {
                max_iterations: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            solve_rotation(&h, &params),
            Err(SolveError::Eigensolve {
                product: Product::Aat,
                source: JacobiError::NotConverged { .. }
            })
        ));
    }

    #[test]
    fn test_non_finite_covariance() {
        let h = DMat3::from_diagonal(DVec3::new(1.0, f64::NAN, 1.0));
        assert_eq!(
            solve_rotation(&h, &SolverParams::default()).err(),
            Some(SolveError::NonFiniteCovariance)
        );
    }

    #[test]
    fn test_solve_translation() {
        let r = DMat3::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let t = solve_translation(&r, DVec3::new(1.0, 0.0, 0.0), DVec3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(t.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(t.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rigid_transform_apply() {
        let transform = RigidTransform {
            rotation: DMat3::from_rotation_z(std::f64::consts::FRAC_PI_2),
            translation: DVec3::new(1.0, 0.0, 0.0),
        };
        let p = transform.apply(DVec3::new(1.0, 0.0, 2.0));
        assert!((p - DVec3::new(1.0, 1.0, 2.0)).length() < 1e-12);
        assert_eq!(RigidTransform::default().apply(p), p);
    }
}
