//! Classical Jacobi eigenvalue algorithm for real symmetric matrices.
//!
//! Each step picks the largest off-diagonal element `a[p][q]`, builds the plane
//! rotation that annihilates it, and applies the rotation to both sides of the
//! working matrix and to the right of an accumulated eigenvector matrix that
//! starts as the identity:
//!
//! ```text
//! A <- J^T A J,   V <- V J
//! ```
//!
//! The iteration stops when the off-diagonal energy `sum_{i != j} a[i][j]^2`
//! drops to the tolerance. On return the columns of `V` are orthonormal
//! eigenvectors and the diagonal of `A` holds the matching eigenvalues.
//!
//! # Example
//!
//! ```
//! use kabsch_linalg::jacobi::{jacobi_eigen, JacobiParams};
//!
//! let a = faer::mat![[2.0, 1.0], [1.0, 2.0]];
//! let mut eig = jacobi_eigen(&a, &JacobiParams::default()).unwrap();
//! eig.sort_descending();
//! assert!((eig.eigenvalues()[0] - 3.0).abs() < 1e-12);
//! assert!((eig.eigenvalues()[1] - 1.0).abs() < 1e-12);
//! ```

use glam::{DMat3, DVec3};
use thiserror::Error;

use crate::mat3;

/// Relative tolerance used to decide whether the input is symmetric.
const SYMMETRY_EPSILON: f64 = 1e-9;

/// Error types for the Jacobi eigensolver.
#[derive(Debug, Error, PartialEq)]
pub enum JacobiError {
    /// The input matrix has no elements.
    #[error("cannot decompose an empty matrix")]
    Empty,

    /// The input matrix is not square.
    #[error("matrix must be square, got {rows}x{cols}")]
    NotSquare {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },

    /// The input matrix is not symmetric.
    #[error("matrix is not symmetric at ({row}, {col}): difference {diff:e}")]
    NotSymmetric {
        /// Row of the offending element.
        row: usize,
        /// Column of the offending element.
        col: usize,
        /// Absolute difference between `a[row][col]` and `a[col][row]`.
        diff: f64,
    },

    /// The input matrix holds NaN or infinite values.
    #[error("matrix contains non-finite values")]
    NonFinite,

    /// The rotation budget ran out before the off-diagonal energy reached the tolerance.
    #[error(
        "no convergence after {iterations} rotations: off-diagonal energy {off_diagonal:e} > {threshold:e}"
    )]
    NotConverged {
        /// Number of rotations applied.
        iterations: usize,
        /// Remaining off-diagonal energy.
        off_diagonal: f64,
        /// Energy threshold that had to be reached.
        threshold: f64,
    },
}

/// How the tolerance is compared against the off-diagonal energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToleranceMode {
    /// Stop when `off(A) <= tolerance * ||A||_F^2`.
    ///
    /// Scale free, so clouds in millimetres and kilometres behave the same.
    #[default]
    Relative,

    /// Stop when `off(A) <= tolerance`.
    Absolute,
}

/// Parameters of the Jacobi eigensolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobiParams {
    /// Threshold on the sum of squared off-diagonal elements.
    pub tolerance: f64,
    /// Maximum number of plane rotations.
    pub max_iterations: usize,
    /// Interpretation of `tolerance`.
    pub mode: ToleranceMode,
}

impl Default for JacobiParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-20,
            max_iterations: 1000,
            mode: ToleranceMode::Relative,
        }
    }
}

impl JacobiParams {
    /// Absolute tolerance of `1e-10` with 1000 rotations.
    pub fn absolute() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 1000,
            mode: ToleranceMode::Absolute,
        }
    }
}

/// Eigen-decomposition of a symmetric n x n matrix.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Orthonormal eigenvectors stored as columns.
    eigenvectors: faer::Mat<f64>,
    /// Eigenvalues, `eigenvalues[i]` belongs to column `i`.
    eigenvalues: Vec<f64>,
    /// Number of rotations applied.
    iterations: usize,
}

impl SymmetricEigen {
    /// Get the eigenvector matrix, one eigenvector per column.
    #[inline]
    pub fn eigenvectors(&self) -> &faer::Mat<f64> {
        &self.eigenvectors
    }

    /// Get the eigenvalues.
    #[inline]
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Get the number of rotations the solver applied.
    #[inline]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Order the eigenpairs by descending eigenvalue and fix the sign of every eigenvector.
    ///
    /// The sort is stable: equal eigenvalues keep the order the solver produced.
    /// After sorting, each column is negated if needed so that its component of
    /// largest magnitude is positive (the first one wins on ties).
    pub fn sort_descending(&mut self) {
        let n = self.eigenvalues.len();
        let mut order = (0..n).collect::<Vec<_>>();
        order.sort_by(|&i, &j| self.eigenvalues[j].total_cmp(&self.eigenvalues[i]));

        let eigenvalues = order.iter().map(|&k| self.eigenvalues[k]).collect::<Vec<_>>();
        let mut eigenvectors =
            faer::Mat::<f64>::from_fn(n, n, |i, j| self.eigenvectors[(i, order[j])]);

        for j in 0..n {
            let mut pivot = 0;
            for i in 1..n {
                if eigenvectors[(i, j)].abs() > eigenvectors[(pivot, j)].abs() {
                    pivot = i;
                }
            }
            if eigenvectors[(pivot, j)] < 0.0 {
                for i in 0..n {
                    eigenvectors[(i, j)] = -eigenvectors[(i, j)];
                }
            }
        }

        self.eigenvalues = eigenvalues;
        self.eigenvectors = eigenvectors;
    }
}

/// Eigen-decomposition of a symmetric 3x3 matrix, sorted by descending eigenvalue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricEigen3 {
    /// Orthonormal eigenvectors stored as columns.
    pub eigenvectors: DMat3,
    /// Eigenvalues, `eigenvalues[i]` belongs to column `i`.
    pub eigenvalues: DVec3,
    /// Number of rotations applied.
    pub iterations: usize,
}

/// Sum of squared off-diagonal elements.
pub fn off_diagonal_energy(a: &faer::Mat<f64>) -> f64 {
    let n = a.nrows();
    let mut energy = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                energy += a[(i, j)] * a[(i, j)];
            }
        }
    }
    energy
}

/// Locate the off-diagonal element of largest magnitude in the upper triangle.
fn largest_off_diagonal(a: &faer::Mat<f64>) -> (usize, usize) {
    let n = a.nrows();
    let (mut p, mut q) = (0, 1);
    let mut largest = -1.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let v = a[(i, j)].abs();
            if v > largest {
                largest = v;
                p = i;
                q = j;
            }
        }
    }
    (p, q)
}

/// Cosine and sine of the rotation that zeroes `a[p][q]`.
///
/// Uses the smaller root of `t^2 + 2 t theta - 1 = 0` so the rotation angle
/// stays within [-pi/4, pi/4].
#[inline]
fn rotation_angle(a_pp: f64, a_qq: f64, a_pq: f64) -> (f64, f64) {
    let theta = (a_qq - a_pp) / (2.0 * a_pq);
    let t = theta.signum() / (theta.abs() + theta.hypot(1.0));
    let c = 1.0 / t.hypot(1.0);
    (c, t * c)
}

/// Apply `A <- J^T A J` and `V <- V J` for the rotation in the (p, q) plane.
fn rotate(a: &mut faer::Mat<f64>, v: &mut faer::Mat<f64>, p: usize, q: usize, c: f64, s: f64) {
    let n = a.nrows();

    // A J: mixes columns p and q
    for k in 0..n {
        let a_kp = a[(k, p)];
        let a_kq = a[(k, q)];
        a[(k, p)] = c * a_kp - s * a_kq;
        a[(k, q)] = s * a_kp + c * a_kq;
    }

    // J^T (A J): mixes rows p and q
    for k in 0..n {
        let a_pk = a[(p, k)];
        let a_qk = a[(q, k)];
        a[(p, k)] = c * a_pk - s * a_qk;
        a[(q, k)] = s * a_pk + c * a_qk;
    }

    // the pivot is zero analytically, drop the rounding residue
    a[(p, q)] = 0.0;
    a[(q, p)] = 0.0;

    for k in 0..n {
        let v_kp = v[(k, p)];
        let v_kq = v[(k, q)];
        v[(k, p)] = c * v_kp - s * v_kq;
        v[(k, q)] = s * v_kp + c * v_kq;
    }
}

fn validate(a: &faer::Mat<f64>) -> Result<(), JacobiError> {
    let (rows, cols) = (a.nrows(), a.ncols());
    if rows != cols {
        return Err(JacobiError::NotSquare { rows, cols });
    }
    if rows == 0 {
        return Err(JacobiError::Empty);
    }

    let mut scale = 0.0f64;
    for i in 0..rows {
        for j in 0..cols {
            let v = a[(i, j)];
            if !v.is_finite() {
                return Err(JacobiError::NonFinite);
            }
            scale = scale.max(v.abs());
        }
    }

    for i in 0..rows {
        for j in (i + 1)..cols {
            let diff = (a[(i, j)] - a[(j, i)]).abs();
            if diff > SYMMETRY_EPSILON * scale.max(1.0) {
                return Err(JacobiError::NotSymmetric {
                    row: i,
                    col: j,
                    diff,
                });
            }
        }
    }

    Ok(())
}

/// Compute the eigenvalues and eigenvectors of a real symmetric matrix.
///
/// # Arguments
///
/// * `a` - A symmetric n x n matrix.
/// * `params` - Tolerance and rotation budget.
///
/// # Returns
///
/// The eigenvectors as the columns of an orthonormal matrix and the eigenvalues
/// read off the final diagonal. The eigenpairs come out in solver order, call
/// [`SymmetricEigen::sort_descending`] for a canonical order.
///
/// # Errors
///
/// [`JacobiError::NotConverged`] when `params.max_iterations` rotations leave
/// the off-diagonal energy above the threshold. There is no partial result.
pub fn jacobi_eigen(
    a: &faer::Mat<f64>,
    params: &JacobiParams,
) -> Result<SymmetricEigen, JacobiError> {
    validate(a)?;

    let n = a.nrows();
    let mut work = a.clone();
    let mut v = faer::Mat::<f64>::identity(n, n);

    let threshold = match params.mode {
        ToleranceMode::Absolute => params.tolerance,
        ToleranceMode::Relative => {
            let norm_sq = (0..n)
                .flat_map(|i| (0..n).map(move |j| (i, j)))
                .map(|(i, j)| a[(i, j)] * a[(i, j)])
                .sum::<f64>();
            params.tolerance * norm_sq
        }
    };

    let mut iterations = 0;
    let mut off_diagonal = off_diagonal_energy(&work);

    while off_diagonal > threshold {
        if iterations == params.max_iterations {
            return Err(JacobiError::NotConverged {
                iterations,
                off_diagonal,
                threshold,
            });
        }

        let (p, q) = largest_off_diagonal(&work);
        let (c, s) = rotation_angle(work[(p, p)], work[(q, q)], work[(p, q)]);
        rotate(&mut work, &mut v, p, q, c, s);

        iterations += 1;
        off_diagonal = off_diagonal_energy(&work);
    }

    log::trace!(
        "jacobi converged after {} rotations, off-diagonal energy {:e}",
        iterations,
        off_diagonal
    );

    Ok(SymmetricEigen {
        eigenvectors: v,
        eigenvalues: (0..n).map(|i| work[(i, i)]).collect(),
        iterations,
    })
}

/// Eigen-decomposition of a symmetric 3x3 matrix.
///
/// Runs [`jacobi_eigen`] and sorts the result with
/// [`SymmetricEigen::sort_descending`], so column 0 holds the largest eigenvalue.
pub fn jacobi_eigen3(a: &DMat3, params: &JacobiParams) -> Result<SymmetricEigen3, JacobiError> {
    let mut eig = jacobi_eigen(&mat3::to_faer(a), params)?;
    eig.sort_descending();

    let values = eig.eigenvalues();
    Ok(SymmetricEigen3 {
        eigenvectors: mat3::from_faer(eig.eigenvectors()),
        eigenvalues: DVec3::new(values[0], values[1], values[2]),
        iterations: eig.iterations(),
    })
}
