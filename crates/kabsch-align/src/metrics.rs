use glam::DVec3;
use serde::Serialize;
use thiserror::Error;

use kabsch_3d::pointset::PointSet;

use crate::solver::RigidTransform;

/// Error types for the error evaluator.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum MetricError {
    /// There are no points to evaluate.
    #[error("cannot evaluate the error of an empty point set")]
    Empty,

    /// The point sets have different lengths.
    #[error("point sets have different lengths: {0} != {1}")]
    LengthMismatch(usize, usize),

    /// A component of the source centroid is zero up to rounding, the normalization is undefined.
    #[error("source centroid has a zero {axis} component, the error normalization is undefined")]
    ZeroCentroidComponent {
        /// The offending axis, `x`, `y` or `z`.
        axis: char,
    },
}

/// Residual of a rigid transform over all correspondences.
///
/// All values are fractions; multiply by 100 for a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ErrorReport {
    /// Mean over the axes of the signed residual sum divided by the source centroid.
    pub global: f64,
    /// Mean over the axes of the absolute residual sum divided by `N` times the source centroid.
    pub point_average: f64,
    /// Signed residual sum per axis divided by the source centroid component.
    pub per_axis_signed: [f64; 3],
    /// Absolute residual sum per axis divided by `N` times the source centroid component.
    pub per_axis_absolute: [f64; 3],
    /// Root mean square of the point residual lengths, in input units.
    pub rms: f64,
}

/// Largest coordinate magnitude of the points in their original frame.
fn max_abs_coordinate(points: &PointSet) -> f64 {
    (0..points.len())
        .map(|i| points.decentered_point(i).abs().max_element())
        .fold(0.0, f64::max)
}

/// Evaluate how well `transform` maps `before` onto `after`.
///
/// Both sets are brought back to their original frame (centroid added) before
/// the transform is applied, so the translation is part of what is measured.
///
/// # Errors
///
/// [`MetricError::ZeroCentroidComponent`] when a source centroid component is
/// within the rounding residue of centering, `f64::EPSILON * N` times the
/// largest coordinate magnitude of the source cloud.
pub fn evaluate_error(
    transform: &RigidTransform,
    before: &PointSet,
    after: &PointSet,
) -> Result<ErrorReport, MetricError> {
    if before.len() != after.len() {
        return Err(MetricError::LengthMismatch(before.len(), after.len()));
    }
    if before.is_empty() {
        return Err(MetricError::Empty);
    }

    let centroid = before.centroid_vec();
    let threshold = f64::EPSILON * before.len() as f64 * max_abs_coordinate(before);
    for (axis, name) in ['x', 'y', 'z'].into_iter().enumerate() {
        if centroid[axis].abs() <= threshold {
            return Err(MetricError::ZeroCentroidComponent { axis: name });
        }
    }

    let (signed, absolute, squared) = (0..before.len()).fold(
        (DVec3::ZERO, DVec3::ZERO, 0.0),
        |(signed, absolute, squared), i| {
            let residual = after.decentered_point(i) - transform.apply(before.decentered_point(i));
            (
                signed + residual,
                absolute + residual.abs(),
                squared + residual.length_squared(),
            )
        },
    );

    let n = before.len() as f64;
    let per_axis_signed = signed / centroid;
    let per_axis_absolute = absolute / (centroid * n);

    let report = ErrorReport {
        global: per_axis_signed.element_sum() / 3.0,
        point_average: per_axis_absolute.element_sum() / 3.0,
        per_axis_signed: per_axis_signed.to_array(),
        per_axis_absolute: per_axis_absolute.to_array(),
        rms: (squared / n).sqrt(),
    };

    log::debug!(
        "global error {:e}, point average error {:e}, rms {:e}",
        report.global,
        report.point_average,
        report.rms
    );

    Ok(report)
}
