//! The coordinator pipeline.
//!
//! `reduce -> eigensolve x2 -> solve -> evaluate`, each stage consuming the
//! previous one's output. A failure up to the solve stops the run. The
//! evaluation runs on a transform that is already final, so its outcome is
//! carried in the result instead.

use std::time::{Duration, Instant};

use kabsch_3d::pointset::{check_correspondence, PointSet};
use kabsch_dist::{gather_covariance, Covariance, ExecutionStrategy};

use crate::error::AlignError;
use crate::metrics::{evaluate_error, ErrorReport, MetricError};
use crate::solver::{solve_rotation, solve_translation, RigidTransform, SolverParams};

/// Configuration of an alignment run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignConfig {
    /// Number of workers the correspondences are partitioned across.
    pub num_workers: usize,
    /// How the workers are executed.
    pub execution: ExecutionStrategy,
    /// Eigensolver and rotation assembly parameters.
    pub solver: SolverParams,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            execution: ExecutionStrategy::default(),
            solver: SolverParams::default(),
        }
    }
}

/// Wall-clock breakdown of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timings {
    /// Reading and centering the inputs.
    pub load: Duration,
    /// Reduction, eigensolves and solve.
    pub compute: Duration,
    /// Everything up to the end of the solve.
    pub total: Duration,
}

impl Timings {
    /// Create a breakdown whose total is `load + compute`.
    pub fn new(load: Duration, compute: Duration) -> Self {
        Self {
            load,
            compute,
            total: load + compute,
        }
    }
}

/// Result of [`align`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    /// The estimated transform, `after = R * before + t`.
    pub transform: RigidTransform,
    /// The aggregate cross-covariance the transform was solved from.
    pub covariance: Covariance,
    /// Residual error of the transform, or why it could not be normalized.
    pub errors: Result<ErrorReport, MetricError>,
    /// Whether `U V^T` came out as a reflection.
    pub reflection_detected: bool,
    /// Time spent from the start of the reduction to the end of the solve.
    pub compute_time: Duration,
}

/// Estimate the rigid transform between two centered, corresponding point sets.
///
/// # Arguments
///
/// * `before` - The source points, centered on their centroid.
/// * `after` - The target points, paired by index with `before`.
/// * `config` - Worker count, execution strategy and solver parameters.
///
/// # Returns
///
/// The transform that maps `before` onto `after`, with its residual error.
///
/// Example:
///
/// ```
/// use kabsch_3d::pointset::PointSet;
/// use kabsch_align::{align, AlignConfig};
///
/// let points = vec![[1.0, 2.0, 3.0], [2.0, 1.0, 5.0], [4.0, 2.0, 2.0], [3.0, 4.0, 1.0]];
/// let before = PointSet::centered(points.clone()).unwrap();
/// let after = PointSet::centered(points).unwrap();
///
/// let result = align(&before, &after, &AlignConfig::default()).unwrap();
/// assert!(result.transform.translation.length() < 1e-9);
/// ```
pub fn align(
    before: &PointSet,
    after: &PointSet,
    config: &AlignConfig,
) -> Result<Alignment, AlignError> {
    let num_points = check_correspondence(before, after)?;
    log::debug!(
        "aligning {} correspondences with {} workers ({:?})",
        num_points,
        config.num_workers,
        config.execution
    );

    let start = Instant::now();

    let covariance = gather_covariance(
        before.points(),
        after.points(),
        config.num_workers,
        config.execution,
    )?;
    log::debug!("reduction took {:?}", start.elapsed());

    let estimate = solve_rotation(&covariance.matrix, &config.solver)?;
    let transform = RigidTransform {
        rotation: estimate.rotation,
        translation: solve_translation(
            &estimate.rotation,
            before.centroid_vec(),
            after.centroid_vec(),
        ),
    };

    let compute_time = start.elapsed();
    log::debug!("reduction and solve took {:?}", compute_time);

    let errors = evaluate_error(&transform, before, after);
    if let Err(err) = &errors {
        log::warn!("transform estimated but not evaluated: {err}");
    }

    Ok(Alignment {
        transform,
        covariance,
        errors,
        reflection_detected: estimate.reflection_detected,
        compute_time,
    })
}
