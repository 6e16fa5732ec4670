//! Cross-covariance accumulation split across workers.
//!
//! Every [`Worker`] owns one [`Partition`] of the centered correspondence
//! arrays and sums the outer products `after[i] * before[i]^T` over its range
//! into a [`PartialCovariance`]. The coordinator ([`reduce_partials`]) waits for
//! all partials, adds them element-wise in rank order and divides by the full
//! point count `N`, including the points the partitioning dropped.

use glam::{DMat3, DVec3};
use rayon::prelude::*;

use kabsch_linalg::mat3;

use crate::partition::{dropped_points, partitions, Partition};
use crate::ReduceError;

/// Controls how the workers are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Run every worker one after the other on the current thread.
    Serial,

    /// Run the workers on the global Rayon thread pool.
    #[default]
    Parallel,

    /// Run the workers on a local thread pool with `n` threads.
    ///
    /// # Warning
    /// Creates a new thread pool on every call.
    Fixed(usize),
}

/// The cross-covariance contribution of one worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialCovariance {
    /// Rank of the worker that produced it.
    pub rank: usize,
    /// Unnormalized sum of `after[i] * before[i]^T` over the worker's range.
    pub matrix: DMat3,
    /// Number of point pairs summed.
    pub num_points: usize,
}

/// The aggregate cross-covariance held by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Covariance {
    /// `H = (1 / N) * sum after[i] * before[i]^T`.
    pub matrix: DMat3,
    /// Total number of point pairs `N`, used as the denominator.
    pub num_points: usize,
    /// Number of point pairs that entered the sum.
    pub used_points: usize,
    /// Number of workers that contributed.
    pub num_workers: usize,
}

impl Covariance {
    /// Number of trailing point pairs left out of the sum.
    #[inline]
    pub fn dropped_points(&self) -> usize {
        self.num_points - self.used_points
    }
}

/// Sum of the outer products `after[i] * before[i]^T`.
///
/// Element `(a, b)` of the result is `sum_i after[i][a] * before[i][b]`.
///
/// PRECONDITION: both slices have the same length.
pub fn partial_covariance(before: &[[f64; 3]], after: &[[f64; 3]]) -> DMat3 {
    debug_assert_eq!(before.len(), after.len());
    before
        .iter()
        .zip(after.iter())
        .fold(DMat3::ZERO, |h, (b, a)| {
            h + mat3::outer(DVec3::from_array(*a), DVec3::from_array(*b))
        })
}

/// A worker bound to its partition of the correspondence arrays.
#[derive(Debug, Clone, Copy)]
pub struct Worker<'a> {
    partition: Partition,
    before: &'a [[f64; 3]],
    after: &'a [[f64; 3]],
}

impl<'a> Worker<'a> {
    /// Bind a partition to the point arrays.
    ///
    /// # Errors
    ///
    /// The partition is checked against the arrays here, before any sums are
    /// computed, so a bad range never reaches the reduction.
    pub fn new(
        partition: Partition,
        before: &'a [[f64; 3]],
        after: &'a [[f64; 3]],
    ) -> Result<Self, ReduceError> {
        if before.len() != after.len() {
            return Err(ReduceError::LengthMismatch {
                before: before.len(),
                after: after.len(),
            });
        }
        if partition.start > partition.end || partition.end > before.len() {
            return Err(ReduceError::PartitionOutOfBounds {
                rank: partition.rank,
                start: partition.start,
                end: partition.end,
                num_points: before.len(),
            });
        }
        Ok(Self {
            partition,
            before,
            after,
        })
    }

    /// Get the partition of the worker.
    #[inline]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Accumulate the worker's partial covariance.
    pub fn compute(&self) -> Result<PartialCovariance, ReduceError> {
        let range = self.partition.range();
        let matrix = partial_covariance(&self.before[range.clone()], &self.after[range]);

        if !mat3::is_finite(&matrix) {
            return Err(ReduceError::NonFiniteContribution(self.partition.rank));
        }

        Ok(PartialCovariance {
            rank: self.partition.rank,
            matrix,
            num_points: self.partition.len(),
        })
    }
}

/// Combine the partial covariances at the coordinator.
///
/// Expects exactly one contribution per rank in `0..partials.len()`. The sum
/// runs in rank order whatever order `partials` arrive in, and is divided by
/// `num_points`.
pub fn reduce_partials(
    partials: &[PartialCovariance],
    num_points: usize,
) -> Result<Covariance, ReduceError> {
    if num_points == 0 {
        return Err(ReduceError::Empty);
    }
    let num_workers = partials.len();
    if num_workers == 0 {
        return Err(ReduceError::InvalidWorkerCount(0));
    }

    let mut by_rank: Vec<Option<&PartialCovariance>> = vec![None; num_workers];
    for partial in partials {
        let slot = by_rank
            .get_mut(partial.rank)
            .ok_or(ReduceError::InvalidRank {
                rank: partial.rank,
                num_workers,
            })?;
        if slot.replace(partial).is_some() {
            return Err(ReduceError::DuplicateContribution(partial.rank));
        }
    }

    let mut sum = DMat3::ZERO;
    let mut used_points = 0;
    for (rank, slot) in by_rank.iter().enumerate() {
        let partial = slot.ok_or(ReduceError::MissingContribution(rank))?;
        sum += partial.matrix;
        used_points += partial.num_points;
    }

    Ok(Covariance {
        matrix: sum * (1.0 / num_points as f64),
        num_points,
        used_points,
        num_workers,
    })
}

fn run_workers(
    workers: &[Worker<'_>],
    strategy: ExecutionStrategy,
) -> Result<Vec<PartialCovariance>, ReduceError> {
    match strategy {
        ExecutionStrategy::Serial => workers.iter().map(Worker::compute).collect(),
        ExecutionStrategy::Parallel => workers.par_iter().map(Worker::compute).collect(),
        ExecutionStrategy::Fixed(n) => {
            if n == 0 {
                return Err(ReduceError::ThreadPool(
                    "thread count must be > 0".to_string(),
                ));
            }
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| ReduceError::ThreadPool(e.to_string()))?;

            pool.install(|| workers.par_iter().map(Worker::compute).collect())
        }
    }
}

/// Compute the aggregate cross-covariance of two centered correspondence arrays.
///
/// # Arguments
///
/// * `before` - Centered points of the source cloud.
/// * `after` - Centered points of the target cloud, paired by index with `before`.
/// * `num_workers` - Number of workers the arrays are partitioned across.
/// * `strategy` - How the workers are executed.
///
/// # Returns
///
/// The covariance normalized by the full point count. All workers finish
/// before the coordinator starts combining, and only the coordinator touches
/// the result.
pub fn gather_covariance(
    before: &[[f64; 3]],
    after: &[[f64; 3]],
    num_workers: usize,
    strategy: ExecutionStrategy,
) -> Result<Covariance, ReduceError> {
    if before.len() != after.len() {
        return Err(ReduceError::LengthMismatch {
            before: before.len(),
            after: after.len(),
        });
    }
    if before.is_empty() {
        return Err(ReduceError::Empty);
    }

    let num_points = before.len();
    let workers = partitions(num_points, num_workers)?
        .into_iter()
        .map(|p| Worker::new(p, before, after))
        .collect::<Result<Vec<_>, _>>()?;

    let dropped = dropped_points(num_points, num_workers);
    if num_workers > num_points {
        log::warn!(
            "{} workers for {} points: every partition is empty",
            num_workers,
            num_points
        );
    } else if dropped > 0 {
        log::warn!(
            "{} trailing points are not assigned to any of the {} workers",
            dropped,
            num_workers
        );
    }

    let partials = run_workers(&workers, strategy)?;
    let covariance = reduce_partials(&partials, num_points)?;

    log::debug!(
        "reduced {} partial covariances over {}/{} points",
        covariance.num_workers,
        covariance.used_points,
        covariance.num_points
    );

    Ok(covariance)
}
