//! Static block partitioning of the correspondence arrays.
//!
//! Worker `r` of `W` owns the half-open range `[r * c, (r + 1) * c)` with
//! `c = floor(N / W)`. The `N mod W` trailing points belong to no worker and do
//! not enter the covariance. When `W > N` every range is empty.

use std::ops::Range;

use crate::ReduceError;

/// The index range owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Worker index in `0..num_workers`.
    pub rank: usize,
    /// Total number of workers.
    pub num_workers: usize,
    /// First point index owned by the worker.
    pub start: usize,
    /// One past the last point index owned by the worker.
    pub end: usize,
}

impl Partition {
    /// Compute the range of worker `rank` for `num_points` points.
    pub fn for_worker(
        rank: usize,
        num_workers: usize,
        num_points: usize,
    ) -> Result<Self, ReduceError> {
        if num_workers == 0 {
            return Err(ReduceError::InvalidWorkerCount(num_workers));
        }
        if rank >= num_workers {
            return Err(ReduceError::InvalidRank { rank, num_workers });
        }

        let chunk = chunk_size(num_points, num_workers);
        Ok(Self {
            rank,
            num_workers,
            start: rank * chunk,
            end: (rank + 1) * chunk,
        })
    }

    /// Get the number of points in the range.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the range is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Get the range as a slice index.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Number of points per worker, `floor(num_points / num_workers)`.
///
/// PRECONDITION: `num_workers > 0`.
#[inline]
pub fn chunk_size(num_points: usize, num_workers: usize) -> usize {
    num_points / num_workers
}

/// Number of trailing points no worker is assigned.
///
/// PRECONDITION: `num_workers > 0`.
#[inline]
pub fn dropped_points(num_points: usize, num_workers: usize) -> usize {
    num_points - chunk_size(num_points, num_workers) * num_workers
}

/// Partitions of all workers, ordered by rank.
pub fn partitions(num_points: usize, num_workers: usize) -> Result<Vec<Partition>, ReduceError> {
    (0..num_workers)
        .map(|rank| Partition::for_worker(rank, num_workers, num_points))
        .collect::<Result<Vec<_>, _>>()
        .and_then(|parts| match parts.is_empty() {
            true => Err(ReduceError::InvalidWorkerCount(num_workers)),
            false => Ok(parts),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions_even() -> Result<(), ReduceError> {
        let parts = partitions(12, 4)?;
        assert_eq!(parts.len(), 4);
        for (r, p) in parts.iter().enumerate() {
            assert_eq!(p.rank, r);
            assert_eq!(p.range(), 3 * r..3 * (r + 1));
            assert_eq!(p.len(), 3);
        }
        assert_eq!(dropped_points(12, 4), 0);
        Ok(())
    }

    #[test]
    fn test_partitions_drop_remainder() -> Result<(), ReduceError> {
        let parts = partitions(10, 3)?;
        assert_eq!(
            parts.iter().map(Partition::range).collect::<Vec<_>>(),
            vec![0..3, 3..6, 6..9]
        );
        // the last point belongs to no worker
        assert_eq!(dropped_points(10, 3), 1);
        assert!(parts.iter().all(|p| p.end <= 9));
        Ok(())
    }

    #[test]
    fn test_partitions_more_workers_than_points() -> Result<(), ReduceError> {
        let parts = partitions(3, 5)?;
        assert_eq!(parts.len(), 5);
        assert!(parts.iter().all(Partition::is_empty));
        assert_eq!(dropped_points(3, 5), 3);
        Ok(())
    }

    #[test]
    fn test_partitions_one_point_per_worker() -> Result<(), ReduceError> {
        let parts = partitions(6, 6)?;
        assert!(parts.iter().all(|p| p.len() == 1));
        assert_eq!(dropped_points(6, 6), 0);
        Ok(())
    }

    #[test]
    fn test_partition_errors() {
        assert_eq!(
            Partition::for_worker(0, 0, 10),
            Err(ReduceError::InvalidWorkerCount(0))
        );
        assert_eq!(
            Partition::for_worker(4, 4, 10),
            Err(ReduceError::InvalidRank {
                rank: 4,
                num_workers: 4
            })
        );
        assert_eq!(partitions(10, 0), Err(ReduceError::InvalidWorkerCount(0)));
    }
}
