use thiserror::Error;

/// Errors raised while partitioning and reducing the cross-covariance.
#[derive(Debug, Error, PartialEq)]
pub enum ReduceError {
    /// At least one worker is required.
    #[error("worker count must be > 0, got {0}")]
    InvalidWorkerCount(usize),

    /// A worker index outside `0..num_workers`.
    #[error("worker rank {rank} is out of range for {num_workers} workers")]
    InvalidRank {
        /// The offending rank.
        rank: usize,
        /// The number of workers.
        num_workers: usize,
    },

    /// The correspondence arrays differ in length.
    #[error("correspondence arrays have different lengths: {before} != {after}")]
    LengthMismatch {
        /// Number of points in the "before" array.
        before: usize,
        /// Number of points in the "after" array.
        after: usize,
    },

    /// There are no points to reduce.
    #[error("cannot reduce an empty point set")]
    Empty,

    /// A partition does not fit the point arrays.
    #[error("partition {start}..{end} of worker {rank} exceeds {num_points} points")]
    PartitionOutOfBounds {
        /// The worker rank.
        rank: usize,
        /// First index of the range.
        start: usize,
        /// One past the last index of the range.
        end: usize,
        /// Number of points available.
        num_points: usize,
    },

    /// A worker produced NaN or infinite sums.
    #[error("worker {0} produced a non-finite partial covariance")]
    NonFiniteContribution(usize),

    /// The coordinator did not receive a contribution from every worker.
    #[error("missing contribution from worker {0}")]
    MissingContribution(usize),

    /// The coordinator received two contributions from the same worker.
    #[error("duplicate contribution from worker {0}")]
    DuplicateContribution(usize),

    /// The local thread pool could not be built.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}
