use thiserror::Error;

use kabsch_3d::{io::pcd::PcdError, pointset::PointSetError};
use kabsch_dist::ReduceError;

use crate::metrics::MetricError;
use crate::solver::SolveError;

/// The pipeline stage an [`AlignError`] originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading and centering the point clouds.
    Load,
    /// Partitioned cross-covariance reduction.
    Reduction,
    /// Either of the two Jacobi eigensolves.
    Eigensolve,
    /// Rotation and translation assembly.
    Solve,
    /// Error evaluation.
    Evaluate,
}

impl Stage {
    /// A distinct non-zero process exit code for the stage.
    pub fn exit_code(&self) -> u8 {
        match self {
            Stage::Load => 2,
            Stage::Reduction => 3,
            Stage::Eigensolve => 4,
            Stage::Solve => 5,
            Stage::Evaluate => 6,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Reduction => "reduction",
            Stage::Eigensolve => "eigensolve",
            Stage::Solve => "solve",
            Stage::Evaluate => "evaluate",
        };
        write!(f, "{name}")
    }
}

/// Error types for the alignment pipeline.
#[derive(Debug, Error)]
pub enum AlignError {
    /// A point cloud file could not be read.
    #[error(transparent)]
    Pcd(#[from] PcdError),

    /// The point sets are empty, invalid or not paired.
    #[error(transparent)]
    PointSet(#[from] PointSetError),

    /// The covariance reduction failed.
    #[error(transparent)]
    Reduce(#[from] ReduceError),

    /// The eigensolves or the rotation assembly failed.
    #[error(transparent)]
    Solve(#[from] SolveError),

    /// The residual error could not be evaluated.
    #[error(transparent)]
    Metric(#[from] MetricError),
}

impl AlignError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            AlignError::Pcd(_) | AlignError::PointSet(_) => Stage::Load,
            AlignError::Reduce(_) => Stage::Reduction,
            AlignError::Solve(SolveError::Eigensolve { .. }) => Stage::Eigensolve,
            AlignError::Solve(_) => Stage::Solve,
            AlignError::Metric(_) => Stage::Evaluate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kabsch_linalg::jacobi::JacobiError;

    use crate::solver::Product;

    #[test]
    fn test_stage_exit_codes_are_distinct() {
        let stages = [
            Stage::Load,
            Stage::Reduction,
            Stage::Eigensolve,
            Stage::Solve,
            Stage::Evaluate,
        ];
        let mut codes = stages.iter().map(Stage::exit_code).collect::<Vec<_>>();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), stages.len());
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn test_error_stage() {
        let err = AlignError::from(ReduceError::InvalidWorkerCount(0));
        assert_eq!(err.stage(), Stage::Reduction);

        let err = AlignError::from(SolveError::Eigensolve {
            product: Product::Ata,
            source: JacobiError::Empty,
        });
        assert_eq!(err.stage(), Stage::Eigensolve);
        assert_eq!(err.stage().to_string(), "eigensolve");

        let err = AlignError::from(SolveError::NonFiniteCovariance);
        assert_eq!(err.stage(), Stage::Solve);

        let err = AlignError::from(PointSetError::Empty);
        assert_eq!(err.stage().exit_code(), 2);
    }
}
