#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod error;
pub use error::ReduceError;

/// Contiguous index ranges assigned to workers.
pub mod partition;

/// Per-worker covariance accumulation and the coordinator reduction.
pub mod reduce;

pub use partition::Partition;
pub use reduce::{gather_covariance, Covariance, ExecutionStrategy, PartialCovariance, Worker};
