#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod error;
pub use error::{AlignError, Stage};

/// Residual error of an estimated transform.
pub mod metrics;

/// Reduction, eigensolves, solve and evaluation in one call.
pub mod pipeline;

/// Textual and serializable alignment report.
pub mod report;

/// Closed-form rotation and translation from the cross-covariance.
pub mod solver;

pub use pipeline::{align, AlignConfig, Alignment, Timings};
pub use solver::{ColumnPairing, ReflectionPolicy, RigidTransform, SolverParams};
