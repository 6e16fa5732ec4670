#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Jacobi eigenvalue method for real symmetric matrices.
pub mod jacobi;

/// Named operations on 3x3 matrices.
pub mod mat3;
