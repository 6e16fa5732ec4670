#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// I/O utilities for reading point clouds.
pub mod io;

/// Rigid transformation of points.
pub mod linalg;

/// Ordered point sets with a centroid.
pub mod pointset;

/// Rotation angle helpers.
pub mod transforms;
