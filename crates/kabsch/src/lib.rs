#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use kabsch_linalg as linalg;

#[doc(inline)]
pub use kabsch_3d as k3d;

#[doc(inline)]
pub use kabsch_dist as dist;

#[doc(inline)]
pub use kabsch_align as align;
