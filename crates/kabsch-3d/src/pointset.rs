use glam::DVec3;
use thiserror::Error;

/// Error types for point sets.
#[derive(Debug, Error, PartialEq)]
pub enum PointSetError {
    /// A point set needs at least one point.
    #[error("point set is empty")]
    Empty,

    /// Two corresponding point sets must have the same number of points.
    #[error("point sets have different lengths: {0} != {1}")]
    LengthMismatch(usize, usize),

    /// A coordinate is NaN or infinite.
    #[error("point {0} has a non-finite coordinate")]
    NonFinite(usize),
}

/// An ordered set of points expressed relative to their centroid.
///
/// The point order is significant: point `i` of one set corresponds to point
/// `i` of the other set it is aligned against.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    // The centered points.
    points: Vec<[f64; 3]>,
    // The mean of the points before centering.
    centroid: [f64; 3],
}

impl PointSet {
    /// Create a point set from raw points, subtracting their centroid.
    ///
    /// # Errors
    ///
    /// [`PointSetError::Empty`] if `points` is empty and
    /// [`PointSetError::NonFinite`] if any coordinate is NaN or infinite.
    pub fn centered(mut points: Vec<[f64; 3]>) -> Result<Self, PointSetError> {
        if points.is_empty() {
            return Err(PointSetError::Empty);
        }
        if let Some(i) = points.iter().position(|p| !p.iter().all(|v| v.is_finite())) {
            return Err(PointSetError::NonFinite(i));
        }

        let centroid = compute_centroid(&points);
        for p in points.iter_mut() {
            p[0] -= centroid[0];
            p[1] -= centroid[1];
            p[2] -= centroid[2];
        }

        Ok(Self { points, centroid })
    }

    /// Create a point set from points that are already centered.
    ///
    /// The centering is trusted and not re-checked.
    pub fn from_centered(points: Vec<[f64; 3]>, centroid: [f64; 3]) -> Result<Self, PointSetError> {
        if points.is_empty() {
            return Err(PointSetError::Empty);
        }
        Ok(Self { points, centroid })
    }

    /// Get the number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get the centered points.
    #[inline]
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get the centroid of the original points.
    #[inline]
    pub fn centroid(&self) -> [f64; 3] {
        self.centroid
    }

    /// Get the centroid as a vector.
    #[inline]
    pub fn centroid_vec(&self) -> DVec3 {
        DVec3::from_array(self.centroid)
    }

    /// Get the `i`-th point in its original frame, centroid added back.
    #[inline]
    pub fn decentered_point(&self, i: usize) -> DVec3 {
        DVec3::from_array(self.points[i]) + self.centroid_vec()
    }

    /// Get all points in their original frame.
    pub fn decentered(&self) -> Vec<[f64; 3]> {
        let c = self.centroid;
        self.points
            .iter()
            .map(|p| [p[0] + c[0], p[1] + c[1], p[2] + c[2]])
            .collect()
    }
}

/// Compute the mean of a set of points.
///
/// Returns the origin for an empty slice.
pub fn compute_centroid(points: &[[f64; 3]]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0; 3];
    }
    let sum = points
        .iter()
        .fold(DVec3::ZERO, |acc, p| acc + DVec3::from_array(*p));
    (sum / points.len() as f64).to_array()
}

/// Check that two point sets can be paired index to index.
///
/// Returns the shared number of points.
pub fn check_correspondence(before: &PointSet, after: &PointSet) -> Result<usize, PointSetError> {
    if before.len() != after.len() {
        return Err(PointSetError::LengthMismatch(before.len(), after.len()));
    }
    if before.is_empty() {
        return Err(PointSetError::Empty);
    }
    Ok(before.len())
}
