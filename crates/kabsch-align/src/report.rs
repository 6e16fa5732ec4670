use std::fmt;

use serde::Serialize;

use kabsch_3d::transforms::rotation_angle;

use crate::pipeline::{Alignment, Timings};

/// The printable outcome of an alignment run.
///
/// `Display` renders the rotation row by row, the translation one component
/// per line, the timing breakdown and both error figures in percent. When the
/// errors could not be normalized the error lines carry the reason instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentReport {
    /// Rotation rows.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
    /// Rotation angle of `R` in degrees.
    pub rotation_angle_degrees: f64,
    /// Load time in seconds.
    pub load_seconds: f64,
    /// Reduction and solve time in seconds.
    pub compute_seconds: f64,
    /// Total time in seconds.
    pub total_seconds: f64,
    /// Global error in percent, `None` when it is undefined.
    pub global_error_percent: Option<f64>,
    /// Point-average error in percent, `None` when it is undefined.
    pub point_average_error_percent: Option<f64>,
    /// Why the errors are undefined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_diagnostic: Option<String>,
    /// Number of correspondences.
    pub num_points: usize,
    /// Number of workers.
    pub num_workers: usize,
    /// Correspondences no worker was assigned.
    pub dropped_points: usize,
}

impl AlignmentReport {
    /// Assemble the report of a finished run.
    pub fn new(alignment: &Alignment, timings: &Timings) -> Self {
        Self {
            rotation: alignment.transform.rotation_rows(),
            translation: alignment.transform.translation.to_array(),
            rotation_angle_degrees: rotation_angle(&alignment.transform.rotation).to_degrees(),
            load_seconds: timings.load.as_secs_f64(),
            compute_seconds: timings.compute.as_secs_f64(),
            total_seconds: timings.total.as_secs_f64(),
            global_error_percent: alignment.errors.as_ref().ok().map(|e| e.global * 100.0),
            point_average_error_percent: alignment
                .errors
                .as_ref()
                .ok()
                .map(|e| e.point_average * 100.0),
            error_diagnostic: alignment.errors.as_ref().err().map(ToString::to_string),
            num_points: alignment.covariance.num_points,
            num_workers: alignment.covariance.num_workers,
            dropped_points: alignment.covariance.dropped_points(),
        }
    }
}

impl fmt::Display for AlignmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "R:")?;
        for row in &self.rotation {
            for v in row {
                write!(f, "{v:>12.6}")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "t:")?;
        for v in &self.translation {
            writeln!(f, "{v:>10.6}")?;
        }
        writeln!(f)?;

        writeln!(f, "Load Time: {:.6}s", self.load_seconds)?;
        writeln!(f, "Computation Time: {:.6}s", self.compute_seconds)?;
        writeln!(f, "Total Time: {:.6}s", self.total_seconds)?;

        match (self.global_error_percent, self.point_average_error_percent) {
            (Some(global), Some(point_average)) => {
                writeln!(f, "Global Error: {global}%")?;
                write!(f, "Point average Error: {point_average}%")
            }
            _ => {
                let reason = self.error_diagnostic.as_deref().unwrap_or("undefined");
                writeln!(f, "Global Error: n/a ({reason})")?;
                write!(f, "Point average Error: n/a ({reason})")
            }
        }
    }
}
