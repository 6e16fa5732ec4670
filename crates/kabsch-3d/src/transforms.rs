use glam::DMat3;

/// Rotation angle in radians of a rotation matrix, in `[0, pi]`.
///
/// Recovered from the trace, `cos(angle) = (trace(R) - 1) / 2`, clamped so
/// rounding on near-identity or half-turn rotations stays in range.
pub fn rotation_angle(r: &DMat3) -> f64 {
    let trace = r.x_axis.x + r.y_axis.y + r.z_axis.z;
    ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos()
}

/// Angle in radians of the relative rotation `a^T * b`.
///
/// Zero when the two rotations are equal.
pub fn rotation_angle_between(a: &DMat3, b: &DMat3) -> f64 {
    rotation_angle(&(a.transpose() * *b))
}
