use glam::{DMat3, DVec3};

/// Apply a rigid transformation `dst = R * src + t` to a single point.
///
/// Example:
///
/// ```
/// use glam::{DMat3, DVec3};
/// use kabsch_3d::linalg::transform_point;
///
/// let p = transform_point(DVec3::new(2.0, 2.0, 2.0), &DMat3::IDENTITY, DVec3::X);
/// assert_eq!(p, DVec3::new(3.0, 2.0, 2.0));
/// ```
#[inline]
pub fn transform_point(point: DVec3, dst_r_src: &DMat3, dst_t_src: DVec3) -> DVec3 {
    dst_r_src.mul_vec3(point) + dst_t_src
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_point_roundtrip() {
        let src = DVec3::new(2.0, 2.0, 2.0);
        // 90 degrees about x
        let rotation = DMat3::from_cols(DVec3::X, DVec3::Z, -DVec3::Y);
        let translation = DVec3::new(1.0, 2.0, 3.0);

        let dst = transform_point(src, &rotation, translation);
        assert_eq!(dst, DVec3::new(3.0, 0.0, 5.0));

        // R' = R^T, t' = -R^T * t
        let rotation_inv = rotation.transpose();
        let back = transform_point(dst, &rotation_inv, -(rotation_inv * translation));
        assert_relative_eq!(back.x, src.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, src.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, src.z, epsilon = 1e-12);
    }
}
