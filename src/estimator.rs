//! Closed-form rigid transform estimation between two corresponding point sets.
//!
//! The transform is restricted to a rotation about Y followed by a translation. The
//! rotation is the least-squares optimum in the X-Z plane (orthogonal Procrustes reduced to
//! one angle), so no iteration is needed.

use crate::geometry::{centroid, distance_squared, Point3, Vector3, YawRotation};

/// Minimum number of correspondences that fixes rotation and translation.
pub const MIN_CORRESPONDENCES: usize = 3;

/// Rotation and translation mapping source points onto target points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidEstimate {
    /// Rotation about Y, in radians.
    pub rotation_angle: f64,
    /// Applied after the rotation. Only X and Z are solved for; Y is always zero.
    pub translation: Vector3,
    /// Sum of squared residuals after applying the transform.
    pub error: f64,
}

/// Estimates the transform taking `source[i]` onto `target[i]`.
///
/// # Panics
///
/// Panics when the slices differ in length or hold fewer than [`MIN_CORRESPONDENCES`]
/// points; either is a caller bug.
pub fn estimate_rigid_transform(source: &[Point3], target: &[Point3]) -> RigidEstimate {
    assert_eq!(
        source.len(),
        target.len(),
        "source and target must have the same number of points"
    );
    assert!(
        source.len() >= MIN_CORRESPONDENCES,
        "at least {MIN_CORRESPONDENCES} correspondences are required, got {}",
        source.len()
    );

    let source_centroid = centroid(source);
    let target_centroid = centroid(target);

    let (mut numerator, mut denominator) = (0.0_f64, 0.0_f64);
    for (s, t) in source.iter().zip(target) {
        let s = s - source_centroid;
        let t = t - target_centroid;
        numerator += s.z * t.x - s.x * t.z;
        denominator += s.x * t.x + s.z * t.z;
    }
    let rotation_angle = numerator.atan2(denominator);

    let rotation = YawRotation::from_angle(rotation_angle);
    let rotated: Vec<Point3> = source.iter().map(|p| rotation.rotate_point(p)).collect();
    let mut translation = target_centroid - centroid(&rotated);
    // Height is not part of the planar registration.
    translation.y = 0.0;

    RigidEstimate {
        rotation_angle,
        translation,
        error: transformation_error(source, target, rotation_angle, &translation),
    }
}

/// Sum of squared distances between each transformed source point and its target.
pub fn transformation_error(
    source: &[Point3],
    target: &[Point3],
    rotation_angle: f64,
    translation: &Vector3,
) -> f64 {
    let rotation = YawRotation::from_angle(rotation_angle);
    source
        .iter()
        .zip(target)
        .map(|(s, t)| distance_squared(&(rotation.rotate_point(s) + *translation), t))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_points() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 3.0),
            Point3::new(-2.0, 0.0, 2.5),
        ]
    }

    #[test]
    fn recovers_known_transform() {
        let source = sample_points();
        let rotation = YawRotation::from_angle(0.8);
        let translation = Vector3::new(3.0, 0.0, -1.5);
        let target: Vec<Point3> = source
            .iter()
            .map(|p| rotation.rotate_point(p) + translation)
            .collect();

        let estimate = estimate_rigid_transform(&source, &target);
        assert_relative_eq!(estimate.rotation_angle, 0.8, epsilon = 1e-9);
        assert_relative_eq!(estimate.translation, translation, epsilon = 1e-9);
        assert_relative_eq!(estimate.error, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn identical_sets_give_identity() {
        let pts = sample_points();
        let estimate = estimate_rigid_transform(&pts, &pts);
        assert_relative_eq!(estimate.rotation_angle, 0.0, epsilon = 1e-12);
        assert_relative_eq!(estimate.translation.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn vertical_offset_is_not_solved() {
        let source = sample_points();
        let target: Vec<Point3> = source.iter().map(|p| p + Vector3::new(1.0, 2.0, 0.0)).collect();
        let estimate = estimate_rigid_transform(&source, &target);
        assert_eq!(estimate.translation.y, 0.0);
        assert_relative_eq!(estimate.translation.x, 1.0, epsilon = 1e-9);
        // Each point is left 2 units short in Y.
        assert_relative_eq!(estimate.error, 4.0 * source.len() as f64, epsilon = 1e-9);
    }

    #[test]
    fn noisy_correspondences_report_residual() {
        let source = sample_points();
        let mut target = source.clone();
        target[1].x += 0.5;
        let estimate = estimate_rigid_transform(&source, &target);
        assert!(estimate.error > 0.0);
        assert!(estimate.error < 0.25);
    }

    #[test]
    #[should_panic(expected = "at least 3 correspondences")]
    fn rejects_two_points() {
        let pts = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        estimate_rigid_transform(&pts, &pts);
    }

    #[test]
    #[should_panic(expected = "same number of points")]
    fn rejects_mismatched_sizes() {
        let pts = sample_points();
        estimate_rigid_transform(&pts, &pts[..3]);
    }
}
