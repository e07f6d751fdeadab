//! Room placement records and incremental composition of manual adjustments.

use nalgebra::Matrix4;

use crate::alignment::AlignmentResult;
use crate::geometry::{approx_eq_matrix, translation_matrix, Vector3, YawRotation};

/// Placement of a room inside its floor's coordinate space.
///
/// The placement is `translation × rotation`: room geometry is first rotated about Y
/// around the room origin, then translated. Holding the translation as a vector and the
/// rotation as a [`YawRotation`] means the translation matrix always has an identity 3×3
/// block and the rotation matrix never carries a translation or a tilt.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransformRecord {
    translation: Vector3,
    rotation: YawRotation,
}

impl TransformRecord {
    /// The "unset" record: both matrices are the identity.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new(translation: Vector3, rotation: YawRotation) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Rebuilds a record from its two stored matrices.
    ///
    /// The offset is read from column 3 of `translation` and the rotation from the first
    /// row of `rotation_y`; every other element is ignored. Use
    /// [`conforms`](Self::conforms) to check the matrices against the record invariants.
    pub fn from_matrices(translation: &Matrix4<f64>, rotation_y: &Matrix4<f64>) -> Self {
        Self::new(offset_of(translation), YawRotation::from_matrix4(rotation_y))
    }

    /// True when `translation` is translation-only and `rotation_y` is a unit rotation
    /// about Y, both within [`STRUCTURE_TOLERANCE`](crate::geometry::STRUCTURE_TOLERANCE).
    pub fn conforms(translation: &Matrix4<f64>, rotation_y: &Matrix4<f64>) -> bool {
        approx_eq_matrix(translation, &translation_matrix(&offset_of(translation)))
            && YawRotation::is_yaw_matrix(rotation_y)
    }

    pub fn translation(&self) -> Vector3 {
        self.translation
    }

    pub fn rotation(&self) -> YawRotation {
        self.rotation
    }

    /// Accumulated rotation as an angle in `(-π, π]`, for display.
    pub fn rotation_angle(&self) -> f64 {
        self.rotation.angle()
    }

    pub fn translation_matrix(&self) -> Matrix4<f64> {
        translation_matrix(&self.translation)
    }

    pub fn rotation_matrix(&self) -> Matrix4<f64> {
        self.rotation.to_matrix4()
    }

    /// `translation × rotation_y`.
    pub fn placement_matrix(&self) -> Matrix4<f64> {
        self.translation_matrix() * self.rotation_matrix()
    }

    /// World transform of a node after placement: `placement × world`.
    pub fn apply_to(&self, world: &Matrix4<f64>) -> Matrix4<f64> {
        self.placement_matrix() * world
    }

    /// False only when both matrices are exactly the identity.
    ///
    /// This separates "never positioned" from "positioned", even a position that happens
    /// to sit near the origin.
    pub fn has_position(&self) -> bool {
        self.translation != Vector3::zeros() || !self.rotation.is_identity()
    }

    /// Adds `(dx, 0, dz)` to the translation.
    pub fn translate(&mut self, dx: f64, dz: f64) {
        self.translation.x += dx;
        self.translation.z += dz;
    }

    /// Right-multiplies the stored rotation by a rotation of `angle` radians.
    pub fn rotate(&mut self, angle: f64) {
        self.rotation = self.rotation.then(&YawRotation::from_angle(angle));
    }

    /// One [`rotate`](Self::rotate) followed by one [`translate`](Self::translate).
    pub fn apply_alignment(&mut self, rotation_angle: f64, translation: &Vector3) {
        self.rotate(rotation_angle);
        self.translate(translation.x, translation.z);
    }

    pub fn apply_auto_alignment(&mut self, result: &AlignmentResult) {
        self.apply_alignment(result.rotation_angle, &result.translation);
    }

    pub fn reset(&mut self) {
        *self = Self::identity();
    }

    pub fn compose_translation(mut self, dx: f64, dz: f64) -> Self {
        self.translate(dx, dz);
        self
    }

    pub fn compose_rotation(mut self, angle: f64) -> Self {
        self.rotate(angle);
        self
    }
}

pub fn has_position(record: &TransformRecord) -> bool {
    record.has_position()
}

fn offset_of(translation: &Matrix4<f64>) -> Vector3 {
    Vector3::new(
        translation[(0, 3)],
        translation[(1, 3)],
        translation[(2, 3)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn identity_compositions_stay_identity() {
        let id = TransformRecord::identity();
        assert_eq!(id.compose_rotation(0.0), id);
        assert_eq!(id.compose_translation(0.0, 0.0), id);
        assert_eq!(id.placement_matrix(), Matrix4::identity());
        assert!(!id.has_position());
    }

    #[test]
    fn any_nonzero_adjustment_sets_position() {
        assert!(TransformRecord::identity().compose_translation(0.01, 0.0).has_position());
        assert!(TransformRecord::identity().compose_translation(0.0, -2.0).has_position());
        assert!(TransformRecord::identity().compose_rotation(0.1).has_position());
        assert!(has_position(&TransformRecord::identity().compose_rotation(-PI)));
    }

    #[test]
    fn rotations_accumulate_in_order() {
        let base = TransformRecord::new(Vector3::new(1.0, 0.0, 2.0), YawRotation::from_angle(0.3));
        let stepped = base.compose_rotation(2.5).compose_rotation(1.9);
        let single = base.compose_rotation(2.5 + 1.9);
        assert_relative_eq!(
            stepped.rotation_matrix(),
            single.rotation_matrix(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            stepped.rotation_angle(),
            (0.3 + 2.5 + 1.9) - 2.0 * PI,
            epsilon = 1e-12
        );
        assert_eq!(stepped.translation(), base.translation());
    }

    #[test]
    fn translate_moves_only_x_and_z() {
        let mut record = TransformRecord::new(Vector3::new(0.0, 1.5, 0.0), YawRotation::IDENTITY);
        record.translate(2.0, -1.0);
        record.translate(0.5, 0.5);
        assert_eq!(record.translation(), Vector3::new(2.5, 1.5, -0.5));
        assert_eq!(record.translation_matrix()[(1, 3)], 1.5);
    }

    #[test]
    fn placement_rotates_then_translates() {
        let mut record = TransformRecord::identity();
        record.apply_alignment(FRAC_PI_2, &Vector3::new(10.0, 0.0, 0.0));
        let p = record
            .placement_matrix()
            .transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(10.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn apply_to_left_multiplies_world() {
        let record = TransformRecord::identity()
            .compose_rotation(0.4)
            .compose_translation(1.0, 2.0);
        let world = Matrix4::new_translation(&Vector3::new(0.0, 3.0, 0.0));
        assert_eq!(record.apply_to(&world), record.placement_matrix() * world);
    }

    #[test]
    fn reset_clears_everything() {
        let mut record = TransformRecord::identity()
            .compose_rotation(1.0)
            .compose_translation(3.0, 3.0);
        record.reset();
        assert_eq!(record, TransformRecord::identity());
    }

    #[test]
    fn from_matrices_reads_offset_and_rotation() {
        let record = TransformRecord::identity()
            .compose_rotation(-0.7)
            .compose_translation(4.0, 1.0);
        let (t, r) = (record.translation_matrix(), record.rotation_matrix());
        assert_eq!(TransformRecord::from_matrices(&t, &r), record);
        assert!(TransformRecord::conforms(&t, &r));

        // Swapped matrices still load, but violate both invariants.
        assert!(!TransformRecord::conforms(&r, &t));
        let swapped = TransformRecord::from_matrices(&r, &t);
        assert_eq!(swapped.translation(), Vector3::zeros());
        assert_eq!(swapped.rotation(), YawRotation::IDENTITY);
    }
}
