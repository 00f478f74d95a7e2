//! Camera data the tessellators need.

use std::f32::consts::PI;

use filament_shared::{Quaternion, Vec3, KINDA_SMALL_NUMBER};

/// Per-frame view parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewContext {
    /// Camera position in world space.
    pub origin: Vec3,
    /// Camera up axis, used when the ribbon faces the camera edge-on.
    pub up: Vec3,
    /// Added to every emitted position.
    pub pre_view_translation: Vec3,
}

impl ViewContext {
    /// A view at `origin` with no pre-view translation.
    #[must_use]
    pub fn new(origin: Vec3, up: Vec3) -> Self {
        Self { origin, up: up.try_normalize().unwrap_or(Vec3::Z), pre_view_translation: Vec3::ZERO }
    }

    /// Sets the pre-view translation.
    #[must_use]
    pub const fn with_pre_view_translation(mut self, translation: Vec3) -> Self {
        self.pre_view_translation = translation;
        self
    }

    /// Ribbon up vector at `point` for a ribbon running along `right`.
    ///
    /// `normalize(right x (point - origin))`, falling back to the camera up
    /// vector when the ribbon points at the camera.
    #[must_use]
    pub fn up_vector(&self, point: Vec3, right: Vec3) -> Vec3 {
        right.cross(point - self.origin).try_normalize().unwrap_or(self.up)
    }

    /// Up vector of sheet `sheet` of `sheets`, rotated `pi / sheets * sheet`
    /// about `right`.
    #[must_use]
    pub fn sheet_up(up: Vec3, right: Vec3, sheet: u32, sheets: u32) -> Vec3 {
        if sheet == 0 || sheets <= 1 || right.is_nearly_zero(KINDA_SMALL_NUMBER) {
            return up;
        }
        let angle = PI / sheets as f32 * sheet as f32;
        Quaternion::from_axis_angle(right.normalize_or_zero(), angle).rotate(up)
    }
}

impl Default for ViewContext {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 1000.0), Vec3::Z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_up_faces_camera() {
        let view = ViewContext::new(Vec3::new(0.0, -100.0, 0.0), Vec3::Z);
        let up = view.up_vector(Vec3::ZERO, Vec3::X);
        assert!(close(up, Vec3::Z));
    }

    #[test]
    fn test_edge_on_falls_back_to_camera_up() {
        let view = ViewContext::new(Vec3::new(-100.0, 0.0, 0.0), Vec3::Z);
        assert_eq!(view.up_vector(Vec3::ZERO, Vec3::X), Vec3::Z);
    }

    #[test]
    fn test_sheets_rotate_about_right() {
        let half = ViewContext::sheet_up(Vec3::Z, Vec3::X, 1, 2);
        assert!(close(half.normalize_or_zero(), -Vec3::Y) || close(half.normalize_or_zero(), Vec3::Y));
        assert!(half.dot(Vec3::Z).abs() < 1e-5);
        assert_eq!(ViewContext::sheet_up(Vec3::Z, Vec3::X, 0, 2), Vec3::Z);
    }
}
