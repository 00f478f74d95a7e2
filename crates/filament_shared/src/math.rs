//! Mathematical types shared by the simulation and the tessellator.
//!
//! Everything here is `#[repr(C)]` + `Pod` so it can live inside the
//! per-particle byte pool and the vertex stream without conversion.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::constants::{KINDA_SMALL_NUMBER, SMALL_NUMBER};

/// 3D Vector - position, velocity, direction
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Creates a vector with all components set to `v`
    #[must_use]
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// All ones
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    /// Unit X vector (forward axis of a component)
    pub const X: Self = Self::new(1.0, 0.0, 0.0);

    /// Unit Y vector
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);

    /// Unit Z vector
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Distance squared (avoids sqrt)
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Returns the unit vector, or `None` when the length is below [`SMALL_NUMBER`].
    #[must_use]
    pub fn try_normalize(self) -> Option<Self> {
        let len_sq = self.length_squared();
        if len_sq < SMALL_NUMBER {
            return None;
        }
        Some(self * len_sq.sqrt().recip())
    }

    /// Returns the unit vector, or zero when it cannot be normalized.
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        self.try_normalize().unwrap_or(Self::ZERO)
    }

    /// True when every component is within `tolerance` of zero.
    #[must_use]
    pub fn is_nearly_zero(self, tolerance: f32) -> bool {
        self.x.abs() <= tolerance && self.y.abs() <= tolerance && self.z.abs() <= tolerance
    }

    /// True when each component of `self - other` is strictly inside `radius`.
    #[must_use]
    pub fn within_box(self, other: Self, radius: f32) -> bool {
        let d = self - other;
        d.x.abs() < radius && d.y.abs() < radius && d.z.abs() < radius
    }

    /// Component-wise multiplication
    #[must_use]
    pub fn mul_elements(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    /// Largest absolute component
    #[must_use]
    pub fn max_abs(self) -> f32 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }

    /// Linear interpolation
    #[must_use]
    pub fn lerp(self, other: Self, alpha: f32) -> Self {
        self + (other - self) * alpha
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Div<f32> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Quaternion for rotations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quaternion {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Rotation of `angle` radians about a unit `axis`.
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Shortest rotation taking unit vector `from` onto unit vector `to`.
    ///
    /// Antiparallel inputs rotate half a turn about an axis perpendicular to `from`.
    #[must_use]
    pub fn from_rotation_arc(from: Vec3, to: Vec3) -> Self {
        let w = 1.0 + from.dot(to);
        if w < KINDA_SMALL_NUMBER {
            let axis = if from.x.abs() > from.z.abs() {
                Vec3::new(-from.y, from.x, 0.0)
            } else {
                Vec3::new(0.0, -from.z, from.y)
            };
            let axis = axis.normalize_or_zero();
            return Self::new(axis.x, axis.y, axis.z, 0.0);
        }
        let c = from.cross(to);
        Self::new(c.x, c.y, c.z, w).normalized()
    }

    /// Returns the unit quaternion.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if len < SMALL_NUMBER {
            return Self::IDENTITY;
        }
        let inv = len.recip();
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// Rotates a vector.
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Quaternion {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

/// Transform - translation + rotation + non-uniform scale.
///
/// Used as the owner component's local-to-world transform.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Transform {
    /// Translation
    pub position: Vec3,
    /// Rotation
    pub rotation: Quaternion,
    /// Scale
    pub scale: Vec3,
}

impl Transform {
    /// Creates a new transform
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quaternion, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    /// Identity transform
    pub const IDENTITY: Self = Self::new(Vec3::ZERO, Quaternion::IDENTITY, Vec3::ONE);

    /// Pure translation
    #[must_use]
    pub const fn from_translation(position: Vec3) -> Self {
        Self::new(position, Quaternion::IDENTITY, Vec3::ONE)
    }

    /// World origin of the transform
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        self.position
    }

    /// Transforms a point from local to world space.
    #[must_use]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p.mul_elements(self.scale)) + self.position
    }

    /// Transforms a direction (no translation).
    #[must_use]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.rotation.rotate(v.mul_elements(self.scale))
    }

    /// Forward (X) axis in world space, unit length.
    #[must_use]
    pub fn forward_axis(&self) -> Vec3 {
        self.rotation.rotate(Vec3::X).try_normalize().unwrap_or(Vec3::X)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Linear RGBA color
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct LinearColor {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl LinearColor {
    /// Creates a new color
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Per-channel linear blend.
    #[must_use]
    pub fn lerp(self, other: Self, alpha: f32) -> Self {
        Self::new(
            self.r + (other.r - self.r) * alpha,
            self.g + (other.g - self.g) * alpha,
            self.b + (other.b - self.b) * alpha,
            self.a + (other.a - self.a) * alpha,
        )
    }
}

impl Default for LinearColor {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Hermite cubic between `p0` and `p1` with tangents `t0`, `t1` at `alpha`.
#[must_use]
pub fn cubic_interp(p0: Vec3, t0: Vec3, p1: Vec3, t1: Vec3, alpha: f32) -> Vec3 {
    let a2 = alpha * alpha;
    let a3 = a2 * alpha;
    p0 * (2.0 * a3 - 3.0 * a2 + 1.0)
        + t0 * (a3 - 2.0 * a2 + alpha)
        + t1 * (a3 - a2)
        + p1 * (-2.0 * a3 + 3.0 * a2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.dot(b), 32.0);
        assert_eq!(Vec3::X.cross(Vec3::Y), Vec3::Z);
    }

    #[test]
    fn test_vec3_bytemuck() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn test_zero_vector_does_not_normalize() {
        assert!(Vec3::ZERO.try_normalize().is_none());
        assert_eq!(Vec3::new(0.0, 3.0, 4.0).normalize_or_zero(), Vec3::new(0.0, 0.6, 0.8));
    }

    #[test]
    fn test_within_box_is_strict() {
        let a = Vec3::new(99.5, 0.0, 0.0);
        assert!(a.within_box(Vec3::new(100.0, 0.0, 0.0), 1.0));
        assert!(!Vec3::new(99.0, 0.0, 0.0).within_box(Vec3::new(100.0, 0.0, 0.0), 1.0));
    }

    #[test]
    fn test_rotation_arc_maps_from_onto_to() {
        let q = Quaternion::from_rotation_arc(Vec3::X, Vec3::Y);
        let r = q.rotate(Vec3::X);
        assert!((r - Vec3::Y).length() < 1e-5);

        let flip = Quaternion::from_rotation_arc(Vec3::X, -Vec3::X);
        assert!((flip.rotate(Vec3::X) + Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_axis_angle_quarter_turn() {
        let q = Quaternion::from_axis_angle(Vec3::Z, std::f32::consts::FRAC_PI_2);
        assert!((q.rotate(Vec3::X) - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_transform_point() {
        let t = Transform::new(
            Vec3::new(10.0, 0.0, 0.0),
            Quaternion::from_axis_angle(Vec3::Z, std::f32::consts::FRAC_PI_2),
            Vec3::splat(2.0),
        );
        let p = t.transform_point(Vec3::X);
        assert!((p - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-5);
        assert!((t.forward_axis() - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_cubic_interp_endpoints() {
        let p0 = Vec3::ZERO;
        let p1 = Vec3::new(100.0, 0.0, 0.0);
        let t = Vec3::new(100.0, 0.0, 0.0);
        assert_eq!(cubic_interp(p0, t, p1, t, 0.0), p0);
        assert_eq!(cubic_interp(p0, t, p1, t, 1.0), p1);
        // Straight tangents keep the curve linear.
        let mid = cubic_interp(p0, t, p1, t, 0.5);
        assert!((mid.x - 50.0).abs() < 1e-4);
    }
}
