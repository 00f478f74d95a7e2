//! # Particle Header
//!
//! The fixed record prefix every emitter shares. Module payloads follow it
//! at offsets fixed by the payload allocator.

use bytemuck::{Pod, Zeroable};
use filament_shared::{LinearColor, Vec3};

/// Size of [`BaseParticle`] in bytes.
pub const HEADER_SIZE: usize = std::mem::size_of::<BaseParticle>();

/// Particle flag bits stored in [`BaseParticle::flags`].
pub mod flags {
    /// Spawned during the current tick.
    pub const JUST_SPAWNED: u32 = 1 << 0;
    /// Has reported at least one collision.
    pub const COLLIDED: u32 = 1 << 1;
    /// Lifetime of zero: never ages.
    pub const IMMORTAL: u32 = 1 << 2;
    /// Marked for removal at the next kill pass.
    pub const PENDING_KILL: u32 = 1 << 3;
}

/// Common particle state at offset 0 of each record.
///
/// `#[repr(C)]` with 4-byte fields only, so it is `Pod` without padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct BaseParticle {
    /// World location (beam: the growing head).
    pub location: Vec3,
    /// Location at the end of the previous tick.
    pub old_location: Vec3,
    /// Velocity in units per second.
    pub velocity: Vec3,
    /// Velocity at spawn.
    pub base_velocity: Vec3,
    /// Current size.
    pub size: Vec3,
    /// Size at spawn.
    pub base_size: Vec3,
    /// Current color.
    pub color: LinearColor,
    /// Color at spawn.
    pub base_color: LinearColor,
    /// Rotation in radians.
    pub rotation: f32,
    /// Rotation at spawn.
    pub base_rotation: f32,
    /// Radians per second.
    pub rotation_rate: f32,
    /// Rotation rate at spawn.
    pub base_rotation_rate: f32,
    /// Age normalized to the lifetime, in [0, 1]. Dead above 1.
    pub relative_time: f32,
    /// 1 / lifetime, zero for immortal particles.
    pub one_over_max_lifetime: f32,
    /// See [`flags`].
    pub flags: u32,
}

impl BaseParticle {
    /// Size of the header in bytes.
    pub const SIZE: usize = HEADER_SIZE;

    /// True when a flag bit is set.
    #[inline]
    #[must_use]
    pub const fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Sets or clears a flag bit.
    #[inline]
    pub fn set_flag(&mut self, flag: u32, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    /// True once the particle outlived its lifetime.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.relative_time > 1.0 || self.has_flag(flags::PENDING_KILL)
    }
}
