//! # Trail Payload
//!
//! Chain links stored after the particle header. Links are pool slots, so
//! they survive the live-index reshuffle that killing causes.
//!
//! ```text
//!   source ─ head(Start) ─next→ Middle ─next→ ... ─next→ tail(End) ─next→ NULL
//!            NULL ←prev─
//! ```

use bytemuck::{Pod, Zeroable};
use filament_shared::{Vec3, NULL_LINK};

/// Position of a particle in its chain.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChainRole {
    /// Head and tail at once.
    #[default]
    Only = 0,
    /// Head of a chain of two or more.
    Start = 1,
    /// Neither end.
    Middle = 2,
    /// Tail of a chain of two or more.
    End = 3,
    /// Killed; swept at the end of the kill pass.
    DeadTrail = 4,
    /// Behind a killed middle particle; swept with it.
    ForceKill = 5,
}

impl ChainRole {
    /// Decodes a stored role. Unknown values read as dead.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Only,
            1 => Self::Start,
            2 => Self::Middle,
            3 => Self::End,
            5 => Self::ForceKill,
            _ => Self::DeadTrail,
        }
    }

    /// True for roles the sweep removes.
    #[must_use]
    pub const fn is_dead(self) -> bool {
        matches!(self, Self::DeadTrail | Self::ForceKill)
    }

    /// True for the head of a chain.
    #[must_use]
    pub const fn is_head(self) -> bool {
        matches!(self, Self::Only | Self::Start)
    }
}

/// Per-particle trail state.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TrailPayload {
    /// Encoded [`ChainRole`].
    pub role: u32,
    /// Newer neighbour, `NULL_LINK` at the head.
    pub prev: i32,
    /// Older neighbour, `NULL_LINK` at the tail.
    pub next: i32,
    /// Owning trail.
    pub trail_index: i32,
    /// Triangles of the segment toward `next`.
    pub triangle_count: i32,
    /// Subdivisions of the segment toward `next`.
    pub tessellation: i32,
    /// Emitter lifetime at spawn.
    pub spawn_time: f32,
    /// Unit direction of the chain at this particle.
    pub tangent: Vec3,
}

impl Default for TrailPayload {
    fn default() -> Self {
        Self {
            role: ChainRole::Only as u32,
            prev: NULL_LINK,
            next: NULL_LINK,
            trail_index: NULL_LINK,
            triangle_count: 0,
            tessellation: 1,
            spawn_time: 0.0,
            tangent: Vec3::ZERO,
        }
    }
}

impl TrailPayload {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Decoded role.
    #[inline]
    #[must_use]
    pub const fn chain_role(&self) -> ChainRole {
        ChainRole::from_u32(self.role)
    }

    /// Stores a role.
    #[inline]
    pub fn set_role(&mut self, role: ChainRole) {
        self.role = role as u32;
    }
}

/// Slot of a link, `None` for `NULL_LINK`.
#[inline]
#[must_use]
pub fn link(value: i32) -> Option<usize> {
    usize::try_from(value).ok()
}

/// Encodes a slot as a link.
#[inline]
#[must_use]
pub fn to_link(slot: Option<usize>) -> i32 {
    slot.and_then(|s| i32::try_from(s).ok()).unwrap_or(NULL_LINK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [ChainRole::Only, ChainRole::Start, ChainRole::Middle, ChainRole::End, ChainRole::ForceKill] {
            assert_eq!(ChainRole::from_u32(role as u32), role);
        }
        assert_eq!(ChainRole::from_u32(99), ChainRole::DeadTrail);
        assert!(ChainRole::ForceKill.is_dead());
        assert!(ChainRole::Only.is_head());
        assert!(!ChainRole::End.is_head());
    }

    #[test]
    fn test_links() {
        assert_eq!(link(NULL_LINK), None);
        assert_eq!(link(3), Some(3));
        assert_eq!(to_link(None), NULL_LINK);
        assert_eq!(to_link(Some(7)), 7);
    }

    #[test]
    fn test_default_is_unlinked() {
        let p = TrailPayload::default();
        assert_eq!(p.chain_role(), ChainRole::Only);
        assert_eq!(link(p.prev), None);
        assert_eq!(link(p.next), None);
        assert_eq!(TrailPayload::SIZE, 7 * 4 + 12);
    }
}
