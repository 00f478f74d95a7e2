//! Distance-driven spawning for trails.
//!
//! Each frame the source's motion is measured, masked per axis, and turned
//! into a particle count. The fractional remainder carries to the next frame.

use filament_shared::Vec3;
use serde::{Deserialize, Serialize};

/// Spawn-per-unit configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnPerUnit {
    /// Particles per unit of travel.
    pub particles_per_unit: f32,
    /// Zero these axes of the motion delta.
    pub ignore_axis: [bool; 3],
    /// Deltas above this are teleports and spawn nothing. 0 disables.
    pub max_frame_distance: f32,
    /// Deltas below this spawn nothing.
    pub min_frame_distance: f32,
}

impl Default for SpawnPerUnit {
    fn default() -> Self {
        Self {
            particles_per_unit: 0.1,
            ignore_axis: [false; 3],
            max_frame_distance: 0.0,
            min_frame_distance: 0.0,
        }
    }
}

/// Per-trail scratch kept by the emitter instance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpawnPerUnitState {
    /// Distance carried from previous frames.
    pub leftover: f32,
    /// Source location at the last measured frame.
    pub last_location: Option<Vec3>,
}

/// Result of one frame of motion.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UnitSpawn {
    /// Particles to spawn.
    pub count: u32,
    /// Location at the start of the motion.
    pub start: Vec3,
    /// Unmasked motion delta.
    pub delta: Vec3,
}

impl UnitSpawn {
    /// Location of the `i`-th of `count` particles, oldest first.
    #[must_use]
    pub fn location(&self, i: u32) -> Vec3 {
        let alpha = (i + 1) as f32 / self.count.max(1) as f32;
        self.start + self.delta * alpha
    }
}

impl SpawnPerUnit {
    /// Distance covered by one particle.
    #[must_use]
    pub fn unit_scalar(&self) -> f32 {
        if self.particles_per_unit > 0.0 {
            self.particles_per_unit.recip()
        } else {
            0.0
        }
    }

    fn masked(&self, delta: Vec3) -> Vec3 {
        let [ix, iy, iz] = self.ignore_axis;
        Vec3::new(
            if ix { 0.0 } else { delta.x },
            if iy { 0.0 } else { delta.y },
            if iz { 0.0 } else { delta.z },
        )
    }

    /// Measures the motion to `location` and returns the spawn count.
    pub fn advance(&self, state: &mut SpawnPerUnitState, location: Vec3) -> UnitSpawn {
        let Some(last) = state.last_location else {
            state.last_location = Some(location);
            return UnitSpawn { count: 0, start: location, delta: Vec3::ZERO };
        };

        let delta = location - last;
        let distance = self.masked(delta).length();
        let idle = UnitSpawn { count: 0, start: last, delta };

        if self.max_frame_distance > 0.0 && distance > self.max_frame_distance {
            state.last_location = Some(location);
            state.leftover = 0.0;
            return idle;
        }
        if distance < self.min_frame_distance || self.particles_per_unit <= 0.0 {
            return idle;
        }

        let travelled = distance + state.leftover;
        let count = (travelled * self.particles_per_unit).floor();
        state.leftover = travelled - count * self.unit_scalar();
        state.last_location = Some(location);

        UnitSpawn { count: count as u32, start: last, delta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primed(at: Vec3, leftover: f32) -> SpawnPerUnitState {
        SpawnPerUnitState { leftover, last_location: Some(at) }
    }

    #[test]
    fn test_count_and_leftover() {
        let spu = SpawnPerUnit::default();
        let mut state = primed(Vec3::ZERO, 3.0);
        let out = spu.advance(&mut state, Vec3::new(15.0, 0.0, 0.0));
        assert_eq!(out.count, 1);
        assert!((state.leftover - 8.0).abs() < 1e-4);
        assert_eq!(out.location(0), Vec3::new(15.0, 0.0, 0.0));
    }

    #[test]
    fn test_first_frame_primes() {
        let spu = SpawnPerUnit::default();
        let mut state = SpawnPerUnitState::default();
        assert_eq!(spu.advance(&mut state, Vec3::splat(4.0)).count, 0);
        assert_eq!(state.last_location, Some(Vec3::splat(4.0)));
    }

    #[test]
    fn test_ignore_axis() {
        let spu = SpawnPerUnit { ignore_axis: [false, false, true], ..SpawnPerUnit::default() };
        let mut state = primed(Vec3::ZERO, 0.0);
        assert_eq!(spu.advance(&mut state, Vec3::new(0.0, 0.0, 100.0)).count, 0);
    }

    #[test]
    fn test_teleport_discards() {
        let spu = SpawnPerUnit { max_frame_distance: 50.0, ..SpawnPerUnit::default() };
        let mut state = primed(Vec3::ZERO, 9.0);
        let out = spu.advance(&mut state, Vec3::new(500.0, 0.0, 0.0));
        assert_eq!(out.count, 0);
        assert_eq!(state.leftover, 0.0);
        assert_eq!(state.last_location, Some(Vec3::new(500.0, 0.0, 0.0)));
    }

    #[test]
    fn test_small_motion_accumulates() {
        let spu = SpawnPerUnit { min_frame_distance: 2.0, ..SpawnPerUnit::default() };
        let mut state = primed(Vec3::ZERO, 0.0);
        assert_eq!(spu.advance(&mut state, Vec3::new(1.0, 0.0, 0.0)).count, 0);
        assert_eq!(state.last_location, Some(Vec3::ZERO));
        let out = spu.advance(&mut state, Vec3::new(12.0, 0.0, 0.0));
        assert_eq!(out.count, 1);
    }

    #[test]
    fn test_interpolated_locations() {
        let out = UnitSpawn { count: 4, start: Vec3::ZERO, delta: Vec3::new(40.0, 0.0, 0.0) };
        assert_eq!(out.location(0), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(out.location(3), Vec3::new(40.0, 0.0, 0.0));
    }
}
