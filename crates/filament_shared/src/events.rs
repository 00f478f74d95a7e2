//! Event records produced by emitters.
//!
//! Producers push these into a queue during their tick. Receivers only see
//! them after every producer of the frame has finished, so a receiver that
//! spawns or kills particles never runs while a pool is being iterated.

use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// Event kind discriminator
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Particle spawned
    Spawn = 0,
    /// Particle died
    Death = 1,
    /// Particle collided (reported by the host)
    Collision = 2,
    /// A named anchor failed to resolve
    ResolveMiss = 3,
}

/// Which end of a beam an anchor belongs to
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorSide {
    /// Beam source
    Source = 0,
    /// Beam target
    Target = 1,
}

/// Fields common to every event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// User-facing event name
    pub name: String,
    /// Emitter that produced the event
    pub emitter: String,
    /// Emitter time when the event fired
    pub emitter_time: f32,
    /// Relative age of the particle (0..1)
    pub particle_time: f32,
    /// World location
    pub location: Vec3,
    /// Particle velocity
    pub velocity: Vec3,
    /// Unit direction of travel (zero when at rest)
    pub direction: Vec3,
}

/// Events emitted by the beam and trail engines
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParticleEvent {
    /// A particle was born
    Spawn(EventRecord),

    /// A particle was killed
    Death(EventRecord),

    /// A particle hit something
    Collision {
        /// Common fields
        record: EventRecord,
        /// Surface normal at the hit
        normal: Vec3,
        /// Fraction of the frame at which the hit happened
        hit_time: f32,
        /// Host item index (-1 = none)
        item: i32,
    },

    /// An anchor lookup missed
    ResolveMiss {
        /// Common fields
        record: EventRecord,
        /// Side that missed
        side: AnchorSide,
    },
}

impl ParticleEvent {
    /// Returns the event kind
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Spawn(_) => EventKind::Spawn,
            Self::Death(_) => EventKind::Death,
            Self::Collision { .. } => EventKind::Collision,
            Self::ResolveMiss { .. } => EventKind::ResolveMiss,
        }
    }

    /// Returns the common record
    #[must_use]
    pub const fn record(&self) -> &EventRecord {
        match self {
            Self::Spawn(record) | Self::Death(record) => record,
            Self::Collision { record, .. } | Self::ResolveMiss { record, .. } => record,
        }
    }

    /// Event name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.record().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> EventRecord {
        EventRecord {
            name: name.to_string(),
            emitter: "sparks".to_string(),
            emitter_time: 1.5,
            particle_time: 0.25,
            location: Vec3::new(10.0, 20.0, 30.0),
            velocity: Vec3::new(0.0, 0.0, -5.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        }
    }

    #[test]
    fn test_event_kind() {
        let event = ParticleEvent::Collision {
            record: record("impact"),
            normal: Vec3::Z,
            hit_time: 0.5,
            item: -1,
        };
        assert_eq!(event.kind(), EventKind::Collision);
        assert_eq!(event.name(), "impact");
    }

    #[test]
    fn test_event_record_access() {
        let event = ParticleEvent::ResolveMiss {
            record: record("lost"),
            side: AnchorSide::Target,
        };
        assert_eq!(event.record().location, Vec3::new(10.0, 20.0, 30.0));
        assert_eq!(ParticleEvent::Death(record("x")).kind(), EventKind::Death);
    }
}
