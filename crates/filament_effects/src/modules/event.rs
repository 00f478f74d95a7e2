//! Event generator and receiver modules.
//!
//! Generators decide which engine events leave an emitter and under what
//! name. Receivers match queued events and act on their own emitter.

use filament_shared::{EventKind, ParticleEvent};
use serde::{Deserialize, Serialize};

use crate::distribution::FloatDistribution;
use crate::random::ParticleRng;

/// One generated event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventGenerator {
    /// Engine event that triggers it.
    pub kind: EventKind,
    /// Name stamped on the record.
    #[serde(default)]
    pub name: String,
    /// Collision only: report the first collision of a particle.
    #[serde(default)]
    pub first_time_only: bool,
    /// Collision only: report the last collision of a particle, at its death.
    #[serde(default)]
    pub last_time_only: bool,
}

impl EventGenerator {
    /// A generator for `kind` under `name`.
    #[must_use]
    pub fn new(kind: EventKind, name: impl Into<String>) -> Self {
        Self { kind, name: name.into(), first_time_only: false, last_time_only: false }
    }

    /// Whether a collision should be reported now.
    ///
    /// `collided_before` is the particle's collided flag prior to this hit.
    #[must_use]
    pub const fn accepts_collision(&self, collided_before: bool) -> bool {
        if self.last_time_only {
            return false;
        }
        !(self.first_time_only && collided_before)
    }
}

/// What a receiver does when it fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReceiverAction {
    /// Kill every live particle.
    KillAll {
        /// Also stop spawning.
        #[serde(default)]
        stop_spawning: bool,
    },
    /// Stop spawning.
    HaltSpawning,
    /// Spawn particles at the event location.
    Spawn {
        /// Particle count.
        count: FloatDistribution,
        /// Sample `count` at the event's particle time instead of emitter time.
        #[serde(default)]
        use_particle_time: bool,
        /// Give spawned particles the event velocity.
        #[serde(default)]
        inherit_velocity: bool,
        /// Scale on the inherited velocity.
        #[serde(default = "unit_scale")]
        inherit_velocity_scale: f32,
    },
}

const fn unit_scale() -> f32 {
    1.0
}

/// Receiver configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventReceiver {
    /// Kind to listen for.
    pub kind: EventKind,
    /// Name to listen for; any name when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Fire on every K-th matching event.
    #[serde(default = "every_event")]
    pub fire_every: u32,
    /// Action.
    pub action: ReceiverAction,
}

const fn every_event() -> u32 {
    1
}

/// Throttle counter kept per emitter instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceiverState {
    /// Matching events seen so far.
    pub matched: u64,
}

/// Resolved action for the emitter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReceiverOutcome {
    /// Kill every particle.
    KillAll {
        /// Also stop spawning.
        stop_spawning: bool,
    },
    /// Stop spawning.
    HaltSpawning,
    /// Spawn `count` particles.
    Spawn {
        /// Particle count.
        count: u32,
        /// Velocity to give each particle.
        velocity: filament_shared::Vec3,
    },
}

impl EventReceiver {
    /// True when the event kind and name match.
    #[must_use]
    pub fn matches(&self, event: &ParticleEvent) -> bool {
        event.kind() == self.kind && self.name.as_deref().map_or(true, |name| name == event.name())
    }

    /// Counts a match and returns the action if this one fires.
    pub fn receive(
        &self,
        state: &mut ReceiverState,
        event: &ParticleEvent,
        rng: &mut ParticleRng,
    ) -> Option<ReceiverOutcome> {
        if !self.matches(event) {
            return None;
        }
        state.matched += 1;
        if state.matched % u64::from(self.fire_every.max(1)) != 0 {
            return None;
        }

        let record = event.record();
        Some(match &self.action {
            ReceiverAction::KillAll { stop_spawning } => ReceiverOutcome::KillAll { stop_spawning: *stop_spawning },
            ReceiverAction::HaltSpawning => ReceiverOutcome::HaltSpawning,
            ReceiverAction::Spawn { count, use_particle_time, inherit_velocity, inherit_velocity_scale } => {
                let t = if *use_particle_time { record.particle_time } else { record.emitter_time };
                let count = count.sample(t, rng).max(0.0) as u32;
                let velocity = if *inherit_velocity {
                    record.velocity * *inherit_velocity_scale
                } else {
                    filament_shared::Vec3::ZERO
                };
                ReceiverOutcome::Spawn { count, velocity }
            }
        })
    }
}
