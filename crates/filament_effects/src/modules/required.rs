//! Required module: spawn rate, bursts, looping and initial particle state.

use filament_shared::{LinearColor, Vec3};
use serde::{Deserialize, Serialize};

use crate::distribution::{FloatDistribution, VectorDistribution};
use crate::random::ParticleRng;

/// A one-shot spawn at an emitter time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Burst {
    /// Emitter time of the burst.
    pub time: f32,
    /// Particles spawned.
    pub count: u32,
}

/// Settings every emitter carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequiredModule {
    /// Particles per second, sampled at emitter time.
    pub spawn_rate: FloatDistribution,
    /// Bursts, fired once per loop.
    pub bursts: Vec<Burst>,
    /// Loop length in seconds. 0 loops forever.
    pub emitter_duration: f32,
    /// Loop count. 0 is infinite.
    pub emitter_loops: u32,
    /// Particle lifetime in seconds. 0 is immortal.
    pub particle_lifetime: FloatDistribution,
    /// Initial size.
    pub initial_size: VectorDistribution,
    /// Initial color.
    pub initial_color: LinearColor,
    /// Initial velocity.
    pub initial_velocity: VectorDistribution,
}

impl Default for RequiredModule {
    fn default() -> Self {
        Self {
            spawn_rate: FloatDistribution::constant(0.0),
            bursts: Vec::new(),
            emitter_duration: 0.0,
            emitter_loops: 0,
            particle_lifetime: FloatDistribution::constant(0.0),
            initial_size: VectorDistribution::constant(Vec3::ONE),
            initial_color: LinearColor::WHITE,
            initial_velocity: VectorDistribution::default(),
        }
    }
}

/// Emitter time bookkeeping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmitterClock {
    /// Time within the current loop.
    pub time: f32,
    /// Time since attach.
    pub seconds_since_creation: f32,
    /// Completed loops.
    pub loop_count: u32,
    /// Fractional particles carried between frames.
    pub spawn_fraction: f32,
    burst_fired: Vec<bool>,
    previous_time: f32,
}

impl EmitterClock {
    /// Advances by `dt`, wrapping at the loop duration.
    pub fn advance(&mut self, required: &RequiredModule, dt: f32) {
        self.previous_time = self.time;
        self.time += dt;
        self.seconds_since_creation += dt;
        if required.emitter_duration > 0.0 && self.time >= required.emitter_duration {
            self.time -= required.emitter_duration;
            self.previous_time = 0.0;
            self.loop_count += 1;
            self.burst_fired.iter_mut().for_each(|fired| *fired = false);
        }
    }

    /// True while the loop budget allows spawning.
    #[must_use]
    pub fn may_spawn(&self, required: &RequiredModule) -> bool {
        required.emitter_loops == 0 || self.loop_count < required.emitter_loops
    }

    /// Particles due from the time-based rate this frame.
    pub fn rate_count(&mut self, rate: f32, dt: f32) -> u32 {
        if rate <= 0.0 {
            return 0;
        }
        let total = self.spawn_fraction + rate * dt;
        let count = total.floor();
        self.spawn_fraction = total - count;
        count as u32
    }

    /// Bursts crossed since the previous frame.
    pub fn burst_count(&mut self, required: &RequiredModule) -> u32 {
        self.burst_fired.resize(required.bursts.len(), false);
        let mut count = 0;
        for (burst, fired) in required.bursts.iter().zip(self.burst_fired.iter_mut()) {
            let crossed = burst.time <= self.time && (burst.time > self.previous_time || burst.time == 0.0);
            if !*fired && crossed {
                *fired = true;
                count += burst.count;
            }
        }
        count
    }
}

/// Initial header values of a new particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitialState {
    /// Size.
    pub size: Vec3,
    /// Color.
    pub color: LinearColor,
    /// Velocity.
    pub velocity: Vec3,
    /// `1 / lifetime`, 0 for immortal particles.
    pub one_over_max_lifetime: f32,
}

impl RequiredModule {
    /// Samples the initial state of a particle spawned at `emitter_time`.
    pub fn initial_state(&self, emitter_time: f32, rng: &mut ParticleRng) -> InitialState {
        let lifetime = self.particle_lifetime.sample(emitter_time, rng);
        InitialState {
            size: self.initial_size.sample(emitter_time, rng),
            color: self.initial_color,
            velocity: self.initial_velocity.sample(emitter_time, rng),
            one_over_max_lifetime: if lifetime > 0.0 { lifetime.recip() } else { 0.0 },
        }
    }
}
