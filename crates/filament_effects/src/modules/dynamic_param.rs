//! Dynamic parameter module: four extra per-vertex floats.

use bytemuck::{Pod, Zeroable};
use filament_shared::Vec3;
use serde::{Deserialize, Serialize};

use crate::distribution::FloatDistribution;
use crate::random::ParticleRng;

/// When a channel is sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicParamMode {
    /// Once, at spawn.
    #[default]
    Spawn,
    /// Every update, at particle time.
    Update,
    /// Once at spawn, then scaled by the particle's speed every update.
    SpawnVelocityScaled,
}

/// One output channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicParamChannel {
    /// Value curve.
    pub value: FloatDistribution,
    /// Sampling mode.
    pub mode: DynamicParamMode,
}

/// Module configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicParameterModule {
    /// The four channels.
    pub channels: [DynamicParamChannel; 4],
}

/// Per-particle values.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DynamicParamPayload {
    /// Values sampled at spawn.
    pub base: [f32; 4],
    /// Values handed to the vertex packer.
    pub values: [f32; 4],
}

impl DynamicParameterModule {
    /// Payload bytes per particle.
    pub const PAYLOAD_SIZE: usize = std::mem::size_of::<DynamicParamPayload>();

    /// Samples every channel for a new particle.
    pub fn spawn(&self, particle_time: f32, rng: &mut ParticleRng) -> DynamicParamPayload {
        let mut payload = DynamicParamPayload::default();
        for (i, channel) in self.channels.iter().enumerate() {
            payload.base[i] = channel.value.sample(particle_time, rng);
            payload.values[i] = payload.base[i];
        }
        payload
    }

    /// Refreshes per-frame channels.
    pub fn update(&self, payload: &mut DynamicParamPayload, particle_time: f32, velocity: Vec3, rng: &mut ParticleRng) {
        for (i, channel) in self.channels.iter().enumerate() {
            match channel.mode {
                DynamicParamMode::Spawn => {}
                DynamicParamMode::Update => payload.values[i] = channel.value.sample(particle_time, rng),
                DynamicParamMode::SpawnVelocityScaled => payload.values[i] = payload.base[i] * velocity.length(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::EffectSeed;

    #[test]
    fn test_modes() {
        let mut module = DynamicParameterModule::default();
        module.channels[0].value = FloatDistribution::constant(2.0);
        module.channels[1] = DynamicParamChannel { value: FloatDistribution::ramp(0.0, 1.0), mode: DynamicParamMode::Update };
        module.channels[2] = DynamicParamChannel {
            value: FloatDistribution::constant(0.5),
            mode: DynamicParamMode::SpawnVelocityScaled,
        };

        let mut rng = ParticleRng::new(EffectSeed::new(1));
        let mut p = module.spawn(0.0, &mut rng);
        assert_eq!(p.values, [2.0, 0.0, 0.5, 0.0]);

        module.update(&mut p, 0.5, Vec3::new(0.0, 4.0, 0.0), &mut rng);
        assert_eq!(p.values, [2.0, 0.5, 2.0, 0.0]);
    }
}
