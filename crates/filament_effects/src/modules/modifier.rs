//! Anchor modifiers.
//!
//! A modifier post-processes one side's resolved anchor. Each field has its
//! own operation:
//!
//! - `Modify` replaces the field with the sampled value.
//! - `Scale` multiplies a freshly resolved field by the sampled value.
//! - `Lock` captures the field at spawn and restores it on every update.

use bytemuck::{Pod, Zeroable};
use filament_shared::{Quaternion, Vec3};
use serde::{Deserialize, Serialize};

use crate::distribution::{FloatDistribution, VectorDistribution};
use crate::modules::anchor::{Anchor, Refreshed};
use crate::random::ParticleRng;

/// Operation applied to one anchor field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierOp {
    /// Leave the field alone.
    #[default]
    None,
    /// Replace the field.
    Modify,
    /// Multiply the field.
    Scale,
    /// Freeze the field at its spawn value.
    Lock,
}

/// Operation plus value source for one field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierField<D> {
    /// Operation.
    pub op: ModifierOp,
    /// Value source.
    pub value: D,
}

/// Per-side anchor modifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorModifier {
    /// Position operation.
    pub position: ModifierField<VectorDistribution>,
    /// Tangent operation.
    pub tangent: ModifierField<VectorDistribution>,
    /// Tangent values are world space. Otherwise they are rotated from +X
    /// into the tangent frame resolved this frame.
    pub tangent_absolute: bool,
    /// Strength operation.
    pub strength: ModifierField<FloatDistribution>,
    /// Sample at particle time instead of emitter time.
    pub use_particle_time: bool,
}

/// Per-particle modifier state.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ModifierPayload {
    /// Last sampled position value.
    pub position: Vec3,
    /// Last sampled tangent value.
    pub tangent: Vec3,
    /// Last sampled strength value.
    pub strength: f32,
    /// Position captured at spawn.
    pub locked_position: Vec3,
    /// Tangent captured at spawn.
    pub locked_tangent: Vec3,
    /// Strength captured at spawn.
    pub locked_strength: f32,
}

impl AnchorModifier {
    /// Payload bytes per particle.
    pub const PAYLOAD_SIZE: usize = std::mem::size_of::<ModifierPayload>();

    /// True when any field has an operation.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.position.op != ModifierOp::None
            || self.tangent.op != ModifierOp::None
            || self.strength.op != ModifierOp::None
    }

    /// Samples values, applies them, and captures locked fields.
    pub fn spawn(
        &self,
        anchor: &mut Anchor,
        payload: &mut ModifierPayload,
        emitter_time: f32,
        particle_time: f32,
        rng: &mut ParticleRng,
    ) {
        self.sample(payload, emitter_time, particle_time, rng);
        let all = Refreshed { position: true, tangent: true, strength: true, ..Refreshed::default() };
        self.apply(anchor, payload, &all);

        payload.locked_position = anchor.position;
        payload.locked_tangent = anchor.tangent;
        payload.locked_strength = anchor.strength;
    }

    /// Resamples values and applies them to the fields resolved this frame.
    pub fn update(
        &self,
        anchor: &mut Anchor,
        payload: &mut ModifierPayload,
        refreshed: &Refreshed,
        emitter_time: f32,
        particle_time: f32,
        rng: &mut ParticleRng,
    ) {
        self.sample(payload, emitter_time, particle_time, rng);
        self.apply(anchor, payload, refreshed);
    }

    fn sample(&self, payload: &mut ModifierPayload, emitter_time: f32, particle_time: f32, rng: &mut ParticleRng) {
        let t = if self.use_particle_time { particle_time } else { emitter_time };
        if matches!(self.position.op, ModifierOp::Modify | ModifierOp::Scale) {
            payload.position = self.position.value.sample(t, rng);
        }
        if matches!(self.tangent.op, ModifierOp::Modify | ModifierOp::Scale) {
            payload.tangent = self.tangent.value.sample(t, rng);
        }
        if matches!(self.strength.op, ModifierOp::Modify | ModifierOp::Scale) {
            payload.strength = self.strength.value.sample(t, rng);
        }
    }

    fn apply(&self, anchor: &mut Anchor, payload: &ModifierPayload, refreshed: &Refreshed) {
        match self.position.op {
            ModifierOp::None => {}
            ModifierOp::Modify => anchor.position = payload.position,
            ModifierOp::Scale if refreshed.position => {
                anchor.position = anchor.position.mul_elements(payload.position);
            }
            ModifierOp::Scale => {}
            ModifierOp::Lock => anchor.position = payload.locked_position,
        }

        match self.tangent.op {
            ModifierOp::None => {}
            ModifierOp::Modify if self.tangent_absolute => anchor.tangent = payload.tangent,
            // A relative frame is only valid on a freshly resolved tangent.
            ModifierOp::Modify if refreshed.tangent => {
                anchor.tangent = Self::tangent_in_frame(anchor.tangent, payload.tangent);
            }
            ModifierOp::Modify => {}
            ModifierOp::Scale if refreshed.tangent => {
                anchor.tangent = anchor.tangent.mul_elements(payload.tangent);
            }
            ModifierOp::Scale => {}
            ModifierOp::Lock => anchor.tangent = payload.locked_tangent,
        }

        match self.strength.op {
            ModifierOp::None => {}
            ModifierOp::Modify => anchor.strength = payload.strength,
            ModifierOp::Scale if refreshed.strength => anchor.strength *= payload.strength,
            ModifierOp::Scale => {}
            ModifierOp::Lock => anchor.strength = payload.locked_strength,
        }
    }

    fn tangent_in_frame(current: Vec3, value: Vec3) -> Vec3 {
        match current.try_normalize() {
            Some(axis) => Quaternion::from_rotation_arc(Vec3::X, axis).rotate(value),
            None => value,
        }
    }
}
