//! # Beam Payload
//!
//! The type-data record every beam particle carries right after the header,
//! the packed state word it shares with the noise module, and the offsets of
//! every optional sub-field.

use bytemuck::{Pod, Zeroable};
use filament_core::{LayoutError, PayloadAllocator, PayloadLayout, PayloadTag};
use filament_shared::{AnchorSide, Vec3, MAX_NOISE_FREQUENCY};

use crate::modules::{Anchor, AnchorModifier, DynamicParameterModule, NoiseLayout};

/// Per-beam state.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Beam2Payload {
    /// Resolved source position.
    pub source_point: Vec3,
    /// Resolved source tangent.
    pub source_tangent: Vec3,
    /// Source tangent scale.
    pub source_strength: f32,
    /// Resolved target position.
    pub target_point: Vec3,
    /// Resolved target tangent.
    pub target_tangent: Vec3,
    /// Target tangent scale.
    pub target_strength: f32,
    /// Packed [`BeamState`].
    pub state: u32,
    /// Interpolated points in use.
    pub interpolation_steps: i32,
    /// Unit source-to-target direction.
    pub direction: Vec3,
    /// Length of one segment.
    pub step_size: f32,
    /// Completed segments.
    pub steps: i32,
    /// Progress through the next segment, in [0, 1).
    pub travel_ratio: f32,
    /// Triangles this beam contributes.
    pub triangle_count: i32,
    /// Bound source particle, -1 when none.
    pub source_particle: i32,
    /// Bound target particle, -1 when none.
    pub target_particle: i32,
    /// Seconds since attach when the beam spawned.
    pub birth_time: f32,
}

impl Beam2Payload {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Unpacked state word.
    #[inline]
    #[must_use]
    pub const fn beam_state(&self) -> BeamState {
        BeamState::unpack(self.state)
    }

    /// Updates the state word.
    #[inline]
    pub fn update_state(&mut self, f: impl FnOnce(&mut BeamState)) {
        let mut state = self.beam_state();
        f(&mut state);
        self.state = state.pack();
    }

    /// True once the head reached the target.
    #[inline]
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.beam_state().locked
    }

    /// The resolved anchor of one side.
    #[must_use]
    pub const fn anchor(&self, side: AnchorSide) -> Anchor {
        match side {
            AnchorSide::Source => Anchor {
                position: self.source_point,
                tangent: self.source_tangent,
                strength: self.source_strength,
            },
            AnchorSide::Target => Anchor {
                position: self.target_point,
                tangent: self.target_tangent,
                strength: self.target_strength,
            },
        }
    }

    /// Stores the resolved anchor of one side.
    pub fn set_anchor(&mut self, side: AnchorSide, anchor: Anchor) {
        let (point, tangent, strength) = match side {
            AnchorSide::Source => (&mut self.source_point, &mut self.source_tangent, &mut self.source_strength),
            AnchorSide::Target => (&mut self.target_point, &mut self.target_tangent, &mut self.target_strength),
        };
        *point = anchor.position;
        *tangent = anchor.tangent;
        *strength = anchor.strength;
    }

    /// Bound particle index of one side.
    pub fn picked_mut(&mut self, side: AnchorSide) -> &mut i32 {
        match side {
            AnchorSide::Source => &mut self.source_particle,
            AnchorSide::Target => &mut self.target_particle,
        }
    }
}

/// State shared between the type-data engine and the noise module.
///
/// | Bits | Field |
/// |---|---|
/// | 0-6 | frequency chosen for this beam |
/// | 7 | locked to target |
/// | 8-31 | active noise points |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BeamState {
    /// Chosen noise frequency.
    pub frequency: u32,
    /// Head reached the target.
    pub locked: bool,
    /// Active noise points.
    pub noise_points: u32,
}

impl BeamState {
    const FREQUENCY_MASK: u32 = 0x7F;
    const LOCKED_BIT: u32 = 1 << 7;
    const NOISE_SHIFT: u32 = 8;
    const NOISE_MASK: u32 = 0x00FF_FFFF;

    /// Packs into a word. Out-of-range fields are truncated.
    #[must_use]
    pub const fn pack(self) -> u32 {
        let locked = if self.locked { Self::LOCKED_BIT } else { 0 };
        (self.frequency & Self::FREQUENCY_MASK) | locked | ((self.noise_points & Self::NOISE_MASK) << Self::NOISE_SHIFT)
    }

    /// Unpacks a word.
    #[must_use]
    pub const fn unpack(word: u32) -> Self {
        Self {
            frequency: word & Self::FREQUENCY_MASK,
            locked: word & Self::LOCKED_BIT != 0,
            noise_points: word >> Self::NOISE_SHIFT,
        }
    }
}

const _: () = assert!(MAX_NOISE_FREQUENCY <= BeamState::FREQUENCY_MASK);

/// Absolute byte offsets of a beam record's payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BeamOffsets {
    /// [`Beam2Payload`].
    pub type_data: usize,
    /// `Vec3` interpolated points, if any.
    pub interpolated: Option<usize>,
    /// Interpolated point count.
    pub interpolation_points: usize,
    /// Noise sub-fields.
    pub noise: Option<NoiseLayout>,
    /// Source modifier payload.
    pub source_modifier: Option<usize>,
    /// Target modifier payload.
    pub target_modifier: Option<usize>,
    /// Dynamic parameter payload.
    pub dynamic_parameter: Option<usize>,
    /// `f32` taper values, if tapering.
    pub taper: Option<usize>,
    /// Taper value count.
    pub taper_count: usize,
}

/// What a beam emitter stores per particle.
#[derive(Clone, Copy, Debug, Default)]
pub struct BeamPayloadPlan<'a> {
    /// Interpolation points.
    pub interpolation_points: usize,
    /// Noise layout, relative.
    pub noise: Option<NoiseLayout>,
    /// Source modifier present.
    pub source_modifier: Option<&'a AnchorModifier>,
    /// Target modifier present.
    pub target_modifier: Option<&'a AnchorModifier>,
    /// Dynamic parameter present.
    pub dynamic_parameter: Option<&'a DynamicParameterModule>,
    /// Taper value count, 0 when not tapering.
    pub taper_count: usize,
}

impl BeamPayloadPlan<'_> {
    /// Runs the allocator and returns the layout plus resolved offsets.
    ///
    /// # Errors
    ///
    /// Propagates [`LayoutError`] from the allocator.
    pub fn allocate(&self) -> Result<(PayloadLayout, BeamOffsets), LayoutError> {
        let vec3 = std::mem::size_of::<Vec3>();
        let type_data_size = Beam2Payload::SIZE + self.interpolation_points * vec3;

        let mut allocator = PayloadAllocator::new().request(PayloadTag::BeamTypeData, type_data_size as isize);
        if let Some(noise) = &self.noise {
            allocator = allocator.request(PayloadTag::Noise, noise.size as isize);
        }
        if self.source_modifier.is_some() {
            allocator = allocator.request(PayloadTag::SourceModifier, AnchorModifier::PAYLOAD_SIZE as isize);
        }
        if self.target_modifier.is_some() {
            allocator = allocator.request(PayloadTag::TargetModifier, AnchorModifier::PAYLOAD_SIZE as isize);
        }
        if self.dynamic_parameter.is_some() {
            allocator =
                allocator.request(PayloadTag::DynamicParameter, DynamicParameterModule::PAYLOAD_SIZE as isize);
        }
        if self.taper_count > 0 {
            allocator = allocator.request(PayloadTag::Taper, (self.taper_count * 4) as isize);
        }

        let layout = allocator.allocate()?;
        let type_data = layout.offset_of(PayloadTag::BeamTypeData).unwrap_or(layout.header_size());
        let offsets = BeamOffsets {
            type_data,
            interpolated: (self.interpolation_points > 0).then_some(type_data + Beam2Payload::SIZE),
            interpolation_points: self.interpolation_points,
            noise: self
                .noise
                .zip(layout.offset_of(PayloadTag::Noise))
                .map(|(noise, base)| noise.at(base)),
            source_modifier: layout.offset_of(PayloadTag::SourceModifier),
            target_modifier: layout.offset_of(PayloadTag::TargetModifier),
            dynamic_parameter: layout.offset_of(PayloadTag::DynamicParameter),
            taper: layout.offset_of(PayloadTag::Taper),
            taper_count: self.taper_count,
        };
        Ok((layout, offsets))
    }
}
