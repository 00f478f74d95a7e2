//! Trail type data and source configuration.

use filament_shared::{Vec3, MAX_SHEETS, MAX_TESSELLATION, MAX_TRAILS};
use serde::{Deserialize, Serialize};

use crate::distribution::FloatDistribution;
use crate::modules::ParticleSelection;

/// Trail configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailTypeData {
    /// Most trails alive at once. The oldest chain rolls over.
    pub max_trail_count: u32,
    /// Most particles per chain. The tail dies first.
    pub max_particle_in_trail_count: u32,
    /// Ribbons rotated around the chain axis.
    pub sheets_per_trail: u32,
    /// Upper bound on subdivisions between two particles.
    pub max_tessellation_between_particles: u32,
    /// Distance per subdivision; 0 always uses the maximum.
    pub tessellation_distance: f32,
    /// Texture repeats along the trail.
    pub texture_tile: u32,
    /// Distance per texture repeat; 0 uses `texture_tile`.
    pub texture_tile_distance: f32,
    /// Drop the segment between the live source and the head.
    pub clip_source_segment: bool,
    /// Width over the chain, 0 at the head, 1 at the tail.
    pub taper_factor: FloatDistribution,
}

impl Default for TrailTypeData {
    fn default() -> Self {
        Self {
            max_trail_count: 1,
            max_particle_in_trail_count: 100,
            sheets_per_trail: 1,
            max_tessellation_between_particles: 1,
            tessellation_distance: 0.0,
            texture_tile: 1,
            texture_tile_distance: 0.0,
            clip_source_segment: false,
            taper_factor: FloatDistribution::constant(1.0),
        }
    }
}

impl TrailTypeData {
    /// Trail count clamped to `[1, MAX_TRAILS]`.
    #[must_use]
    pub fn max_trail_count(&self) -> u32 {
        self.max_trail_count.clamp(1, MAX_TRAILS)
    }

    /// Chain length, at least 1.
    #[must_use]
    pub fn max_particle_in_trail_count(&self) -> u32 {
        self.max_particle_in_trail_count.max(1)
    }

    /// Sheet count clamped to `[1, MAX_SHEETS]`.
    #[must_use]
    pub fn sheets(&self) -> u32 {
        self.sheets_per_trail.clamp(1, MAX_SHEETS)
    }

    /// Subdivision cap clamped to `[1, MAX_TESSELLATION]`.
    #[must_use]
    pub fn max_tessellation(&self) -> u32 {
        self.max_tessellation_between_particles.clamp(1, MAX_TESSELLATION)
    }

    /// Pool capacity: every chain at full length.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_trail_count() as usize * self.max_particle_in_trail_count() as usize
    }

    /// Subdivisions for a segment of `length`.
    #[must_use]
    pub fn tessellation_for(&self, length: f32) -> u32 {
        let max = self.max_tessellation();
        if self.tessellation_distance > 0.0 {
            ((length / self.tessellation_distance).ceil() as u32).clamp(1, max)
        } else {
            max
        }
    }
}

/// Where trail heads come from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrailSourceMethod {
    /// The owner component, one trail per offset.
    #[default]
    Emitter,
    /// One trail per particle of a source emitter.
    Particle {
        /// Source emitter name.
        emitter: String,
        /// Which particles get trails first.
        #[serde(default)]
        selection: ParticleSelection,
    },
    /// A named actor, one trail per offset.
    Actor {
        /// Parameter name.
        name: String,
    },
}

/// Trail source module.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailSource {
    /// Source method.
    pub method: TrailSourceMethod,
    /// Per-trail offsets in the owner's local frame.
    pub offsets: Vec<Vec3>,
}

impl TrailSource {
    /// Name of the source emitter for the particle method.
    #[must_use]
    pub fn source_emitter(&self) -> Option<&str> {
        match &self.method {
            TrailSourceMethod::Particle { emitter, .. } => Some(emitter),
            _ => None,
        }
    }
}
