//! # Beam Type Data
//!
//! Beam configuration and the pure step-accounting rules of the engine.
//!
//! ## Step accounting
//!
//! Without noise a beam is cut into `Interp` segments. With noise it is cut
//! into `C + 1` segments, where `C` is the active noise-point count. A
//! growing beam reports how many whole segments its head has passed
//! (`steps`) and how far it is into the next one (`travel_ratio`).

use filament_shared::{KINDA_SMALL_NUMBER, MAX_BEAMS, MAX_INTERPOLATION_POINTS, MAX_SHEETS};
use serde::{Deserialize, Serialize};

use crate::distribution::FloatDistribution;

/// How the target end is found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamMethod {
    /// Use the target resolver.
    #[default]
    Target,
    /// Project `distance` along the owner's forward axis.
    Distance,
}

/// How the width tapers along the beam.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaperMethod {
    /// Constant width.
    #[default]
    None,
    /// Taper over the full source-to-target length.
    Full,
    /// Taper over the travelled part of a growing beam.
    Partial,
}

/// Beam type-data configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamTypeData {
    /// Target method.
    pub beam_method: BeamMethod,
    /// Head speed in units per second. 0 locks at once.
    pub speed: f32,
    /// Hermite points between source and target.
    pub interpolation_points: u32,
    /// Most beams alive at once.
    pub max_beam_count: u32,
    /// Keep `max_beam_count` beams alive.
    pub always_on: bool,
    /// Ribbons rotated around the beam axis.
    pub sheets: u32,
    /// Beam length for the distance method, sampled at particle time.
    pub distance: FloatDistribution,
    /// Texture repeats along the beam.
    pub texture_tile: u32,
    /// Distance per texture repeat; 0 uses `texture_tile`.
    pub texture_tile_distance: f32,
    /// Taper method.
    pub taper_method: TaperMethod,
    /// Taper curve over the beam, 0 at source, 1 at target.
    pub taper_factor: FloatDistribution,
    /// Extra taper scale over the beam.
    pub taper_scale: FloatDistribution,
}

impl Default for BeamTypeData {
    fn default() -> Self {
        Self {
            beam_method: BeamMethod::Target,
            speed: 10.0,
            interpolation_points: 0,
            max_beam_count: 1,
            always_on: false,
            sheets: 1,
            distance: FloatDistribution::constant(25.0),
            texture_tile: 1,
            texture_tile_distance: 0.0,
            taper_method: TaperMethod::None,
            taper_factor: FloatDistribution::constant(1.0),
            taper_scale: FloatDistribution::constant(1.0),
        }
    }
}

impl BeamTypeData {
    /// Interpolation points clamped to the cap.
    #[must_use]
    pub fn interpolation_points(&self) -> u32 {
        self.interpolation_points.min(MAX_INTERPOLATION_POINTS)
    }

    /// Beam count clamped to `[1, MAX_BEAMS]`.
    #[must_use]
    pub fn max_beam_count(&self) -> u32 {
        self.max_beam_count.clamp(1, MAX_BEAMS)
    }

    /// Sheet count clamped to `[1, MAX_SHEETS]`.
    #[must_use]
    pub fn sheets(&self) -> u32 {
        self.sheets.clamp(1, MAX_SHEETS)
    }
}

/// Segment bookkeeping of one beam.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepAccount {
    /// Length of one segment.
    pub step_size: f32,
    /// Completed segments.
    pub steps: i32,
    /// Progress through the next segment.
    pub travel_ratio: f32,
    /// The head overshot the target and must lock.
    pub lock: bool,
}

/// Largest representable travel ratio below 1.
const MAX_TRAVEL_RATIO: f32 = 1.0 - f32::EPSILON;

fn clamp_ratio(ratio: f32) -> f32 {
    ratio.clamp(0.0, MAX_TRAVEL_RATIO)
}

/// Step accounting without noise.
///
/// `interp` is `max(InterpolationPoints, 1)`.
#[must_use]
pub fn steps_without_noise(full_mag: f32, true_mag: f32, interp: u32, locked: bool) -> StepAccount {
    let interp = interp.max(1);
    let step_size = full_mag / interp as f32;
    let locked_account = StepAccount { step_size, steps: interp as i32, travel_ratio: 0.0, lock: !locked };

    if locked {
        return StepAccount { lock: false, ..locked_account };
    }
    if true_mag > full_mag {
        return locked_account;
    }

    let ratio = true_mag / full_mag;
    let steps = (ratio * interp as f32).floor() as i32;
    let travel_ratio = (true_mag - step_size * steps as f32) / step_size;
    StepAccount { step_size, steps, travel_ratio: clamp_ratio(travel_ratio), lock: false }
}

/// Active noise points for a beam of `full_mag` length.
#[must_use]
pub fn noise_point_count(full_mag: f32, frequency: u32, frequency_distance: f32) -> u32 {
    if frequency_distance > 0.0 {
        ((full_mag / frequency_distance) as u32).min(frequency)
    } else {
        frequency
    }
}

/// Step accounting with `count` active noise points.
#[must_use]
pub fn steps_with_noise(full_mag: f32, true_mag: f32, count: u32, locked: bool) -> StepAccount {
    let segments = count as f32 + 1.0;
    let step_size = full_mag / segments;
    let count = count as i32;

    if locked {
        return StepAccount { step_size, steps: count, travel_ratio: 0.0, lock: false };
    }

    let ratio = true_mag / full_mag;
    let steps = ((ratio * segments).floor() as i32).min(count);
    let travelled = true_mag - step_size * steps as f32;
    let travel_ratio = if steps == count {
        travelled / (full_mag - step_size * steps as f32)
    } else {
        travelled / step_size
    };
    StepAccount { step_size, steps, travel_ratio: clamp_ratio(travel_ratio), lock: false }
}

/// Triangles a beam contributes to one sheet.
///
/// `noise_tessellation` is `Some(T)` when noise is active.
#[must_use]
pub fn triangle_count(steps: i32, travel_ratio: f32, locked: bool, noise_tessellation: Option<u32>) -> i32 {
    match noise_tessellation {
        None => {
            let partial = if travel_ratio > KINDA_SMALL_NUMBER { 2 } else { 0 };
            steps * 2 + partial
        }
        Some(t) => {
            let t = t.max(1) as i32;
            let tail = if locked {
                t * 2
            } else if travel_ratio > KINDA_SMALL_NUMBER {
                (travel_ratio * t as f32).floor() as i32 * 2
            } else {
                0
            };
            steps * t * 2 + tail
        }
    }
}

/// Taper values per beam.
///
/// `noise` is `Some((F, T))` when noise is active.
#[must_use]
pub fn taper_count(interpolation_points: u32, noise: Option<(u32, u32)>) -> usize {
    match noise {
        Some((frequency, tessellation)) => (frequency as usize + 1) * tessellation.max(1) as usize,
        None if interpolation_points > 0 => interpolation_points as usize + 1,
        None => 2,
    }
}
