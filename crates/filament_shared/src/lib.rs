//! # FILAMENT Shared
//!
//! Types used by both the simulation crates and the tessellator.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on a GPU or window crate.
//! If you need vertex types, put them in `filament_rendering`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod events;
pub mod math;

pub use constants::{
    DEFAULT_LOCK_RADIUS, KINDA_SMALL_NUMBER, MAX_BEAMS, MAX_INTERPOLATION_POINTS,
    MAX_NOISE_FREQUENCY, MAX_SHEETS, MAX_TESSELLATION, MAX_TRAILS, MIN_BEAM_DISTANCE, NULL_LINK,
    SMALL_NUMBER,
};
pub use events::{AnchorSide, EventKind, EventRecord, ParticleEvent};
pub use math::{cubic_interp, LinearColor, Quaternion, Transform, Vec3};
