//! # Subsystem Caps
//!
//! Compile-time limits shared by the simulation and the vertex packer.
//!
//! **CRITICAL:** The packer sizes its scratch arrays from these values.
//! Raising one without the other corrupts the vertex stream.

// =============================================================================
// TOLERANCES
// =============================================================================

/// Tolerance for "effectively zero" geometric quantities.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Squared-length floor below which a vector is not normalized.
pub const SMALL_NUMBER: f32 = 1.0e-8;

// =============================================================================
// BEAM LIMITS
// =============================================================================

/// Highest noise frequency a beam may use.
///
/// The packed beam word stores the frequency in 7 bits.
pub const MAX_NOISE_FREQUENCY: u32 = 127;

/// Highest number of Hermite interpolation points per beam.
pub const MAX_INTERPOLATION_POINTS: u32 = 250;

/// Highest number of beams a single emitter may own.
pub const MAX_BEAMS: u32 = 2048;

/// Highest number of duplicate sheets rotated around a beam or trail axis.
pub const MAX_SHEETS: u32 = 16;

/// Highest tessellation between two noise points or two trail particles.
pub const MAX_TESSELLATION: u32 = 64;

/// Lock radius used when the target resolver does not provide one.
pub const DEFAULT_LOCK_RADIUS: f32 = 1.0;

/// Distance substituted for a zero-length distance-method beam.
pub const MIN_BEAM_DISTANCE: f32 = 0.001;

// =============================================================================
// TRAIL LIMITS
// =============================================================================

/// Highest number of simultaneous chains per trail emitter.
pub const MAX_TRAILS: u32 = 256;

/// Sentinel stored in prev/next links for "no neighbour".
pub const NULL_LINK: i32 = -1;
