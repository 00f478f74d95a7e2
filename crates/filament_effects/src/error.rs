//! # Effect Error Types
//!
//! Boot-time errors are returned as [`EffectError`]. Per-frame faults never
//! unwind out of a tick; they are tallied in [`EmitterDiagnostics`].

use std::sync::atomic::{AtomicBool, Ordering};

use filament_core::LayoutError;
use thiserror::Error;

/// Errors raised while loading templates or attaching emitters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// The module list produced an invalid payload layout.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// A template failed to parse or validate.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A beam names its own emitter as a particle source.
    #[error("emitter '{0}' cannot use itself as a particle source")]
    SelfReference(String),

    /// Two emitters share a name.
    #[error("duplicate emitter name: {0}")]
    DuplicateEmitter(String),

    /// An emitter name did not match anything.
    #[error("unknown emitter: {0}")]
    UnknownEmitter(String),

    /// A template file could not be read.
    #[error("failed to read template {path}: {reason}")]
    TemplateIo {
        /// File path.
        path: String,
        /// OS error text.
        reason: String,
    },
}

/// Result type for effect operations.
pub type EffectResult<T> = Result<T, EffectError>;

/// Recoverable per-frame fault kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuntimeFault {
    /// A named anchor failed to resolve; the last value was kept.
    ResolveMiss,
    /// Source and target coincide; the beam drew nothing this frame.
    DegenerateBeam,
    /// A noise frequency above the cap was clamped.
    FrequencyOverflow,
    /// A spawn exceeded capacity and recycled the oldest particle.
    CapacityExhausted,
    /// A particle-source emitter had nothing to bind to.
    UnresolvedParticle,
}

/// Fault counters of one emitter instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmitterDiagnostics {
    /// Named anchors that failed to resolve.
    pub resolve_misses: u64,
    /// Beams that degenerated.
    pub degenerate_beams: u64,
    /// Clamped noise frequencies.
    pub frequency_overflows: u64,
    /// Particles recycled because capacity ran out.
    pub capacity_recycles: u64,
    /// Particle-source binds that found no particle.
    pub unresolved_particles: u64,
}

impl EmitterDiagnostics {
    /// Counts one fault.
    #[inline]
    pub fn record(&mut self, fault: RuntimeFault) {
        *self.counter_mut(fault) += 1;
    }

    /// Current count for a fault kind.
    #[must_use]
    pub fn count(&self, fault: RuntimeFault) -> u64 {
        match fault {
            RuntimeFault::ResolveMiss => self.resolve_misses,
            RuntimeFault::DegenerateBeam => self.degenerate_beams,
            RuntimeFault::FrequencyOverflow => self.frequency_overflows,
            RuntimeFault::CapacityExhausted => self.capacity_recycles,
            RuntimeFault::UnresolvedParticle => self.unresolved_particles,
        }
    }

    fn counter_mut(&mut self, fault: RuntimeFault) -> &mut u64 {
        match fault {
            RuntimeFault::ResolveMiss => &mut self.resolve_misses,
            RuntimeFault::DegenerateBeam => &mut self.degenerate_beams,
            RuntimeFault::FrequencyOverflow => &mut self.frequency_overflows,
            RuntimeFault::CapacityExhausted => &mut self.capacity_recycles,
            RuntimeFault::UnresolvedParticle => &mut self.unresolved_particles,
        }
    }
}

static FREQUENCY_OVERFLOW_LOGGED: AtomicBool = AtomicBool::new(false);

/// Logs a clamped noise frequency, once per process.
///
/// Returns `true` if this call emitted the log line.
pub fn log_frequency_overflow(emitter: &str, requested: u32, max: u32) -> bool {
    if FREQUENCY_OVERFLOW_LOGGED.swap(true, Ordering::Relaxed) {
        return false;
    }
    tracing::warn!(emitter, requested, max, "noise frequency clamped");
    true
}
