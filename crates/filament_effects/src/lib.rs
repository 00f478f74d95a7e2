//! # FILAMENT Effects
//!
//! Beam and trail simulation on top of the `filament_core` byte pool.
//!
//! ## Frame
//!
//! ```text
//! host ── dt, transform, parameters ──> EffectSystem::tick
//!                                          │
//!            ┌─────────────────────────────┼─────────────────────────────┐
//!            v                             v                             v
//!     BeamEmitter::tick             TrailEmitter::tick                  ...
//!     resolve → modify →            kill → bind sources →
//!     noise → grow/lock             spawn → link → tessellate
//!            │                             │
//!            └──────── snapshot ───────────┘
//!                          │
//!                 dispatch queued events
//!                 (receivers, then EventStream)
//! ```
//!
//! ## Rules
//!
//! 1. **Modules are read-only** - per-particle state lives in the pool
//! 2. **No cross-emitter borrows** - source emitters are read through
//!    published snapshots
//! 3. **Events are queued** - receivers run after every emitter ticked
//! 4. **Per-frame faults never unwind** - they are counted in
//!    [`EmitterDiagnostics`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use filament_effects::{EffectSystem, EffectTemplate, ParameterTable};
//!
//! let template = EffectTemplate::from_file("effects/lightning.toml")?;
//! let parameters = ParameterTable::new();
//! let mut effect = EffectSystem::new(&template, parameters.handle(), None)?;
//! effect.tick(1.0 / 60.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod beam;
pub mod bus;
pub mod config;
pub mod distribution;
pub mod emitter;
pub mod error;
pub mod modules;
pub mod params;
pub mod random;
pub mod system;
pub mod trail;

pub use beam::{BeamEmitter, BeamView};
pub use bus::{EventBus, EventStream};
pub use config::{BeamTemplate, EffectTemplate, EmitterKind, EmitterTemplate, TrailTemplate};
pub use distribution::{FloatDistribution, VectorDistribution};
pub use emitter::{Emitter, FrameContext};
pub use error::{EffectError, EffectResult, EmitterDiagnostics, RuntimeFault};
pub use params::{ActorState, ParameterHandle, ParameterTable, ParameterValue};
pub use random::{EffectSeed, ParticleRng};
pub use system::EffectSystem;
pub use trail::{TrailEmitter, TrailPoint, TrailView};
