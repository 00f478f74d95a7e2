//! # Emitter Modules
//!
//! Read-only configuration shared by every instance of a template. Modules
//! never own per-particle state; they read and write the instance's pool at
//! offsets fixed when the instance attached.

pub mod anchor;
pub mod dynamic_param;
pub mod event;
pub mod modifier;
pub mod noise;
pub mod required;
pub mod spawn_per_unit;

pub use anchor::{
    resolve_offset, Anchor, AnchorMethod, AnchorModule, HostAnchors, ParticleSelection, PickCursor,
    Refreshed, ResolveContext, TangentMethod,
};
pub use dynamic_param::{DynamicParamChannel, DynamicParamMode, DynamicParamPayload, DynamicParameterModule};
pub use event::{EventGenerator, EventReceiver, ReceiverAction, ReceiverOutcome, ReceiverState};
pub use modifier::{AnchorModifier, ModifierField, ModifierOp, ModifierPayload};
pub use noise::{NoiseLayout, NoiseModule, NoiseTimer};
pub use required::{Burst, EmitterClock, InitialState, RequiredModule};
pub use spawn_per_unit::{SpawnPerUnit, SpawnPerUnitState, UnitSpawn};
