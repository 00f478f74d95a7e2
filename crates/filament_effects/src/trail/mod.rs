//! # Trail Engine
//!
//! Ribbons built from linked particle chains. New particles join at the
//! head as the source moves; the tail ages out or is cut when the chain
//! is full.

pub mod emitter;
pub mod payload;
pub mod type_data;

pub use emitter::{SourceKey, TrailEmitter, TrailOffsets, TrailPoint, TrailView};
pub use payload::{ChainRole, TrailPayload};
pub use type_data::{TrailSource, TrailSourceMethod, TrailTypeData};
