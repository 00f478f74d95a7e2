//! # Memory Management
//!
//! Per-emitter particle storage.
//!
//! ## Design Philosophy
//!
//! Layout is computed once when an emitter attaches. During a tick:
//! - No heap allocations
//! - Fixed record stride
//! - Payloads addressed by precomputed offsets

mod layout;
mod pool;

pub use layout::{LayoutEntry, PayloadAllocator, PayloadLayout, PayloadRequest, PayloadStage, PayloadTag};
pub use pool::ParticlePool;
