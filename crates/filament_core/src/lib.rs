//! # FILAMENT Core
//!
//! Per-particle memory for beam and trail emitters:
//! - A fixed [`BaseParticle`] header at offset 0 of every record
//! - A payload allocator that fixes module offsets once, at attach
//! - A byte pool with a live-index array, owned by exactly one emitter
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in hot path** - pools are pre-allocated
//! 2. **Layout is immutable** - offsets never change after attach
//! 3. **No strong cross-emitter references** - readers hold weak handles
//!
//! ## Example
//!
//! ```rust,ignore
//! use filament_core::{PayloadAllocator, PayloadTag, ParticlePool};
//!
//! let layout = PayloadAllocator::new()
//!     .request(PayloadTag::BeamTypeData, 100)
//!     .allocate()?;
//! let mut pool = ParticlePool::new(&layout, 64)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;
pub mod particle;
pub mod sync;

pub use error::{LayoutError, LayoutResult};
pub use memory::{
    LayoutEntry, ParticlePool, PayloadAllocator, PayloadLayout, PayloadRequest, PayloadStage,
    PayloadTag,
};
pub use particle::{flags, BaseParticle, HEADER_SIZE};
pub use sync::{EmitterSnapshot, SnapshotHandle, SnapshotParticle, SnapshotPublisher};
