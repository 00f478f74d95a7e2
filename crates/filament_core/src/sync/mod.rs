//! # Cross-Emitter Publication
//!
//! ## The Problem
//!
//! ```text
//! Emitter A (sparks):     owns its particle pool, ticks first
//! Emitter B (beam):       wants a spark as its source anchor
//!
//! B reading A's pool directly: aliasing + ordering hazard
//! ```
//!
//! ## The Solution: Published Snapshots
//!
//! ```text
//! Frame N:
//!   A ticks, then publishes (origin, [location, velocity]) under a write lock
//!   B ticks, reads the snapshot through a Weak handle
//!
//! A detaches:
//!   the Arc drops, B's handle fails to upgrade, B falls back
//! ```

mod snapshot;

pub use snapshot::{EmitterSnapshot, SnapshotHandle, SnapshotParticle, SnapshotPublisher};
