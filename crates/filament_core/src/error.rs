//! # Layout Error Types
//!
//! Errors raised while fixing an emitter's per-particle layout.
//! They only occur at attach time; a running emitter never sees them.

use thiserror::Error;

use crate::memory::PayloadTag;

/// Errors that can occur while building a payload layout or pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A module asked for a negative number of bytes.
    #[error("payload {tag:?} requested a negative size ({size} bytes)")]
    NegativeSize {
        /// The offending payload.
        tag: PayloadTag,
        /// The requested size.
        size: isize,
    },

    /// Two payloads claim the same bytes (or the same tag twice).
    #[error("payload {tag:?} overlaps payload {other:?}")]
    Overlap {
        /// The payload that was being placed.
        tag: PayloadTag,
        /// The payload it collides with.
        other: PayloadTag,
    },

    /// A fixed offset points inside the particle header.
    #[error("payload {tag:?} pinned at offset {offset}, inside the {header}-byte header")]
    InsideHeader {
        /// The offending payload.
        tag: PayloadTag,
        /// The requested offset.
        offset: usize,
        /// Header size in bytes.
        header: usize,
    },

    /// A pool was requested with no room for particles.
    #[error("particle pool needs a non-zero capacity (stride {stride}, capacity {capacity})")]
    EmptyPool {
        /// Record stride in bytes.
        stride: usize,
        /// Requested particle capacity.
        capacity: usize,
    },
}

/// Result type for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;
