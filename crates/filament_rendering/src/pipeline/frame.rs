//! Render frame data structures.
//!
//! Contains all data needed to draw the ribbons of one effect for a frame.

use super::RenderStats;
use crate::ribbon::RibbonBatch;

/// One emitter's strip.
#[derive(Debug, Clone)]
pub struct EmitterBatch {
    /// Emitter name.
    pub emitter: String,
    /// Vertices and indices.
    pub batch: RibbonBatch,
}

impl EmitterBatch {
    /// Triangles to submit for this emitter, degenerates included.
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.batch.triangle_count()
    }
}

/// All data needed to draw a frame.
///
/// Produced by `RenderPipeline::prepare_frame`. The renderer owns it, so
/// detaching or ticking the effect afterwards does not invalidate it.
#[derive(Debug, Clone, Default)]
pub struct RenderFrame {
    /// One entry per emitter that drew something, in host order.
    pub batches: Vec<EmitterBatch>,
    /// Frame statistics.
    pub stats: RenderStats,
}

impl RenderFrame {
    /// Batch of the named emitter.
    #[must_use]
    pub fn batch(&self, emitter: &str) -> Option<&RibbonBatch> {
        self.batches.iter().find(|b| b.emitter == emitter).map(|b| &b.batch)
    }

    /// Returns true if there's anything to draw.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.batches.is_empty()
    }
}
