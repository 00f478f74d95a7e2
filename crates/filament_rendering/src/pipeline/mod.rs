//! Render pipeline orchestration.
//!
//! Turns every emitter of an [`EffectSystem`] into a [`RibbonBatch`].

mod frame;
mod stats;

pub use frame::{EmitterBatch, RenderFrame};
pub use stats::RenderStats;

use filament_effects::{EffectSystem, Emitter};
use tracing::debug;

use crate::beam_packer::BeamPacker;
use crate::ribbon::RibbonBatch;
use crate::trail_packer::TrailPacker;
use crate::view::ViewContext;

/// Effect tessellation pipeline.
///
/// Keeps the packers' scratch buffers alive between frames.
#[derive(Debug, Default)]
pub struct RenderPipeline {
    beams: BeamPacker,
    trails: TrailPacker,
    stats: RenderStats,
}

impl RenderPipeline {
    /// Creates a new pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tessellates one emitter into `batch`, appending. Returns the ribbons
    /// drawn.
    pub fn pack_emitter(&mut self, emitter: &Emitter, view: &ViewContext, batch: &mut RibbonBatch) -> usize {
        match emitter {
            Emitter::Beam(beam) => self.beams.pack(beam, view, batch),
            Emitter::Trail(trail) => self.trails.pack(trail, view, batch),
        }
    }

    /// Tessellates every emitter of `effect` for `view`.
    pub fn prepare_frame(&mut self, effect: &EffectSystem, view: &ViewContext) -> RenderFrame {
        let mut frame = RenderFrame::default();
        let mut stats = RenderStats::default();

        for emitter in effect.emitters() {
            let mut batch = RibbonBatch::for_emitter(emitter);
            let drawn = self.pack_emitter(emitter, view, &mut batch) as u32;
            if drawn == 0 {
                continue;
            }
            match emitter {
                Emitter::Beam(_) => stats.beams += drawn,
                Emitter::Trail(_) => stats.trails += drawn,
            }
            stats.emitters += 1;
            stats.vertices += batch.vertices.len() as u32;
            stats.triangles += batch.ribbon_triangles();
            stats.degenerate_triangles += batch.degenerate_triangles();
            stats.vertex_bytes += batch.vertices.as_bytes().len();
            frame.batches.push(EmitterBatch { emitter: emitter.name().to_owned(), batch });
        }

        debug!(
            emitters = stats.emitters,
            ribbons = stats.ribbons(),
            vertices = stats.vertices,
            "prepared effect frame"
        );
        self.stats = stats;
        frame.stats = stats;
        frame
    }

    /// Returns statistics of the last prepared frame.
    #[must_use]
    pub const fn stats(&self) -> RenderStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_creation() {
        let pipeline = RenderPipeline::new();
        assert_eq!(pipeline.stats(), RenderStats::default());
    }
}
