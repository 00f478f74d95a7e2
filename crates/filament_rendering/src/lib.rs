//! # FILAMENT Rendering
//!
//! Tessellates beam and trail emitters into strided vertex buffers the
//! ribbon shader consumes.
//!
//! ## Pipeline
//!
//! ```text
//! EffectSystem ──> RenderPipeline::prepare_frame(view)
//!                        │
//!          ┌─────────────┴─────────────┐
//!          v                           v
//!     BeamPacker                  TrailPacker
//!     payload → centerline        chain → Hermite samples
//!          │                           │
//!          └──────> RibbonBatch <──────┘
//!                   2 vertices per point per sheet,
//!                   strips joined by degenerates
//! ```
//!
//! ## Rules
//!
//! 1. **Fixed declaration** - [`vertex::declaration`] is what the shader
//!    expects, 76 bytes per vertex or 92 with dynamic parameters
//! 2. **Renderer-owned staging** - a [`RenderFrame`] stays valid after the
//!    effect ticks or detaches
//! 3. **Read-only** - packing never touches particle state
//!
//! ## Example
//!
//! ```rust,ignore
//! use filament_rendering::{RenderPipeline, ViewContext};
//!
//! let mut pipeline = RenderPipeline::new();
//! let frame = pipeline.prepare_frame(&effect, &ViewContext::new(camera, Vec3::Z));
//! for batch in &frame.batches {
//!     upload(batch.batch.vertices.as_bytes(), &batch.batch.indices);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod beam_packer;
pub mod pipeline;
pub mod ribbon;
pub mod trail_packer;
pub mod vertex;
pub mod view;

pub use beam_packer::BeamPacker;
pub use pipeline::{EmitterBatch, RenderFrame, RenderPipeline, RenderStats};
pub use ribbon::{RibbonBatch, RibbonPoint};
pub use trail_packer::TrailPacker;
pub use vertex::{DynamicRibbonVertex, RibbonVertex, VertexBuffer, VertexElement, VertexFormat, VertexSemantic};
pub use view::ViewContext;
