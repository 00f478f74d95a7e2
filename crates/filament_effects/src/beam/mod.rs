//! # Beam Engine
//!
//! One particle per beam. Each tick resolves the two anchors, grows the head
//! toward the target, and records the step counts the tessellator needs.

pub mod emitter;
pub mod payload;
pub mod type_data;

pub use emitter::{BeamEmitter, BeamView};
pub use payload::{Beam2Payload, BeamOffsets, BeamPayloadPlan, BeamState};
pub use type_data::{
    noise_point_count, steps_with_noise, steps_without_noise, taper_count, triangle_count, BeamMethod,
    BeamTypeData, StepAccount, TaperMethod,
};
