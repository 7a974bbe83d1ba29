//! Renderer-agnostic scene flattening.
//!
//! The parsed models keep geometry grouped the way the archives store it.
//! Renderers want one interleaved vertex buffer, one index buffer, and an
//! ordered list of draw calls with their texture and blend state. The
//! builders here produce exactly that, leaving GPU upload, shader
//! selection, and blend configuration to the consumer.

pub mod map;
pub mod stage;

pub use map::{MapDrawCall, MapScene, build_map_scene};
pub use stage::{StageDrawCall, StageScene, build_stage_scene};
