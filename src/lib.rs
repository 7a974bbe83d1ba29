//! # ps2stage
//!
//! A pure-Rust library for extracting scene geometry and textures from the
//! PS2 stage archives of Haunting Ground and Silent Hill 3.
//!
//! ## Supported Formats
//!
//! - **PAC stage archives** (Haunting Ground) - VIF-packed draw records and
//!   GS-native textures
//! - **Map archives** (Silent Hill 3) - offset-linked geometry trees,
//!   transform tables, and local/global/TR texture archives
//! - **GS local memory** - tiled upload and palette-indexed readback of
//!   4-/8-bit images
//!
//! ## Quick Start
//!
//! ### Haunting Ground stages
//!
//! ```no_run
//! use ps2stage::formats::pac::read_stage_pac;
//!
//! let stage = read_stage_pac("ST_000.PAC")?;
//! println!("{} mesh groups, {} textures", stage.mesh_groups.len(), stage.textures.len());
//! # Ok::<(), ps2stage::Error>(())
//! ```
//!
//! ### Silent Hill 3 maps
//!
//! ```no_run
//! use ps2stage::formats::map::read_map;
//!
//! let map = read_map("mall.map", "global.tex", None)?;
//! for texture in &map.textures {
//!     println!("{} ({}x{})", texture.name, texture.width, texture.height);
//! }
//! # Ok::<(), ps2stage::Error>(())
//! ```
//!
//! ### Flattening for a renderer
//!
//! ```no_run
//! use ps2stage::formats::pac::read_stage_pac;
//! use ps2stage::scene::build_stage_scene;
//!
//! let stage = read_stage_pac("ST_000.PAC")?;
//! let scene = build_stage_scene(&stage);
//! // scene.vertex_data / scene.index_data / scene.draw_calls feed the GPU.
//! # Ok::<(), ps2stage::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `ps2stage` command-line binary

pub mod error;
pub mod formats;
pub mod gs;
pub mod scene;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::formats::map::{
        ImageSource, MapParser, MapTexture, SilentHill3Map, parse_map, read_map, texture_name,
    };
    pub use crate::formats::pac::{Stage, Texture, parse_stage_pac, read_stage_pac};
    pub use crate::gs::{GsMemoryMap, PixelStorageFormat};
    pub use crate::scene::{
        MapScene, StageScene, build_map_scene, build_stage_scene,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
