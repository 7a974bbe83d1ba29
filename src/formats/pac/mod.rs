//! Haunting Ground stage archives (PAC).
//!
//! A stage archive carries a VIF-packed geometry sector of fixed-layout
//! draw records and a texture sector of GS-native images. [`read_stage_pac`]
//! and [`parse_stage_pac`] decode one archive into a flat [`Stage`]: mesh
//! groups with world-space vertices and strip-derived indices, plus decoded
//! RGBA textures.

mod reader;

pub use reader::{parse_stage_pac, read_stage_pac};

use crate::formats::common::TextureSummary;
use crate::gs::PixelStorageFormat;
use glam::{Vec2, Vec3, Vec4};
use serde::Serialize;

/// A decoded stage: ordered mesh groups and a flat texture table.
#[derive(Debug)]
pub struct Stage {
    pub mesh_groups: Vec<MeshGroup>,
    pub textures: Vec<Texture>,
}

/// A batch of triangles sharing one texture and blend state.
///
/// All per-vertex sequences have equal length, and every index refers into
/// this group's own vertices. Positions are world space (the record matrix
/// is applied at parse time).
#[derive(Debug, Default)]
pub struct MeshGroup {
    pub vertices: Vec<Vec3>,
    pub vertex_colors: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    /// Index into [`Stage::textures`]; negative for untextured (light-only)
    /// geometry.
    pub texture_index: i32,
    pub translucent: bool,
    pub additive_blend: bool,
}

/// A decoded RGBA8 texture.
#[derive(Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    /// Source storage format, for diagnostics only.
    pub psm: PixelStorageFormat,
    /// `width * height * 4` bytes, row-major RGBA.
    pub pixels: Vec<u8>,
    pub name: String,
}

impl Texture {
    pub fn new(width: u32, height: u32, psm: PixelStorageFormat, index: usize) -> Self {
        Self {
            width,
            height,
            psm,
            pixels: vec![0u8; (width as usize) * (height as usize) * 4],
            name: format!("TEX_{index}"),
        }
    }
}

/// Serializable stage statistics for reporting.
#[derive(Debug, Serialize)]
pub struct StageSummary {
    pub mesh_groups: usize,
    pub total_vertices: usize,
    pub total_triangles: usize,
    pub translucent_groups: usize,
    pub textures: Vec<TextureSummary>,
}

impl Stage {
    pub fn summary(&self) -> StageSummary {
        StageSummary {
            mesh_groups: self.mesh_groups.len(),
            total_vertices: self.mesh_groups.iter().map(|g| g.vertices.len()).sum(),
            total_triangles: self.mesh_groups.iter().map(|g| g.indices.len() / 3).sum(),
            translucent_groups: self.mesh_groups.iter().filter(|g| g.translucent).count(),
            textures: self
                .textures
                .iter()
                .map(|t| TextureSummary {
                    name: t.name.clone(),
                    width: t.width,
                    height: t.height,
                    format: t.psm.to_string(),
                })
                .collect(),
        }
    }
}
