//! Silent Hill 3 map archives.
//!
//! A map archive holds an offset-linked geometry tree (groups, meshes,
//! submeshes, shapes), a transform table, and a local texture section;
//! global and TR texture archives ship separately. [`MapParser`] walks the
//! geometry first, recording which (image, palette) combinations meshes
//! actually reference, then decodes only those images — one output texture
//! per referenced palette.

mod reader;

pub use reader::{MapParser, parse_map, read_map};

use crate::formats::common::TextureSummary;
use crate::gs::PixelStorageFormat;
use glam::{Mat4, Vec2, Vec3};
use serde::Serialize;
use std::collections::BTreeMap;

/// A decoded map: the geometry tree, decoded textures, the fallback
/// texture, and the transform table.
#[derive(Debug)]
pub struct SilentHill3Map {
    pub mesh_groups: Vec<MeshGroup>,
    pub textures: Vec<MapTexture>,
    pub dummy_texture: MapTexture,
    pub mesh_transforms: TransformTable,
}

impl SilentHill3Map {
    /// Iterate every submesh with its owning group and mesh, in tree order.
    pub fn iter_submeshes(&self) -> impl Iterator<Item = (&MeshGroup, &Mesh, &Submesh)> {
        self.mesh_groups.iter().flat_map(|group| {
            group.meshes.iter().flat_map(move |mesh| {
                mesh.submeshes
                    .iter()
                    .map(move |submesh| (group, mesh, submesh))
            })
        })
    }
}

/// Where a mesh group's texture image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ImageSource {
    Unknown,
    Global,
    Tr,
    Local,
}

impl ImageSource {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            1 => Self::Global,
            2 => Self::Tr,
            3 => Self::Local,
            _ => Self::Unknown,
        }
    }
}

/// The deterministic name a decoded texture is bound by.
///
/// Global and TR images carry a source prefix; local and unknown sources
/// use the bare index pair.
pub fn texture_name(image_index: i32, palette_index: u16, source: ImageSource) -> String {
    let prefix = match source {
        ImageSource::Global => "gb_",
        ImageSource::Tr => "tr_",
        ImageSource::Local | ImageSource::Unknown => "",
    };
    format!("tex_{prefix}{image_index}_{palette_index}")
}

/// A group of meshes sharing one source image.
#[derive(Debug)]
pub struct MeshGroup {
    pub image_source: ImageSource,
    pub image_index: i32,
    pub mesh_count: u16,
    pub meshes: Vec<Mesh>,
}

/// A mesh: one palette selection over the group's image.
#[derive(Debug)]
pub struct Mesh {
    pub texture_palette_index: u16,
    pub translucent: bool,
    pub submeshes: Vec<Submesh>,
}

#[derive(Debug)]
pub struct Submesh {
    pub shapes: Vec<Shape>,
}

/// A strip of vertices under one transform.
///
/// Positions are raw signed 16-bit units; the transform referenced by
/// `transform_index` positions them in the world. All per-vertex sequences
/// have equal length and indices refer into this shape only.
#[derive(Debug, Default)]
pub struct Shape {
    pub transform_index: u32,
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub vertex_colors: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };
}

/// A named placement in the transform table.
#[derive(Debug, Clone, Copy)]
pub struct MeshTransform {
    pub index: u32,
    pub transform: Mat4,
    pub aabb: Aabb,
}

/// The map's transform table, indexed sparsely.
///
/// Index 0 is a synthetic identity entry; lookups for indices the archive
/// never defined fall back to it.
#[derive(Debug)]
pub struct TransformTable {
    entries: BTreeMap<u32, MeshTransform>,
}

impl Default for TransformTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformTable {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            0,
            MeshTransform {
                index: 0,
                transform: Mat4::IDENTITY,
                aabb: Aabb::ZERO,
            },
        );
        Self { entries }
    }

    pub fn insert(&mut self, transform: MeshTransform) {
        self.entries.insert(transform.index, transform);
    }

    /// The transform at `index`, or the identity default when missing.
    pub fn get(&self, index: u32) -> &MeshTransform {
        self.entries.get(&index).unwrap_or(&self.entries[&0])
    }

    pub fn contains(&self, index: u32) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeshTransform> {
        self.entries.values()
    }
}

/// A decoded RGBA8 texture with its binding name.
#[derive(Debug)]
pub struct MapTexture {
    pub width: u32,
    pub height: u32,
    /// Source storage format, for diagnostics only.
    pub psm: PixelStorageFormat,
    /// `width * height * 4` bytes, row-major RGBA.
    pub pixels: Vec<u8>,
    pub name: String,
}

impl MapTexture {
    pub fn new(
        width: u32,
        height: u32,
        psm: PixelStorageFormat,
        image_index: i32,
        palette_index: u16,
        source: ImageSource,
    ) -> Self {
        Self {
            width,
            height,
            psm,
            pixels: vec![0u8; (width as usize) * (height as usize) * 4],
            name: texture_name(image_index, palette_index, source),
        }
    }
}

/// Serializable map statistics for reporting.
#[derive(Debug, Serialize)]
pub struct MapSummary {
    pub mesh_groups: usize,
    pub meshes: usize,
    pub submeshes: usize,
    pub shapes: usize,
    pub total_vertices: usize,
    pub total_triangles: usize,
    pub transforms: usize,
    pub textures: Vec<TextureSummary>,
}

impl SilentHill3Map {
    pub fn summary(&self) -> MapSummary {
        let mut meshes = 0;
        let mut submeshes = 0;
        let mut shapes = 0;
        let mut total_vertices = 0;
        let mut total_triangles = 0;
        for group in &self.mesh_groups {
            meshes += group.meshes.len();
            for mesh in &group.meshes {
                submeshes += mesh.submeshes.len();
                for submesh in &mesh.submeshes {
                    shapes += submesh.shapes.len();
                    for shape in &submesh.shapes {
                        total_vertices += shape.vertices.len();
                        total_triangles += shape.indices.len() / 3;
                    }
                }
            }
        }
        MapSummary {
            mesh_groups: self.mesh_groups.len(),
            meshes,
            submeshes,
            shapes,
            total_vertices,
            total_triangles,
            transforms: self.mesh_transforms.len(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_names_are_deterministic() {
        assert_eq!(texture_name(5, 2, ImageSource::Global), "tex_gb_5_2");
        assert_eq!(texture_name(5, 2, ImageSource::Tr), "tex_tr_5_2");
        assert_eq!(texture_name(5, 2, ImageSource::Local), "tex_5_2");
        assert_eq!(texture_name(5, 2, ImageSource::Unknown), "tex_5_2");
        assert_eq!(texture_name(-1, 0, ImageSource::Global), "tex_gb_-1_0");
    }

    #[test]
    fn transform_table_falls_back_to_identity() {
        let table = TransformTable::new();
        assert_eq!(table.get(7).index, 0);
        assert_eq!(table.get(7).transform, Mat4::IDENTITY);
        assert!(table.contains(0));
        assert!(!table.contains(7));
    }

    #[test]
    fn image_source_from_raw() {
        assert_eq!(ImageSource::from_raw(0), ImageSource::Unknown);
        assert_eq!(ImageSource::from_raw(1), ImageSource::Global);
        assert_eq!(ImageSource::from_raw(2), ImageSource::Tr);
        assert_eq!(ImageSource::from_raw(3), ImageSource::Local);
        assert_eq!(ImageSource::from_raw(9), ImageSource::Unknown);
    }
}
