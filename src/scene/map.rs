//! Silent Hill 3 map flattening.

use crate::formats::map::{SilentHill3Map, texture_name};
use glam::Mat4;

/// Floats per vertex: position (3), normal (3), color (4), uv (2).
pub const VERTEX_STRIDE: usize = 12;

/// One draw over a contiguous index range under a single transform.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDrawCall {
    pub first_index: u32,
    pub index_count: u32,
    /// Index into [`MapScene::texture_names`]; negative means the dummy
    /// texture.
    pub texture_index: i32,
    pub translucent: bool,
    pub transform: Mat4,
}

/// Flattened map geometry in tree order.
#[derive(Debug, Default)]
pub struct MapScene {
    pub vertex_data: Vec<f32>,
    pub index_data: Vec<u32>,
    pub draw_calls: Vec<MapDrawCall>,
    pub texture_names: Vec<String>,
}

impl MapScene {
    /// The vertex buffer as raw bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertex_data)
    }

    /// The index buffer as raw bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.index_data)
    }
}

/// Flatten a parsed map into buffers and draw calls.
///
/// Within a submesh, consecutive shapes sharing a transform index collapse
/// into one draw call; a change of transform splits. Texture references
/// that resolve to no decoded texture fall back to the dummy (index -1).
pub fn build_map_scene(map: &SilentHill3Map) -> MapScene {
    let mut scene = MapScene {
        texture_names: map.textures.iter().map(|t| t.name.clone()).collect(),
        ..MapScene::default()
    };

    let mut index_count = 0u32;
    let mut base_vertex = 0u32;
    for (group, mesh, submesh) in map.iter_submeshes() {
        let name = texture_name(group.image_index, mesh.texture_palette_index, group.image_source);
        let texture_index = scene
            .texture_names
            .iter()
            .position(|n| *n == name)
            .map_or(-1, |p| p as i32);
        if texture_index < 0 {
            tracing::debug!("texture {name} not decoded, using dummy");
        }

        let mut first_index = index_count;
        let mut last_transform_index: Option<u32> = None;
        for shape in &submesh.shapes {
            if let Some(last) = last_transform_index {
                if shape.transform_index != last && index_count > first_index {
                    scene.draw_calls.push(MapDrawCall {
                        first_index,
                        index_count: index_count - first_index,
                        texture_index,
                        translucent: mesh.translucent,
                        transform: map.mesh_transforms.get(last).transform,
                    });
                    first_index = index_count;
                }
            }

            for i in 0..shape.vertices.len() {
                scene.vertex_data.extend_from_slice(&[
                    shape.vertices[i].x,
                    shape.vertices[i].y,
                    shape.vertices[i].z,
                    shape.normals[i].x,
                    shape.normals[i].y,
                    shape.normals[i].z,
                    shape.vertex_colors[i].x,
                    shape.vertex_colors[i].y,
                    shape.vertex_colors[i].z,
                    1.0,
                    shape.uvs[i].x,
                    shape.uvs[i].y,
                ]);
            }
            scene
                .index_data
                .extend(shape.indices.iter().map(|&i| i + base_vertex));
            index_count += shape.indices.len() as u32;
            base_vertex += shape.vertices.len() as u32;
            last_transform_index = Some(shape.transform_index);
        }

        if index_count > first_index {
            let last = last_transform_index.unwrap_or(0);
            scene.draw_calls.push(MapDrawCall {
                first_index,
                index_count: index_count - first_index,
                texture_index,
                translucent: mesh.translucent,
                transform: map.mesh_transforms.get(last).transform,
            });
        }
    }

    scene
}
