//! Haunting Ground stage flattening.

use crate::formats::pac::{MeshGroup, Stage};
use std::collections::BTreeMap;

/// Floats per vertex: position (3), color (4), uv (2).
pub const VERTEX_STRIDE: usize = 9;

/// One batched draw over a contiguous index range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDrawCall {
    pub first_index: u32,
    pub index_count: u32,
    pub texture_index: i32,
    pub translucent: bool,
    pub additive_blend: bool,
}

/// Flattened stage geometry: interleaved vertices, rebased indices, and
/// draw calls ordered opaque-first.
#[derive(Debug, Default)]
pub struct StageScene {
    pub vertex_data: Vec<f32>,
    pub index_data: Vec<u32>,
    pub draw_calls: Vec<StageDrawCall>,
    pub texture_names: Vec<String>,
}

impl StageScene {
    /// The vertex buffer as raw bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertex_data)
    }

    /// The index buffer as raw bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.index_data)
    }
}

type BatchKey = (i32, bool);

/// Flatten a parsed stage into buffers and draw calls.
///
/// Untextured groups are light volumes, not drawable geometry, and are
/// excluded. Opaque groups batch freely by (texture, additive blend);
/// translucent groups keep their archive order and merge only consecutive
/// runs with an equal key, so their back-to-front intent survives.
pub fn build_stage_scene(stage: &Stage) -> StageScene {
    let mut scene = StageScene {
        texture_names: stage.textures.iter().map(|t| t.name.clone()).collect(),
        ..StageScene::default()
    };

    let mut opaque: BTreeMap<BatchKey, Vec<&MeshGroup>> = BTreeMap::new();
    let mut translucent: Vec<(BatchKey, Vec<&MeshGroup>)> = Vec::new();
    for group in &stage.mesh_groups {
        if group.texture_index < 0 {
            // Light-only geometry; typically has no UVs.
            continue;
        }
        let key = (group.texture_index, group.additive_blend);
        if !group.translucent {
            opaque.entry(key).or_default().push(group);
        } else if let Some(last) = translucent.last_mut().filter(|(k, _)| *k == key) {
            last.1.push(group);
        } else {
            translucent.push((key, vec![group]));
        }
    }

    let mut draw_order: Vec<&MeshGroup> = Vec::new();
    let mut index_count = 0u32;
    for ((texture_index, additive_blend), groups) in &opaque {
        let first_index = index_count;
        for group in groups {
            index_count += group.indices.len() as u32;
            draw_order.push(group);
        }
        scene.draw_calls.push(StageDrawCall {
            first_index,
            index_count: index_count - first_index,
            texture_index: *texture_index,
            translucent: false,
            additive_blend: *additive_blend,
        });
    }
    for ((texture_index, additive_blend), groups) in &translucent {
        let first_index = index_count;
        for group in groups {
            index_count += group.indices.len() as u32;
            draw_order.push(group);
        }
        scene.draw_calls.push(StageDrawCall {
            first_index,
            index_count: index_count - first_index,
            texture_index: *texture_index,
            translucent: true,
            additive_blend: *additive_blend,
        });
    }

    let mut base_vertex = 0u32;
    for group in draw_order {
        for i in 0..group.vertices.len() {
            scene.vertex_data.extend_from_slice(&[
                group.vertices[i].x,
                group.vertices[i].y,
                group.vertices[i].z,
                group.vertex_colors[i].x,
                group.vertex_colors[i].y,
                group.vertex_colors[i].z,
                group.vertex_colors[i].w,
                group.uvs[i].x,
                group.uvs[i].y,
            ]);
        }
        scene
            .index_data
            .extend(group.indices.iter().map(|&i| i + base_vertex));
        base_vertex += group.vertices.len() as u32;
    }

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3, Vec4};

    fn group(texture_index: i32, translucent: bool, additive: bool, tris: usize) -> MeshGroup {
        let n = tris + 2;
        let mut group = MeshGroup {
            texture_index,
            translucent,
            additive_blend: additive,
            ..MeshGroup::default()
        };
        for i in 0..n {
            group.vertices.push(Vec3::new(i as f32, 0.0, 0.0));
            group.vertex_colors.push(Vec4::ONE);
            group.uvs.push(Vec2::ZERO);
        }
        for i in 2..n {
            group
                .indices
                .extend_from_slice(&[i as u32 - 2, i as u32 - 1, i as u32]);
        }
        group
    }

    #[test]
    fn light_groups_are_excluded() {
        let stage = Stage {
            mesh_groups: vec![group(-1, false, false, 2), group(0, false, false, 1)],
            textures: Vec::new(),
        };
        let scene = build_stage_scene(&stage);
        assert_eq!(scene.draw_calls.len(), 1);
        assert_eq!(scene.vertex_data.len(), 3 * VERTEX_STRIDE);
        assert_eq!(scene.index_data.len(), 3);
    }

    #[test]
    fn opaque_groups_batch_by_texture_and_blend() {
        let stage = Stage {
            mesh_groups: vec![
                group(0, false, false, 1),
                group(1, false, false, 1),
                group(0, false, false, 1),
            ],
            textures: Vec::new(),
        };
        let scene = build_stage_scene(&stage);
        // Two batches: texture 0 (both groups merged) and texture 1.
        assert_eq!(scene.draw_calls.len(), 2);
        assert_eq!(scene.draw_calls[0].texture_index, 0);
        assert_eq!(scene.draw_calls[0].index_count, 6);
        assert_eq!(scene.draw_calls[1].texture_index, 1);
        assert_eq!(scene.draw_calls[1].index_count, 3);
    }

    #[test]
    fn translucent_runs_merge_only_when_consecutive() {
        let stage = Stage {
            mesh_groups: vec![
                group(0, true, false, 1),
                group(0, true, false, 1),
                group(1, true, false, 1),
                group(0, true, false, 1),
            ],
            textures: Vec::new(),
        };
        let scene = build_stage_scene(&stage);
        let counts: Vec<u32> = scene.draw_calls.iter().map(|d| d.index_count).collect();
        assert_eq!(counts, vec![6, 3, 3]);
        assert!(scene.draw_calls.iter().all(|d| d.translucent));
    }

    #[test]
    fn translucent_draws_after_opaque_with_rebased_indices() {
        let stage = Stage {
            mesh_groups: vec![group(0, true, false, 1), group(1, false, false, 1)],
            textures: Vec::new(),
        };
        let scene = build_stage_scene(&stage);
        assert!(!scene.draw_calls[0].translucent);
        assert!(scene.draw_calls[1].translucent);
        // The translucent group's vertices follow the opaque group's three.
        assert_eq!(scene.index_data[3..6], [3, 4, 5]);
        assert_eq!(scene.vertex_bytes().len(), scene.vertex_data.len() * 4);
    }
}
