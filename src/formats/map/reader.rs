//! Map archive decoding.
//!
//! Decoding is two conceptual passes over one buffered view: the geometry
//! walk records which (image, source) pairs are referenced and with which
//! palettes, then texture processing decodes only the referenced images.

use super::{
    Aabb, ImageSource, MapTexture, Mesh, MeshGroup, MeshTransform, Shape, SilentHill3Map, Submesh,
    TransformTable,
};
use crate::error::{Error, Result};
use crate::formats::common::{BytesView, StripWinding};
use crate::gs::{GsMemoryMap, PixelStorageFormat};
use glam::{Mat4, Vec2, Vec3};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

// Map header field offsets.
const TRANSFORM_TABLE_OFFS: usize = 0xC;
const LOCAL_TEX_HEADER_OFFS: usize = 0x10;
const GROUP_OFFS_CANDIDATES: [usize; 3] = [0x1C, 0x20, 0x24];
const NUM_GLOBAL_IMAGES_OFFS: usize = 0x42;
const NUM_TR_IMAGES_OFFS: usize = 0x46;

// Image data uploads at block 0; CLUTs are staged high in memory, one
// 4-block palette per palette index.
const IMAGE_BASE_BLOCK: u32 = 0x0;
const CLUT_BASE_BLOCK: u32 = 0x3640;
const CLUT_PALETTE_STRIDE: u32 = 0x4;

/// Read a map archive and its texture archives from disk and parse them.
///
/// # Errors
/// Returns an error if a file cannot be read or an archive is malformed.
pub fn read_map(
    map_path: impl AsRef<Path>,
    global_path: impl AsRef<Path>,
    tr_path: Option<&Path>,
) -> Result<SilentHill3Map> {
    let map = std::fs::read(map_path)?;
    let global_tex = std::fs::read(global_path)?;
    let tr_tex = tr_path.map(std::fs::read).transpose()?;
    parse_map(&map, &global_tex, tr_tex.as_deref())
}

/// Parse a map archive with its global (and optional TR) texture archives.
///
/// # Errors
/// Returns an error on out-of-range reads or cyclic record chains.
pub fn parse_map(
    map: &[u8],
    global_tex: &[u8],
    tr_tex: Option<&[u8]>,
) -> Result<SilentHill3Map> {
    MapParser::new().parse_map(map, global_tex, tr_tex)
}

// (image index, image source) -> palette indices referenced by meshes.
type ImageRefMap = BTreeMap<(i32, ImageSource), BTreeSet<u16>>;

/// Stateful parser for one map: accumulates texture references during the
/// geometry walk and owns the GS memory the textures decode through.
pub struct MapParser {
    image_refs: ImageRefMap,
    gs: GsMemoryMap,
}

impl Default for MapParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MapParser {
    pub fn new() -> Self {
        Self {
            image_refs: ImageRefMap::new(),
            gs: GsMemoryMap::new(),
        }
    }

    /// Parse the map buffer plus texture archives into a scene model.
    pub fn parse_map(
        &mut self,
        map: &[u8],
        global_tex: &[u8],
        tr_tex: Option<&[u8]>,
    ) -> Result<SilentHill3Map> {
        let view = BytesView::new(map);

        let mut first_group_offs = 0u32;
        for field in GROUP_OFFS_CANDIDATES {
            let candidate = view.u32_at(field)?;
            if candidate > 0 && (first_group_offs == 0 || candidate < first_group_offs) {
                first_group_offs = candidate;
            }
        }
        let mesh_groups = self.parse_mesh_groups(&view, first_group_offs as usize)?;

        let tex_header_offs = view.u32_at(LOCAL_TEX_HEADER_OFFS)? as usize;
        let num_global_images = view.u16_at(NUM_GLOBAL_IMAGES_OFFS)?;
        let num_tr_images = view.u16_at(NUM_TR_IMAGES_OFFS)?;

        let mut textures = Vec::new();
        if let Some(tr) = tr_tex {
            textures.extend(self.process_textures(&BytesView::new(tr), 0, 0, ImageSource::Tr)?);
        }
        textures.extend(self.process_textures(
            &BytesView::new(global_tex),
            0,
            0,
            ImageSource::Global,
        )?);
        textures.extend(self.process_textures(
            &view,
            tex_header_offs,
            i32::from(num_tr_images) + i32::from(num_global_images),
            ImageSource::Local,
        )?);

        let dummy_texture = create_dummy_texture();
        let mesh_transforms =
            parse_mesh_transforms(&view, view.u32_at(TRANSFORM_TABLE_OFFS)? as usize)?;

        Ok(SilentHill3Map {
            mesh_groups,
            textures,
            dummy_texture,
            mesh_transforms,
        })
    }

    fn parse_mesh_groups(
        &mut self,
        view: &BytesView<'_>,
        start_offs: usize,
    ) -> Result<Vec<MeshGroup>> {
        let mut mesh_groups = Vec::new();
        let mut visited = HashSet::new();
        let mut offs = start_offs;
        while offs > 0 {
            if !visited.insert(offs) {
                return Err(Error::CyclicOffsetChain {
                    record: "mesh group",
                    offset: offs,
                });
            }
            let next_group_offs = view.u32_at(offs)? as usize;
            let image_source = ImageSource::from_raw(view.u16_at(offs + 0x10)?);
            let image_index = view.i32_at(offs + 0x14)?;
            let mesh_count = view.u16_at(offs + 0x18)?;
            let palette_refs = self.image_refs.entry((image_index, image_source)).or_default();
            let meshes = parse_meshes(
                view,
                offs + usize::from(view.u16_at(offs + 0x4)?),
                palette_refs,
            )?;
            mesh_groups.push(MeshGroup {
                image_source,
                image_index,
                mesh_count,
                meshes,
            });
            offs = next_group_offs;
        }
        Ok(mesh_groups)
    }

    fn process_textures(
        &mut self,
        view: &BytesView<'_>,
        offset: usize,
        base_image_index: i32,
        source: ImageSource,
    ) -> Result<Vec<MapTexture>> {
        let mut textures = Vec::new();
        let num_images = view.u32_at(offset + 0x14)? as usize;
        let mut offs = offset + view.u32_at(offset + 0x8)? as usize;
        for i in 0..num_images {
            let data_size = view.u32_at(offs + 0x10)? as usize;
            let data_offs = offs + usize::from(view.u16_at(offs + 0x14)?);
            let psm = PixelStorageFormat::from_raw(view.u8_at(offs + 0x19)?);
            let has_clut = matches!(
                psm,
                PixelStorageFormat::Psmt4 | PixelStorageFormat::Psmt8
            );
            let clut_size = if has_clut {
                view.u32_at(data_offs + data_size)? as usize
            } else {
                0
            };
            let next_offs = data_offs + data_size + clut_size + 0x30;

            // The last global image is addressed as index -1, a convention
            // baked into the source format.
            let image_index = if i == num_images - 1 && source == ImageSource::Global {
                -1
            } else {
                i as i32 + base_image_index
            };
            let Some(palette_refs) = self.image_refs.get(&(image_index, source)) else {
                // Never referenced by any mesh; skip the decode entirely.
                offs = next_offs;
                continue;
            };

            let width = u32::from(view.u16_at(offs + 0x8)?);
            let height = u32::from(view.u16_at(offs + 0xA)?);
            // Image data is stored pre-tiled and re-uploaded as 32-bit
            // pixels; the factors shrink the transfer rectangle to match
            // the byte count of the native format.
            let h_factor = u32::from(view.u8_at(offs + 0x1A)?);
            let w_factor = u32::from(h_factor > 0);
            let buf_width = width >> 6 >> w_factor;
            let rect_w = width >> w_factor;
            let rect_h = height >> h_factor;
            self.gs.upload_image(
                PixelStorageFormat::Psmct32,
                IMAGE_BASE_BLOCK,
                buf_width,
                0,
                0,
                rect_w,
                rect_h,
                view.bytes_at(data_offs, data_size)?,
            )?;
            if has_clut {
                let clut_header_offs = data_offs + data_size;
                let clut_data_offs = clut_header_offs + 0x30;
                let clut_width = u32::from(view.u8_at(clut_header_offs + 0xE)?);
                if clut_width == 0 {
                    tracing::warn!("image {image_index}: palette header declares zero width");
                } else {
                    let clut_height = (clut_size / (clut_width as usize * 4)) as u32;
                    self.gs.upload_image(
                        PixelStorageFormat::Psmct32,
                        CLUT_BASE_BLOCK,
                        1,
                        0,
                        0,
                        clut_width,
                        clut_height,
                        view.bytes_at(clut_data_offs, clut_size)?,
                    )?;
                }
            }

            for &palette_index in palette_refs {
                let mut texture =
                    MapTexture::new(width, height, psm, image_index, palette_index, source);
                let clut_base = CLUT_BASE_BLOCK + u32::from(palette_index) * CLUT_PALETTE_STRIDE;
                match psm {
                    PixelStorageFormat::Psmt4 => self.gs.read_image_psmt4(
                        &mut texture.pixels,
                        IMAGE_BASE_BLOCK,
                        width >> 6,
                        width,
                        height,
                        clut_base,
                        0,
                        -1,
                    ),
                    PixelStorageFormat::Psmt8 => self.gs.read_image_psmt8(
                        &mut texture.pixels,
                        IMAGE_BASE_BLOCK,
                        width >> 6,
                        width,
                        height,
                        clut_base,
                        -1,
                    ),
                    other => {
                        tracing::warn!("image {image_index}: download unsupported for {other}");
                    }
                }
                textures.push(texture);
            }
            offs = next_offs;
        }
        Ok(textures)
    }
}

fn parse_meshes(
    view: &BytesView<'_>,
    start_offs: usize,
    palette_refs: &mut BTreeSet<u16>,
) -> Result<Vec<Mesh>> {
    let mut meshes = Vec::new();
    let mut visited = HashSet::new();
    let mut offs = start_offs;
    while offs > 0 {
        if !visited.insert(offs) {
            return Err(Error::CyclicOffsetChain {
                record: "mesh",
                offset: offs,
            });
        }
        let next_mesh_offs = view.u32_at(offs)? as usize;
        let texture_palette_index = view.u16_at(offs + 0x10)?;
        let translucent = view.u16_at(offs + 0x16)? == 1;
        palette_refs.insert(texture_palette_index);
        let submeshes = parse_submeshes(view, offs + usize::from(view.u16_at(offs + 0x4)?))?;
        meshes.push(Mesh {
            texture_palette_index,
            translucent,
            submeshes,
        });
        offs = next_mesh_offs;
    }
    Ok(meshes)
}

fn parse_submeshes(view: &BytesView<'_>, start_offs: usize) -> Result<Vec<Submesh>> {
    let mut submeshes = Vec::new();
    let mut visited = HashSet::new();
    let mut offs = start_offs;
    while offs > 0 {
        if !visited.insert(offs) {
            return Err(Error::CyclicOffsetChain {
                record: "submesh",
                offset: offs,
            });
        }
        let next_submesh_offs = view.u32_at(offs)? as usize;
        // Submesh header data beyond the child offset is still unknown.
        let shapes = parse_shapes(view, offs + usize::from(view.u16_at(offs + 0x4)?))?;
        submeshes.push(Submesh { shapes });
        offs = next_submesh_offs;
    }
    Ok(submeshes)
}

fn parse_shapes(view: &BytesView<'_>, start_offs: usize) -> Result<Vec<Shape>> {
    let mut shapes = Vec::new();
    let mut visited = HashSet::new();
    let mut offs = start_offs;
    while offs > 0 {
        if !visited.insert(offs) {
            return Err(Error::CyclicOffsetChain {
                record: "shape",
                offset: offs,
            });
        }
        let next_shape_offs = view.u32_at(offs)? as usize;
        let num_vertices = view.u32_at(offs + 0x10)? as usize;
        let transform_index = view.u32_at(offs + 0x14)?;
        let payload = offs + view.u32_at(offs + 0x4)? as usize;

        let mut shape = Shape {
            transform_index,
            ..Shape::default()
        };
        let mut winding = StripWinding::new();
        for i in 0..num_vertices {
            let vert = payload + i * 0x10;
            shape.vertices.push(Vec3::new(
                f32::from(view.i16_at(vert)?),
                f32::from(view.i16_at(vert + 0x2)?),
                f32::from(view.i16_at(vert + 0x4)?),
            ));
            // Three 16-bit fields each pack a 10-bit normal component in
            // the top bits and a 6-bit color component in the bottom bits.
            let packed_a = view.i16_at(vert + 0x6)?;
            let packed_b = view.i16_at(vert + 0xC)?;
            let packed_c = view.i16_at(vert + 0xE)?;
            shape.normals.push(Vec3::new(
                f32::from(packed_a & !0x3F) / 32768.0,
                f32::from(packed_b & !0x3F) / 32768.0,
                f32::from(packed_c & !0x3F) / 32768.0,
            ));
            shape.vertex_colors.push(Vec3::new(
                f32::from(packed_a & 0x3F) / 32.0,
                f32::from(packed_b & 0x3F) / 32.0,
                f32::from(packed_c & 0x3F) / 32.0,
            ));
            shape.uvs.push(Vec2::new(
                f32::from(view.i16_at(vert + 0x8)?) / 32768.0,
                f32::from(view.i16_at(vert + 0xA)?) / 32768.0,
            ));
            // The low bit of the U field doubles as the strip flag; the
            // winding flips on every vertex regardless.
            if view.u8_at(vert + 0x8)? & 1 == 0 {
                winding.emit(i, &mut shape.indices);
            } else {
                winding.skip();
            }
        }
        shapes.push(shape);
        offs = next_shape_offs;
    }
    Ok(shapes)
}

fn parse_mesh_transforms(view: &BytesView<'_>, start_offs: usize) -> Result<TransformTable> {
    let mut table = TransformTable::new();
    let mut inverse_first = Mat4::IDENTITY;
    let mut offs = start_offs;
    while offs > 0 {
        let next_rel = view.u32_at(offs)? as usize;
        let next_offs = if next_rel > 0 { offs + next_rel } else { 0 };
        let index = view.u32_at(offs + 0x10)?;
        let payload = offs + view.u32_at(offs + 0x4)? as usize;

        let mut transform = Mat4::from_cols_array(&view.mat4_at(payload)?);
        if index == 1 {
            // The first transform is the world origin; applying its inverse
            // to the rest recenters maps whose native coordinates sit tens
            // of thousands of units from zero.
            inverse_first = transform.inverse();
            transform = Mat4::IDENTITY;
        } else {
            transform = inverse_first * transform;
        }

        // The box is stored max corner first.
        let aabb_offs = payload + 0x40;
        let aabb = Aabb {
            max: Vec3::new(
                view.f32_at(aabb_offs)?,
                view.f32_at(aabb_offs + 0x4)?,
                view.f32_at(aabb_offs + 0x8)?,
            ),
            min: Vec3::new(
                view.f32_at(aabb_offs + 0x70)?,
                view.f32_at(aabb_offs + 0x74)?,
                view.f32_at(aabb_offs + 0x78)?,
            ),
        };

        table.insert(MeshTransform {
            index,
            transform,
            aabb,
        });
        offs = next_offs;
    }
    Ok(table)
}

// 64x64 magenta placeholder bound whenever a mesh's texture reference
// cannot be resolved.
fn create_dummy_texture() -> MapTexture {
    let mut texture = MapTexture::new(
        64,
        64,
        PixelStorageFormat::Psmt8,
        99,
        99,
        ImageSource::Global,
    );
    for pixel in texture.pixels.chunks_exact_mut(4) {
        pixel[0] = 255;
        pixel[2] = 255;
        pixel[3] = 255;
    }
    texture
}
