//! PAC stage archive decoding.

use super::{MeshGroup, Stage, Texture};
use crate::error::{Error, Result};
use crate::formats::common::{BytesView, StripWinding, align16};
use crate::gs::{GsMemoryMap, PixelStorageFormat};
use glam::{Mat4, Vec2, Vec4};
use std::path::Path;

// Header field offsets.
const VIF_SECTOR_OFFS: usize = 0xC;
const VIF_SECTOR_END_OFFS: usize = 0x10;
const VIF_SECTOR_END_FALLBACK_OFFS: usize = 0x14;
const TEX_SECTOR_OFFS: usize = 0x24;

// Vertex flag word that starts a new strip.
const STRIP_RESET: u16 = 0x8000;

// Image data uploads at block 0x8; the CLUT goes to block 0.
const IMAGE_BASE_BLOCK: u32 = 0x8;
const CLUT_BASE_BLOCK: u32 = 0;

/// Read and parse a stage archive from disk.
///
/// # Errors
/// Returns an error if the file cannot be read or the archive layout is
/// invalid.
pub fn read_stage_pac<P: AsRef<Path>>(path: P) -> Result<Stage> {
    let buffer = std::fs::read(path)?;
    parse_stage_pac(&buffer)
}

/// Parse a stage archive from bytes.
///
/// # Errors
/// Returns an error if a declared region or record runs past the buffer.
pub fn parse_stage_pac(data: &[u8]) -> Result<Stage> {
    let view = BytesView::new(data);

    let vif_start = view.u32_at(VIF_SECTOR_OFFS)? as usize;
    let mut vif_end = view.u32_at(VIF_SECTOR_END_OFFS)? as usize;
    if vif_end < vif_start {
        // The primary end field overflowed; a second candidate follows it.
        vif_end = view.u32_at(VIF_SECTOR_END_FALLBACK_OFFS)? as usize;
    }
    if vif_end < vif_start || vif_end > data.len() {
        return Err(Error::InvalidRegion {
            region: "VIF geometry",
            start: vif_start,
            end: vif_end,
            len: data.len(),
        });
    }
    let vif = view.subview(vif_start, vif_end - vif_start)?;
    let mesh_groups = parse_mesh_groups(&vif)?;

    let textures = parse_textures(&view)?;

    Ok(Stage {
        mesh_groups,
        textures,
    })
}

fn parse_mesh_groups(vif: &BytesView<'_>) -> Result<Vec<MeshGroup>> {
    let mut mesh_groups = Vec::new();
    if vif.is_empty() {
        return Ok(mesh_groups);
    }

    let mut offs = vif.u32_at(0)? as usize;
    while offs < vif.len() {
        let num_vertices = vif.i32_at(offs)?;
        let texture_index = vif.i32_at(offs + 0x4)?;
        let flags = vif.u32_at(offs + 0x8)?;
        let mut translucent = (flags & 1) != 0;
        let additive_blend = (vif.u8_at(offs + 0xD)? & 1) != 0;

        // Sky geometry in some stages carries an opaque flags word but must
        // still blend; the byte after the flags word marks it.
        if vif.u8_at(offs + 0x9)? > 0 {
            translucent = true;
        }

        offs += 0x10;
        if num_vertices <= 0 {
            continue;
        }
        let num_vertices = num_vertices as usize;

        let mut group = MeshGroup {
            texture_index,
            translucent,
            additive_blend,
            ..MeshGroup::default()
        };

        // The record matrix is column-major on disk.
        let matrix = Mat4::from_cols_array(&vif.mat4_at(offs)?).transpose();
        offs += 0x40;

        for i in 0..num_vertices {
            group.uvs.push(Vec2::new(
                vif.f32_at(offs + i * 0x8)?,
                vif.f32_at(offs + i * 0x8 + 0x4)?,
            ));
        }
        offs += align16(num_vertices * 0x8);

        for i in 0..num_vertices {
            // Alpha is on the console's 0x80-is-opaque scale, so it can
            // reach 2.0; the renderer clamps.
            group.vertex_colors.push(Vec4::new(
                f32::from(vif.u8_at(offs + i * 0x4)?) / 256.0,
                f32::from(vif.u8_at(offs + i * 0x4 + 0x1)?) / 256.0,
                f32::from(vif.u8_at(offs + i * 0x4 + 0x2)?) / 256.0,
                f32::from(vif.u8_at(offs + i * 0x4 + 0x3)?) / 128.0,
            ));
        }
        offs += align16(num_vertices * 0x4);

        let mut winding = StripWinding::new();
        for i in 0..num_vertices {
            let position = Vec4::new(
                vif.f32_at(offs + i * 0x10)?,
                vif.f32_at(offs + i * 0x10 + 0x4)?,
                vif.f32_at(offs + i * 0x10 + 0x8)?,
                1.0,
            );
            group.vertices.push((matrix * position).truncate());

            let flag = vif.u16_at(offs + i * 0x10 + 0xC)?;
            if flag == STRIP_RESET {
                winding.reset();
            } else {
                winding.emit(i, &mut group.indices);
            }
        }
        offs += num_vertices * 0x10;

        mesh_groups.push(group);
    }
    Ok(mesh_groups)
}

fn parse_textures(view: &BytesView<'_>) -> Result<Vec<Texture>> {
    let tex_start = view.u32_at(TEX_SECTOR_OFFS)? as usize;
    let tex = view.subview_from(tex_start)?;

    let mut textures = Vec::new();
    let mut gs = GsMemoryMap::new();
    let count = tex.u32_at(0)? as usize;
    for i in 0..count {
        let entry = i * 0x10;
        let psm = PixelStorageFormat::from_raw(tex.u32_at(entry + 0x10)? as u8);
        let width = u32::from(tex.u16_at(entry + 0x14)?);
        let height = u32::from(tex.u16_at(entry + 0x16)?);
        let data_size = usize::from(tex.u16_at(entry + 0x18)?) << 4;
        let clut_size = usize::from(tex.u16_at(entry + 0x1A)?) << 4;
        let data_offs = tex.u32_at(entry + 0x1C)? as usize;
        let clut_offs = data_offs + data_size;

        let payload = tex.bytes_at(data_offs + (i + 1) * 0x10, data_size)?;
        gs.upload_image(psm, IMAGE_BASE_BLOCK, width >> 6, 0, 0, width, height, payload)?;
        if clut_size > 0 {
            let clut = tex.bytes_at(clut_offs + (i + 1) * 0x10, clut_size)?;
            gs.upload_image(
                PixelStorageFormat::Psmct32,
                CLUT_BASE_BLOCK,
                1,
                0,
                0,
                0x10,
                (clut_size / 0x40) as u32,
                clut,
            )?;
        }

        let mut texture = Texture::new(width, height, psm, i);
        match psm {
            PixelStorageFormat::Psmt4 => gs.read_image_psmt4(
                &mut texture.pixels,
                IMAGE_BASE_BLOCK,
                width >> 6,
                width,
                height,
                CLUT_BASE_BLOCK,
                0,
                -1,
            ),
            PixelStorageFormat::Psmt8 => gs.read_image_psmt8(
                &mut texture.pixels,
                IMAGE_BASE_BLOCK,
                width >> 6,
                width,
                height,
                CLUT_BASE_BLOCK,
                -1,
            ),
            other => {
                tracing::warn!("texture {i}: readback unsupported for {other}, leaving pixels empty");
            }
        }
        textures.push(texture);
    }
    Ok(textures)
}

#[cfg(test)]
mod tests {
    use super::*;

    // A minimal archive: header, VIF sector with the given records, empty
    // texture table.
    fn build_archive(records: &[(i32, i32, u32, Vec<[f32; 4]>)]) -> Vec<u8> {
        let mut vif = vec![0u8; 4];
        // First record offset, stored at the start of the sector.
        vif[0..4].copy_from_slice(&0x10u32.to_le_bytes());
        vif.resize(0x10, 0);
        for (num_vertices, texture_index, flags, verts) in records {
            vif.extend_from_slice(&num_vertices.to_le_bytes());
            vif.extend_from_slice(&texture_index.to_le_bytes());
            vif.extend_from_slice(&flags.to_le_bytes());
            vif.extend_from_slice(&[0u8; 4]);
            if *num_vertices <= 0 {
                continue;
            }
            let n = *num_vertices as usize;
            // Identity matrix.
            for row in 0..4 {
                for col in 0..4 {
                    let v: f32 = if row == col { 1.0 } else { 0.0 };
                    vif.extend_from_slice(&v.to_le_bytes());
                }
            }
            // UVs.
            let uv_len = align16(n * 8);
            let uv_start = vif.len();
            for i in 0..n {
                vif.extend_from_slice(&(i as f32 * 0.25).to_le_bytes());
                vif.extend_from_slice(&0.5f32.to_le_bytes());
            }
            vif.resize(uv_start + uv_len, 0);
            // Colors.
            let col_len = align16(n * 4);
            let col_start = vif.len();
            for _ in 0..n {
                vif.extend_from_slice(&[0x80, 0x40, 0x20, 0x80]);
            }
            vif.resize(col_start + col_len, 0);
            // Positions + flags.
            for v in verts {
                vif.extend_from_slice(&v[0].to_le_bytes());
                vif.extend_from_slice(&v[1].to_le_bytes());
                vif.extend_from_slice(&v[2].to_le_bytes());
                let flag = v[3] as u16;
                vif.extend_from_slice(&flag.to_le_bytes());
                vif.extend_from_slice(&[0u8; 2]);
            }
        }

        let vif_start = 0x40usize;
        let vif_end = vif_start + vif.len();
        let tex_start = vif_end;

        let mut data = vec![0u8; 0x40];
        data[VIF_SECTOR_OFFS..VIF_SECTOR_OFFS + 4]
            .copy_from_slice(&(vif_start as u32).to_le_bytes());
        data[VIF_SECTOR_END_OFFS..VIF_SECTOR_END_OFFS + 4]
            .copy_from_slice(&(vif_end as u32).to_le_bytes());
        data[TEX_SECTOR_OFFS..TEX_SECTOR_OFFS + 4]
            .copy_from_slice(&(tex_start as u32).to_le_bytes());
        data.extend_from_slice(&vif);
        // Empty texture table.
        data.extend_from_slice(&0u32.to_le_bytes());
        data
    }

    #[test]
    fn four_vertex_record_forms_two_triangles() {
        let verts = vec![
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0, 0.0],
        ];
        let data = build_archive(&[(4, 0, 0, verts)]);
        let stage = parse_stage_pac(&data).unwrap();
        assert_eq!(stage.mesh_groups.len(), 1);
        let group = &stage.mesh_groups[0];
        assert_eq!(group.vertices.len(), 4);
        assert_eq!(group.vertex_colors.len(), 4);
        assert_eq!(group.uvs.len(), 4);
        assert_eq!(group.indices, vec![0, 1, 2, 3, 2, 1]);
    }

    #[test]
    fn strip_reset_starts_a_new_strip() {
        let flag = f32::from(STRIP_RESET);
        let verts = vec![
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
            [3.0, 0.0, 0.0, flag],
            [4.0, 0.0, 0.0, flag],
            [5.0, 0.0, 0.0, 0.0],
            [6.0, 0.0, 0.0, 0.0],
        ];
        let data = build_archive(&[(7, 0, 0, verts)]);
        let stage = parse_stage_pac(&data).unwrap();
        let group = &stage.mesh_groups[0];
        // Reset vertices emit nothing; the strip resumes in normal order.
        assert_eq!(group.indices, vec![0, 1, 2, 3, 4, 5, 6, 5, 4]);
    }

    #[test]
    fn skipped_record_does_not_produce_a_group() {
        let verts = vec![
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
        ];
        let data = build_archive(&[(0, 0, 0, Vec::new()), (3, 2, 1, verts)]);
        let stage = parse_stage_pac(&data).unwrap();
        assert_eq!(stage.mesh_groups.len(), 1);
        assert_eq!(stage.mesh_groups[0].texture_index, 2);
        assert!(stage.mesh_groups[0].translucent);
        assert_eq!(stage.mesh_groups[0].indices.len(), 3);
    }

    #[test]
    fn sky_byte_forces_translucency() {
        let verts = vec![
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
        ];
        // Flags word opaque, but byte +0x9 nonzero.
        let data = build_archive(&[(3, 0, 0x100, verts)]);
        let stage = parse_stage_pac(&data).unwrap();
        assert!(stage.mesh_groups[0].translucent);
    }

    #[test]
    fn end_offset_fallback_when_primary_overflows() {
        let verts = vec![
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
        ];
        let mut data = build_archive(&[(3, 0, 0, verts)]);
        let end = u32::from_le_bytes(data[VIF_SECTOR_END_OFFS..VIF_SECTOR_END_OFFS + 4].try_into().unwrap());
        // Corrupt the primary end field below the start; the fallback holds
        // the real end.
        data[VIF_SECTOR_END_OFFS..VIF_SECTOR_END_OFFS + 4].copy_from_slice(&4u32.to_le_bytes());
        data[VIF_SECTOR_END_FALLBACK_OFFS..VIF_SECTOR_END_FALLBACK_OFFS + 4]
            .copy_from_slice(&end.to_le_bytes());
        let stage = parse_stage_pac(&data).unwrap();
        assert_eq!(stage.mesh_groups.len(), 1);
    }

    #[test]
    fn truncated_record_is_a_decode_error() {
        let verts = vec![
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
        ];
        let mut data = build_archive(&[(3, 0, 0, verts)]);
        // Claim more vertices than the record holds.
        let vif_start = 0x40;
        data[vif_start + 0x10..vif_start + 0x14].copy_from_slice(&100i32.to_le_bytes());
        assert!(parse_stage_pac(&data).is_err());
    }
}
