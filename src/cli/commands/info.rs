//! CLI commands for archive inspection

use crate::formats::map::read_map;
use crate::formats::pac::read_stage_pac;
use std::path::Path;

/// Print a summary of a stage archive
pub fn stage_info(source: &Path, json: bool) -> anyhow::Result<()> {
    let stage = read_stage_pac(source)?;
    let summary = stage.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Stage: {}", source.display());
    println!();
    println!("Mesh groups: {}", summary.mesh_groups);
    println!("  translucent: {}", summary.translucent_groups);
    println!("Vertices: {}", summary.total_vertices);
    println!("Triangles: {}", summary.total_triangles);
    println!("Textures: {}", summary.textures.len());
    for tex in &summary.textures {
        println!("  {} {}x{} ({})", tex.name, tex.width, tex.height, tex.format);
    }

    Ok(())
}

/// Print a summary of a map archive
pub fn map_info(
    map_path: &Path,
    global_path: &Path,
    tr_path: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let map = read_map(map_path, global_path, tr_path)?;
    let summary = map.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Map: {}", map_path.display());
    println!();
    println!("Mesh groups: {}", summary.mesh_groups);
    println!("Meshes: {}", summary.meshes);
    println!("Submeshes: {}", summary.submeshes);
    println!("Shapes: {}", summary.shapes);
    println!("Vertices: {}", summary.total_vertices);
    println!("Triangles: {}", summary.total_triangles);
    println!("Transforms: {}", summary.transforms);
    println!("Textures: {}", summary.textures.len());
    for tex in &summary.textures {
        println!("  {} {}x{} ({})", tex.name, tex.width, tex.height, tex.format);
    }

    Ok(())
}
