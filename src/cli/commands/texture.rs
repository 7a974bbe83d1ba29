//! CLI commands for texture export

use crate::formats::map::read_map;
use crate::formats::pac::read_stage_pac;
use anyhow::Context;
use std::path::Path;

/// Export every decoded stage texture as PNG
pub fn export_stage_textures(source: &Path, destination: &Path) -> anyhow::Result<()> {
    let stage = read_stage_pac(source)?;
    std::fs::create_dir_all(destination)?;

    let mut written = 0usize;
    for tex in &stage.textures {
        write_png(destination, &tex.name, tex.width, tex.height, &tex.pixels)?;
        written += 1;
    }
    println!("Wrote {written} textures to {}", destination.display());
    Ok(())
}

/// Export every decoded map texture (plus the dummy fallback) as PNG
pub fn export_map_textures(
    map_path: &Path,
    global_path: &Path,
    tr_path: Option<&Path>,
    destination: &Path,
) -> anyhow::Result<()> {
    let map = read_map(map_path, global_path, tr_path)?;
    std::fs::create_dir_all(destination)?;

    let mut written = 0usize;
    for tex in &map.textures {
        write_png(destination, &tex.name, tex.width, tex.height, &tex.pixels)?;
        written += 1;
    }
    let dummy = &map.dummy_texture;
    write_png(destination, &dummy.name, dummy.width, dummy.height, &dummy.pixels)?;
    println!("Wrote {} textures to {}", written + 1, destination.display());
    Ok(())
}

fn write_png(dir: &Path, name: &str, width: u32, height: u32, pixels: &[u8]) -> anyhow::Result<()> {
    let image = image::RgbaImage::from_raw(width, height, pixels.to_vec())
        .with_context(|| format!("texture {name} has a short pixel buffer"))?;
    let path = dir.join(format!("{name}.png"));
    image
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
