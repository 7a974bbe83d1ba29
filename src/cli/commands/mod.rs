use clap::Subcommand;
use std::path::PathBuf;

pub mod info;
pub mod texture;

#[derive(Subcommand)]
pub enum Commands {
    /// Show information about a Haunting Ground stage archive
    StageInfo {
        /// Source PAC file
        source: PathBuf,

        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export decoded textures from a Haunting Ground stage archive
    StageTextures {
        /// Source PAC file
        source: PathBuf,

        /// Output directory for PNG files
        #[arg(short, long)]
        destination: PathBuf,
    },

    /// Show information about a Silent Hill 3 map archive
    MapInfo {
        /// Map archive file
        map: PathBuf,

        /// Global texture archive file
        #[arg(long)]
        global: PathBuf,

        /// TR texture archive file
        #[arg(long)]
        tr: Option<PathBuf>,

        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export decoded textures from a Silent Hill 3 map archive
    MapTextures {
        /// Map archive file
        map: PathBuf,

        /// Global texture archive file
        #[arg(long)]
        global: PathBuf,

        /// TR texture archive file
        #[arg(long)]
        tr: Option<PathBuf>,

        /// Output directory for PNG files
        #[arg(short, long)]
        destination: PathBuf,
    },
}

impl Commands {
    pub fn execute(self) -> anyhow::Result<()> {
        match self {
            Commands::StageInfo { source, json } => info::stage_info(&source, json),
            Commands::StageTextures {
                source,
                destination,
            } => texture::export_stage_textures(&source, &destination),
            Commands::MapInfo {
                map,
                global,
                tr,
                json,
            } => info::map_info(&map, &global, tr.as_deref(), json),
            Commands::MapTextures {
                map,
                global,
                tr,
                destination,
            } => texture::export_map_textures(&map, &global, tr.as_deref(), &destination),
        }
    }
}
