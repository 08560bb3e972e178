//! bigshot - build zoomable tile pyramids and panorama cube maps
//!
//! # Commands
//!
//! - `bigshot make <input> <output>` - Run a job (pyramid, facemap, face, carousel)
//! - `bigshot pack <dir> <archive>` - Pack a directory into a BIGSHOT archive
//! - `bigshot list <archive>` - List archive entries
//! - `bigshot extract <archive> <dir>` - Unpack an archive
//!
//! # Usage
//!
//! ```bash
//! # Plain pyramid of a large photo
//! bigshot make photo.jpg photo-pyramid
//!
//! # Deep Zoom cube map of an equirectangular panorama, packed
//! bigshot make pano.jpg pano.bigshot --preset dzi-cubemap --format archive
//!
//! # Settings from a job file, with command-line overrides
//! bigshot make pano.jpg out --config job.toml --face-size 1024
//! ```

mod archive;
mod make;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bigshot")]
#[command(about = "Panorama cube maps, tiled image pyramids and packed tile archives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job: image pyramid, cube-face pyramids, single face or carousel
    Make(make::MakeArgs),

    /// Pack a directory tree into a single BIGSHOT archive
    Pack(archive::PackArgs),

    /// List the entries of a BIGSHOT archive
    List(archive::ListArgs),

    /// Extract every entry of a BIGSHOT archive into a directory
    Extract(archive::ExtractArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Make(args) => make::execute(args),
        Commands::Pack(args) => archive::pack(args),
        Commands::List(args) => archive::list(args),
        Commands::Extract(args) => archive::extract(args),
    }
}
