//! `make` command: run a job from a config file and command-line overrides

use std::path::PathBuf;

use anyhow::{Context, Result};
use bigshot::config::{FolderLayout, ImageFormat, OutputMode, Preset, Transform};
use bigshot::pyramid::{DescriptorFormat, LevelNumbering};
use bigshot::{run_job, JobOptions, StandardCodec};
use clap::Args;

/// Every option is also accepted as a kebab-case key in the `--config` file.
/// Command-line values win over the file.
#[derive(Args)]
pub struct MakeArgs {
    /// Source image
    pub input: PathBuf,

    /// Output folder, archive file, or image file for `--transform face`
    pub output: PathBuf,

    /// TOML job file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Preset to fill unset options from (dzi-cubemap)
    #[arg(long)]
    pub preset: Option<Preset>,

    /// pyramid, facemap, cylinder-facemap, face or carousel
    #[arg(long)]
    pub transform: Option<Transform>,

    /// Output mode: folders or archive
    #[arg(long)]
    pub format: Option<OutputMode>,

    /// Tile image format: jpg or png
    #[arg(long)]
    pub image_format: Option<ImageFormat>,

    /// JPEG quality in (0, 1]
    #[arg(long)]
    pub jpeg_quality: Option<f32>,

    /// Descriptor format: bigshot or dzi
    #[arg(long)]
    pub descriptor_format: Option<DescriptorFormat>,

    /// Folder layout: bigshot or dzi
    #[arg(long)]
    pub folder_layout: Option<FolderLayout>,

    /// Level folder numbering: default or invert
    #[arg(long)]
    pub level_numbering: Option<LevelNumbering>,

    #[arg(long)]
    pub tile_size: Option<u32>,

    #[arg(long)]
    pub overlap: Option<u32>,

    /// Number of pyramid levels (computed when unset)
    #[arg(long)]
    pub levels: Option<u32>,

    /// Halve while the width stays a multiple of the tile size
    #[arg(long)]
    pub wrap_x: Option<bool>,

    #[arg(long)]
    pub poster_size: Option<u32>,

    /// Cube face edge in pixels, excluding overlap
    #[arg(long)]
    pub face_size: Option<u32>,

    /// Panorama yaw shown on the front face, degrees
    #[arg(long, allow_hyphen_values = true)]
    pub front_at: Option<f64>,

    /// Vertical field of view of a cylindrical source, degrees
    #[arg(long)]
    pub input_vfov: Option<f64>,

    /// Horizontal field of view of a cylindrical source, degrees
    #[arg(long)]
    pub input_hfov: Option<f64>,

    /// Horizon row of a cylindrical source
    #[arg(long, allow_hyphen_values = true)]
    pub input_horizon: Option<f64>,

    /// Whether a cylindrical source wraps horizontally
    #[arg(long)]
    pub horizontal_wrap: Option<bool>,

    /// Vertical field of view of a single face, degrees
    #[arg(long)]
    pub fov: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub yaw: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub pitch: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub roll: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub yaw_offset: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub pitch_offset: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub roll_offset: Option<f64>,

    #[arg(long)]
    pub output_width: Option<u32>,

    #[arg(long)]
    pub output_height: Option<u32>,

    /// Samples per output pixel along each axis
    #[arg(long)]
    pub oversampling: Option<u32>,

    /// Random sample offset, in output pixels
    #[arg(long)]
    pub jitter: Option<f64>,

    /// Seed for reproducible jitter
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub carousel_steps: Option<u32>,

    #[arg(long)]
    pub carousel_fov: Option<f64>,

    #[arg(long)]
    pub carousel_output_width: Option<u32>,

    #[arg(long)]
    pub carousel_output_height: Option<u32>,

    /// Abort a render that takes longer than this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl MakeArgs {
    fn overrides(&self) -> JobOptions {
        JobOptions {
            preset: self.preset,
            transform: self.transform,
            format: self.format,
            image_format: self.image_format,
            jpeg_quality: self.jpeg_quality,
            descriptor_format: self.descriptor_format,
            folder_layout: self.folder_layout,
            level_numbering: self.level_numbering,
            tile_size: self.tile_size,
            overlap: self.overlap,
            levels: self.levels,
            wrap_x: self.wrap_x,
            poster_size: self.poster_size,
            face_size: self.face_size,
            front_at: self.front_at,
            input_vfov: self.input_vfov,
            input_hfov: self.input_hfov,
            input_horizon: self.input_horizon,
            horizontal_wrap: self.horizontal_wrap,
            fov: self.fov,
            yaw: self.yaw,
            pitch: self.pitch,
            roll: self.roll,
            yaw_offset: self.yaw_offset,
            pitch_offset: self.pitch_offset,
            roll_offset: self.roll_offset,
            output_width: self.output_width,
            output_height: self.output_height,
            oversampling: self.oversampling,
            jitter: self.jitter,
            seed: self.seed,
            carousel_steps: self.carousel_steps,
            carousel_fov: self.carousel_fov,
            carousel_output_width: self.carousel_output_width,
            carousel_output_height: self.carousel_output_height,
            timeout_secs: self.timeout_secs,
        }
    }
}

pub fn execute(args: MakeArgs) -> Result<()> {
    let base = match &args.config {
        Some(path) => JobOptions::load(path)
            .with_context(|| format!("Failed to load job file: {}", path.display()))?,
        None => JobOptions::default(),
    };
    let job = base
        .merge(args.overrides())
        .resolve()
        .context("Invalid job options")?;

    let codec = StandardCodec::default();
    run_job(&job, &args.input, &args.output, &codec).with_context(|| {
        format!(
            "Failed to run {} on {}",
            job.transform,
            args.input.display()
        )
    })?;

    tracing::info!("Done: {}", args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        make: MakeArgs,
    }

    #[test]
    fn test_flags_become_overrides() {
        let h = Harness::parse_from([
            "bigshot",
            "in.jpg",
            "out",
            "--transform",
            "cylinder-facemap",
            "--tile-size",
            "510",
            "--front-at",
            "-90",
            "--wrap-x",
            "true",
        ]);
        let o = h.make.overrides();
        assert_eq!(o.transform, Some(Transform::CylinderFacemap));
        assert_eq!(o.tile_size, Some(510));
        assert_eq!(o.front_at, Some(-90.0));
        assert_eq!(o.wrap_x, Some(true));
        assert_eq!(o.overlap, None);
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        assert!(Harness::try_parse_from(["bigshot", "a", "b", "--format", "zip"]).is_err());
    }
}
