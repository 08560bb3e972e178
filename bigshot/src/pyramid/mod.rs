//! Tiled multi-resolution image pyramids
//!
//! Level 0 is the full-resolution image. Each following level halves the
//! previous one (keeping the overlap band), until the configured number of
//! levels is reached. Every level is sliced into `tile × tile` squares, where
//! `tile = tile_size + overlap`.
//!
//! ```text
//! <folder>/
//! ├── poster.jpg
//! ├── descriptor          (Bigshot descriptor format)
//! ├── 0/0_0.jpg 1_0.jpg ...
//! ├── 1/...
//! └── ...
//! ```

pub mod descriptor;
pub mod resample;
pub mod tile;

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::codec::{ImageCodec, OutputFormat};
use crate::error::{BigshotError, IoContext, Result};
use crate::raster::Image;

pub use descriptor::{Descriptor, DescriptorFormat};
pub use resample::area_average;
pub use tile::{tile_name, tile_starts, write_level};

/// How level directories are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LevelNumbering {
    /// Full resolution is level `0`
    #[default]
    Default,
    /// Full resolution is level `levels - 1` (Deep Zoom order)
    Invert,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PyramidConfig {
    /// Tile edge excluding overlap
    pub tile_size: u32,
    pub overlap: u32,
    /// Explicit level count; derived from the image size when `None`
    pub levels: Option<u32>,
    /// Level count from the number of exact halvings of the width
    pub wrap_x: bool,
    /// Longest edge of the poster image
    pub poster_size: u32,
    pub format: OutputFormat,
    pub descriptor: DescriptorFormat,
    pub numbering: LevelNumbering,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            overlap: 0,
            levels: None,
            wrap_x: false,
            poster_size: 512,
            format: OutputFormat::default(),
            descriptor: DescriptorFormat::Bigshot,
            numbering: LevelNumbering::Default,
        }
    }
}

impl PyramidConfig {
    /// Tile edge including overlap.
    pub fn tile(&self) -> u32 {
        self.tile_size + self.overlap
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(BigshotError::config("tile size must be at least 1"));
        }
        if self.poster_size == 0 {
            return Err(BigshotError::config("poster size must be at least 1"));
        }
        if let OutputFormat::Jpeg { quality } = self.format
            && !(0.0..=1.0).contains(&quality)
        {
            return Err(BigshotError::config(format!(
                "JPEG quality must be in [0, 1], got {quality}"
            )));
        }
        Ok(())
    }

    /// Number of levels generated for a `width × height` image.
    pub fn level_count(&self, width: u32, height: u32) -> u32 {
        let tile = self.tile();
        if self.wrap_x {
            // Zero when the width is not a multiple of the tile
            let mut w = width;
            let mut levels = 0;
            while w > 0 && w % tile == 0 {
                w /= 2;
                levels += 1;
            }
            return levels;
        }
        if let Some(levels) = self.levels {
            return levels;
        }
        let max_dim = width.max(height).max(1) as f64;
        let heuristic = max_dim.log2().ceil() - (tile as f64).log2().floor() + 2.0;
        heuristic.max(0.0) as u32
    }

    fn level_dir_name(&self, zoom: u32, levels: u32) -> String {
        match self.numbering {
            LevelNumbering::Default => zoom.to_string(),
            LevelNumbering::Invert => (levels - zoom - 1).to_string(),
        }
    }
}

/// Next level edge: halve the part outside the overlap band.
pub fn halve(dim: u32, overlap: u32) -> u32 {
    (dim.saturating_sub(overlap) / 2 + overlap).max(1)
}

/// Poster dimensions with the longest edge scaled to `poster_size`.
pub fn poster_dimensions(width: u32, height: u32, poster_size: u32) -> (u32, u32) {
    let scale = poster_size as f64 / width.max(height).max(1) as f64;
    let pw = (width as f64 * scale) as u32;
    let ph = (height as f64 * scale) as u32;
    (pw.max(1), ph.max(1))
}

/// Write poster, levels and descriptor for `image` into `folder`.
pub fn make_pyramid(
    image: Image,
    folder: &Path,
    config: &PyramidConfig,
    codec: &dyn ImageCodec,
) -> Result<Descriptor> {
    config.validate()?;
    if image.is_empty() {
        return Err(BigshotError::config("cannot build a pyramid from an empty image"));
    }
    fs::create_dir_all(folder).at(folder)?;

    let (full_w, full_h) = image.dimensions();
    let suffix = config.format.suffix();
    info!("Full image size: {full_w} x {full_h}");

    let (pw, ph) = poster_dimensions(full_w, full_h, config.poster_size);
    info!("Creating {pw} x {ph} poster image");
    let poster = area_average(&image, pw, ph);
    codec.write(&poster, config.format, &folder.join(format!("poster{suffix}")))?;
    drop(poster);

    let tile = config.tile();
    let levels = config.level_count(full_w, full_h);
    info!("Creating pyramid with {levels} levels");

    let mut level = image;
    let (mut w, mut h) = (full_w, full_h);
    for zoom in 0..levels {
        let dir = folder.join(config.level_dir_name(zoom, levels));
        fs::create_dir_all(&dir).at(&dir)?;
        let tiles = write_level(&level, &dir, tile, config.overlap, config.format, codec)?;
        info!("Level {zoom}: {w} x {h}, {tiles} tiles");

        w = halve(w, config.overlap);
        h = halve(h, config.overlap);
        if zoom + 1 < levels {
            level = area_average(&level, w, h);
        }
    }

    let descriptor = Descriptor {
        suffix: suffix.to_string(),
        width: full_w,
        height: full_h,
        tile_size: tile,
        overlap: config.overlap,
        min_zoom: 1 - levels as i32,
        poster_size: config.poster_size,
        poster_width: pw,
        poster_height: ph,
    };
    descriptor.write(config.descriptor, folder)?;
    Ok(descriptor)
}
