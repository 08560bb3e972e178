//! Slicing one pyramid level into overlapping square tiles

use std::path::Path;

use tracing::debug;

use crate::codec::{ImageCodec, OutputFormat};
use crate::error::Result;
use crate::raster::Image;

/// Start offsets of tiles along an axis of length `dim`.
///
/// Tiles of `tile` pixels step by `tile - overlap`, starting while the start
/// is before `dim - overlap`.
pub fn tile_starts(dim: u32, tile: u32, overlap: u32) -> Vec<u32> {
    let step = tile.saturating_sub(overlap).max(1);
    (0..dim.saturating_sub(overlap)).step_by(step as usize).collect()
}

/// File name of tile `(tx, ty)`.
pub fn tile_name(tx: usize, ty: usize, suffix: &str) -> String {
    format!("{tx}_{ty}{suffix}")
}

/// Write every tile of `level` into `dir`. Returns the number of tiles.
pub fn write_level(
    level: &Image,
    dir: &Path,
    tile: u32,
    overlap: u32,
    format: OutputFormat,
    codec: &dyn ImageCodec,
) -> Result<usize> {
    let xs = tile_starts(level.width(), tile, overlap);
    let ys = tile_starts(level.height(), tile, overlap);
    for (ty, &y) in ys.iter().enumerate() {
        for (tx, &x) in xs.iter().enumerate() {
            let name = tile_name(tx, ty, format.suffix());
            debug!("Tile {name} = [{x},{y}] + [{tile},{tile}]");
            let section = level.crop_onto_black(x, y, tile, tile, tile, tile);
            codec.write(&section, format, &dir.join(name))?;
        }
    }
    Ok(xs.len() * ys.len())
}
