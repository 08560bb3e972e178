//! Image file decode/encode boundary

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;

use crate::error::{BigshotError, IoContext, Result};
use crate::raster::{ChannelLayout, Image};

/// Encoded output format for faces, tiles and posters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Png,
    /// Quality in `0.0..=1.0`
    Jpeg { quality: f32 },
}

impl OutputFormat {
    pub const DEFAULT_JPEG_QUALITY: f32 = 0.7;

    /// File suffix including the dot.
    pub fn suffix(&self) -> &'static str {
        match self {
            OutputFormat::Png => ".png",
            OutputFormat::Jpeg { .. } => ".jpg",
        }
    }

    /// Format name as used in Deep Zoom descriptors.
    pub fn extension(&self) -> &'static str {
        &self.suffix()[1..]
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Jpeg {
            quality: Self::DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Decodes source images and encodes generated ones.
pub trait ImageCodec: Send + Sync {
    fn read(&self, path: &Path) -> Result<Image>;
    fn write(&self, image: &Image, format: OutputFormat, path: &Path) -> Result<()>;
}

/// Codec backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec {
    layout: ChannelLayout,
}

impl StandardCodec {
    pub fn new(layout: ChannelLayout) -> Self {
        Self { layout }
    }
}

impl ImageCodec for StandardCodec {
    fn read(&self, path: &Path) -> Result<Image> {
        let img = image::open(path).map_err(|source| BigshotError::UnreadableSource {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Image::from_rgb8(&img.to_rgb8(), self.layout))
    }

    fn write(&self, image: &Image, format: OutputFormat, path: &Path) -> Result<()> {
        let rgb = image.to_rgb8();
        let encode_err = |source| BigshotError::Encode {
            path: path.to_path_buf(),
            source,
        };
        match format {
            OutputFormat::Png => rgb
                .save_with_format(path, ImageFormat::Png)
                .map_err(encode_err),
            OutputFormat::Jpeg { quality } => {
                let file = File::create(path).at(path)?;
                let mut writer = BufWriter::new(file);
                let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
                JpegEncoder::new_with_quality(&mut writer, q)
                    .encode_image(&rgb)
                    .map_err(encode_err)?;
                writer.flush().at(path)
            }
        }
    }
}
