//! Pyramid descriptors: the Bigshot key/value record and Deep Zoom XML

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BigshotError, IoContext, Result};

/// Descriptor file written inside a Bigshot pyramid folder.
pub const BIGSHOT_DESCRIPTOR_FILE: &str = "descriptor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptorFormat {
    #[default]
    Bigshot,
    Dzi,
}

/// Geometry of a generated pyramid (or carousel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Tile file suffix, including the dot
    pub suffix: String,
    pub width: u32,
    pub height: u32,
    /// Tile edge including overlap
    pub tile_size: u32,
    pub overlap: u32,
    pub min_zoom: i32,
    pub poster_size: u32,
    pub poster_width: u32,
    pub poster_height: u32,
}

impl Descriptor {
    /// `suffix:.jpg:width:W:height:H:tileSize:T:overlap:O:minZoom:M:posterSize:P:posterWidth:PW:posterHeight:PH`
    pub fn to_bigshot(&self) -> String {
        format!(
            "suffix:{}:width:{}:height:{}:tileSize:{}:overlap:{}:minZoom:{}:posterSize:{}:posterWidth:{}:posterHeight:{}",
            self.suffix,
            self.width,
            self.height,
            self.tile_size,
            self.overlap,
            self.min_zoom,
            self.poster_size,
            self.poster_width,
            self.poster_height
        )
    }

    /// Parse a Bigshot record. Unknown keys are ignored.
    pub fn from_bigshot(record: &str) -> Result<Self> {
        let parts: Vec<&str> = record.trim_end().split(':').collect();
        if parts.len() % 2 != 0 {
            return Err(BigshotError::config(format!(
                "descriptor has an odd number of fields: {record}"
            )));
        }

        let mut d = Descriptor {
            suffix: String::new(),
            width: 0,
            height: 0,
            tile_size: 0,
            overlap: 0,
            min_zoom: 0,
            poster_size: 0,
            poster_width: 0,
            poster_height: 0,
        };
        for pair in parts.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            let num = || {
                value
                    .parse::<u32>()
                    .map_err(|_| BigshotError::config(format!("descriptor {key}: bad value {value:?}")))
            };
            match key {
                "suffix" => d.suffix = value.to_string(),
                "width" => d.width = num()?,
                "height" => d.height = num()?,
                "tileSize" => d.tile_size = num()?,
                "overlap" => d.overlap = num()?,
                "minZoom" => {
                    d.min_zoom = value.parse().map_err(|_| {
                        BigshotError::config(format!("descriptor minZoom: bad value {value:?}"))
                    })?
                }
                "posterSize" => d.poster_size = num()?,
                "posterWidth" => d.poster_width = num()?,
                "posterHeight" => d.poster_height = num()?,
                _ => {}
            }
        }
        Ok(d)
    }

    /// Deep Zoom XML.
    pub fn to_dzi(&self) -> String {
        let format = self.suffix.strip_prefix('.').unwrap_or(&self.suffix);
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <Image TileSize=\"{}\" Overlap=\"{}\" Format=\"{}\" ServerFormat=\"Default\" xmlns=\"http://schemas.microsoft.com/deepzoom/2008\">\n\
             <Size Width=\"{}\" Height=\"{}\" />\n\
             </Image>\n",
            self.tile_size, self.overlap, format, self.width, self.height
        )
    }

    /// Write the descriptor for the pyramid in `folder`.
    ///
    /// Bigshot records go to `folder/descriptor`; Deep Zoom XML goes next to
    /// the folder as `<folder name>.xml`. Returns the written path.
    pub fn write(&self, format: DescriptorFormat, folder: &Path) -> Result<PathBuf> {
        let (path, contents) = match format {
            DescriptorFormat::Bigshot => (folder.join(BIGSHOT_DESCRIPTOR_FILE), self.to_bigshot()),
            DescriptorFormat::Dzi => (dzi_path(folder)?, self.to_dzi()),
        };
        fs::write(&path, contents).at(&path)?;
        Ok(path)
    }
}

/// `<parent>/<folder name>.xml`
pub fn dzi_path(folder: &Path) -> Result<PathBuf> {
    let name = folder.file_name().ok_or_else(|| {
        BigshotError::config(format!("{} has no folder name", folder.display()))
    })?;
    let parent = folder.parent().unwrap_or_else(|| Path::new(""));
    let mut file = name.to_os_string();
    file.push(".xml");
    Ok(parent.join(file))
}
