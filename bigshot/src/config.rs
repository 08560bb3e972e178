//! Job configuration
//!
//! A job is described by [`JobOptions`]: a flat set of optional, kebab-case
//! keys that can come from a TOML file and from command-line overrides.
//! [`JobOptions::resolve`] applies the preset, fills defaults and validates,
//! producing an immutable [`Job`].
//!
//! ```toml
//! preset = "dzi-cubemap"
//! format = "archive"
//! face-size = 1024
//! jpeg-quality = 0.85
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::codec::OutputFormat;
use crate::error::{BigshotError, IoContext, Result};
use crate::math::Orientation;
use crate::projection::{CylindricalModel, ProjectionConfig, ProjectionModel};
use crate::pyramid::{DescriptorFormat, LevelNumbering, PyramidConfig};

/// `as_str`, `FromStr` and `Display` for enums selected by a keyword.
macro_rules! keyword_enum {
    ($name:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(
                        "unknown value {s:?} (expected one of: {})",
                        [$($text),+].join(", ")
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    DziCubemap,
}

keyword_enum!(Preset { DziCubemap => "dzi-cubemap" });

/// What the job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transform {
    /// Pyramid of the source image itself
    #[default]
    Pyramid,
    /// One pyramid per cube face of an equirectangular panorama
    Facemap,
    /// One pyramid per cube face of a cylindrical panorama
    CylinderFacemap,
    /// A single rendered view
    Face,
    /// Views spread around the horizon
    Carousel,
}

keyword_enum!(Transform {
    Pyramid => "pyramid",
    Facemap => "facemap",
    CylinderFacemap => "cylinder-facemap",
    Face => "face",
    Carousel => "carousel",
});

/// Directory tree or packed archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    #[default]
    Folders,
    Archive,
}

keyword_enum!(OutputMode {
    Folders => "folders",
    Archive => "archive",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageFormat {
    #[default]
    Jpg,
    Png,
}

keyword_enum!(ImageFormat { Jpg => "jpg", Png => "png" });

/// Where pyramid tiles go relative to the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FolderLayout {
    /// Tiles directly under the output
    #[default]
    Bigshot,
    /// Tiles under `<output>/<output name>/`
    Dzi,
}

keyword_enum!(FolderLayout { Bigshot => "bigshot", Dzi => "dzi" });
keyword_enum!(DescriptorFormat { Bigshot => "bigshot", Dzi => "dzi" });
keyword_enum!(LevelNumbering { Default => "default", Invert => "invert" });

/// Raw job parameters. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct JobOptions {
    pub preset: Option<Preset>,
    pub transform: Option<Transform>,
    pub format: Option<OutputMode>,
    pub image_format: Option<ImageFormat>,
    pub jpeg_quality: Option<f32>,
    pub descriptor_format: Option<DescriptorFormat>,
    pub folder_layout: Option<FolderLayout>,
    pub level_numbering: Option<LevelNumbering>,

    // Pyramid
    pub tile_size: Option<u32>,
    pub overlap: Option<u32>,
    pub levels: Option<u32>,
    pub wrap_x: Option<bool>,
    pub poster_size: Option<u32>,

    // Cube faces
    pub face_size: Option<u32>,
    pub front_at: Option<f64>,
    pub input_vfov: Option<f64>,
    pub input_hfov: Option<f64>,
    pub input_horizon: Option<f64>,
    pub horizontal_wrap: Option<bool>,

    // Single face
    pub fov: Option<f64>,
    pub yaw: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw_offset: Option<f64>,
    pub pitch_offset: Option<f64>,
    pub roll_offset: Option<f64>,
    pub output_width: Option<u32>,
    pub output_height: Option<u32>,

    // Anti-aliasing, all rendered views
    pub oversampling: Option<u32>,
    pub jitter: Option<f64>,
    pub seed: Option<u64>,

    // Carousel
    pub carousel_steps: Option<u32>,
    pub carousel_fov: Option<f64>,
    pub carousel_output_width: Option<u32>,
    pub carousel_output_height: Option<u32>,

    pub timeout_secs: Option<u64>,
}

/// Carousel geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct CarouselConfig {
    pub steps: u32,
    /// Vertical field of view of each view, degrees
    pub fov: f64,
    pub width: u32,
    pub height: u32,
}

/// A validated job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub transform: Transform,
    pub output: OutputMode,
    pub folder_layout: FolderLayout,
    pub pyramid: PyramidConfig,
    /// Cube face edge excluding overlap
    pub face_size: u32,
    /// Yaw of the panorama column shown on the front face
    pub front_at: f64,
    /// Source projection for cube faces
    pub model: ProjectionModel,
    /// The single `face` view; its oversampling, jitter and seed apply to
    /// every rendered view
    pub face: ProjectionConfig,
    pub carousel: CarouselConfig,
    pub timeout: Duration,
}

impl JobOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).at(path)?;
        toml::from_str(&content)
            .map_err(|e| BigshotError::config(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BigshotError::config(e.to_string()))
    }

    /// Keys set in `overrides` replace those in `self`.
    pub fn merge(self, overrides: JobOptions) -> JobOptions {
        let base = self;
        macro_rules! pick {
            ($($field:ident),+ $(,)?) => {
                JobOptions { $($field: overrides.$field.or(base.$field)),+ }
            };
        }
        pick!(
            preset,
            transform,
            format,
            image_format,
            jpeg_quality,
            descriptor_format,
            folder_layout,
            level_numbering,
            tile_size,
            overlap,
            levels,
            wrap_x,
            poster_size,
            face_size,
            front_at,
            input_vfov,
            input_hfov,
            input_horizon,
            horizontal_wrap,
            fov,
            yaw,
            pitch,
            roll,
            yaw_offset,
            pitch_offset,
            roll_offset,
            output_width,
            output_height,
            oversampling,
            jitter,
            seed,
            carousel_steps,
            carousel_fov,
            carousel_output_width,
            carousel_output_height,
            timeout_secs,
        )
    }

    /// Fill unset keys from the preset.
    fn apply_preset(&mut self) {
        let Some(Preset::DziCubemap) = self.preset else {
            return;
        };
        let overlap = self.overlap.unwrap_or(2);
        let tile_size = self.tile_size.unwrap_or(256u32.saturating_sub(overlap));
        let face_size = self.face_size.unwrap_or(8 * tile_size);

        if !(tile_size + overlap).is_power_of_two() {
            warn!(
                "Resulting image tile size (tile-size + overlap) is not a power of two: {}",
                tile_size + overlap
            );
        }
        if tile_size == 0 || face_size % tile_size != 0 {
            warn!("face-size {face_size} is not an even multiple of tile-size {tile_size}");
        }

        self.overlap.get_or_insert(overlap);
        self.tile_size.get_or_insert(tile_size);
        self.face_size.get_or_insert(face_size);
        self.transform.get_or_insert(Transform::Facemap);
        let levels = ((face_size + overlap) as f64).log2().ceil() as u32;
        self.levels.get_or_insert(levels + 1);
        self.descriptor_format.get_or_insert(DescriptorFormat::Dzi);
        self.folder_layout.get_or_insert(FolderLayout::Dzi);
        self.level_numbering.get_or_insert(LevelNumbering::Invert);
    }

    /// Apply the preset, fill defaults and validate.
    pub fn resolve(mut self) -> Result<Job> {
        self.apply_preset();

        let transform = self.transform.unwrap_or_default();
        let output = self.format.unwrap_or_default();
        let quality = self.jpeg_quality.unwrap_or(OutputFormat::DEFAULT_JPEG_QUALITY);
        let format = match self.image_format.unwrap_or_default() {
            ImageFormat::Jpg => OutputFormat::Jpeg { quality },
            ImageFormat::Png => OutputFormat::Png,
        };

        let pyramid = PyramidConfig {
            tile_size: self.tile_size.unwrap_or(256),
            overlap: self.overlap.unwrap_or(0),
            levels: self.levels,
            wrap_x: self.wrap_x.unwrap_or(false),
            poster_size: self.poster_size.unwrap_or(512),
            format,
            descriptor: self.descriptor_format.unwrap_or_default(),
            numbering: self.level_numbering.unwrap_or_default(),
        };
        pyramid.validate()?;

        let model = match transform {
            Transform::CylinderFacemap => {
                let c = CylindricalModel {
                    hfov: self.input_hfov.unwrap_or(360.0),
                    vfov: self.input_vfov.unwrap_or(90.0),
                    horizon: self.input_horizon,
                    wrap: self.horizontal_wrap.unwrap_or(true),
                };
                c.validate()?;
                ProjectionModel::Cylindrical(c)
            }
            _ => ProjectionModel::Equirectangular,
        };

        let face = ProjectionConfig {
            model: ProjectionModel::Equirectangular,
            view: Orientation::new(
                self.yaw.unwrap_or(0.0),
                self.pitch.unwrap_or(0.0),
                self.roll.unwrap_or(0.0),
            ),
            offset: Orientation::new(
                self.yaw_offset.unwrap_or(0.0),
                self.pitch_offset.unwrap_or(0.0),
                self.roll_offset.unwrap_or(0.0),
            ),
            vfov: self.fov.unwrap_or(60.0),
            width: self.output_width.unwrap_or(640),
            height: self.output_height.unwrap_or(480),
            oversampling: self.oversampling.unwrap_or(1),
            jitter: self.jitter.unwrap_or(0.0),
            seed: self.seed,
        };
        face.validate()?;

        let carousel = CarouselConfig {
            steps: self.carousel_steps.unwrap_or(24),
            fov: self.carousel_fov.unwrap_or(60.0),
            width: self.carousel_output_width.unwrap_or(360),
            height: self.carousel_output_height.unwrap_or(240),
        };
        if carousel.steps == 0 {
            return Err(BigshotError::config("carousel-steps must be at least 1"));
        }

        let face_size = self.face_size.unwrap_or(2048);
        if face_size == 0 {
            return Err(BigshotError::config("face-size must be at least 1"));
        }
        let front_at = self.front_at.unwrap_or(0.0);
        if !front_at.is_finite() {
            return Err(BigshotError::config("front-at must be finite"));
        }

        let timeout_secs = self.timeout_secs.unwrap_or(600);
        if timeout_secs == 0 {
            return Err(BigshotError::config("timeout-secs must be at least 1"));
        }
        if transform == Transform::Face && output == OutputMode::Archive {
            return Err(BigshotError::config(
                "the face transform writes a single image; archive output is not available",
            ));
        }

        Ok(Job {
            transform,
            output,
            folder_layout: self.folder_layout.unwrap_or_default(),
            pyramid,
            face_size,
            front_at,
            model,
            face,
            carousel,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let job = JobOptions::default().resolve().unwrap();
        assert_eq!(job.transform, Transform::Pyramid);
        assert_eq!(job.output, OutputMode::Folders);
        assert_eq!(job.pyramid, PyramidConfig::default());
        assert_eq!(job.face_size, 2048);
        assert_eq!(job.face.width, 640);
        assert_eq!(job.face.height, 480);
        assert_eq!(job.carousel.steps, 24);
        assert_eq!(job.carousel.height, 240);
        assert_eq!(job.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_parse_kebab_case() {
        let opts = JobOptions::parse(
            r#"
            transform = "cylinder-facemap"
            image-format = "png"
            tile-size = 510
            overlap = 2
            input-vfov = 70.0
            horizontal-wrap = false
            "#,
        )
        .unwrap();
        let job = opts.resolve().unwrap();
        assert_eq!(job.pyramid.tile(), 512);
        assert_eq!(job.pyramid.format, OutputFormat::Png);
        match job.model {
            ProjectionModel::Cylindrical(c) => {
                assert_eq!(c.vfov, 70.0);
                assert!(!c.wrap);
            }
            other => panic!("expected cylindrical, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = JobOptions::parse("tile_size = 256").unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Configuration);
    }

    #[test]
    fn test_dzi_cubemap_preset() {
        let opts = JobOptions {
            preset: Some(Preset::DziCubemap),
            ..JobOptions::default()
        };
        let job = opts.resolve().unwrap();
        assert_eq!(job.transform, Transform::Facemap);
        assert_eq!(job.pyramid.overlap, 2);
        assert_eq!(job.pyramid.tile_size, 254);
        assert_eq!(job.face_size, 2032);
        // ceil(log2(2034)) + 1
        assert_eq!(job.pyramid.levels, Some(12));
        assert_eq!(job.pyramid.descriptor, DescriptorFormat::Dzi);
        assert_eq!(job.pyramid.numbering, LevelNumbering::Invert);
        assert_eq!(job.folder_layout, FolderLayout::Dzi);
    }

    #[test]
    fn test_preset_keeps_explicit_values() {
        let opts = JobOptions {
            preset: Some(Preset::DziCubemap),
            overlap: Some(0),
            face_size: Some(1024),
            level_numbering: Some(LevelNumbering::Default),
            ..JobOptions::default()
        };
        let job = opts.resolve().unwrap();
        assert_eq!(job.pyramid.overlap, 0);
        assert_eq!(job.pyramid.tile_size, 256);
        assert_eq!(job.face_size, 1024);
        assert_eq!(job.pyramid.levels, Some(11));
        assert_eq!(job.pyramid.numbering, LevelNumbering::Default);
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = JobOptions {
            tile_size: Some(128),
            overlap: Some(1),
            ..JobOptions::default()
        };
        let cli = JobOptions {
            tile_size: Some(512),
            ..JobOptions::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.tile_size, Some(512));
        assert_eq!(merged.overlap, Some(1));
    }

    #[test]
    fn test_invalid_values() {
        let bad = [
            JobOptions { fov: Some(180.0), ..JobOptions::default() },
            JobOptions { oversampling: Some(0), ..JobOptions::default() },
            JobOptions { jpeg_quality: Some(2.0), ..JobOptions::default() },
            JobOptions { tile_size: Some(0), ..JobOptions::default() },
            JobOptions { carousel_steps: Some(0), ..JobOptions::default() },
            JobOptions {
                transform: Some(Transform::Face),
                format: Some(OutputMode::Archive),
                ..JobOptions::default()
            },
        ];
        for opts in bad {
            assert!(opts.clone().resolve().is_err(), "{opts:?}");
        }
    }

    #[test]
    fn test_keywords() {
        assert_eq!("cylinder-facemap".parse::<Transform>(), Ok(Transform::CylinderFacemap));
        assert_eq!(LevelNumbering::Invert.to_string(), "invert");
        assert!("tiff".parse::<ImageFormat>().unwrap_err().contains("jpg, png"));
    }
}
