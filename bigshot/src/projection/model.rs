//! Source panorama models: spherical angles -> source pixel coordinates

use std::f64::consts::{FRAC_PI_2, PI};

use crate::error::{BigshotError, Result};

/// Projection of the source panorama.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ProjectionModel {
    /// Full sphere: x ∝ longitude (-π..π), y ∝ latitude (-π/2..π/2)
    #[default]
    Equirectangular,
    /// Calibrated cylinder, possibly covering less than 360°
    Cylindrical(CylindricalModel),
}

/// Cylindrical source calibration. Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylindricalModel {
    /// Horizontal field of view covered by the full source width
    pub hfov: f64,
    /// Vertical field of view covered by the full source height
    pub vfov: f64,
    /// Source row of the horizon; `None` means the middle row
    pub horizon: Option<f64>,
    /// Whether sampling may wrap around the left/right edges
    pub wrap: bool,
}

impl Default for CylindricalModel {
    fn default() -> Self {
        Self {
            hfov: 360.0,
            vfov: 90.0,
            horizon: None,
            wrap: true,
        }
    }
}

impl CylindricalModel {
    /// Calibration from panorama stitcher output parameters.
    ///
    /// # Arguments
    /// * `width`, `height` - Stitched panorama size before cropping
    /// * `hfov` - Horizontal field of view of the stitched panorama, degrees
    /// * `crop_top` - Rows cropped from the top of the stitched panorama
    /// * `source_height` - Height of the (cropped) source image actually sampled
    pub fn from_stitcher_parameters(
        width: u32,
        height: u32,
        hfov: f64,
        crop_top: i64,
        source_height: u32,
    ) -> Self {
        let horizon = (height / 2) as i64 - crop_top;
        let hfov_rad = hfov.to_radians();
        let per_pixel = (hfov_rad / width as f64).tan();
        let half_extent = (source_height / 2) as f64 * per_pixel;
        Self {
            hfov,
            vfov: (half_extent.atan() * 2.0).to_degrees(),
            horizon: Some(horizon as f64),
            wrap: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.hfov > 0.0 && self.hfov <= 360.0) {
            return Err(BigshotError::config(format!(
                "input horizontal FOV must be in (0, 360] degrees, got {}",
                self.hfov
            )));
        }
        if !(self.vfov > 0.0 && self.vfov < 180.0) {
            return Err(BigshotError::config(format!(
                "input vertical FOV must be in (0, 180) degrees, got {}",
                self.vfov
            )));
        }
        if let Some(h) = self.horizon
            && !h.is_finite()
        {
            return Err(BigshotError::config("input horizon must be finite"));
        }
        Ok(())
    }
}

/// Where a ray lands in the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourcePosition {
    /// Outside the source coverage: contributes black
    Outside,
    /// On the last row/column: nearest sample, no neighbour to blend with
    Nearest { x: f64, y: f64 },
    Bilinear { x: f64, y: f64 },
}

impl SourcePosition {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match *self {
            SourcePosition::Outside => None,
            SourcePosition::Nearest { x, y } | SourcePosition::Bilinear { x, y } => Some((x, y)),
        }
    }
}

/// A [`ProjectionModel`] with its per-source constants precomputed.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SourceMapping {
    Equirectangular {
        half_w: f64,
        half_h: f64,
        last_row: f64,
    },
    Cylindrical {
        half_w: f64,
        half_h: f64,
        width: f64,
        height: f64,
        half_hfov: f64,
        tan_half_vfov: f64,
        horizon: f64,
        wrap: bool,
    },
}

impl SourceMapping {
    pub(crate) fn new(model: &ProjectionModel, width: u32, height: u32) -> Self {
        // Integer halves, matching pixel-centre conventions of the tile viewer
        let half_w = (width / 2) as f64;
        let half_h = (height / 2) as f64;
        match model {
            ProjectionModel::Equirectangular => SourceMapping::Equirectangular {
                half_w,
                half_h,
                last_row: height as f64 - 1.0,
            },
            ProjectionModel::Cylindrical(c) => SourceMapping::Cylindrical {
                half_w,
                half_h,
                width: width as f64,
                height: height as f64,
                half_hfov: c.hfov.to_radians() / 2.0,
                tan_half_vfov: (c.vfov.to_radians() / 2.0).tan(),
                horizon: c.horizon.unwrap_or(half_h),
                wrap: c.wrap,
            },
        }
    }

    /// Map longitude `theta` (-π..π) and latitude `phi` (-π/2..π/2).
    #[inline]
    pub(crate) fn locate(&self, theta: f64, phi: f64) -> SourcePosition {
        match *self {
            SourceMapping::Equirectangular {
                half_w,
                half_h,
                last_row,
            } => {
                let x = theta / PI * half_w + half_w;
                let y = phi / FRAC_PI_2 * half_h + half_h;
                if y >= last_row {
                    SourcePosition::Nearest { x, y }
                } else {
                    SourcePosition::Bilinear { x, y }
                }
            }
            SourceMapping::Cylindrical {
                half_w,
                half_h,
                width,
                height,
                half_hfov,
                tan_half_vfov,
                horizon,
                wrap,
            } => {
                let x = theta / half_hfov * half_w + half_w;
                let y = phi.tan() / tan_half_vfov * half_h + horizon;
                let inside_y = y >= 0.0 && y < height;
                let inside_x = wrap || (x >= 0.0 && x < width);
                if !(inside_y && inside_x) {
                    SourcePosition::Outside
                } else if y >= height - 1.0 || (!wrap && x >= width - 1.0) {
                    SourcePosition::Nearest { x, y }
                } else {
                    SourcePosition::Bilinear { x, y }
                }
            }
        }
    }
}
