//! Panorama-aware sampling of a source [`Image`]
//!
//! Horizontal coordinates wrap (panoramas are periodic in longitude),
//! vertical coordinates clamp (poles are not).

use crate::raster::Image;

#[derive(Debug, Clone, Copy)]
pub struct Sampler<'a> {
    image: &'a Image,
}

impl<'a> Sampler<'a> {
    /// The image must not be empty.
    pub fn new(image: &'a Image) -> Self {
        debug_assert!(!image.is_empty());
        Self { image }
    }

    pub fn image(&self) -> &'a Image {
        self.image
    }

    #[inline]
    pub fn value_at(&self, x: i64, y: i64) -> u32 {
        let w = self.image.width() as i64;
        let h = self.image.height() as i64;
        let x = x.rem_euclid(w);
        let y = y.clamp(0, h - 1);
        self.image.get(x as u32, y as u32)
    }

    #[inline]
    pub fn components_at(&self, x: i64, y: i64) -> [u32; 3] {
        self.image.layout().unpack(self.value_at(x, y))
    }

    /// Nearest sample at truncated coordinates.
    #[inline]
    pub fn nearest(&self, x: f64, y: f64) -> [u32; 3] {
        self.components_at(x as i64, y as i64)
    }

    /// Bilinear interpolation per channel, truncated toward zero.
    #[inline]
    pub fn bilinear(&self, x: f64, y: f64) -> [u32; 3] {
        let x0f = x.floor();
        let y0f = y.floor();
        let xf = x - x0f;
        let yf = y - y0f;
        let (x0, y0) = (x0f as i64, y0f as i64);

        let c00 = self.components_at(x0, y0);
        let c10 = self.components_at(x0 + 1, y0);
        let c01 = self.components_at(x0, y0 + 1);
        let c11 = self.components_at(x0 + 1, y0 + 1);

        let mut out = [0u32; 3];
        for (i, o) in out.iter_mut().enumerate() {
            let top = lerp(c00[i] as f64, c10[i] as f64, xf);
            let bottom = lerp(c01[i] as f64, c11[i] as f64, xf);
            *o = lerp(top, bottom, yf) as u32;
        }
        out
    }

    /// Packed bilinear sample.
    pub fn bilinear_sample(&self, x: f64, y: f64) -> u32 {
        self.image.layout().pack(self.bilinear(x, y))
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    // exact when a == b
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ChannelLayout;

    fn ramp() -> Image {
        // red = 10 * x, green = 10 * y
        Image::from_fn(4, 3, ChannelLayout::TEN_BIT, |x, y| [10 * x, 10 * y, 7])
    }

    #[test]
    fn test_wrap_and_clamp() {
        let img = ramp();
        let s = Sampler::new(&img);
        assert_eq!(s.components_at(4, 0), s.components_at(0, 0));
        assert_eq!(s.components_at(-1, 0), s.components_at(3, 0));
        assert_eq!(s.components_at(0, -5), s.components_at(0, 0));
        assert_eq!(s.components_at(0, 99), s.components_at(0, 2));
    }

    #[test]
    fn test_bilinear_midpoints() {
        let img = ramp();
        let s = Sampler::new(&img);
        assert_eq!(s.bilinear(1.0, 1.0), [10, 10, 7]);
        assert_eq!(s.bilinear(1.5, 0.5), [15, 5, 7]);
        // Truncation, not rounding
        assert_eq!(s.bilinear(1.25, 0.0), [12, 0, 7]);
    }

    #[test]
    fn test_bilinear_wraps_across_seam() {
        let img = ramp();
        let s = Sampler::new(&img);
        // Between column 3 (30) and column 0 (0)
        assert_eq!(s.bilinear(3.5, 0.0)[0], 15);
        // Negative coordinates wrap from the right edge
        assert_eq!(s.bilinear(-0.5, 0.0)[0], 15);
    }

    #[test]
    fn test_channels_independent() {
        let img = Image::from_fn(2, 1, ChannelLayout::EIGHT_BIT, |x, _| {
            if x == 0 { [255, 0, 255] } else { [255, 255, 255] }
        });
        let s = Sampler::new(&img);
        assert_eq!(s.bilinear(0.5, 0.0), [255, 127, 255]);
    }
}
