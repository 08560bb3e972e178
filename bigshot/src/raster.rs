//! Packed RGB raster
//!
//! Samples are stored one `u32` per pixel with three fixed-width channels:
//!
//! ```text
//! bit:  [2*bits .. 3*bits) red | [bits .. 2*bits) green | [0 .. bits) blue
//! ```
//!
//! Decoded 8-bit images are stored unscaled in a 10-bit layout, leaving two
//! bits of headroom per channel.

/// Per-channel bit width of a packed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    bits: u32,
}

impl ChannelLayout {
    pub const EIGHT_BIT: Self = Self { bits: 8 };
    pub const TEN_BIT: Self = Self { bits: 10 };

    pub fn bits(self) -> u32 {
        self.bits
    }

    #[inline]
    pub fn mask(self) -> u32 {
        (1 << self.bits) - 1
    }

    #[inline]
    pub fn pack(self, [r, g, b]: [u32; 3]) -> u32 {
        let m = self.mask();
        ((r & m) << (2 * self.bits)) | ((g & m) << self.bits) | (b & m)
    }

    #[inline]
    pub fn unpack(self, v: u32) -> [u32; 3] {
        let m = self.mask();
        [(v >> (2 * self.bits)) & m, (v >> self.bits) & m, v & m]
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::TEN_BIT
    }
}

/// Row-major raster of packed samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    data: Vec<u32>,
}

impl Image {
    /// Black image.
    pub fn new(width: u32, height: u32, layout: ChannelLayout) -> Self {
        Self {
            width,
            height,
            layout,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Wrap existing packed samples. Returns `None` on a length mismatch.
    pub fn from_packed(width: u32, height: u32, layout: ChannelLayout, data: Vec<u32>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// Build an image by evaluating `f(x, y) -> [r, g, b]` for every pixel.
    pub fn from_fn(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        f: impl Fn(u32, u32) -> [u32; 3],
    ) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(layout.pack(f(x, y)));
            }
        }
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Convert from 8-bit RGB.
    pub fn from_rgb8(rgb: &image::RgbImage, layout: ChannelLayout) -> Self {
        let (width, height) = rgb.dimensions();
        let data = rgb
            .pixels()
            .map(|p| layout.pack([p[0] as u32, p[1] as u32, p[2] as u32]))
            .collect();
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Convert to 8-bit RGB, clamping channels above 255.
    pub fn to_rgb8(&self) -> image::RgbImage {
        let mut out = image::RgbImage::new(self.width, self.height);
        for (dst, &v) in out.pixels_mut().zip(&self.data) {
            let [r, g, b] = self.layout.unpack(v);
            dst.0 = [r.min(255) as u8, g.min(255) as u8, b.min(255) as u8];
        }
        out
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u32> {
        self.data
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, v: u32) {
        self.data[y as usize * self.width as usize + x as usize] = v;
    }

    #[inline]
    pub fn components(&self, x: u32, y: u32) -> [u32; 3] {
        self.layout.unpack(self.get(x, y))
    }

    pub fn row(&self, y: u32) -> &[u32] {
        let w = self.width as usize;
        &self.data[y as usize * w..(y as usize + 1) * w]
    }

    /// Copy of the `w × h` region at `(x, y)`, clipped to the image and
    /// composited onto a black `canvas_w × canvas_h` canvas.
    pub fn crop_onto_black(&self, x: u32, y: u32, w: u32, h: u32, canvas_w: u32, canvas_h: u32) -> Image {
        let mut out = Image::new(canvas_w, canvas_h, self.layout);
        let w = w.min(self.width.saturating_sub(x)).min(canvas_w);
        let h = h.min(self.height.saturating_sub(y)).min(canvas_h);
        for row in 0..h {
            let src = (y + row) as usize * self.width as usize + x as usize;
            let dst = row as usize * canvas_w as usize;
            out.data[dst..dst + w as usize].copy_from_slice(&self.data[src..src + w as usize]);
        }
        out
    }
}
