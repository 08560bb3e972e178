//! Area-average resampling
//!
//! Every destination pixel is the coverage-weighted mean of the source pixels
//! its footprint overlaps. Weights are exact: along an axis, source pixel `j`
//! spans `[j * dst, (j + 1) * dst)` and destination pixel `i` spans
//! `[i * src, (i + 1) * src)` in the same integer units.

use crate::raster::Image;

/// `(source index, weight)` pairs for each destination index. Weights sum to 1.
fn contributions(src: u32, dst: u32) -> Vec<Vec<(u32, f64)>> {
    let (s, d) = (src as u64, dst as u64);
    (0..d)
        .map(|i| {
            let start = i * s;
            let end = start + s;
            let first = start / d;
            let last = (end - 1) / d;
            (first..=last)
                .filter_map(|j| {
                    let overlap = end.min((j + 1) * d) - start.max(j * d);
                    (overlap > 0).then(|| (j as u32, overlap as f64 / s as f64))
                })
                .collect()
        })
        .collect()
}

/// Resample `src` to `width × height` by area averaging.
///
/// Rows are produced one at a time; memory use beyond the output is one row
/// of accumulators.
pub fn area_average(src: &Image, width: u32, height: u32) -> Image {
    let layout = src.layout();
    if src.is_empty() || width == 0 || height == 0 {
        return Image::new(width, height, layout);
    }
    if src.dimensions() == (width, height) {
        return src.clone();
    }

    let horizontal = contributions(src.width(), width);
    let vertical = contributions(src.height(), height);

    let mut out = Image::new(width, height, layout);
    let mut row = vec![[0f64; 3]; width as usize];
    let mut acc = vec![[0f64; 3]; width as usize];
    for (dy, sources) in vertical.iter().enumerate() {
        acc.fill([0.0; 3]);
        for &(sy, wy) in sources {
            resample_row(src, sy, &horizontal, &mut row);
            for (a, r) in acc.iter_mut().zip(&row) {
                for c in 0..3 {
                    a[c] += r[c] * wy;
                }
            }
        }
        for (dx, a) in acc.iter().enumerate() {
            let max = layout.mask() as f64;
            let v = layout.pack(a.map(|c| c.round().clamp(0.0, max) as u32));
            out.set(dx as u32, dy as u32, v);
        }
    }
    out
}

fn resample_row(src: &Image, y: u32, horizontal: &[Vec<(u32, f64)>], out: &mut [[f64; 3]]) {
    let layout = src.layout();
    let row = src.row(y);
    for (o, sources) in out.iter_mut().zip(horizontal) {
        *o = [0.0; 3];
        for &(sx, wx) in sources {
            let c = layout.unpack(row[sx as usize]);
            for i in 0..3 {
                o[i] += c[i] as f64 * wx;
            }
        }
    }
}
