//! Intensity statistics used by the detector front-end.
//!
//! - [`equalize_histogram`] spreads the intensity distribution over the full
//!   8-bit range before corner search,
//! - [`dynamic_range`] is the cheap contrast test used for fast rejection,
//! - [`IntegralImage`] gives O(1) box means for adaptive thresholding.

use crate::{GrayImage, GrayImageView};

/// 256-bin intensity histogram.
pub fn histogram(src: &GrayImageView<'_>) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &v in src.data {
        hist[v as usize] += 1;
    }
    hist
}

/// Histogram equalisation via the cumulative distribution.
///
/// Constant images are returned unchanged.
pub fn equalize_histogram(src: &GrayImageView<'_>) -> GrayImage {
    let hist = histogram(src);
    let total = src.data.len() as u64;

    let mut cdf = [0u64; 256];
    let mut acc = 0u64;
    for (i, &h) in hist.iter().enumerate() {
        acc += h as u64;
        cdf[i] = acc;
    }

    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total == 0 || total == cdf_min {
        return src.to_owned_image();
    }

    let denom = (total - cdf_min) as f64;
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        let c = cdf[i].saturating_sub(cdf_min) as f64;
        *slot = (c / denom * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    GrayImage {
        width: src.width,
        height: src.height,
        data: src.data.iter().map(|&v| lut[v as usize]).collect(),
    }
}

/// Spread between the `lo` and `hi` quantiles of the intensity distribution.
///
/// Quantiles are fractions in `[0, 1]`; using e.g. 5 % / 95 % keeps isolated
/// specular pixels from faking contrast.
pub fn dynamic_range(src: &GrayImageView<'_>, lo: f32, hi: f32) -> u8 {
    if src.data.is_empty() {
        return 0;
    }
    let hist = histogram(src);
    let total = src.data.len() as f64;
    let lo_count = (lo.clamp(0.0, 1.0) as f64 * total).floor() as u64;
    let hi_count = (hi.clamp(0.0, 1.0) as f64 * total).ceil() as u64;

    let mut acc = 0u64;
    let mut lo_v = None;
    let mut hi_v = 255u8;
    for (v, &h) in hist.iter().enumerate() {
        acc += h as u64;
        if lo_v.is_none() && acc > lo_count {
            lo_v = Some(v as u8);
        }
        if acc >= hi_count {
            hi_v = v as u8;
            break;
        }
    }
    hi_v.saturating_sub(lo_v.unwrap_or(0))
}

/// Summed-area table over an 8-bit image.
#[derive(Clone, Debug)]
pub struct IntegralImage {
    width: usize,
    height: usize,
    // (width + 1) x (height + 1), first row/column are zero.
    sums: Vec<u64>,
}

impl IntegralImage {
    pub fn new(src: &GrayImageView<'_>) -> Self {
        let w1 = src.width + 1;
        let mut sums = vec![0u64; w1 * (src.height + 1)];
        for y in 0..src.height {
            let mut row = 0u64;
            for x in 0..src.width {
                row += src.data[y * src.width + x] as u64;
                sums[(y + 1) * w1 + x + 1] = sums[y * w1 + x + 1] + row;
            }
        }
        Self {
            width: src.width,
            height: src.height,
            sums,
        }
    }

    /// Mean intensity of the box centred on `(cx, cy)` with the given
    /// half-size, clipped to the image. `None` for an empty image.
    pub fn box_mean(&self, cx: i64, cy: i64, radius: i64) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let x0 = (cx - radius).clamp(0, self.width as i64 - 1) as usize;
        let y0 = (cy - radius).clamp(0, self.height as i64 - 1) as usize;
        let x1 = (cx + radius).clamp(0, self.width as i64 - 1) as usize + 1;
        let y1 = (cy + radius).clamp(0, self.height as i64 - 1) as usize + 1;

        let w1 = self.width + 1;
        let sum = self.sums[y1 * w1 + x1] + self.sums[y0 * w1 + x0]
            - self.sums[y0 * w1 + x1]
            - self.sums[y1 * w1 + x0];
        let area = ((x1 - x0) * (y1 - y0)) as f32;
        Some(sum as f32 / area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: usize, h: usize, lo: u8, hi: u8) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        for (i, v) in img.data.iter_mut().enumerate() {
            let t = (i % w) as f32 / (w - 1) as f32;
            *v = (lo as f32 + t * (hi as f32 - lo as f32)).round() as u8;
        }
        img
    }

    #[test]
    fn equalization_stretches_low_contrast_ramp() {
        let img = ramp(64, 4, 100, 140);
        let eq = equalize_histogram(&img.view());
        let min = *eq.data.iter().min().unwrap();
        let max = *eq.data.iter().max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn equalization_keeps_constant_image() {
        let img = GrayImage {
            width: 3,
            height: 3,
            data: vec![77; 9],
        };
        assert_eq!(equalize_histogram(&img.view()).data, img.data);
    }

    #[test]
    fn dynamic_range_ignores_outliers() {
        let mut img = GrayImage {
            width: 100,
            height: 1,
            data: vec![120; 100],
        };
        img.data[0] = 0;
        img.data[1] = 255;
        assert_eq!(dynamic_range(&img.view(), 0.05, 0.95), 0);
        assert_eq!(dynamic_range(&img.view(), 0.0, 1.0), 255);
    }

    #[test]
    fn box_mean_matches_brute_force() {
        let img = ramp(20, 10, 0, 190);
        let view = img.view();
        let integral = IntegralImage::new(&view);

        let (cx, cy, r) = (7i64, 4i64, 3i64);
        let mut sum = 0f32;
        let mut n = 0f32;
        for y in (cy - r)..=(cy + r) {
            for x in (cx - r)..=(cx + r) {
                sum += view.get(x as usize, y as usize).unwrap() as f32;
                n += 1.0;
            }
        }
        let mean = integral.box_mean(cx, cy, r).unwrap();
        assert!((mean - sum / n).abs() < 1e-3);
    }
}
