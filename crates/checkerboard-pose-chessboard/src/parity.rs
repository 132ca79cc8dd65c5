//! Adaptive-threshold check on an assembled grid.
//!
//! Each cell centre is classified as dark or light against the mean of a
//! box window about one grid spacing in radius. On a real board the cell
//! colours alternate; a grid assembled from clutter does not.

use checkerboard_pose_core::{GrayImageView, IntegralImage};
use nalgebra::Point2;

/// Fraction of cells that follow the checkerboard colour pattern, in
/// `[0.5, 1]`, for a row-major `rows x cols` grid of corner positions.
/// `None` if the grid has no cells or a cell could not be sampled.
pub fn parity_agreement(
    image: &GrayImageView<'_>,
    corners: &[Point2<f32>],
    rows: usize,
    cols: usize,
) -> Option<f32> {
    if rows < 2 || cols < 2 || corners.len() != rows * cols {
        return None;
    }
    let integral = IntegralImage::new(image);
    let at = |r: usize, c: usize| corners[r * cols + c];

    let mut even = 0usize;
    let mut total = 0usize;
    for r in 0..rows - 1 {
        for c in 0..cols - 1 {
            let (p00, p01, p10, p11) = (at(r, c), at(r, c + 1), at(r + 1, c), at(r + 1, c + 1));
            let centre = (p00.coords + p01.coords + p10.coords + p11.coords) / 4.0;
            let spacing = ((p01 - p00).norm()
                + (p11 - p10).norm()
                + (p10 - p00).norm()
                + (p11 - p01).norm())
                / 4.0;

            let (cx, cy) = (centre.x.round() as i64, centre.y.round() as i64);
            let outer = spacing.round().max(2.0) as i64;
            let inner = (spacing / 5.0).round().max(0.0) as i64;
            let local_mean = integral.box_mean(cx, cy, outer)?;
            let cell = integral.box_mean(cx, cy, inner)?;

            let light = cell > local_mean;
            if light == ((r + c) % 2 == 0) {
                even += 1;
            }
            total += 1;
        }
    }

    let agree = even.max(total - even) as f32 / total as f32;
    Some(agree)
}
