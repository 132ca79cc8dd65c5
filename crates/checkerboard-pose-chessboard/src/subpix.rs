//! Sub-pixel corner refinement by gradient orthogonality.
//!
//! For a true corner `q`, the image gradient at every nearby point `p` is
//! either zero (flat region) or perpendicular to `p - q` (on an edge through
//! the corner). Each iteration solves the weighted least-squares system
//! `sum(w g gᵀ) q = sum(w g gᵀ p)` over the integer pixels of a square window
//! around the current estimate.
//!
//! Gradients are central differences on the pixel grid. Each term is scaled
//! by `1 / |g|`, so an edge contributes its unit normal weighted by edge
//! strength and corners between pixel centres are not pulled toward the
//! steepest pixel.

use checkerboard_pose_core::GrayImageView;
use nalgebra::{Matrix2, Point2, Vector2};

use crate::params::SubpixParams;

const MIN_GRADIENT: f64 = 1e-6;

#[inline]
fn pixel(image: &GrayImageView<'_>, x: usize, y: usize) -> f64 {
    image.get(x, y).map_or(0.0, f64::from)
}

/// Refine one corner. Falls back to `start` when the system is singular or
/// the estimate leaves the search window.
pub fn refine_corner(
    image: &GrayImageView<'_>,
    start: Point2<f64>,
    params: &SubpixParams,
) -> Point2<f64> {
    if image.width < 3 || image.height < 3 || !start.x.is_finite() || !start.y.is_finite() {
        return start;
    }

    let half = params.half_window.max(1) as i64;
    let sigma2 = (half as f64 * 0.5).powi(2).max(1.0);
    let (max_x, max_y) = (image.width as i64 - 2, image.height as i64 - 2);
    let mut q = start;

    for _ in 0..params.max_iterations.max(1) {
        let mut a = Matrix2::<f64>::zeros();
        let mut b = Vector2::<f64>::zeros();

        let (cx, cy) = (q.x.round() as i64, q.y.round() as i64);
        for y in (cy - half).max(1)..=(cy + half).min(max_y) {
            for x in (cx - half).max(1)..=(cx + half).min(max_x) {
                let (ux, uy) = (x as usize, y as usize);
                let gx = 0.5 * (pixel(image, ux + 1, uy) - pixel(image, ux - 1, uy));
                let gy = 0.5 * (pixel(image, ux, uy + 1) - pixel(image, ux, uy - 1));
                let mag = gx.hypot(gy);
                if mag < MIN_GRADIENT {
                    continue;
                }

                let (px, py) = (x as f64, y as f64);
                let d2 = (px - q.x).powi(2) + (py - q.y).powi(2);
                let w = (-d2 / (2.0 * sigma2)).exp() / mag;

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b.x += gxx * px + gxy * py;
                b.y += gxy * px + gyy * py;
            }
        }

        // A window with a single edge direction is rank deficient.
        if a.determinant().abs() < 1e-9 * (a.trace() * a.trace()).max(1e-12) {
            break;
        }
        let Some(next) = a.try_inverse().map(|inv| inv * b) else {
            break;
        };
        if !next.iter().all(|v| v.is_finite()) {
            break;
        }
        let next = Point2::from(next);
        let moved = (next - q).norm();
        q = next;
        if moved < params.epsilon {
            break;
        }
    }

    if (q - start).norm() > params.half_window.max(1) as f64 {
        return start;
    }
    q
}

pub fn refine_corners(
    image: &GrayImageView<'_>,
    corners: &[Point2<f64>],
    params: &SubpixParams,
) -> Vec<Point2<f64>> {
    corners
        .iter()
        .map(|&c| refine_corner(image, c, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkerboard_pose_core::GrayImage;

    fn quadrant_image(cx: f64, cy: f64) -> GrayImage {
        rotated_quadrant_image(cx, cy, 0.0)
    }

    fn rotated_quadrant_image(cx: f64, cy: f64, angle: f64) -> GrayImage {
        // Four quadrants around (cx, cy), 4x4 supersampled.
        let (w, h) = (40usize, 40usize);
        let (sin, cos) = angle.sin_cos();
        let mut img = GrayImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for sy in 0..4 {
                    for sx in 0..4 {
                        let u = x as f64 - 0.375 + sx as f64 * 0.25 - cx;
                        let v = y as f64 - 0.375 + sy as f64 * 0.25 - cy;
                        let (ru, rv) = (cos * u + sin * v, cos * v - sin * u);
                        let dark = (ru < 0.0) == (rv < 0.0);
                        acc += if dark { 10.0 } else { 240.0 };
                    }
                }
                img.data[y * w + x] = (acc / 16.0f64).round() as u8;
            }
        }
        img
    }

    #[test]
    fn converges_on_quadrant_corner() {
        let (cx, cy) = (19.25, 20.75);
        let img = quadrant_image(cx, cy);
        let refined = refine_corner(&img.view(), Point2::new(20.0, 20.0), &SubpixParams::default());
        assert!((refined.x - cx).abs() < 0.05, "x = {}", refined.x);
        assert!((refined.y - cy).abs() < 0.05, "y = {}", refined.y);
    }

    #[test]
    fn converges_on_rotated_corner() {
        let (cx, cy) = (19.9, 20.3);
        let img = rotated_quadrant_image(cx, cy, 0.7);
        let refined = refine_corner(&img.view(), Point2::new(21.0, 19.0), &SubpixParams::default());
        assert!((refined.x - cx).abs() < 0.05, "x = {}", refined.x);
        assert!((refined.y - cy).abs() < 0.05, "y = {}", refined.y);
    }

    #[test]
    fn single_edge_keeps_start() {
        let img = rotated_quadrant_image(19.5, -100.0, 0.0);
        let start = Point2::new(18.0, 20.0);
        assert_eq!(refine_corner(&img.view(), start, &SubpixParams::default()), start);
    }

    #[test]
    fn flat_patch_keeps_start() {
        let img = GrayImage {
            width: 30,
            height: 30,
            data: vec![90; 900],
        };
        let start = Point2::new(14.2, 15.7);
        assert_eq!(refine_corner(&img.view(), start, &SubpixParams::default()), start);
    }
}
