//! Detection visualisation written to PNG files.

use std::fs;
use std::path::{Path, PathBuf};

use checkerboard_pose_core::BoardSpec;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_line_segment_mut};
use log::debug;
use nalgebra::Point2;

use crate::pipeline::Frame;
use crate::sink::SinkError;

/// Display boundary: receives every frame and the corners found in it.
pub trait DetectionView {
    fn show(
        &mut self,
        frame: &Frame,
        corners: Option<&[Point2<f64>]>,
        board: &BoardSpec,
    ) -> Result<(), SinkError>;
}

const ROW_COLORS: [Rgb<u8>; 7] = [
    Rgb([255, 0, 0]),
    Rgb([255, 128, 0]),
    Rgb([200, 200, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 200, 200]),
    Rgb([0, 0, 255]),
    Rgb([255, 0, 255]),
];

const CROSS_HALF: f32 = 4.0;

/// Saves one annotated PNG per frame into a directory.
///
/// Corners are drawn as crosses coloured per row and joined in scan order,
/// so a wrong ordering shows up as a broken zigzag. Frames without a
/// detection are saved unannotated.
#[derive(Clone, Debug)]
pub struct PngOverlayWriter {
    dir: PathBuf,
    next_index: usize,
}

impl PngOverlayWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_index: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DetectionView for PngOverlayWriter {
    fn show(
        &mut self,
        frame: &Frame,
        corners: Option<&[Point2<f64>]>,
        board: &BoardSpec,
    ) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir)?;
        let mut canvas = DynamicImage::ImageLuma8(frame.image.clone()).to_rgb8();
        if let Some(corners) = corners {
            draw_corners(&mut canvas, corners, board.cols() as usize);
        }
        let path = self.dir.join(format!("frame_{:06}.png", self.next_index));
        canvas.save(&path)?;
        debug!("overlay written to {}", path.display());
        self.next_index += 1;
        Ok(())
    }
}

/// Draw row-major corners: a cross per corner, consecutive corners joined.
pub fn draw_corners(canvas: &mut RgbImage, corners: &[Point2<f64>], cols: usize) {
    let cols = cols.max(1);
    let mut prev: Option<(f32, f32)> = None;
    for (i, p) in corners.iter().enumerate() {
        let color = ROW_COLORS[(i / cols) % ROW_COLORS.len()];
        let (x, y) = (p.x as f32, p.y as f32);
        let (lo, hi) = (x - CROSS_HALF, x + CROSS_HALF);
        draw_line_segment_mut(canvas, (lo, y - CROSS_HALF), (hi, y + CROSS_HALF), color);
        draw_line_segment_mut(canvas, (lo, y + CROSS_HALF), (hi, y - CROSS_HALF), color);
        draw_cross_mut(canvas, color, p.x.round() as i32, p.y.round() as i32);
        if let Some(q) = prev {
            draw_line_segment_mut(canvas, q, (x, y), color);
        }
        prev = Some((x, y));
    }
}
