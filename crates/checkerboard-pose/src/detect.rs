//! Corner detection front-end: ChESS candidates from `chess-corners`, grid
//! assembly and refinement from `checkerboard-pose-chessboard`.

use checkerboard_pose_chessboard::{ChessboardDetection, ChessboardDetector};
use checkerboard_pose_core::{BoardSpec, Corner, GrayImageView};
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor, ThresholdMode};
use log::debug;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::DetectorConfig;

/// Errors produced when wrapping raw buffers for detection.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },
}

/// ChESS settings used by [`CornerDetector`] for a detector configuration.
pub fn chess_config(config: &DetectorConfig) -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.threshold_mode = ThresholdMode::Relative;
    cfg.threshold_value = config.chess_threshold_rel as _;
    cfg.nms_radius = config.chess_nms_radius as _;
    cfg
}

/// Borrow an `image::GrayImage` as a core view.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Build an `image::GrayImage` from a raw grayscale buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    let w = usize::try_from(width).ok();
    let h = usize::try_from(height).ok();
    let Some((w, h)) = w.zip(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    let Some(expected) = w.checked_mul(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::InvalidGrayDimensions { width, height })
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner::new(c.x, c.y, c.response)
}

/// Finds a board's internal corners in a grayscale image.
///
/// The ChESS search runs on the prepared search image (equalised when
/// `normalize_image` is on); sub-pixel refinement runs on the input image.
pub struct CornerDetector {
    chess: ChessConfig,
    chessboard: ChessboardDetector,
}

impl CornerDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            chess: chess_config(config),
            chessboard: ChessboardDetector::new(config.chessboard.clone()),
        }
    }

    /// Corners of `board` in row-major order, or `None` if the board is not
    /// fully visible.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, img, board),
            fields(width = img.width(), height = img.height())
        )
    )]
    pub fn detect(&self, img: &::image::GrayImage, board: &BoardSpec) -> Option<ChessboardDetection> {
        let mut prepared = self.chessboard.prepare_image(gray_view(img))?;

        // Lend the search buffer to `image` for the ChESS pass and take it back.
        let search = ::image::GrayImage::from_raw(
            prepared.search.width as u32,
            prepared.search.height as u32,
            std::mem::take(&mut prepared.search.data),
        )?;
        let raw = find_chess_corners_image(&search, &self.chess);
        prepared.search.data = search.into_raw();

        let raw = match raw {
            Ok(raw) => raw,
            Err(err) => {
                debug!("ChESS corner search failed: {err}");
                return None;
            }
        };
        let corners: Vec<Corner> = raw.iter().map(adapt_chess_corner).collect();
        debug!("{} raw ChESS corners", corners.len());

        self.chessboard.detect(&prepared, &corners, board)
    }

    /// [`CornerDetector::detect`] on a raw row-major buffer.
    pub fn detect_gray_u8(
        &self,
        width: u32,
        height: u32,
        pixels: &[u8],
        board: &BoardSpec,
    ) -> Result<Option<ChessboardDetection>, DetectError> {
        let img = gray_image_from_slice(width, height, pixels)?;
        Ok(self.detect(&img, board))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_buffer_length_is_checked() {
        let err = gray_image_from_slice(4, 3, &[0u8; 11]).unwrap_err();
        assert_eq!(
            err,
            DetectError::InvalidGrayBuffer {
                expected: 12,
                got: 11
            }
        );
        let img = gray_image_from_slice(4, 3, &[7u8; 12]).unwrap();
        assert_eq!(gray_view(&img).get(3, 2), Some(7));
    }

    #[test]
    fn chess_config_uses_relative_threshold() {
        let config = DetectorConfig {
            chess_threshold_rel: 0.35,
            chess_nms_radius: 3,
            ..DetectorConfig::default()
        };
        let cfg = chess_config(&config);
        assert_eq!(cfg.threshold_mode, ThresholdMode::Relative);
        assert!((cfg.threshold_value - 0.35).abs() < 1e-6);
        assert_eq!(cfg.nms_radius, 3);
    }

    #[test]
    fn flat_image_is_a_miss() {
        let detector = CornerDetector::new(&DetectorConfig::default());
        let img = ::image::GrayImage::from_pixel(64, 48, ::image::Luma([128]));
        let board = BoardSpec::new(3, 4, 0.02).unwrap();
        assert!(detector.detect(&img, &board).is_none());
    }
}
