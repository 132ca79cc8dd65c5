//! Board specification and the canonical 3D corner layout.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Static checkerboard specification.
///
/// `rows`/`cols` count *internal* corners (not squares); `square_size` is the
/// physical spacing between neighbouring corners, in the unit the resulting
/// translations are expressed in (typically meters).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoardSpec {
    rows: u32,
    cols: u32,
    square_size: f64,
}

/// Board specification validation errors.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BoardSpecError {
    #[error("rows and cols must be >= 2 (got {rows}x{cols})")]
    InvalidSize { rows: u32, cols: u32 },
    #[error("square_size must be finite and > 0 (got {0})")]
    InvalidSquareSize(f64),
}

impl BoardSpec {
    /// Validate and create a board spec.
    pub fn new(rows: u32, cols: u32, square_size: f64) -> Result<Self, BoardSpecError> {
        if rows < 2 || cols < 2 {
            return Err(BoardSpecError::InvalidSize { rows, cols });
        }
        if !square_size.is_finite() || square_size <= 0.0 {
            return Err(BoardSpecError::InvalidSquareSize(square_size));
        }
        Ok(Self {
            rows,
            cols,
            square_size,
        })
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    #[inline]
    pub fn square_size(&self) -> f64 {
        self.square_size
    }

    /// Number of internal corners, `rows * cols`.
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

/// Where the board frame origin sits relative to the corner grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternOrigin {
    /// Origin at the centre of the internal-corner grid; the points are
    /// symmetric about it in x and y.
    #[default]
    Center,
    /// Origin offset by `square_size * cols / 2` and `square_size * rows / 2`
    /// from the first corner, which puts it half a square right of and below
    /// the grid centre. For poses recorded under that convention.
    HalfSquareOffset,
}

/// The board's internal corners in board coordinates.
///
/// Axes: x along columns (rightward), y along rows (upward), z out of the
/// board toward the camera. Points are stored row-major (row index outer,
/// column index inner), which is the order the chessboard detector reports
/// image corners in. Solving PnP against these points yields the
/// camera -> board transform directly.
#[derive(Clone, Debug)]
pub struct PatternModel {
    spec: BoardSpec,
    origin: PatternOrigin,
    points: Vec<Point3<f64>>,
}

impl PatternModel {
    pub fn new(spec: BoardSpec) -> Self {
        Self::with_origin(spec, PatternOrigin::Center)
    }

    pub fn with_origin(spec: BoardSpec, origin: PatternOrigin) -> Self {
        let s = spec.square_size;
        let (cx, cy) = match origin {
            PatternOrigin::Center => (
                s * (spec.cols - 1) as f64 / 2.0,
                s * (spec.rows - 1) as f64 / 2.0,
            ),
            PatternOrigin::HalfSquareOffset => {
                (s * spec.cols as f64 / 2.0, s * spec.rows as f64 / 2.0)
            }
        };

        let mut points = Vec::with_capacity(spec.corner_count());
        for i in 0..spec.rows {
            for j in 0..spec.cols {
                let x = j as f64 * s - cx;
                let y = cy - i as f64 * s;
                points.push(Point3::new(x, y, 0.0));
            }
        }

        Self {
            spec,
            origin,
            points,
        }
    }

    #[inline]
    pub fn spec(&self) -> BoardSpec {
        self.spec
    }

    #[inline]
    pub fn origin(&self) -> PatternOrigin {
        self.origin
    }

    /// Corner coordinates in row-major order.
    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Corner at `(row, col)`, if inside the grid.
    pub fn point(&self, row: u32, col: u32) -> Option<Point3<f64>> {
        if row >= self.spec.rows || col >= self.spec.cols {
            return None;
        }
        self.points
            .get((row * self.spec.cols + col) as usize)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn two_by_two_board_is_centered_row_major() {
        let spec = BoardSpec::new(2, 2, 1.0).unwrap();
        let model = PatternModel::new(spec);
        let expected = [
            Point3::new(-0.5, 0.5, 0.0),
            Point3::new(0.5, 0.5, 0.0),
            Point3::new(-0.5, -0.5, 0.0),
            Point3::new(0.5, -0.5, 0.0),
        ];
        assert_eq!(model.points(), &expected);
    }

    #[test]
    fn points_are_planar_and_symmetric() {
        for (rows, cols, s) in [(2, 3, 0.5), (8, 6, 0.06), (7, 9, 0.025), (5, 5, 1.0)] {
            let model = PatternModel::new(BoardSpec::new(rows, cols, s).unwrap());
            let pts = model.points();
            assert_eq!(pts.len(), (rows * cols) as usize);
            assert!(pts.iter().all(|p| p.z == 0.0));

            let sum = pts.iter().fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
            assert_abs_diff_eq!(sum.x, 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(sum.y, 0.0, epsilon = 1e-9);

            // Mirror pairs: (i, j) <-> (rows-1-i, cols-1-j).
            for i in 0..rows {
                for j in 0..cols {
                    let p = model.point(i, j).unwrap();
                    let q = model.point(rows - 1 - i, cols - 1 - j).unwrap();
                    assert_abs_diff_eq!(p.x, -q.x, epsilon = 1e-12);
                    assert_abs_diff_eq!(p.y, -q.y, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn half_square_offset_shifts_by_half_a_square() {
        let spec = BoardSpec::new(6, 8, 0.06).unwrap();
        let centered = PatternModel::new(spec);
        let offset = PatternModel::with_origin(spec, PatternOrigin::HalfSquareOffset);
        for (c, o) in centered.points().iter().zip(offset.points()) {
            assert_abs_diff_eq!(o.x, c.x - 0.03, epsilon = 1e-12);
            assert_abs_diff_eq!(o.y, c.y + 0.03, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(offset.points()[0].x, -0.24, epsilon = 1e-12);
        assert_abs_diff_eq!(offset.points()[0].y, 0.18, epsilon = 1e-12);
    }

    #[test]
    fn rows_advance_down_columns_advance_right() {
        let model = PatternModel::new(BoardSpec::new(3, 4, 0.1).unwrap());
        let p00 = model.point(0, 0).unwrap();
        let p01 = model.point(0, 1).unwrap();
        let p10 = model.point(1, 0).unwrap();
        assert!(p01.x > p00.x);
        assert!(p10.y < p00.y);
        assert!(model.point(3, 0).is_none());
    }

    #[test]
    fn invalid_specs_are_rejected() {
        assert_eq!(
            BoardSpec::new(1, 5, 0.1),
            Err(BoardSpecError::InvalidSize { rows: 1, cols: 5 })
        );
        assert!(matches!(
            BoardSpec::new(3, 3, 0.0),
            Err(BoardSpecError::InvalidSquareSize(_))
        ));
        assert!(BoardSpec::new(3, 3, f64::NAN).is_err());
    }
}
