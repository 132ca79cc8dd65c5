use std::collections::HashMap;

use checkerboard_pose_core::{
    dynamic_range, equalize_histogram, BoardSpec, Corner, GrayImage, GrayImageView,
};
use log::{debug, info};
use nalgebra::{Point2, Vector2};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::geom::cross2;
use crate::gridgraph::{assign_grid_coordinates, connected_components, GridCoord, GridGraph};
use crate::params::ChessboardParams;
use crate::parity::parity_agreement;
use crate::subpix::refine_corners;

/// A fully populated board grid.
#[derive(Clone, Debug, Serialize)]
pub struct ChessboardDetection {
    pub rows: u32,
    pub cols: u32,
    /// Refined corner positions, row-major, `rows * cols` entries.
    pub corners: Vec<Point2<f64>>,
    /// Summed candidate strength over the grid.
    pub score: f32,
    /// Colour alternation ratio, when the adaptive-threshold check ran.
    pub parity_agreement: Option<f32>,
}

/// Input image plus the search image derived from it.
pub struct SearchImage<'a> {
    pub original: GrayImageView<'a>,
    pub search: GrayImage,
}

impl SearchImage<'_> {
    pub fn view(&self) -> GrayImageView<'_> {
        self.search.view()
    }
}

/// Chessboard grid assembly over ChESS-style corner candidates.
pub struct ChessboardDetector {
    pub params: ChessboardParams,
}

// Best window found in one labelled component.
struct WindowMatch {
    // Node indices, `height` rows of `width` entries in label coordinates.
    grid: Vec<Vec<usize>>,
    score: f32,
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self { params }
    }

    /// Build the image the candidate search runs on.
    ///
    /// Returns `None` when `fast_check` is on and the intensity spread
    /// between the 5 % and 95 % quantiles is below `min_dynamic_range`.
    /// The search image is histogram-equalised if `normalize_image` is on.
    pub fn prepare_image<'a>(&self, image: GrayImageView<'a>) -> Option<SearchImage<'a>> {
        let flags = self.params.flags;
        if flags.fast_check {
            let range = dynamic_range(&image, 0.05, 0.95);
            if range < self.params.min_dynamic_range {
                debug!(
                    "fast check: dynamic range {} below {}",
                    range, self.params.min_dynamic_range
                );
                return None;
            }
        }
        let search = if flags.normalize_image {
            equalize_histogram(&image)
        } else {
            image.to_owned_image()
        };
        Some(SearchImage {
            original: image,
            search,
        })
    }

    /// Find the board in a cloud of corner candidates.
    ///
    /// Edge contrast and the parity check run on the search image; sub-pixel
    /// refinement runs on the original one, whose edge profiles are not
    /// reshaped by equalisation.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image, corners), fields(corners = corners.len()))
    )]
    pub fn detect(
        &self,
        image: &SearchImage<'_>,
        corners: &[Corner],
        board: &BoardSpec,
    ) -> Option<ChessboardDetection> {
        let rows = board.rows() as usize;
        let cols = board.cols() as usize;
        let search = image.view();

        // 1. Filter by strength.
        let strong: Vec<Corner> = corners
            .iter()
            .copied()
            .filter(|c| {
                c.strength >= self.params.min_strength
                    && c.position.x.is_finite()
                    && c.position.y.is_finite()
            })
            .collect();

        debug!("{} candidates after strength filter", strong.len());

        if self.params.flags.fast_check && strong.len() < board.corner_count() {
            debug!(
                "fast check: {} candidates for a {}x{} board",
                strong.len(),
                rows,
                cols
            );
            return None;
        }

        // 2. Link and label.
        let graph = GridGraph::new(&strong, &search, &self.params.graph);
        let mut best: Option<WindowMatch> = None;
        for component in connected_components(&graph) {
            if component.len() < board.corner_count() {
                continue;
            }
            let Some(cells) = assign_grid_coordinates(
                &graph,
                &strong,
                &component,
                self.params.graph.axis_tolerance_deg,
            ) else {
                continue;
            };
            for (w, h) in [(cols, rows), (rows, cols)] {
                if let Some(m) = best_window(&cells, &strong, w, h) {
                    if best.as_ref().is_none_or(|b| m.score > b.score) {
                        best = Some(m);
                    }
                }
            }
        }

        let Some(found) = best else {
            info!("no {rows}x{cols} grid among {} candidates", strong.len());
            return None;
        };

        // 3. Row-major order in the board's convention.
        let positions: Vec<Vec<Point2<f32>>> = found
            .grid
            .iter()
            .map(|row| row.iter().map(|&i| strong[i].position).collect())
            .collect();
        let ordered = canonical_order(&positions, rows, cols)?;

        // 4. Parity.
        let parity = if self.params.flags.adaptive_threshold {
            let agree = parity_agreement(&search, &ordered, rows, cols)?;
            if agree < self.params.min_parity_agreement {
                info!(
                    "grid rejected: cell colours alternate for {:.0}% of cells",
                    agree * 100.0
                );
                return None;
            }
            Some(agree)
        } else {
            None
        };

        // 5. Sub-pixel refinement.
        let initial: Vec<Point2<f64>> = ordered
            .iter()
            .map(|p| Point2::new(p.x as f64, p.y as f64))
            .collect();
        let refined = refine_corners(&image.original, &initial, &self.params.subpix);

        debug!("chessboard {rows}x{cols} found, score {:.3}", found.score);

        Some(ChessboardDetection {
            rows: board.rows(),
            cols: board.cols(),
            corners: refined,
            score: found.score,
            parity_agreement: parity,
        })
    }
}

// Fully populated `w x h` window with the largest summed strength.
fn best_window(
    cells: &HashMap<GridCoord, usize>,
    corners: &[Corner],
    w: usize,
    h: usize,
) -> Option<WindowMatch> {
    let min_c = cells.keys().map(|k| k.0).min()?;
    let max_c = cells.keys().map(|k| k.0).max()?;
    let min_r = cells.keys().map(|k| k.1).min()?;
    let max_r = cells.keys().map(|k| k.1).max()?;
    let (w_i, h_i) = (w as i32, h as i32);

    let mut best: Option<WindowMatch> = None;
    for r0 in min_r..=(max_r - h_i + 1) {
        'window: for c0 in min_c..=(max_c - w_i + 1) {
            let mut grid = Vec::with_capacity(h);
            let mut score = 0.0f32;
            for r in 0..h_i {
                let mut row = Vec::with_capacity(w);
                for c in 0..w_i {
                    let Some(&node) = cells.get(&(c0 + c, r0 + r)) else {
                        continue 'window;
                    };
                    score += corners[node].strength;
                    row.push(node);
                }
                grid.push(row);
            }
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(WindowMatch { grid, score });
            }
        }
    }
    best
}

fn mean_step(grid: &[Vec<Point2<f32>>], along_row: bool) -> Vector2<f32> {
    let mut acc = Vector2::zeros();
    let mut n = 0.0f32;
    for (r, row) in grid.iter().enumerate() {
        for (c, p) in row.iter().enumerate() {
            let next = if along_row {
                row.get(c + 1)
            } else {
                grid.get(r + 1).and_then(|nr| nr.get(c))
            };
            if let Some(q) = next {
                acc += q - p;
                n += 1.0;
            }
        }
    }
    if n > 0.0 {
        acc / n
    } else {
        acc
    }
}

// One of the eight grid symmetries applied to an `h x w` array.
fn transform<T: Copy>(grid: &[Vec<T>], transpose: bool, flip_r: bool, flip_c: bool) -> Vec<Vec<T>> {
    let h = grid.len();
    let w = grid.first().map_or(0, Vec::len);
    let (oh, ow) = if transpose { (w, h) } else { (h, w) };
    (0..oh)
        .map(|r| {
            (0..ow)
                .map(|c| {
                    let r = if flip_r { oh - 1 - r } else { r };
                    let c = if flip_c { ow - 1 - c } else { c };
                    if transpose {
                        grid[c][r]
                    } else {
                        grid[r][c]
                    }
                })
                .collect()
        })
        .collect()
}

/// Reorder an assembled grid into the board's row-major convention.
///
/// Among the symmetries that produce a `rows x cols` array with positive
/// image handedness (the board seen from the front), picks the one whose
/// rows run most rightward and advance most downward.
pub fn canonical_order(
    grid: &[Vec<Point2<f32>>],
    rows: usize,
    cols: usize,
) -> Option<Vec<Point2<f32>>> {
    let mut best: Option<(f32, Vec<Vec<Point2<f32>>>)> = None;
    for transpose in [false, true] {
        for flip_r in [false, true] {
            for flip_c in [false, true] {
                let candidate = transform(grid, transpose, flip_r, flip_c);
                if candidate.len() != rows || candidate.first().map_or(0, Vec::len) != cols {
                    continue;
                }
                let row_dir = mean_step(&candidate, true);
                let col_dir = mean_step(&candidate, false);
                if cross2(&row_dir, &col_dir) <= 0.0 {
                    continue;
                }
                let score = row_dir.x / row_dir.norm().max(f32::EPSILON)
                    + col_dir.y / col_dir.norm().max(f32::EPSILON);
                if best.as_ref().is_none_or(|(s, _)| score > *s) {
                    best = Some((score, candidate));
                }
            }
        }
    }
    best.map(|(_, g)| g.into_iter().flatten().collect())
}
