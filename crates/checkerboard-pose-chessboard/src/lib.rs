//! Chessboard grid assembly on top of `checkerboard-pose-core`.
//!
//! Pipeline (graph-based, perspective-aware):
//! 1. Optional fast check on the intensity spread and histogram
//!    equalisation ([`ChessboardDetector::prepare_image`]).
//! 2. Filter candidates by strength; reject early when fewer than
//!    `rows * cols` remain.
//! 3. Link each candidate to at most four neighbours: nearest first, in
//!    well-separated directions, and only across a dark/light square edge.
//! 4. BFS each connected component, assign integer coordinates (col, row)
//!    while propagating the local grid axes.
//! 5. Keep the fully populated `cols x rows` (or transposed) window with the
//!    largest summed strength over all components.
//! 6. Reorder to the board's row-major convention, check cell colour
//!    alternation, refine every corner to sub-pixel accuracy.

mod detector;
mod geom;
mod gridgraph;
mod params;
mod parity;
mod subpix;

pub use detector::{canonical_order, ChessboardDetection, ChessboardDetector, SearchImage};
pub use gridgraph::{
    assign_grid_coordinates, connected_components, edge_contrast, GridCoord, GridGraph,
    NodeNeighbor,
};
pub use params::{ChessboardParams, DetectionFlags, GridGraphParams, SubpixParams};
pub use parity::parity_agreement;
pub use subpix::{refine_corner, refine_corners};
