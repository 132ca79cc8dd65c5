use serde::{Deserialize, Serialize};

/// Search options applied around the grid assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionFlags {
    /// Histogram-equalise the image before searching.
    pub normalize_image: bool,
    /// Reject frames with too little contrast or too few candidates before
    /// building the grid graph.
    pub fast_check: bool,
    /// Verify that grid cells alternate dark/light against a local mean.
    pub adaptive_threshold: bool,
}

impl Default for DetectionFlags {
    fn default() -> Self {
        Self {
            normalize_image: true,
            fast_check: true,
            adaptive_threshold: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    pub k_neighbors: usize,
    /// Minimal intensity difference across an edge midpoint for two
    /// candidates to count as grid neighbours.
    pub min_edge_contrast: f32,
    /// Minimal angle between two accepted edges of the same node.
    pub min_edge_separation_deg: f32,
    /// Maximal angle between an edge and the propagated grid axis during
    /// labelling.
    pub axis_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 6.0,
            max_spacing_pix: 400.0,
            k_neighbors: 8,
            min_edge_contrast: 30.0,
            min_edge_separation_deg: 30.0,
            axis_tolerance_deg: 35.0,
        }
    }
}

/// Gradient-orthogonality corner refinement.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubpixParams {
    /// Window is `(2 * half_window + 1)` pixels wide.
    pub half_window: u32,
    pub max_iterations: u32,
    /// Stop once an update moves the corner less than this, in pixels.
    pub epsilon: f64,
}

impl Default for SubpixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iterations: 30,
            epsilon: 0.1,
        }
    }
}

/// Parameters specific to the chessboard detector.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    pub flags: DetectionFlags,

    /// Minimal candidate strength to consider.
    pub min_strength: f32,

    /// Minimal spread between the 5 % and 95 % intensity quantiles when
    /// `fast_check` is on.
    pub min_dynamic_range: u8,

    /// Fraction of grid cells whose colour must follow the checkerboard
    /// parity when `adaptive_threshold` is on.
    pub min_parity_agreement: f32,

    pub graph: GridGraphParams,
    pub subpix: SubpixParams,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            flags: DetectionFlags::default(),
            min_strength: 0.0,
            min_dynamic_range: 30,
            min_parity_agreement: 0.9,
            graph: GridGraphParams::default(),
            subpix: SubpixParams::default(),
        }
    }
}
