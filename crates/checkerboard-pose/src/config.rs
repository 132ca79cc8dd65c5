//! JSON configuration for the pose pipeline.
//!
//! Every field has a default, so `{}` is a valid configuration. The board
//! and frame parameters also accept their historical names (`size`,
//! `frame_id`).

use std::fs;
use std::path::{Path, PathBuf};

use checkerboard_pose_chessboard::ChessboardParams;
use checkerboard_pose_core::{BoardSpec, BoardSpecError, PatternModel, PatternOrigin};
use checkerboard_pose_pnp::SolverParams;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Board(#[from] BoardSpecError),
}

/// Corner front-end and grid assembly settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// ChESS response threshold relative to the strongest response.
    pub chess_threshold_rel: f32,
    /// ChESS non-maximum suppression radius, pixels.
    pub chess_nms_radius: u32,
    pub chessboard: ChessboardParams,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            chess_threshold_rel: 0.2,
            chess_nms_radius: 2,
            chessboard: ChessboardParams::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Internal corner rows.
    pub rows: u32,
    /// Internal corner columns.
    pub cols: u32,
    /// Corner spacing in metres.
    #[serde(alias = "size")]
    pub square_size: f64,
    /// Images are rectified: use `P` and no distortion.
    pub rectified: bool,
    /// Hand every frame to the detection view.
    pub show_detection: bool,
    /// Child frame of the emitted transform.
    #[serde(alias = "frame_id")]
    pub target_frame_id: String,
    pub pattern_origin: PatternOrigin,
    /// Where the CLI writes overlay images when `show_detection` is on.
    pub overlay_dir: Option<PathBuf>,
    pub detector: DetectorConfig,
    pub solver: SolverParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rows: 8,
            cols: 6,
            square_size: 0.06,
            rectified: true,
            show_detection: false,
            target_frame_id: "checkerboard".to_string(),
            pattern_origin: PatternOrigin::Center,
            overlay_dir: None,
            detector: DetectorConfig::default(),
            solver: SolverParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn board(&self) -> Result<BoardSpec, BoardSpecError> {
        BoardSpec::new(self.rows, self.cols, self.square_size)
    }

    pub fn pattern_model(&self) -> Result<PatternModel, BoardSpecError> {
        Ok(PatternModel::with_origin(self.board()?, self.pattern_origin))
    }

    /// Parse and validate a configuration.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.board()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}
