//! Checkerboard pose estimation from single grayscale frames.
//!
//! This crate ties the workspace together:
//! - stable re-exports of the underlying crates,
//! - (feature `image`) the ChESS corner front-end ([`detect::CornerDetector`])
//!   and the per-frame [`pipeline::PosePipeline`],
//! - [`emit::PoseEmitter`] and the stamped transform messages,
//! - output sinks, configuration and a PNG overlay writer.
//!
//! ## Quickstart
//!
//! ```no_run
//! use checkerboard_pose::{CameraInfo, Frame, PipelineConfig, PosePipeline, Stamp};
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load("pose.json")?;
//! let camera_info: CameraInfo = serde_json::from_str(&std::fs::read_to_string("camera.json")?)?;
//! let pipeline = PosePipeline::new(config)?;
//!
//! let img = ImageReader::open("board.png")?.decode()?.to_luma8();
//! let frame = Frame::new(img, Stamp::default(), "camera");
//! if let Some(pose) = pipeline.process_frame(&frame, &camera_info)? {
//!     println!("{}", serde_json::to_string(&pose.transform)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `checkerboard_pose::core`: board geometry, camera model, image views.
//! - `checkerboard_pose::chessboard`: grid assembly from corner candidates.
//! - `checkerboard_pose::pnp`: pose solver.

pub use checkerboard_pose_chessboard as chessboard;
pub use checkerboard_pose_core as core;
pub use checkerboard_pose_pnp as pnp;

pub use checkerboard_pose_chessboard::{ChessboardDetection, ChessboardParams};
pub use checkerboard_pose_core::{
    BoardSpec, CameraInfo, CameraParams, Distortion, PatternModel, PatternOrigin,
};
pub use checkerboard_pose_pnp::{PnpError, PnpSolution, PoseEstimator, SolverParams};

pub mod config;
pub mod emit;
pub mod sink;

#[cfg(feature = "image")]
pub mod detect;
#[cfg(feature = "image")]
pub mod overlay;
#[cfg(feature = "image")]
pub mod pipeline;

pub use config::{ConfigError, DetectorConfig, PipelineConfig};
pub use emit::{
    rotation_from_axis_angle, Clock, EmittedPose, PoseEmitter, PoseStamped, Stamp,
    StampedTransform, SystemClock,
};
pub use sink::{JsonLinesSink, MemorySink, PoseSink, SinkError, TransformSink};

#[cfg(feature = "image")]
pub use detect::{CornerDetector, DetectError};
#[cfg(feature = "image")]
pub use overlay::{DetectionView, PngOverlayWriter};
#[cfg(feature = "image")]
pub use pipeline::{Frame, FrameResult, PipelineError, PosePipeline};
