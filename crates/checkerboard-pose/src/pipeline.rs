//! Per-frame pose pipeline: detect -> camera model -> PnP -> emit.
//!
//! Each frame is processed independently. The pattern model is built once
//! from the configuration and shared read-only across frames.

use checkerboard_pose_chessboard::ChessboardDetection;
use checkerboard_pose_core::{BoardSpec, CameraInfo, CameraParams, PatternModel};
use checkerboard_pose_pnp::{PnpError, PoseEstimator};
use log::{debug, warn};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::{ConfigError, PipelineConfig};
use crate::detect::{gray_image_from_slice, CornerDetector, DetectError};
use crate::emit::{Clock, EmittedPose, PoseEmitter, Stamp, SystemClock};
use crate::overlay::DetectionView;
use crate::sink::{PoseSink, SinkError, TransformSink};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The caller broke the pipeline contract; the frame cannot be processed.
    #[error("precondition violated: {0}")]
    Precondition(PnpError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Detect(#[from] DetectError),
}

/// One grayscale image with its acquisition stamp and camera frame id.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: image::GrayImage,
    /// Zero when unknown; the emitter then stamps with its clock.
    pub stamp: Stamp,
    pub frame_id: String,
}

impl Frame {
    pub fn new(image: image::GrayImage, stamp: Stamp, frame_id: impl Into<String>) -> Self {
        Self {
            image,
            stamp,
            frame_id: frame_id.into(),
        }
    }

    pub fn from_gray_u8(
        width: u32,
        height: u32,
        pixels: &[u8],
        stamp: Stamp,
        frame_id: impl Into<String>,
    ) -> Result<Self, DetectError> {
        Ok(Self::new(
            gray_image_from_slice(width, height, pixels)?,
            stamp,
            frame_id,
        ))
    }
}

/// Detection and pose of one frame, before publication.
#[derive(Clone, Debug)]
pub struct FrameResult {
    pub detection: Option<ChessboardDetection>,
    pub pose: Option<EmittedPose>,
}

pub struct PosePipeline<C = SystemClock> {
    config: PipelineConfig,
    board: BoardSpec,
    model: PatternModel,
    detector: CornerDetector,
    estimator: PoseEstimator,
    emitter: PoseEmitter<C>,
}

impl PosePipeline<SystemClock> {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> PosePipeline<C> {
    pub fn with_clock(config: PipelineConfig, clock: C) -> Result<Self, ConfigError> {
        let model = config.pattern_model()?;
        Ok(Self {
            board: model.spec(),
            model,
            detector: CornerDetector::new(&config.detector),
            estimator: PoseEstimator::new(config.solver.clone()),
            emitter: PoseEmitter::with_clock(config.target_frame_id.clone(), clock),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model(&self) -> &PatternModel {
        &self.model
    }

    /// Pose of the board in `frame`, or `None` when the board is not found
    /// or the solve fails.
    pub fn process_frame(
        &self,
        frame: &Frame,
        camera_info: &CameraInfo,
    ) -> Result<Option<EmittedPose>, PipelineError> {
        Ok(self.locate(frame, camera_info)?.pose)
    }

    /// [`PosePipeline::process_frame`] on a raw row-major buffer.
    pub fn process_gray_u8(
        &self,
        width: u32,
        height: u32,
        pixels: &[u8],
        stamp: Stamp,
        frame_id: &str,
        camera_info: &CameraInfo,
    ) -> Result<Option<EmittedPose>, PipelineError> {
        let frame = Frame::from_gray_u8(width, height, pixels, stamp, frame_id)?;
        self.process_frame(&frame, camera_info)
    }

    /// Detection plus pose, without publishing.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, frame, camera_info),
            fields(frame_id = %frame.frame_id, stamp = frame.stamp.as_secs_f64())
        )
    )]
    pub fn locate(
        &self,
        frame: &Frame,
        camera_info: &CameraInfo,
    ) -> Result<FrameResult, PipelineError> {
        let Some(detection) = self.detector.detect(&frame.image, &self.board) else {
            warn!(
                "checkerboard {}x{} not found in frame {} ({:.3}s)",
                self.board.rows(),
                self.board.cols(),
                frame.frame_id,
                frame.stamp.as_secs_f64()
            );
            return Ok(FrameResult {
                detection: None,
                pose: None,
            });
        };

        let pose = self.solve_corners(&detection.corners, frame, camera_info)?;
        Ok(FrameResult {
            detection: Some(detection),
            pose,
        })
    }

    /// Pose from corners ordered like the pattern model. Solver failures
    /// caused by the frame are logged and yield `None`.
    pub(crate) fn solve_corners(
        &self,
        corners: &[Point2<f64>],
        frame: &Frame,
        camera_info: &CameraInfo,
    ) -> Result<Option<EmittedPose>, PipelineError> {
        let camera = CameraParams::from_camera_info(camera_info, self.config.rectified);
        match self.estimator.solve(self.model.points(), corners, &camera) {
            Ok(solution) => {
                debug!(
                    "pose t = [{:.4}, {:.4}, {:.4}], rms {:.3} px",
                    solution.translation.x,
                    solution.translation.y,
                    solution.translation.z,
                    solution.rms_error
                );
                Ok(Some(self.emitter.emit_solution(
                    &solution,
                    frame.stamp,
                    &frame.frame_id,
                )))
            }
            Err(err) if err.is_precondition() => Err(PipelineError::Precondition(err)),
            Err(err) => {
                warn!("pose solve failed for frame {}: {err}", frame.frame_id);
                Ok(None)
            }
        }
    }

    /// Process a frame and publish the result.
    ///
    /// The transform goes out before the pose record. When `show_detection`
    /// is on and a view is given, the view sees every frame, hit or miss.
    pub fn run_frame<S>(
        &self,
        frame: &Frame,
        camera_info: &CameraInfo,
        sink: &mut S,
        view: Option<&mut dyn DetectionView>,
    ) -> Result<Option<EmittedPose>, PipelineError>
    where
        S: TransformSink + PoseSink + ?Sized,
    {
        let result = self.locate(frame, camera_info)?;

        if let Some(pose) = &result.pose {
            sink.send_transform(&pose.transform)?;
            sink.publish(&pose.pose)?;
        }

        if self.config.show_detection {
            if let Some(view) = view {
                let corners = result.detection.as_ref().map(|d| d.corners.as_slice());
                view.show(frame, corners, &self.board)?;
            }
        }

        Ok(result.pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> PosePipeline {
        PosePipeline::new(PipelineConfig::default()).unwrap()
    }

    fn frame() -> Frame {
        Frame::new(image::GrayImage::new(64, 48), Stamp::new(3, 0), "camera")
    }

    #[test]
    fn short_corner_list_is_a_precondition_error() {
        let pipeline = pipeline();
        let info = CameraInfo::pinhole(64, 48, 60.0, 60.0, 32.0, 24.0);
        let corners = vec![Point2::new(10.0, 10.0); 5];

        let err = pipeline
            .solve_corners(&corners, &frame(), &info)
            .unwrap_err();
        match err {
            PipelineError::Precondition(PnpError::CorrespondenceMismatch { object, image }) => {
                assert_eq!(object, pipeline.model().points().len());
                assert_eq!(image, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn degenerate_corners_are_a_miss() {
        let pipeline = pipeline();
        let info = CameraInfo::pinhole(64, 48, 60.0, 60.0, 32.0, 24.0);
        let n = pipeline.model().points().len();
        let corners = vec![Point2::new(10.0, 10.0); n];

        let pose = pipeline.solve_corners(&corners, &frame(), &info).unwrap();
        assert!(pose.is_none());
    }
}
