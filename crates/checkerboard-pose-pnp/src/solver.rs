use checkerboard_pose_core::CameraParams;
use log::debug;
use nalgebra::{Isometry3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::dlt::dlt_pose;
use crate::error::PnpError;
use crate::planar::{planar_pose, PlaneFrame};
use crate::refine::{refine_pose, RefineOptions};

/// Minimal number of correspondences for a planar target.
pub const MIN_PLANAR_POINTS: usize = 4;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverParams {
    /// Levenberg-Marquardt iteration cap.
    pub max_iterations: u32,
    /// Refinement stops once an update is smaller than this.
    pub step_tolerance: f64,
    /// Solutions with a larger RMS reprojection error (pixels) are rejected.
    pub max_reprojection_error: f64,
    /// Out-of-plane spread, relative to the in-plane spread, below which the
    /// object points count as planar.
    pub planarity_tolerance: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            step_tolerance: 1e-10,
            max_reprojection_error: 2.0,
            planarity_tolerance: 1e-6,
        }
    }
}

/// Pose of the object frame in the camera frame: `x_cam = R(rotation) x_obj + translation`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PnpSolution {
    /// Axis-angle rotation; direction is the axis, norm the angle in radians.
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
    /// RMS pixel reprojection error of the refined pose.
    pub rms_error: f64,
    pub iterations: u32,
}

impl PnpSolution {
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::new(self.translation, self.rotation)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PoseEstimator {
    pub params: SolverParams,
}

impl PoseEstimator {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    /// Solve for the pose mapping `object` onto `image` through `camera`.
    ///
    /// Points correspond by index. Planar object sets need at least four
    /// points, general ones at least six.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, object, image, camera), fields(points = object.len()))
    )]
    pub fn solve(
        &self,
        object: &[Point3<f64>],
        image: &[Point2<f64>],
        camera: &CameraParams,
    ) -> Result<PnpSolution, PnpError> {
        if object.len() != image.len() {
            return Err(PnpError::CorrespondenceMismatch {
                object: object.len(),
                image: image.len(),
            });
        }
        let n = object.len();
        if n < MIN_PLANAR_POINTS {
            return Err(PnpError::InsufficientCorrespondences {
                got: n,
                required: MIN_PLANAR_POINTS,
            });
        }
        if !object.iter().all(|p| p.coords.iter().all(|v| v.is_finite()))
            || !image.iter().all(|p| p.coords.iter().all(|v| v.is_finite()))
        {
            return Err(PnpError::NonFinite);
        }
        if !camera.is_finite() || camera.intrinsic.try_inverse().is_none() {
            return Err(PnpError::SingularIntrinsics);
        }

        let normalized = image
            .iter()
            .map(|p| camera.normalize(p))
            .collect::<Option<Vec<_>>>()
            .ok_or(PnpError::SingularIntrinsics)?;

        let frame = PlaneFrame::fit(object).ok_or(PnpError::Degenerate)?;
        let initial = if frame.is_planar(self.params.planarity_tolerance) {
            if frame.is_degenerate(1e-6) {
                return Err(PnpError::Degenerate);
            }
            planar_pose(&frame, object, &normalized)?
        } else {
            dlt_pose(object, &normalized)?
        };

        let refined = refine_pose(
            initial,
            camera,
            object,
            image,
            &RefineOptions {
                max_iterations: self.params.max_iterations,
                step_tolerance: self.params.step_tolerance,
            },
        )?;

        let pose = refined.pose;
        let rotation = pose.rotation.scaled_axis();
        let translation = pose.translation.vector;
        if !rotation.iter().chain(translation.iter()).all(|v| v.is_finite())
            || !refined.rms_error.is_finite()
        {
            return Err(PnpError::NonFinite);
        }
        if object.iter().any(|p| (pose * p).z <= 0.0) {
            return Err(PnpError::PointsBehindCamera);
        }
        if refined.rms_error > self.params.max_reprojection_error {
            return Err(PnpError::ReprojectionError {
                rms: refined.rms_error,
                max: self.params.max_reprojection_error,
            });
        }

        debug!(
            "pnp: {} points, rms {:.4} px after {} iterations",
            n, refined.rms_error, refined.iterations
        );

        Ok(PnpSolution {
            rotation,
            translation,
            rms_error: refined.rms_error,
            iterations: refined.iterations,
        })
    }
}

/// Solve with default [`SolverParams`].
pub fn solve_pnp(
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    camera: &CameraParams,
) -> Result<PnpSolution, PnpError> {
    PoseEstimator::default().solve(object, image, camera)
}
