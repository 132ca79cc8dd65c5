//! Perspective-n-point pose estimation.
//!
//! [`PoseEstimator::solve`] takes object points, their pixel observations
//! and a [`checkerboard_pose_core::CameraParams`], and returns the
//! axis-angle rotation and translation of the object frame in the camera
//! frame.
//!
//! - Planar object sets (the usual case for a board) are initialised from a
//!   plane-to-image homography, general sets from a normalised DLT.
//! - Both are refined with Levenberg-Marquardt on pixel reprojection error
//!   through the full camera model, distortion included.
//! - The result is validated: finite, in front of the camera, RMS error
//!   within [`SolverParams::max_reprojection_error`].

mod dlt;
mod error;
mod planar;
mod refine;
mod solver;

pub use dlt::dlt_pose;
pub use error::PnpError;
pub use planar::{planar_pose, project_to_so3, PlaneFrame};
pub use refine::{refine_pose, squared_error, RefineOptions, Refined};
pub use solver::{solve_pnp, PnpSolution, PoseEstimator, SolverParams, MIN_PLANAR_POINTS};
