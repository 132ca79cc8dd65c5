//! Core types and utilities for checkerboard pose estimation.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector or image library:
//!
//! - [`BoardSpec`] / [`PatternModel`]: the board's canonical 3D corners.
//! - [`CameraInfo`] / [`CameraParams`]: calibration input and the projection
//!   model selected from it (rectified or raw).
//! - [`Corner`]: raw corner candidate handed from a front-end to the grid
//!   assembly.
//! - [`GrayImageView`]: borrowed 8-bit grayscale buffer plus sampling and
//!   histogram helpers shared by the detector stages.
//! - [`estimate_homography`]: normalised DLT used by the planar PnP solve.

mod board;
mod camera;
mod corner;
mod histogram;
mod homography;
mod image;
mod logger;
pub mod synthetic;

pub use board::{BoardSpec, BoardSpecError, PatternModel, PatternOrigin};
pub use camera::{CameraInfo, CameraParams, Distortion};
pub use corner::Corner;
pub use histogram::{dynamic_range, equalize_histogram, histogram, IntegralImage};
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
