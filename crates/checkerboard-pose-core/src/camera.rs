//! Camera calibration input and the projection model used for pose solving.

use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

/// Calibration record for one camera stream.
///
/// `k` is the 3x3 intrinsic matrix and `p` the 3x4 projection matrix of the
/// rectified stream, both row-major. `d` holds distortion coefficients in
/// `(k1, k2, p1, p2, k3, ...)` order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub k: [f64; 9],
    #[serde(default)]
    pub d: Vec<f64>,
    pub p: [f64; 12],
}

impl CameraInfo {
    /// Ideal pinhole calibration: `P = [K | 0]`, no distortion.
    pub fn pinhole(width: u32, height: u32, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            k: [fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0],
            d: Vec::new(),
            p: [fx, 0.0, cx, 0.0, 0.0, fy, cy, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }
}

/// Radial-tangential (Brown-Conrady) distortion with two radial terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
}

const UNDISTORT_ITERS: usize = 20;

impl Distortion {
    /// Take the first four coefficients as `(k1, k2, p1, p2)`; missing
    /// entries are zero and anything past the fourth is ignored.
    pub fn from_coefficients(d: &[f64]) -> Self {
        let at = |i: usize| d.get(i).copied().unwrap_or(0.0);
        Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0
    }

    /// Map an ideal normalised point to its distorted location.
    pub fn distort(&self, n: Point2<f64>) -> Point2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Point2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert [`Self::distort`] by fixed-point iteration.
    pub fn undistort(&self, n_dist: Point2<f64>) -> Point2<f64> {
        let mut p = n_dist;
        for _ in 0..UNDISTORT_ITERS {
            let d = self.distort(p);
            p.x -= d.x - n_dist.x;
            p.y -= d.y - n_dist.y;
        }
        p
    }
}

/// Projection model selected from a [`CameraInfo`].
///
/// For a rectified stream the intrinsics are the left 3x3 block of `P` and
/// there is no distortion. For a raw stream the intrinsics are `K` and the
/// distortion comes from `D`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    pub intrinsic: Matrix3<f64>,
    pub distortion: Option<Distortion>,
    pub rectified: bool,
}

impl CameraParams {
    pub fn from_camera_info(info: &CameraInfo, rectified: bool) -> Self {
        if rectified {
            let p = &info.p;
            let intrinsic = Matrix3::new(
                p[0], p[1], p[2], //
                p[4], p[5], p[6], //
                p[8], p[9], p[10],
            );
            Self {
                intrinsic,
                distortion: None,
                rectified,
            }
        } else {
            let distortion = Distortion::from_coefficients(&info.d);
            Self {
                intrinsic: Matrix3::from_row_slice(&info.k),
                distortion: (!distortion.is_zero()).then_some(distortion),
                rectified,
            }
        }
    }

    pub fn pinhole(intrinsic: Matrix3<f64>) -> Self {
        Self {
            intrinsic,
            distortion: None,
            rectified: true,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.intrinsic.iter().all(|v| v.is_finite())
            && self.distortion.is_none_or(|d| {
                d.k1.is_finite() && d.k2.is_finite() && d.p1.is_finite() && d.p2.is_finite()
            })
    }

    /// Project a camera-frame point to pixels. `None` when the point is not
    /// in front of the camera.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= 0.0 {
            return None;
        }
        let n = Point2::new(p.x / p.z, p.y / p.z);
        let n = match &self.distortion {
            Some(d) => d.distort(n),
            None => n,
        };
        let v = self.intrinsic * n.to_homogeneous();
        if v.z.abs() < f64::EPSILON {
            return None;
        }
        Some(Point2::new(v.x / v.z, v.y / v.z))
    }

    /// Pixel to ideal (undistorted) normalised image coordinates. `None` when
    /// the intrinsic matrix is singular.
    pub fn normalize(&self, pixel: &Point2<f64>) -> Option<Point2<f64>> {
        let k_inv = self.intrinsic.try_inverse()?;
        let v = k_inv * pixel.to_homogeneous();
        if v.z.abs() < f64::EPSILON {
            return None;
        }
        let n = Point2::new(v.x / v.z, v.y / v.z);
        Some(match &self.distortion {
            Some(d) => d.undistort(n),
            None => n,
        })
    }
}
