//! Synthetic checkerboard images with known ground truth.
//!
//! Used by the test suites and by the `render` CLI command. Each output
//! pixel is supersampled; every sample ray is undistorted and intersected
//! with the board plane, so the rendered corners land exactly where
//! [`CameraParams::project`] puts them.

use nalgebra::{Isometry3, Point2, Point3, Translation3, UnitQuaternion, Vector3};

use crate::{CameraParams, GrayImage, PatternModel};

const DARK: f32 = 0.0;
const LIGHT: f32 = 255.0;

/// Camera, board pose and output size for one rendered frame.
///
/// `pose` maps board coordinates into the camera frame, which is the
/// transform the pose estimator recovers.
#[derive(Clone, Debug)]
pub struct SyntheticScene {
    pub width: usize,
    pub height: usize,
    pub camera: CameraParams,
    pub pose: Isometry3<f64>,
    pub background: u8,
    /// Samples per pixel along each axis.
    pub supersample: usize,
}

impl SyntheticScene {
    pub fn new(width: usize, height: usize, camera: CameraParams, pose: Isometry3<f64>) -> Self {
        Self {
            width,
            height,
            camera,
            pose,
            background: 100,
            supersample: 4,
        }
    }

    /// Board facing the camera at `distance`, tilted by `tilt_x`/`tilt_y`
    /// radians about the board's own x and y axes.
    pub fn facing_pose(distance: f64, tilt_x: f64, tilt_y: f64) -> Isometry3<f64> {
        let facing = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI);
        let tilt = UnitQuaternion::from_euler_angles(tilt_x, tilt_y, 0.0);
        Isometry3::from_parts(Translation3::new(0.0, 0.0, distance), facing * tilt)
    }

    /// Ground-truth pixel positions of the model's corners, in model order.
    /// `None` if any corner is behind the camera.
    pub fn project_corners(&self, model: &PatternModel) -> Option<Vec<Point2<f64>>> {
        model
            .points()
            .iter()
            .map(|p| self.camera.project(&(self.pose * p)))
            .collect()
    }

    pub fn render(&self, model: &PatternModel) -> GrayImage {
        let mut img = GrayImage::new(self.width, self.height);
        let Some(k_inv) = self.camera.intrinsic.try_inverse() else {
            img.data.fill(self.background);
            return img;
        };

        let spec = model.spec();
        let s = spec.square_size();
        let first = model.points().first().copied().unwrap_or_else(Point3::origin);
        let rows = spec.rows() as i64;
        let cols = spec.cols() as i64;

        let rot = self.pose.rotation;
        let normal = rot * Vector3::z();
        let t = self.pose.translation.vector;
        let plane_d = normal.dot(&t);

        let n = self.supersample.max(1);
        let step = 1.0 / n as f64;
        let background = self.background as f32;

        let shade = |u: f64, v: f64| -> f32 {
            let h = k_inv * Vector3::new(u, v, 1.0);
            if h.z.abs() < f64::EPSILON {
                return background;
            }
            let mut m = Point2::new(h.x / h.z, h.y / h.z);
            if let Some(d) = &self.camera.distortion {
                m = d.undistort(m);
            }
            let ray = Vector3::new(m.x, m.y, 1.0);
            let denom = normal.dot(&ray);
            if denom.abs() < 1e-12 {
                return background;
            }
            let depth = plane_d / denom;
            if depth <= 0.0 {
                return background;
            }
            let q = rot.inverse() * (ray * depth - t);

            let a = ((q.x - first.x) / s).floor() as i64 + 1;
            let b = ((first.y - q.y) / s).floor() as i64 + 1;
            if (0..=cols).contains(&a) && (0..=rows).contains(&b) {
                if (a + b) % 2 == 0 {
                    DARK
                } else {
                    LIGHT
                }
            } else if (-1..=cols + 1).contains(&a) && (-1..=rows + 1).contains(&b) {
                LIGHT
            } else {
                background
            }
        };

        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0f32;
                for sy in 0..n {
                    for sx in 0..n {
                        // Pixel centres sit on integer coordinates.
                        let u = x as f64 - 0.5 + (sx as f64 + 0.5) * step;
                        let v = y as f64 - 0.5 + (sy as f64 + 0.5) * step;
                        acc += shade(u, v);
                    }
                }
                img.data[y * self.width + x] = (acc / (n * n) as f32).round().clamp(0.0, 255.0) as u8;
            }
        }
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoardSpec;
    use nalgebra::Matrix3;

    fn scene(pose: Isometry3<f64>) -> SyntheticScene {
        let k = Matrix3::new(500.0, 0.0, 160.0, 0.0, 500.0, 120.0, 0.0, 0.0, 1.0);
        SyntheticScene::new(320, 240, CameraParams::pinhole(k), pose)
    }

    #[test]
    fn fronto_parallel_corners_are_a_regular_grid() {
        let model = PatternModel::new(BoardSpec::new(4, 5, 0.04).unwrap());
        let sc = scene(SyntheticScene::facing_pose(1.0, 0.0, 0.0));
        let px = sc.project_corners(&model).unwrap();
        // 0.04 m at 1 m with f = 500 -> 20 px spacing.
        assert!((px[1].x - px[0].x - 20.0).abs() < 1e-9);
        assert!((px[5].y - px[0].y - 20.0).abs() < 1e-9);
        // Grid centred on the principal point.
        let cx: f64 = px.iter().map(|p| p.x).sum::<f64>() / px.len() as f64;
        assert!((cx - 160.0).abs() < 1e-9);
    }

    #[test]
    fn render_has_board_squares_and_background() {
        let model = PatternModel::new(BoardSpec::new(4, 5, 0.04).unwrap());
        let sc = scene(SyntheticScene::facing_pose(1.0, 0.0, 0.0));
        let img = sc.render(&model);
        let px = sc.project_corners(&model).unwrap();
        let at = |x: f64, y: f64| img.data[y.round() as usize * img.width + x.round() as usize];

        assert_eq!(at(2.0, 2.0), 100);
        // The square up-left of the first corner is dark, up-right is light.
        assert_eq!(at(px[0].x - 10.0, px[0].y - 10.0), 0);
        assert_eq!(at(px[0].x + 10.0, px[0].y - 10.0), 255);
    }
}
