//! Levenberg-Marquardt refinement of a pose on pixel reprojection error.
//!
//! The state is `T_C_O`; updates are applied as a left perturbation
//! `exp(ω) R`, `t + δt`, so the rotation parametrisation has no
//! singularities. The Jacobian is taken by central differences through the
//! full camera model, distortion included.

use checkerboard_pose_core::CameraParams;
use nalgebra::{
    Isometry3, Matrix6, Point2, Point3, SMatrix, Translation3, UnitQuaternion, Vector2, Vector3,
    Vector6,
};

use crate::error::PnpError;

const JACOBIAN_STEP: f64 = 1e-7;
const MAX_DAMPING: f64 = 1e10;

#[derive(Clone, Copy, Debug)]
pub struct RefineOptions {
    pub max_iterations: u32,
    /// Stop once the update norm drops below this.
    pub step_tolerance: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct Refined {
    pub pose: Isometry3<f64>,
    pub rms_error: f64,
    pub iterations: u32,
}

fn perturb(pose: &Isometry3<f64>, delta: &Vector6<f64>) -> Isometry3<f64> {
    let w = Vector3::new(delta[0], delta[1], delta[2]);
    let dt = Vector3::new(delta[3], delta[4], delta[5]);
    let rot = UnitQuaternion::new(w) * pose.rotation;
    Isometry3::from_parts(Translation3::from(pose.translation.vector + dt), rot)
}

fn residual(
    pose: &Isometry3<f64>,
    camera: &CameraParams,
    object: &Point3<f64>,
    observed: &Point2<f64>,
) -> Option<Vector2<f64>> {
    let projected = camera.project(&(pose * object))?;
    Some(projected - observed)
}

/// Sum of squared pixel residuals. `None` if any point falls behind the camera.
pub fn squared_error(
    pose: &Isometry3<f64>,
    camera: &CameraParams,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
) -> Option<f64> {
    object
        .iter()
        .zip(image)
        .map(|(o, i)| residual(pose, camera, o, i).map(|r| r.norm_squared()))
        .sum()
}

fn normal_equations(
    pose: &Isometry3<f64>,
    camera: &CameraParams,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
) -> Option<(Matrix6<f64>, Vector6<f64>)> {
    let mut jtj = Matrix6::<f64>::zeros();
    let mut jtr = Vector6::<f64>::zeros();

    // Perturbed poses are shared across all points.
    let mut plus = Vec::with_capacity(6);
    let mut minus = Vec::with_capacity(6);
    for k in 0..6 {
        let mut d = Vector6::zeros();
        d[k] = JACOBIAN_STEP;
        plus.push(perturb(pose, &d));
        minus.push(perturb(pose, &-d));
    }

    for (o, i) in object.iter().zip(image) {
        let r = residual(pose, camera, o, i)?;
        let mut j = SMatrix::<f64, 2, 6>::zeros();
        for k in 0..6 {
            let rp = residual(&plus[k], camera, o, i)?;
            let rm = residual(&minus[k], camera, o, i)?;
            j.set_column(k, &((rp - rm) / (2.0 * JACOBIAN_STEP)));
        }
        jtj += j.transpose() * j;
        jtr += j.transpose() * r;
    }
    Some((jtj, jtr))
}

pub fn refine_pose(
    initial: Isometry3<f64>,
    camera: &CameraParams,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    options: &RefineOptions,
) -> Result<Refined, PnpError> {
    let mut pose = initial;
    let mut cost = squared_error(&pose, camera, object, image).ok_or(PnpError::PointsBehindCamera)?;
    let mut lambda = 1e-3;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        iterations += 1;
        let Some((jtj, jtr)) = normal_equations(&pose, camera, object, image) else {
            break;
        };

        let mut improved = false;
        let mut step_norm = f64::INFINITY;
        while lambda < MAX_DAMPING {
            let mut a = jtj;
            for k in 0..6 {
                a[(k, k)] += lambda * jtj[(k, k)].max(1e-12);
            }
            let Some(delta) = a.cholesky().map(|c| c.solve(&-jtr)) else {
                lambda *= 10.0;
                continue;
            };
            step_norm = delta.norm();
            let candidate = perturb(&pose, &delta);
            match squared_error(&candidate, camera, object, image) {
                Some(c) if c.is_finite() && c < cost => {
                    pose = candidate;
                    cost = c;
                    lambda = (lambda * 0.1).max(1e-12);
                    improved = true;
                    break;
                }
                _ => lambda *= 10.0,
            }
        }

        if !improved || step_norm < options.step_tolerance {
            break;
        }
    }

    log::trace!("pose refinement: {iterations} iterations, cost {cost:.3e}");

    let n = object.len().max(1) as f64;
    Ok(Refined {
        pose,
        rms_error: (cost / n).sqrt(),
        iterations,
    })
}
