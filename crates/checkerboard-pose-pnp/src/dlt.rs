//! Linear PnP (DLT) for general, non-planar point sets.

use nalgebra::{DMatrix, Isometry3, Matrix3, Matrix3x4, Point2, Point3, Vector3};

use crate::error::PnpError;
use crate::planar::{isometry_from, project_to_so3};

pub const MIN_POINTS: usize = 6;

/// Pose `T_C_O` from normalised image observations.
///
/// Object points are centred and scaled before building the `2N x 12`
/// system; the camera matrix `[R | t]` is the right singular vector of the
/// smallest singular value.
pub fn dlt_pose(object: &[Point3<f64>], normalized: &[Point2<f64>]) -> Result<Isometry3<f64>, PnpError> {
    let n = object.len();
    if n < MIN_POINTS {
        return Err(PnpError::InsufficientCorrespondences {
            got: n,
            required: MIN_POINTS,
        });
    }

    let centroid = object.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n as f64;
    let mean_dist = object.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n as f64;
    if mean_dist <= f64::EPSILON {
        return Err(PnpError::Degenerate);
    }
    let scale = 3f64.sqrt() / mean_dist;

    let mut a = DMatrix::<f64>::zeros(2 * n, 12);
    for (i, (pw, pi)) in object.iter().zip(normalized).enumerate() {
        let q = (pw.coords - centroid) * scale;
        let (x, y, z) = (q.x, q.y, q.z);
        let (u, v) = (pi.x, pi.y);

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        // Row for x
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = z;
        a[(r0, 3)] = 1.0;
        a[(r0, 8)] = -u * x;
        a[(r0, 9)] = -u * y;
        a[(r0, 10)] = -u * z;
        a[(r0, 11)] = -u;

        // Row for y
        a[(r1, 4)] = x;
        a[(r1, 5)] = y;
        a[(r1, 6)] = z;
        a[(r1, 7)] = 1.0;
        a[(r1, 8)] = -v * x;
        a[(r1, 9)] = -v * y;
        a[(r1, 10)] = -v * z;
        a[(r1, 11)] = -v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(PnpError::Degenerate)?;
    let mut sv: Vec<(usize, f64)> = svd.singular_values.iter().copied().enumerate().collect();
    sv.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (min_idx, _) = sv[0];
    let largest = sv[sv.len() - 1].1;
    if sv[1].1 < 1e-9 * largest.max(f64::MIN_POSITIVE) {
        return Err(PnpError::Degenerate);
    }

    let p_vec = v_t.row(min_idx);
    let mut p = Matrix3x4::<f64>::zeros();
    for r in 0..3 {
        for c in 0..4 {
            p[(r, c)] = p_vec[4 * r + c];
        }
    }

    // Fix the overall sign so that points have positive depth.
    let depth_sum: f64 = object
        .iter()
        .map(|pw| {
            let q = (pw.coords - centroid) * scale;
            p[(2, 0)] * q.x + p[(2, 1)] * q.y + p[(2, 2)] * q.z + p[(2, 3)]
        })
        .sum();
    if depth_sum < 0.0 {
        p = -p;
    }

    // P ~ alpha [R / scale | R c + t]
    let m: Matrix3<f64> = p.fixed_view::<3, 3>(0, 0).into_owned();
    let s = (m.row(0).norm() + m.row(1).norm() + m.row(2).norm()) / 3.0;
    if s <= f64::EPSILON {
        return Err(PnpError::Degenerate);
    }
    let r = project_to_so3(&(m / s)).ok_or(PnpError::Degenerate)?;
    let alpha = s * scale;
    let t = p.column(3).into_owned() / alpha - r * centroid;

    let pose = isometry_from(r, t);
    if !pose.translation.vector.iter().all(|v| v.is_finite()) {
        return Err(PnpError::NonFinite);
    }
    Ok(pose)
}
