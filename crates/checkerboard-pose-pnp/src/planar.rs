//! Linear pose initialisation for planar targets.
//!
//! The object points are expressed in a 2D frame on their plane, a
//! homography to the normalised image points is estimated, and the
//! homography is decomposed into `[r1 r2 t]` (the intrinsics are identity
//! because the image points are already normalised).

use checkerboard_pose_core::estimate_homography;
use nalgebra::{Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};

use crate::error::PnpError;

/// Orthonormal frame fitted to a point set.
#[derive(Clone, Copy, Debug)]
pub struct PlaneFrame {
    pub centroid: Vector3<f64>,
    /// Columns: first in-plane axis, second in-plane axis, normal. Right-handed.
    pub basis: Matrix3<f64>,
    /// Spread along each basis axis (standard deviation).
    pub extents: Vector3<f64>,
}

impl PlaneFrame {
    pub fn fit(points: &[Point3<f64>]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
        let mut cov = Matrix3::zeros();
        for p in points {
            let d = p.coords - centroid;
            cov += d * d.transpose();
        }
        cov /= n;

        let eig = cov.symmetric_eigen();
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

        let e1: Vector3<f64> = eig.eigenvectors.column(order[0]).into_owned();
        let normal: Vector3<f64> = eig.eigenvectors.column(order[2]).into_owned();
        let e2 = normal.cross(&e1);
        let basis = Matrix3::from_columns(&[e1, e2, normal]);
        let extents = Vector3::new(
            eig.eigenvalues[order[0]].max(0.0).sqrt(),
            eig.eigenvalues[order[1]].max(0.0).sqrt(),
            eig.eigenvalues[order[2]].max(0.0).sqrt(),
        );
        Some(Self {
            centroid,
            basis,
            extents,
        })
    }

    /// Points lie on the plane within `tolerance` relative to the in-plane
    /// spread.
    pub fn is_planar(&self, tolerance: f64) -> bool {
        self.extents.z <= tolerance * self.extents.x
    }

    /// Both in-plane directions carry spread (not collinear).
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        self.extents.x <= f64::EPSILON || self.extents.y <= tolerance * self.extents.x
    }

    pub fn to_plane(&self, p: &Point3<f64>) -> Point2<f64> {
        let d = p.coords - self.centroid;
        Point2::new(
            d.dot(&self.basis.column(0).into_owned()),
            d.dot(&self.basis.column(1).into_owned()),
        )
    }
}

/// Pose `T_C_O` of a planar point set from normalised image observations.
pub fn planar_pose(
    frame: &PlaneFrame,
    object: &[Point3<f64>],
    normalized: &[Point2<f64>],
) -> Result<Isometry3<f64>, PnpError> {
    let plane: Vec<Point2<f64>> = object.iter().map(|p| frame.to_plane(p)).collect();
    let h = estimate_homography(&plane, normalized).ok_or(PnpError::Degenerate)?.h;

    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    // Scale factor λ: normalize first two columns (average for robustness)
    let norm = 0.5 * (h1.norm() + h2.norm());
    if norm <= f64::EPSILON {
        return Err(PnpError::Degenerate);
    }
    let mut lambda = 1.0 / norm;
    // The plane must sit in front of the camera.
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let t_plane = h3 * lambda;

    let r_plane = project_to_so3(&Matrix3::from_columns(&[r1, r2, r3])).ok_or(PnpError::Degenerate)?;

    // x_cam = R_p Bᵀ (X - c) + t_p
    let r = r_plane * frame.basis.transpose();
    let t = t_plane - r * frame.centroid;
    Ok(isometry_from(r, t))
}

/// Closest rotation in the Frobenius sense, with `det = +1`.
pub fn project_to_so3(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r = u_flipped * v_t;
    }
    r.iter().all(|v| v.is_finite()).then_some(r)
}

pub(crate) fn isometry_from(r: Matrix3<f64>, t: Vector3<f64>) -> Isometry3<f64> {
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    Isometry3::from_parts(Translation3::from(t), rot)
}
