use nalgebra::Vector2;

/// z-component of the 2D cross product.
#[inline]
pub fn cross2(a: &Vector2<f32>, b: &Vector2<f32>) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Unsigned angle between two directed vectors, in `[0, π]`.
/// Zero-length inputs give `π`.
pub fn angle_between(a: &Vector2<f32>, b: &Vector2<f32>) -> f32 {
    let na = a.norm();
    let nb = b.norm();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return std::f32::consts::PI;
    }
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos()
}

/// `v` rotated by +90° in image coordinates, same length.
#[inline]
pub fn perpendicular(v: &Vector2<f32>) -> Vector2<f32> {
    Vector2::new(-v.y, v.x)
}
