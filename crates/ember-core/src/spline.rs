//! Pure spline math shared by curve evaluation and field forces.

use glam::{Vec3, Vec4};

/// Cubic Hermite interpolation on 4-component values.
///
/// `m0` and `m1` are tangents per unit time; `dt` is the span of the interval
/// so the result stays C1-continuous across intervals of different lengths.
pub fn cubic_hermite(p0: Vec4, m0: Vec4, p1: Vec4, m1: Vec4, dt: f32, t: f32) -> Vec4 {
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    p0 * h00 + m0 * (h10 * dt) + p1 * h01 + m1 * (h11 * dt)
}

/// Catmull-Rom tangent at an interior key with non-uniform spacing.
pub fn catmull_rom_tangent(prev: (f32, Vec4), next: (f32, Vec4)) -> Vec4 {
    let span = next.0 - prev.0;
    if span.abs() < f32::EPSILON {
        return Vec4::ZERO;
    }
    (next.1 - prev.1) / span
}

/// Rotate a vector around a unit axis by an angle in radians (Rodrigues' formula).
pub fn rotate_around_axis(v: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    let cos_a = angle.cos();
    let sin_a = angle.sin();
    let dot = v.dot(axis);
    v * cos_a + axis.cross(v) * sin_a + axis * dot * (1.0 - cos_a)
}

/// Quintic fade curve used by value noise (zero first and second derivative at 0 and 1).
pub fn smootherstep(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}
