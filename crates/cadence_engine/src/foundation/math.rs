//! Math utilities and types
//!
//! Pure value helpers consumed by components and systems.

pub use nalgebra::{Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f64>;

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// Wrap `value` into the half-open range `[start, end)`.
///
/// Useful for angles: `normalize(370.0, 0.0, 360.0) == 10.0`.
pub fn normalize(value: f64, start: f64, end: f64) -> f64 {
    let width = end - start;
    let offset = value - start;
    offset - (offset / width).floor() * width + start
}

/// Convert degrees to radians
pub fn deg_to_rad(degrees: f64) -> f64 {
    degrees.to_radians()
}

/// Convert radians to degrees
pub fn rad_to_deg(radians: f64) -> f64 {
    radians.to_degrees()
}

/// Unit vector pointing along `angle` radians, measured from the +x axis
pub fn direction(angle: f64) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}
