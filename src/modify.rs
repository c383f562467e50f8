//! Basis change between the game's Y-up coordinates and the Z-up scene.
use nalgebra::{Matrix3, Vector3};
use crate::gamez::Vec3;

/// Unit correction applied to the World object only.
pub const WORLD_SCALE: f32 = 0.03;

/// `(x, y, z)` Y-up becomes `(x, -z, y)` Z-up.  Used for positions and Euler rotations alike.
pub fn flip_axes(v: Vec3) -> [f32; 3] {
    let flipped = flip_matrix() * Vector3::new(v.x, v.y, v.z);
    flipped.into()
}

/// Inverse of `flip_axes`: `(x, y, z)` Z-up becomes `(x, z, -y)` Y-up.
pub fn unflip_axes(v: [f32; 3]) -> Vec3 {
    let back = flip_matrix().transpose() * Vector3::from(v);
    Vec3::new(back.x, back.y, back.z)
}

fn flip_matrix() -> Matrix3<f32> {
    Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, 0.0, -1.0,
        0.0, 1.0, 0.0,
    )
}

pub fn scale(v: [f32; 3], c: f32) -> [f32; 3] {
    (Vector3::from(v) * c).into()
}
