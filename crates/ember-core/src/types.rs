//! Color and transform types

use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Scale / rotate / translate triple.
///
/// Rotation is Euler XYZ in radians, applied after scale and before
/// translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Srt {
    pub scale: Vec3,
    pub rotate: Vec3,
    pub translate: Vec3,
}

impl Default for Srt {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Srt {
    pub const IDENTITY: Self = Self {
        scale: Vec3::ONE,
        rotate: Vec3::ZERO,
        translate: Vec3::ZERO,
    };

    pub fn from_translation(translate: Vec3) -> Self {
        Self {
            translate,
            ..Self::IDENTITY
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotate(mut self, rotate: Vec3) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotate.x, self.rotate.y, self.rotate.z)
    }

    /// Full scale-rotate-translate matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation(), self.translate)
    }

    /// Rotate-translate matrix (scale dropped), used for directions
    pub fn to_rt_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation(), self.translate)
    }
}

/// Straight (non-premultiplied) RGBA color.
///
/// Authored as a four-element array, e.g. `color = [1.0, 0.5, 0.0, 1.0]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_vec4(v: Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }

    pub fn to_vec4(&self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Component-wise product, used to tint by the emitter color
    pub fn modulate(&self, other: &Self) -> Self {
        Self::from_vec4(self.to_vec4() * other.to_vec4())
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Color> for [f32; 4] {
    fn from(c: Color) -> Self {
        c.to_array()
    }
}
