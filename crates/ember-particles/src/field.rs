//! Force fields applied to every live particle once per frame.
//!
//! Fields run in authored order, after gravity and air resistance and before
//! the position step, so a field sees the velocity the particle is about to
//! move with.

use crate::anim::{channel, AnimTable};
use crate::particle::Particle;
use crate::rand::{particle_random, RandomSource};
use ember_core::spline::{rotate_around_axis, smootherstep};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Per-particle random channel for the curl-noise phase offset
const CURL_OFFSET_CHANNEL: u32 = 32;

/// One authored field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldResource {
    PositionAdd(PositionAddField),
    Convergence(ConvergenceField),
    Collision(CollisionField),
    Spin(SpinField),
    Magnet(MagnetField),
    RandomSimple(RandomField),
    CurlNoise(CurlNoiseField),
}

impl FieldResource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PositionAdd(_) => "position_add",
            Self::Convergence(_) => "convergence",
            Self::Collision(_) => "collision",
            Self::Spin(_) => "spin",
            Self::Magnet(_) => "magnet",
            Self::RandomSimple(_) => "random_simple",
            Self::CurlNoise(_) => "curl_noise",
        }
    }

    /// Whether applying this field draws from the emitter's random source
    pub fn consumes_random(&self) -> bool {
        matches!(self, Self::RandomSimple(_))
    }
}

/// Adds a (possibly animated) offset to the position every frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionAddField {
    pub offset: Vec3,
    /// Offset over the particle's life; replaces `offset` when present
    pub anim: Option<AnimTable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceTarget {
    /// The authored `target` point
    #[default]
    AssignedPosition,
    /// The emitter origin in the particle's simulation space
    EmitterOrigin,
}

/// Pulls particles toward a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceField {
    pub target: Vec3,
    pub mode: ConvergenceTarget,
    /// Fraction of the remaining distance closed per frame
    pub strength: f32,
    /// Strength multiplier over the particle's life
    pub strength_curve: Option<AnimTable>,
}

impl Default for ConvergenceField {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            mode: ConvergenceTarget::AssignedPosition,
            strength: 0.1,
            strength_curve: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionResponse {
    #[default]
    Bounce,
    Kill,
}

/// Horizontal collision plane at `height`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionField {
    pub height: f32,
    pub response: CollisionResponse,
    /// Fraction of vertical speed kept after a bounce
    pub restitution: f32,
    /// Fraction of horizontal speed kept after a bounce
    pub friction: f32,
}

impl Default for CollisionField {
    fn default() -> Self {
        Self {
            height: 0.0,
            response: CollisionResponse::Bounce,
            restitution: 0.5,
            friction: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinAxis {
    X,
    #[default]
    Y,
    Z,
}

impl SpinAxis {
    pub fn vector(&self) -> Vec3 {
        match self {
            Self::X => Vec3::X,
            Self::Y => Vec3::Y,
            Self::Z => Vec3::Z,
        }
    }
}

/// Rotates positions about one of the emitter's local axes, pivoting on the
/// emitter origin
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinField {
    pub axis: SpinAxis,
    /// Degrees per frame
    pub rate: f32,
    /// Outward drift away from the axis per frame
    pub diffusion: f32,
}

/// Inverse-distance attraction (positive strength) or repulsion (negative)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnetField {
    pub position: Vec3,
    pub strength: f32,
    /// Distances below this are clamped to keep the force finite
    pub min_distance: f32,
}

impl Default for MagnetField {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            strength: 0.0,
            min_distance: 0.1,
        }
    }
}

/// Random velocity kicks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomField {
    /// Frames between kicks; zero or less kicks every frame
    pub interval: f32,
    /// Maximum kick per axis
    pub strength: Vec3,
}

impl Default for RandomField {
    fn default() -> Self {
        Self {
            interval: 1.0,
            strength: Vec3::splat(0.01),
        }
    }
}

/// Position perturbation from a divergence-free noise texture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurlNoiseField {
    /// Texels per simulation unit
    pub scale: f32,
    /// Texture scroll per frame, in texels
    pub speed: Vec3,
    pub strength: Vec3,
    /// Give every particle its own phase in the texture
    pub offset_random: bool,
}

impl Default for CurlNoiseField {
    fn default() -> Self {
        Self {
            scale: 1.0,
            speed: Vec3::ZERO,
            strength: Vec3::splat(0.01),
            offset_random: false,
        }
    }
}

/// Precomputed periodic 3D vector texture, normally a curl-noise field.
#[derive(Debug, Clone)]
pub struct CurlNoiseTexture {
    size: usize,
    data: Vec<Vec3>,
}

impl CurlNoiseTexture {
    /// Wrap externally authored texels (`size^3` entries, x fastest).
    /// Returns `None` when the data length does not match.
    pub fn from_texels(size: usize, data: Vec<Vec3>) -> Option<Self> {
        if size == 0 || data.len() != size * size * size {
            return None;
        }
        Some(Self { size, data })
    }

    /// Build a curl-noise texture: the curl of a smooth periodic vector
    /// potential, taken with central differences so the discrete divergence
    /// vanishes. Output is normalized to a peak magnitude of one.
    pub fn generate(size: usize, seed: u32) -> Self {
        let size = size.max(4);
        let cells = (size / 4).max(1);
        let mut rng = RandomSource::new(seed);
        let lattice: Vec<Vec3> = (0..cells * cells * cells)
            .map(|_| rng.signed_vec3())
            .collect();

        let potential: Vec<Vec3> = (0..size * size * size)
            .map(|i| {
                let (x, y, z) = (i % size, (i / size) % size, i / (size * size));
                let scale = cells as f32 / size as f32;
                value_noise(
                    &lattice,
                    cells,
                    Vec3::new(x as f32, y as f32, z as f32) * scale,
                )
            })
            .collect();

        let idx = |x: usize, y: usize, z: usize| x + y * size + z * size * size;
        let wrap = |v: usize, d: isize| (v as isize + d).rem_euclid(size as isize) as usize;
        let mut data = Vec::with_capacity(size * size * size);
        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let dx = (potential[idx(wrap(x, 1), y, z)] - potential[idx(wrap(x, -1), y, z)]) * 0.5;
                    let dy = (potential[idx(x, wrap(y, 1), z)] - potential[idx(x, wrap(y, -1), z)]) * 0.5;
                    let dz = (potential[idx(x, y, wrap(z, 1))] - potential[idx(x, y, wrap(z, -1))]) * 0.5;
                    data.push(Vec3::new(dy.z - dz.y, dz.x - dx.z, dx.y - dy.x));
                }
            }
        }

        let peak = data.iter().map(|v| v.length()).fold(0.0f32, f32::max);
        if peak > 0.0 {
            for v in &mut data {
                *v /= peak;
            }
        }
        Self { size, data }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn texel(&self, x: usize, y: usize, z: usize) -> Vec3 {
        let s = self.size;
        self.data[(x % s) + (y % s) * s + (z % s) * s * s]
    }

    /// Trilinear sample with wrap-around; `p` is in texel units
    pub fn sample(&self, p: Vec3) -> Vec3 {
        let s = self.size as f32;
        let p = Vec3::new(p.x.rem_euclid(s), p.y.rem_euclid(s), p.z.rem_euclid(s));
        let base = p.floor();
        let f = p - base;
        let (x0, y0, z0) = (base.x as usize, base.y as usize, base.z as usize);

        let mut acc = Vec3::ZERO;
        for corner in 0..8 {
            let (ox, oy, oz) = (corner & 1, (corner >> 1) & 1, (corner >> 2) & 1);
            let w = (if ox == 1 { f.x } else { 1.0 - f.x })
                * (if oy == 1 { f.y } else { 1.0 - f.y })
                * (if oz == 1 { f.z } else { 1.0 - f.z });
            acc += self.texel(x0 + ox, y0 + oy, z0 + oz) * w;
        }
        acc
    }
}

/// Smooth periodic value noise over a `cells^3` lattice
fn value_noise(lattice: &[Vec3], cells: usize, p: Vec3) -> Vec3 {
    let base = p.floor();
    let f = p - base;
    let (u, v, w) = (smootherstep(f.x), smootherstep(f.y), smootherstep(f.z));
    let at = |x: usize, y: usize, z: usize| {
        lattice[(x % cells) + (y % cells) * cells + (z % cells) * cells * cells]
    };
    let (x0, y0, z0) = (base.x as usize, base.y as usize, base.z as usize);

    let x00 = at(x0, y0, z0).lerp(at(x0 + 1, y0, z0), u);
    let x10 = at(x0, y0 + 1, z0).lerp(at(x0 + 1, y0 + 1, z0), u);
    let x01 = at(x0, y0, z0 + 1).lerp(at(x0 + 1, y0, z0 + 1), u);
    let x11 = at(x0, y0 + 1, z0 + 1).lerp(at(x0 + 1, y0 + 1, z0 + 1), u);
    x00.lerp(x10, v).lerp(x01.lerp(x11, v), w)
}

/// Per-frame inputs shared by every field
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub frame_rate: f32,
    /// Emitter time the particle is being evaluated at
    pub time: f32,
    /// Emitter origin in the particle's simulation space
    pub emitter_origin: Vec3,
    /// Emitter orientation in the particle's simulation space
    pub emitter_rotation: Quat,
    pub curl_noise: Option<&'a CurlNoiseTexture>,
}

/// Apply one field to a particle.
///
/// Only `RandomSimple` touches `rng`. A curl-noise field with no texture bound
/// does nothing.
pub fn apply_field(
    field: &FieldResource,
    ctx: &FieldContext<'_>,
    p: &mut Particle,
    rng: &mut RandomSource,
) {
    let fr = ctx.frame_rate;
    let age = ctx.time - p.birth_time;

    match field {
        FieldResource::PositionAdd(f) => {
            let offset = match &f.anim {
                Some(table) => table
                    .sample_particle(age, p.life, p.seed, channel::SCALE)
                    .truncate(),
                None => f.offset,
            };
            p.position += offset * fr;
        }
        FieldResource::Convergence(f) => {
            let target = match f.mode {
                ConvergenceTarget::AssignedPosition => f.target,
                ConvergenceTarget::EmitterOrigin => ctx.emitter_origin,
            };
            let curve = f
                .strength_curve
                .as_ref()
                .map(|t| t.sample_particle(age, p.life, p.seed, channel::SCALE).x)
                .unwrap_or(1.0);
            let k = (f.strength * curve * fr).clamp(0.0, 1.0);
            p.position += (target - p.position) * k;
        }
        FieldResource::Collision(f) => {
            let next_y = p.position.y + p.velocity.y * fr;
            if next_y < f.height {
                match f.response {
                    CollisionResponse::Kill => p.life = 0.0,
                    CollisionResponse::Bounce => {
                        p.position.y = p.position.y.max(f.height);
                        p.velocity.y = -p.velocity.y * f.restitution;
                        p.velocity.x *= f.friction;
                        p.velocity.z *= f.friction;
                    }
                }
            }
        }
        FieldResource::Spin(f) => {
            // Axis and pivot are the emitter's
            let axis = (ctx.emitter_rotation * f.axis.vector()).normalize_or_zero();
            let mut local = p.position - ctx.emitter_origin;
            local = rotate_around_axis(local, axis, f.rate.to_radians() * fr);
            if f.diffusion != 0.0 {
                let radial = local - axis * local.dot(axis);
                local += radial.normalize_or_zero() * f.diffusion * fr;
            }
            p.position = ctx.emitter_origin + local;
        }
        FieldResource::Magnet(f) => {
            let d = f.position - p.position;
            let dist = d.length().max(f.min_distance.max(f32::EPSILON));
            p.velocity += d.normalize_or_zero() * (f.strength / dist) * fr;
        }
        FieldResource::RandomSimple(f) => {
            let due = if f.interval <= 0.0 {
                true
            } else {
                let prev_age = age - fr;
                age > 0.0 && (age / f.interval).floor() != (prev_age / f.interval).floor()
            };
            if due {
                p.velocity += rng.signed_vec3() * f.strength;
            }
        }
        FieldResource::CurlNoise(f) => {
            let Some(texture) = ctx.curl_noise else {
                return;
            };
            let phase = if f.offset_random {
                particle_random(p.seed, CURL_OFFSET_CHANNEL) * texture.size() as f32
            } else {
                0.0
            };
            let uv = p.position * f.scale + f.speed * ctx.time + Vec3::splat(phase);
            p.position += texture.sample(uv) * f.strength * fr;
        }
    }
}
