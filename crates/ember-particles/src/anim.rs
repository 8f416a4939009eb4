//! 8-key animation tables: keyframe search, linear and smooth interpolation,
//! loop wrapping and per-particle variation.

use crate::rand::particle_random;
use crate::resource::EmitterResource;
use ember_core::spline::{catmull_rom_tangent, cubic_hermite};
use ember_core::{Color, EmberError, Result};
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Upper bound on keys per table
pub const MAX_KEYS: usize = 8;

/// Per-particle random channels. Each curve hashes the particle seed with its
/// own channel so two curves on one particle do not vary in lockstep.
pub mod channel {
    pub const LIFE: u32 = 1;
    pub const SCALE: u32 = 2;
    pub const COLOR0: u32 = 3;
    pub const COLOR1: u32 = 4;
    pub const ALPHA0: u32 = 5;
    pub const ALPHA1: u32 = 6;
    pub const LOOP_OFFSET: u32 = 7;
    pub const ROTATION: u32 = 8;
    pub const ROTATION_VELOCITY: u32 = 9;
    pub const SPEED: u32 = 10;
}

/// How to interpolate between keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    /// Cubic Hermite through every key with Catmull-Rom tangents
    Smooth,
}

/// A key: a 4-component value at a point in time.
///
/// Authored values may have 1 to 4 components: one value is splatted, three
/// values get `w = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "KeyRepr")]
pub struct AnimKey {
    pub time: f32,
    pub value: Vec4,
}

#[derive(Deserialize)]
struct KeyRepr {
    time: f32,
    value: Vec<f32>,
}

impl TryFrom<KeyRepr> for AnimKey {
    type Error = String;

    fn try_from(repr: KeyRepr) -> std::result::Result<Self, Self::Error> {
        let v = &repr.value;
        let value = match v.len() {
            1 => Vec4::splat(v[0]),
            2 => Vec4::new(v[0], v[1], 0.0, 0.0),
            3 => Vec4::new(v[0], v[1], v[2], 1.0),
            4 => Vec4::new(v[0], v[1], v[2], v[3]),
            n => return Err(format!("key value must have 1 to 4 components, got {n}")),
        };
        Ok(Self {
            time: repr.time,
            value,
        })
    }
}

impl AnimKey {
    pub fn new(time: f32, value: Vec4) -> Self {
        Self { time, value }
    }

    pub fn scalar(time: f32, value: f32) -> Self {
        Self::new(time, Vec4::splat(value))
    }
}

/// Loop behaviour for a table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Loop period in frames
    pub rate: f32,
    /// Offset each particle's loop phase by its own random value
    #[serde(default)]
    pub random_offset: bool,
}

/// A keyframed curve of up to [`MAX_KEYS`] keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimTable {
    pub keys: Vec<AnimKey>,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default, rename = "loop")]
    pub looping: Option<LoopConfig>,
    /// Per-particle variation: the value is scaled by `1 - random * r`
    #[serde(default)]
    pub random: f32,
}

impl AnimTable {
    /// A single-key table
    pub fn constant(value: Vec4) -> Self {
        Self {
            keys: vec![AnimKey::new(0.0, value)],
            interpolation: Interpolation::Linear,
            looping: None,
            random: 0.0,
        }
    }

    /// Two keys at normalized times 0 and 1
    pub fn linear(start: Vec4, end: Vec4) -> Self {
        Self {
            keys: vec![AnimKey::new(0.0, start), AnimKey::new(1.0, end)],
            interpolation: Interpolation::Linear,
            looping: None,
            random: 0.0,
        }
    }

    pub fn from_keys(keys: Vec<AnimKey>, interpolation: Interpolation) -> Self {
        Self {
            keys,
            interpolation,
            looping: None,
            random: 0.0,
        }
    }

    pub fn with_loop(mut self, rate: f32, random_offset: bool) -> Self {
        self.looping = Some(LoopConfig {
            rate,
            random_offset,
        });
        self
    }

    pub fn with_random(mut self, random: f32) -> Self {
        self.random = random;
        self
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if self.keys.is_empty() {
            return Err(EmberError::MissingRequiredField(format!("{name}.keys")));
        }
        if self.keys.len() > MAX_KEYS {
            return Err(EmberError::TooManyKeys {
                curve: name.to_string(),
                count: self.keys.len(),
                max: MAX_KEYS,
            });
        }
        if self.keys.windows(2).any(|w| w[1].time < w[0].time) {
            return Err(EmberError::ValidationError(format!(
                "{name}: key times must be ascending"
            )));
        }
        if let Some(looping) = &self.looping {
            if looping.rate <= 0.0 {
                return Err(EmberError::ValueOutOfRange {
                    field: format!("{name}.loop.rate"),
                    min: f32::MIN_POSITIVE as f64,
                    max: f32::MAX as f64,
                    value: looping.rate as f64,
                });
            }
        }
        if !(0.0..=1.0).contains(&self.random) {
            return Err(EmberError::ValueOutOfRange {
                field: format!("{name}.random"),
                min: 0.0,
                max: 1.0,
                value: self.random as f64,
            });
        }
        Ok(())
    }

    /// Evaluate at `time` in the same units as the key times.
    ///
    /// Times outside the key range clamp to the first or last value.
    pub fn evaluate(&self, time: f32) -> Vec4 {
        let keys = &self.keys;
        let Some(first) = keys.first() else {
            return Vec4::ZERO;
        };
        if keys.len() == 1 || time <= first.time {
            return first.value;
        }
        let last = keys[keys.len() - 1];
        if time >= last.time {
            return last.value;
        }

        // At most 8 keys, a linear scan is all that is needed
        let mut idx = 1;
        while idx < keys.len() - 1 && keys[idx].time <= time {
            idx += 1;
        }
        let prev = keys[idx - 1];
        let next = keys[idx];

        let span = next.time - prev.time;
        if span <= 0.0 {
            return next.value;
        }
        let t = (time - prev.time) / span;

        match self.interpolation {
            Interpolation::Linear => prev.value.lerp(next.value, t),
            Interpolation::Smooth => {
                let m0 = self.tangent(idx - 1);
                let m1 = self.tangent(idx);
                cubic_hermite(prev.value, m0, next.value, m1, span, t)
            }
        }
    }

    fn tangent(&self, i: usize) -> Vec4 {
        let keys = &self.keys;
        let n = keys.len();
        let at = |k: usize| (keys[k].time, keys[k].value);
        if i == 0 {
            catmull_rom_tangent(at(0), at(1))
        } else if i == n - 1 {
            catmull_rom_tangent(at(n - 2), at(n - 1))
        } else {
            catmull_rom_tangent(at(i - 1), at(i + 1))
        }
    }

    /// Evaluate an emitter-level channel at the emitter's age in frames
    pub fn sample_emitter(&self, emitter_time: f32) -> Vec4 {
        match &self.looping {
            Some(looping) => self.evaluate(emitter_time.rem_euclid(looping.rate)),
            None => self.evaluate(emitter_time),
        }
    }

    /// Evaluate a particle curve.
    ///
    /// Without a loop, key times are life ratios in [0, 1]. With a loop, the
    /// particle's age wraps every `rate` frames and that phase is used instead.
    pub fn sample_particle(&self, age: f32, life: f32, seed: u32, channel: u32) -> Vec4 {
        let t = match &self.looping {
            Some(looping) => {
                let offset = if looping.random_offset {
                    particle_random(seed, channel::LOOP_OFFSET) * looping.rate
                } else {
                    0.0
                };
                (age + offset).rem_euclid(looping.rate) / looping.rate
            }
            None if life > 0.0 => age / life,
            None => 1.0,
        };
        let value = self.evaluate(t);
        if self.random > 0.0 {
            value * (1.0 - self.random * particle_random(seed, channel))
        } else {
            value
        }
    }
}

/// Current values of the emitter-level animated channels.
///
/// Authored constants are used where a channel has no table; a table replaces
/// the constant entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterAnimValue {
    pub scale: Vec3,
    pub rotate: Vec3,
    pub translate: Vec3,
    pub color0: Color,
    pub color1: Color,
    pub alpha0: f32,
    pub alpha1: f32,
    pub emission_rate: f32,
    pub life: f32,
    pub all_direction_speed: f32,
    pub designated_speed: f32,
    pub particle_scale: Vec3,
    pub volume_scale: Vec3,
    pub gravity_scale: f32,
}

impl Default for EmitterAnimValue {
    fn default() -> Self {
        Self {
            scale: Vec3::ONE,
            rotate: Vec3::ZERO,
            translate: Vec3::ZERO,
            color0: Color::WHITE,
            color1: Color::WHITE,
            alpha0: 1.0,
            alpha1: 1.0,
            emission_rate: 0.0,
            life: 0.0,
            all_direction_speed: 0.0,
            designated_speed: 0.0,
            particle_scale: Vec3::ONE,
            volume_scale: Vec3::ONE,
            gravity_scale: 1.0,
        }
    }
}

impl EmitterAnimValue {
    /// Evaluate every emitter channel at `emitter_time` (frames)
    pub fn evaluate(res: &EmitterResource, emitter_time: f32) -> Self {
        let anim = &res.anim;
        let vec3 = |table: &Option<AnimTable>, base: Vec3| {
            table
                .as_ref()
                .map(|t| t.sample_emitter(emitter_time).truncate())
                .unwrap_or(base)
        };
        let scalar = |table: &Option<AnimTable>, base: f32| {
            table
                .as_ref()
                .map(|t| t.sample_emitter(emitter_time).x)
                .unwrap_or(base)
        };
        let color = |table: &Option<AnimTable>, base: Color| {
            table
                .as_ref()
                .map(|t| Color::from_vec4(t.sample_emitter(emitter_time)))
                .unwrap_or(base)
        };

        Self {
            scale: vec3(&anim.scale, res.transform.scale),
            rotate: vec3(&anim.rotate, res.transform.rotate),
            translate: vec3(&anim.translate, res.transform.translate),
            color0: color(&anim.color0, res.color0),
            color1: color(&anim.color1, res.color1),
            alpha0: scalar(&anim.alpha0, res.alpha0),
            alpha1: scalar(&anim.alpha1, res.alpha1),
            emission_rate: scalar(&anim.emission_rate, res.emission.rate).max(0.0),
            life: scalar(&anim.life, res.emission.life).max(0.0),
            all_direction_speed: scalar(&anim.all_direction_speed, res.emission.all_direction_speed),
            designated_speed: scalar(&anim.designated_speed, res.emission.designated_speed),
            particle_scale: vec3(&anim.particle_scale, res.particle.emitter_scale),
            volume_scale: vec3(&anim.volume_scale, res.shape.volume_scale),
            gravity_scale: scalar(&anim.gravity_scale, res.particle.gravity_scale),
        }
    }
}
