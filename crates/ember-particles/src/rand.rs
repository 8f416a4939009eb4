//! Lightweight xorshift32 PRNG and seed policies

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// How an emitter's random source is seeded when the emitter is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomSeedMode {
    /// Fresh seed drawn from the system generator for every emitter instance
    #[default]
    PerEmitter,
    /// Every emitter of one emitter set starts from the set's seed
    EmitterSetShared,
    /// Constant seed; replays identically every time
    Fixed(u32),
}

/// Deterministic scalar generator. Same seed, same sequence.
#[derive(Debug, Clone)]
pub struct RandomSource {
    state: u32,
}

impl RandomSource {
    pub fn new(seed: u32) -> Self {
        // Scramble first: xorshift barely mixes small neighbouring seeds
        let state = mix(seed);
        Self {
            state: if state == 0 { 0x9E37_79B9 } else { state },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Returns a float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        // 24 mantissa bits so the result can never round up to 1.0
        (self.next_u32() >> 8) as f32 * (1.0 / 16_777_216.0)
    }

    /// Returns a float in [-1, 1)
    pub fn next_signed(&mut self) -> f32 {
        self.next_f32() * 2.0 - 1.0
    }

    /// Returns a float in [min, max)
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform point on the unit sphere.
    ///
    /// Latitude comes from the inverse CDF (`y = 1 - 2u`), which keeps the
    /// density even instead of bunching at the poles.
    pub fn unit_vector(&mut self) -> Vec3 {
        let y = 1.0 - 2.0 * self.next_f32();
        let phi = TAU * self.next_f32();
        let r = (1.0 - y * y).max(0.0).sqrt();
        Vec3::new(r * phi.cos(), y, r * phi.sin())
    }

    /// Vector with each component in [-1, 1)
    pub fn signed_vec3(&mut self) -> Vec3 {
        Vec3::new(self.next_signed(), self.next_signed(), self.next_signed())
    }
}

/// Murmur3 finalizer
fn mix(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2_AE35);
    x ^= x >> 16;
    x
}

/// Stateless per-particle random value for a given channel.
///
/// Particles keep one seed for their whole life; curves and per-particle
/// variation hash that seed with a channel number so re-evaluating a particle
/// never consumes generator state.
pub fn particle_random(seed: u32, channel: u32) -> f32 {
    let x = mix(seed ^ channel.wrapping_mul(0x9E37_79B9));
    (x >> 8) as f32 * (1.0 / 16_777_216.0)
}
