//! Emission bookkeeping: how many particles to emit, which slots they take
//! and what they start with.

use crate::action::BoundAction;
use crate::anim::channel;
use crate::calc::apply_particle_curves;
use crate::emitter::{EmitReservationInfo, Emitter, ParentParticleInfo};
use crate::particle::Particle;
use crate::rand::{particle_random, RandomSource};
use crate::resource::{EmitOrder, FollowType};
use crate::shape::{evaluate_shape, PrimitiveEmitMode, ShapeContext};
use ember_core::{Color, RuntimeWarning};
use glam::Vec3;
use std::f32::consts::TAU;
use std::sync::Arc;

/// Salt separating a particle's initialization randoms from its shape sample
const INIT_SALT: u32 = 0x5BD1_E995;

/// Upper bound on interval bursts counted in a single frame
pub const MAX_BURSTS_PER_FRAME: u32 = 1024;

impl Emitter {
    /// Number of particles to emit this frame.
    ///
    /// Continuous emission emits `floor(rate * frame_rate + saving)` and
    /// carries the fraction to the next frame. Interval emission counts the
    /// interval down by `frame_rate` and emits `rate` particles per elapsed
    /// interval, at most [`MAX_BURSTS_PER_FRAME`] of them. Sets the
    /// emission-done flag once the emission window or the total limit is
    /// used up.
    pub fn try_emit_particle(&mut self, frame_rate: f32) -> u32 {
        if self.emission_done || self.resource.is_manual() {
            return 0;
        }
        let res = Arc::clone(&self.resource);
        let e = &res.emission;
        let t = self.time;

        if t < e.start_frame {
            return 0;
        }
        if let Some(duration) = e.duration {
            if t >= e.start_frame + duration {
                self.emission_done = true;
                return 0;
            }
        }

        let rate = self.anim.emission_rate.max(0.0);
        let wanted = if e.interval > 0.0 {
            let mut bursts = 0u32;
            while self.interval_counter <= 0.0 && bursts < MAX_BURSTS_PER_FRAME {
                bursts += 1;
                self.interval_counter += e.interval + e.interval_random * self.rng.next_f32();
            }
            // Backlog beyond the cap is dropped
            if self.interval_counter <= 0.0 {
                self.interval_counter = e.interval;
            }
            self.interval_counter -= frame_rate;
            rate * bursts as f32
        } else {
            rate * frame_rate
        };

        let total = wanted + self.emit_saving;
        let whole = total.floor().max(0.0);
        self.emit_saving = total - whole;
        let mut count = whole as u32;

        if let Some(limit) = e.total_limit {
            let remaining = (limit as u64).saturating_sub(self.requested_total);
            count = count.min(remaining as u32);
            self.requested_total += count as u64;
            if self.requested_total >= limit as u64 {
                self.emission_done = true;
            }
        }
        count
    }

    /// Emit up to `count` particles, returning the slot of the last one
    /// written.
    ///
    /// Running out of slots truncates the emission and raises a warning.
    /// `force_search` uses first-free-slot search even on ring-order
    /// emitters.
    pub fn emit(
        &mut self,
        count: u32,
        force_search: bool,
        reservation: Option<&EmitReservationInfo>,
    ) -> Option<usize> {
        self.emit_inner(count, force_search, reservation, None, None)
    }

    pub(crate) fn emit_inner(
        &mut self,
        count: u32,
        force_search: bool,
        reservation: Option<&EmitReservationInfo>,
        parent: Option<&ParentParticleInfo>,
        action: Option<&BoundAction<'_>>,
    ) -> Option<usize> {
        if count == 0 {
            return None;
        }
        if self.pool.capacity() == 0 {
            self.raise(RuntimeWarning::PARTICLE_MAX_COUNT_IS_ZERO);
            return None;
        }

        let order = if force_search {
            EmitOrder::SearchOrder
        } else {
            self.resource.emit_order
        };
        let burst_random = self.rng.next_u32();
        let mut cursor = 0;
        let mut last = None;

        for emit_index in 0..count {
            let slot = match order {
                EmitOrder::SearchOrder => match self.pool.find_free_slot(cursor, self.time) {
                    Some(slot) => slot,
                    None => {
                        self.raise(if reservation.is_some() {
                            RuntimeWarning::MANUAL_EMITTER_IS_FULL
                        } else {
                            RuntimeWarning::PARTICLE_EMISSION_FAILURE
                        });
                        break;
                    }
                },
                EmitOrder::SortOrder => match self.pool.next_sort_slot(self.time) {
                    Some((slot, live)) => {
                        if live {
                            self.raise(RuntimeWarning::PARTICLE_OVERWRITTEN);
                        }
                        slot
                    }
                    None => break,
                },
            };

            let seed = self.rng.next_u32();
            let Some(mut particle) =
                self.initialize_particle(emit_index, count, seed, burst_random, parent, reservation)
            else {
                // Shape could not be evaluated; the slot stays free
                continue;
            };

            if let Some(bound) = action {
                let ctx = bound.context(&self.resource.name, self.time, slot);
                bound.action.on_particle_emit(&ctx, &mut particle);
            }
            self.pool.write(slot, particle);
            cursor = slot + 1;
            self.emitted_total += 1;
            self.emitted_last_frame += 1;
            last = Some(slot);
        }

        if self.resource.shape.primitive_mode == PrimitiveEmitMode::IndexOrder {
            self.primitive_cursor = self.primitive_cursor.wrapping_add(count);
        }
        last
    }

    /// Build the particle for one emission, or `None` when the shape cannot
    /// be evaluated.
    ///
    /// Every random draw derives from `seed`, so the same inputs always give
    /// the same particle.
    pub fn initialize_particle(
        &self,
        emit_index: u32,
        max_emit_count: u32,
        seed: u32,
        burst_random: u32,
        parent: Option<&ParentParticleInfo>,
        reservation: Option<&EmitReservationInfo>,
    ) -> Option<Particle> {
        let res = &self.resource;
        let anim = &self.anim;
        let shape_ctx = ShapeContext {
            shape: &res.shape,
            primitive: self.primitive.as_deref(),
            primitive_cursor: self.primitive_cursor,
            burst_random,
        };
        let (mut position, mut velocity) =
            evaluate_shape(&shape_ctx, emit_index, max_emit_count, seed, anim)?;

        let e = &res.emission;
        let mut rnd = RandomSource::new(seed ^ INIT_SALT);
        let fixed_velocity = reservation.and_then(|r| r.velocity);

        if anim.designated_speed != 0.0 && fixed_velocity.is_none() {
            let dir = e.designated_direction.try_normalize().unwrap_or(Vec3::Y);
            let dir = disperse(dir, e.dispersion_angle.to_radians(), &mut rnd);
            velocity += dir * anim.designated_speed;
        }
        velocity *= 1.0 - e.speed_random * particle_random(seed, channel::SPEED);
        if e.position_random > 0.0 {
            position += rnd.unit_vector() * e.position_random * rnd.next_f32();
        }

        if let Some(r) = reservation {
            if let Some(p) = r.position {
                position = p;
            }
            if let Some(v) = r.velocity {
                velocity = v;
            }
        }

        let (position, velocity) = match self.follow() {
            FollowType::None => (
                self.matrix_srt.transform_point3(position),
                self.matrix_srt.transform_vector3(velocity),
            ),
            FollowType::All => (position, velocity),
            FollowType::PosOnly => (
                self.matrix_srt.transform_vector3(position),
                self.matrix_srt.transform_vector3(velocity),
            ),
        };

        let p = &res.particle;
        let base_scale = p.scale * (1.0 - p.scale_random * particle_random(seed, channel::SCALE));
        let rotation = degrees(p.rotation + p.rotation_random * rnd.signed_vec3());
        let rotation_velocity =
            degrees(p.rotation_velocity + p.rotation_velocity_random * rnd.signed_vec3());

        let mut particle = Particle {
            position,
            velocity,
            birth_time: self.time,
            life: anim.life * (1.0 - e.life_random * particle_random(seed, channel::LIFE)),
            seed,
            base_scale,
            scale: base_scale,
            rotation,
            rotation_velocity,
            base_color0: p.color0,
            base_color1: p.color1,
            color0: p.color0,
            color1: p.color1,
            birth_matrix: self.matrix_srt,
            generation: 0,
            parent: None,
        };
        if let Some(parent) = parent {
            inherit_parent_particle_info(&mut particle, parent);
        }
        apply_particle_curves(&mut particle, p, self.time);
        Some(particle)
    }
}

/// Copy the attributes a child particle takes from its parent, per the
/// parent's inherit flags. Position and velocity are world space.
pub fn inherit_parent_particle_info(particle: &mut Particle, parent: &ParentParticleInfo) {
    let inherit = &parent.inherit;
    if inherit.position {
        particle.position += parent.position;
    }
    if inherit.velocity {
        particle.velocity += parent.velocity * inherit.velocity_rate;
    }
    if inherit.color {
        particle.base_color0 = with_rgb(particle.base_color0, parent.color0);
        particle.base_color1 = with_rgb(particle.base_color1, parent.color1);
    }
    if inherit.alpha {
        particle.base_color0.a *= parent.color0.a;
        particle.base_color1.a *= parent.color1.a;
    }
    if inherit.scale {
        particle.base_scale *= parent.scale;
    }
    if inherit.rotation {
        particle.rotation = parent.rotation;
    }
    particle.parent = Some(parent.handle);
}

/// Take `from`'s rgb, keep `own` alpha
fn with_rgb(own: Color, from: Color) -> Color {
    Color::new(from.r, from.g, from.b, own.a)
}

fn degrees(v: Vec3) -> Vec3 {
    Vec3::new(v.x.to_radians(), v.y.to_radians(), v.z.to_radians())
}

/// Random direction within `half_angle` radians of `dir`, uniform over the
/// spherical cap
fn disperse(dir: Vec3, half_angle: f32, rnd: &mut RandomSource) -> Vec3 {
    if half_angle <= 0.0 {
        return dir;
    }
    let cos_t = 1.0 - rnd.next_f32() * (1.0 - half_angle.cos());
    let sin_t = (1.0 - cos_t * cos_t).max(0.0).sqrt();
    let phi = TAU * rnd.next_f32();
    let (t1, t2) = dir.any_orthonormal_pair();
    (dir * cos_t + (t1 * phi.cos() + t2 * phi.sin()) * sin_t).normalize_or_zero()
}
