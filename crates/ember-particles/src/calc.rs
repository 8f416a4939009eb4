//! Per-frame emitter calculation: emission, integration, packing.

use crate::action::{BoundAction, CustomAction};
use crate::anim::{channel, AnimTable, EmitterAnimValue};
use crate::buffer::{BufferSwapMode, EmitterDynamicConstants};
use crate::emitter::{ChildFire, Emitter, EmitterState, ParentParticleInfo};
use crate::field::{apply_field, CurlNoiseTexture, FieldContext};
use crate::particle::{Particle, ParticleAttribute};
use crate::rand::RandomSource;
use crate::resource::{EmitterResource, FollowType, ParticleResource};
use ember_core::{Color, RuntimeWarning, Srt};
use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;
use std::sync::Arc;

/// What the owner should do with an emitter after a calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterCalculationResult {
    /// Keep calculating
    Alive,
    /// Emission finished this frame; the emitter is now fading
    Fade,
    /// Nothing left; the emitter is dead and may be dropped
    Kill,
}

/// Inputs to one particle's behavior step
#[derive(Debug, Clone, Copy)]
pub struct BehaviorContext<'a> {
    pub resource: &'a EmitterResource,
    pub anim: &'a EmitterAnimValue,
    /// Emitter time being evaluated, in frames
    pub time: f32,
    pub frame_rate: f32,
    /// Emitter origin in the particles' simulation space
    pub emitter_origin: Vec3,
    /// Emitter orientation in the particles' simulation space
    pub emitter_rotation: Quat,
    pub curl_noise: Option<&'a CurlNoiseTexture>,
}

/// Drives emitters frame by frame. Holds the registered custom actions;
/// all other state lives on the emitters, so one calculator can serve
/// emitters on several threads.
#[derive(Default)]
pub struct EmitterCalculator {
    actions: HashMap<u32, Box<dyn CustomAction>>,
}

impl EmitterCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action(&mut self, id: u32, action: Box<dyn CustomAction>) {
        self.actions.insert(id, action);
    }

    pub fn has_action(&self, id: u32) -> bool {
        self.actions.contains_key(&id)
    }

    /// Advance one emitter by `frame_rate` frames.
    ///
    /// `is_fade` moves the emitter to fading; `is_emission` allows new
    /// particles; `is_force_calc` runs a paused emitter anyway and, while
    /// fading, expires every particle at once.
    pub fn calculate(
        &self,
        emitter: &mut Emitter,
        frame_rate: f32,
        swap_mode: BufferSwapMode,
        is_fade: bool,
        is_emission: bool,
        is_force_calc: bool,
    ) -> EmitterCalculationResult {
        if emitter.state == EmitterState::Dead {
            return EmitterCalculationResult::Kill;
        }
        if is_fade {
            emitter.fade();
        }
        if emitter.paused && !is_force_calc {
            return EmitterCalculationResult::Alive;
        }

        let res = Arc::clone(&emitter.resource);
        let action = self.bind_action(emitter, &res);
        self.update_emitter_matrix(emitter);

        let force_expire = emitter.state == EmitterState::Fading && is_force_calc;
        if force_expire {
            emitter.pool.expire_all();
            emitter.reservations.clear();
        }

        emitter.emitted_last_frame = 0;
        if emitter.state == EmitterState::Emitting && is_emission {
            if !emitter.is_child {
                let count = emitter.try_emit_particle(frame_rate);
                emitter.emit_inner(count, false, None, None, action.as_ref());
            }
            while let Some(info) = emitter.reservations.pop_front() {
                emitter.emit_inner(info.count, true, Some(&info), None, action.as_ref());
            }
        }

        if !res.calc_mode.is_gpu() {
            self.calculate_particles(emitter, frame_rate, action.as_ref());
        }

        emit_children(emitter, frame_rate);
        for child in &mut emitter.children {
            self.calculate(
                &mut child.emitter,
                frame_rate,
                swap_mode,
                force_expire,
                is_emission,
                is_force_calc,
            );
        }

        self.pack_attributes(emitter, swap_mode);
        emitter.alive = emitter.pool.alive_count(emitter.time);
        emitter.constants = self.make_dynamic_constant_buffer(emitter, frame_rate);
        emitter.eval_time = emitter.time;
        log::trace!(
            "[particles] '{}' frame {} t={:.2} emitted={} alive={}",
            res.name,
            emitter.frame,
            emitter.time,
            emitter.emitted_last_frame,
            emitter.alive
        );
        emitter.time += frame_rate;
        emitter.frame += 1;

        match emitter.state {
            EmitterState::Emitting if emitter.emission_done => {
                emitter.fade();
                EmitterCalculationResult::Fade
            }
            EmitterState::Fading if emitter.total_alive() == 0 => {
                log::debug!("[particles] emitter '{}' finished", res.name);
                emitter.state = EmitterState::Dead;
                EmitterCalculationResult::Kill
            }
            _ => EmitterCalculationResult::Alive,
        }
    }

    /// Resolve the emitter's custom action. An action id without a
    /// parameter block raises `NO_CUSTOM_ACTION_PARAMETER` and binds nothing.
    fn bind_action<'a>(
        &'a self,
        emitter: &mut Emitter,
        res: &'a EmitterResource,
    ) -> Option<BoundAction<'a>> {
        let custom = res.custom_action.as_ref()?;
        let Some(params) = custom.params.as_deref() else {
            emitter.raise(RuntimeWarning::NO_CUSTOM_ACTION_PARAMETER);
            return None;
        };
        let action = self.actions.get(&custom.id)?;
        Some(BoundAction {
            action: action.as_ref(),
            params,
        })
    }

    /// Re-evaluate the emitter animation channels and rebuild the emitter
    /// SRT and RT matrices
    pub fn update_emitter_matrix(&self, emitter: &mut Emitter) {
        emitter.anim = EmitterAnimValue::evaluate(&emitter.resource, emitter.time);
        let local = Srt {
            scale: emitter.anim.scale,
            rotate: emitter.anim.rotate,
            translate: emitter.anim.translate,
        };
        emitter.matrix_srt = emitter.parent_matrix * local.to_matrix();
        let (_, rotation, translation) = emitter.matrix_srt.to_scale_rotation_translation();
        emitter.matrix_rt = Mat4::from_rotation_translation(rotation, translation);
    }

    /// Run the behavior step on every live particle. Returns the live count.
    pub(crate) fn calculate_particles(
        &self,
        emitter: &mut Emitter,
        frame_rate: f32,
        action: Option<&BoundAction<'_>>,
    ) -> usize {
        let res = Arc::clone(&emitter.resource);
        let time = emitter.time;
        let anim = emitter.anim;
        let (_, world_rotation, world_origin) = emitter.matrix_rt.to_scale_rotation_translation();
        let (origin, rotation) = match emitter.follow() {
            FollowType::None => (world_origin, world_rotation),
            FollowType::PosOnly => (Vec3::ZERO, world_rotation),
            FollowType::All => (Vec3::ZERO, Quat::IDENTITY),
        };
        let Emitter {
            pool,
            rng,
            curl_noise,
            ..
        } = emitter;
        let ctx = BehaviorContext {
            resource: &res,
            anim: &anim,
            time,
            frame_rate,
            emitter_origin: origin,
            emitter_rotation: rotation,
            curl_noise: curl_noise.as_deref(),
        };

        let mut alive = 0;
        for slot in 0..pool.high_water() {
            if !pool.slot(slot).is_alive(time) {
                continue;
            }
            let mut next = calculate_particle_behavior(&ctx, pool.slot(slot), rng);
            if let Some(bound) = action {
                let cb = bound.context(&res.name, time, slot);
                bound.action.on_particle_calc(&cb, &mut next);
            }
            if next.is_alive(time) {
                alive += 1;
            }
            *pool.slot_mut(slot) = next;
        }
        alive
    }

    /// Write every live particle into the emitter's next attribute buffer
    fn pack_attributes(&self, emitter: &mut Emitter, swap_mode: BufferSwapMode) {
        let time = emitter.time;
        let follow = emitter.follow();
        let m = emitter.matrix_srt;
        let count = emitter.pool.alive_count(time);

        let packed = {
            let Emitter {
                pool,
                attributes,
                packed_slots,
                ..
            } = &mut *emitter;
            match attributes.begin_write(swap_mode, count) {
                Some(buffer) => {
                    packed_slots.clear();
                    for (slot, p) in pool.alive(time) {
                        let (position, velocity) = world_space(follow, m, p);
                        buffer.push(ParticleAttribute::from_particle(p, position, velocity, time));
                        packed_slots.push(slot as u32);
                    }
                    attributes.commit();
                    true
                }
                None => false,
            }
        };
        if !packed {
            emitter.raise(RuntimeWarning::GPU_BUFFER_ALLOCATION_FAILED);
        }
        emitter.frame_ready = packed;
    }

    /// Emitter-wide shader constants for the current frame
    pub fn make_dynamic_constant_buffer(
        &self,
        emitter: &Emitter,
        frame_rate: f32,
    ) -> EmitterDynamicConstants {
        let a = &emitter.anim;
        let emitting = if emitter.state == EmitterState::Emitting {
            1.0
        } else {
            0.0
        };
        EmitterDynamicConstants {
            color0: [a.color0.r, a.color0.g, a.color0.b, a.color0.a * a.alpha0],
            color1: [a.color1.r, a.color1.g, a.color1.b, a.color1.a * a.alpha1],
            particle_scale: a.particle_scale.extend(a.gravity_scale).to_array(),
            time: [emitter.time, frame_rate, emitting, emitter.alive as f32],
            emitter_srt: emitter.matrix_srt.to_cols_array_2d(),
            emitter_rt: emitter.matrix_rt.to_cols_array_2d(),
            misc: [emitter.seed, emitter.attributes.generation() as u32, 0, 0],
        }
    }
}

/// One particle's step from `ctx.time` to `ctx.time + frame_rate`.
///
/// Gravity and air resistance act first, then every field in authored
/// order, then the position and rotation steps, then the life curves. A
/// particle of age zero is not moved, so a particle born this frame keeps
/// its initial state. With no random-consuming field the result depends
/// only on the inputs.
pub fn calculate_particle_behavior(
    ctx: &BehaviorContext<'_>,
    particle: &Particle,
    rng: &mut RandomSource,
) -> Particle {
    let mut p = particle.clone();
    let pr = &ctx.resource.particle;

    if p.age(ctx.time) > 0.0 {
        let fr = ctx.frame_rate;
        p.velocity += pr.gravity * ctx.anim.gravity_scale * fr;
        if pr.air_resist < 1.0 {
            p.velocity *= pr.air_resist.powf(fr);
        }

        let field_ctx = FieldContext {
            frame_rate: fr,
            time: ctx.time,
            emitter_origin: ctx.emitter_origin,
            emitter_rotation: ctx.emitter_rotation,
            curl_noise: ctx.curl_noise,
        };
        for field in &ctx.resource.fields {
            apply_field(field, &field_ctx, &mut p, rng);
            if p.life <= 0.0 {
                return p;
            }
        }

        p.position += p.velocity * fr;
        p.rotation += p.rotation_velocity * fr;
    }

    apply_particle_curves(&mut p, pr, ctx.time);
    p
}

/// Derive the particle's current scale and colors from its life curves
pub(crate) fn apply_particle_curves(p: &mut Particle, pr: &ParticleResource, time: f32) {
    let age = p.age(time);
    let sample = |table: &Option<AnimTable>, ch: u32| {
        table
            .as_ref()
            .map(|t| t.sample_particle(age, p.life, p.seed, ch))
    };

    p.scale = match sample(&pr.scale_anim, channel::SCALE) {
        Some(v) => p.base_scale * v.truncate(),
        None => p.base_scale,
    };

    let mut c0 = p.base_color0;
    if let Some(v) = sample(&pr.color0_anim, channel::COLOR0) {
        c0 = c0.modulate(&Color::from_vec4(v));
    }
    if let Some(v) = sample(&pr.alpha0_anim, channel::ALPHA0) {
        c0.a *= v.x;
    }
    let mut c1 = p.base_color1;
    if let Some(v) = sample(&pr.color1_anim, channel::COLOR1) {
        c1 = c1.modulate(&Color::from_vec4(v));
    }
    if let Some(v) = sample(&pr.alpha1_anim, channel::ALPHA1) {
        c1.a *= v.x;
    }
    p.color0 = c0;
    p.color1 = c1;
}

/// World-space position and velocity of a particle
pub(crate) fn world_space(follow: FollowType, m: Mat4, p: &Particle) -> (Vec3, Vec3) {
    match follow {
        FollowType::None => (p.position, p.velocity),
        FollowType::All => (m.transform_point3(p.position), m.transform_vector3(p.velocity)),
        FollowType::PosOnly => (p.position + m.w_axis.truncate(), p.velocity),
    }
}

/// Inverse of [`world_space`]
pub(crate) fn simulation_space(
    follow: FollowType,
    m: Mat4,
    position: Vec3,
    velocity: Vec3,
) -> (Vec3, Vec3) {
    match follow {
        FollowType::None => (position, velocity),
        FollowType::All => {
            let inv = m.inverse();
            (inv.transform_point3(position), inv.transform_vector3(velocity))
        }
        FollowType::PosOnly => (position - m.w_axis.truncate(), velocity),
    }
}

/// Fire child emitters from parent particles whose life ratio crosses the
/// child's timing during this frame, or whose repeat interval has elapsed
fn emit_children(emitter: &mut Emitter, frame_rate: f32) {
    if emitter.children.is_empty() {
        return;
    }
    let time = emitter.time;
    let follow = emitter.follow();
    let m = emitter.matrix_srt;
    let Emitter { pool, children, .. } = emitter;

    for child in children.iter_mut() {
        for (slot, p) in pool.alive(time) {
            let age = p.age(time);
            let fire = match child.fired[slot] {
                Some(prev) if prev.generation == p.generation => {
                    matches!(prev.next_age, Some(next) if age >= next)
                }
                _ => (age + frame_rate) / p.life >= child.emit_timing,
            };
            if !fire {
                continue;
            }
            child.fired[slot] = Some(ChildFire {
                generation: p.generation,
                next_age: child.emit_interval.map(|i| age + i),
            });

            let Some(parent) = pool.get(pool.handle(slot)) else {
                continue;
            };
            let (position, velocity) = world_space(follow, m, parent);
            let info = ParentParticleInfo {
                handle: pool.handle(slot),
                position,
                velocity,
                color0: parent.color0,
                color1: parent.color1,
                scale: parent.scale,
                rotation: parent.rotation,
                inherit: child.inherit.clone(),
            };
            child
                .emitter
                .emit_inner(child.emit_count, false, None, Some(&info), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::CustomActionContext;
    use crate::anim::{AnimKey, Interpolation};
    use crate::emitter::EmitReservationInfo;
    use crate::field::{CollisionField, CollisionResponse, FieldResource, SpinField};
    use crate::resource::{
        CalcMode, ChildEmitterResource, CustomActionResource, InheritResource, ManualEmitResource,
    };
    use crate::shape::ShapeKind;
    use glam::Vec4;

    const FR: f32 = 1.0;

    fn build(f: impl FnOnce(&mut EmitterResource)) -> Emitter {
        let mut res = EmitterResource::new("calc");
        res.max_particles = 100;
        f(&mut res);
        Emitter::new(Arc::new(res), 42, 42)
    }

    fn step(calc: &EmitterCalculator, e: &mut Emitter) -> EmitterCalculationResult {
        calc.calculate(e, FR, BufferSwapMode::Auto, false, true, false)
    }

    #[test]
    fn point_emitter_end_to_end() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.shape.kind = ShapeKind::Point;
            r.emission.rate = 10.0;
            r.emission.life = 5.0;
            r.emission.duration = Some(3.0);
        });

        let mut alive = Vec::new();
        let mut results = Vec::new();
        for _ in 0..8 {
            results.push(step(&calc, &mut e));
            alive.push(e.alive_count());
        }
        assert_eq!(&alive[..3], &[10, 20, 30]);
        assert_eq!(alive[7], 0);
        assert_eq!(results[3], EmitterCalculationResult::Fade);
        assert_eq!(results[7], EmitterCalculationResult::Kill);
        assert_eq!(e.state(), EmitterState::Dead);
        assert_eq!(e.emitted_total(), 30);
    }

    #[test]
    fn alive_count_never_exceeds_capacity() {
        let calc = EmitterCalculator::new();
        let mut rng = RandomSource::new(17);
        for round in 0..6 {
            let rate = rng.range(0.5, 30.0);
            let life = rng.range(1.0, 40.0);
            let mut e = build(|r| {
                r.max_particles = 16 + round * 7;
                r.emission.rate = rate;
                r.emission.life = life;
                r.emission.life_random = 0.5;
                if round % 2 == 1 {
                    r.emit_order = crate::resource::EmitOrder::SortOrder;
                }
            });
            for _ in 0..300 {
                step(&calc, &mut e);
                assert!(e.alive_count() <= e.capacity());
                assert_eq!(e.attributes().len(), e.alive_count());
            }
        }
    }

    fn behavior_fixture() -> (EmitterResource, Particle) {
        let mut res = EmitterResource::new("b");
        res.particle.gravity = Vec3::new(0.0, -0.1, 0.0);
        res.particle.air_resist = 0.9;
        res.particle.alpha0_anim = Some(AnimTable::linear(Vec4::ONE, Vec4::ZERO));
        res.fields.push(FieldResource::Spin(SpinField {
            rate: 10.0,
            ..Default::default()
        }));
        let p = Particle {
            position: Vec3::new(1.0, 2.0, 0.0),
            velocity: Vec3::new(0.5, 0.0, 0.0),
            life: 10.0,
            seed: 11,
            ..Particle::dead()
        };
        (res, p)
    }

    #[test]
    fn behavior_is_idempotent_without_random_fields() {
        let (res, p) = behavior_fixture();
        let anim = EmitterAnimValue::evaluate(&res, 3.0);
        let ctx = BehaviorContext {
            resource: &res,
            anim: &anim,
            time: 3.0,
            frame_rate: 1.0,
            emitter_origin: Vec3::ZERO,
            emitter_rotation: Quat::IDENTITY,
            curl_noise: None,
        };
        let a = calculate_particle_behavior(&ctx, &p, &mut RandomSource::new(1));
        let b = calculate_particle_behavior(&ctx, &p, &mut RandomSource::new(2));
        assert_eq!(a, b);
        assert_ne!(a.position, p.position);
        assert!((a.color0.a - 0.7).abs() < 1e-5);
    }

    #[test]
    fn age_zero_particles_do_not_move() {
        let (res, mut p) = behavior_fixture();
        p.birth_time = 3.0;
        let anim = EmitterAnimValue::evaluate(&res, 3.0);
        let ctx = BehaviorContext {
            resource: &res,
            anim: &anim,
            time: 3.0,
            frame_rate: 1.0,
            emitter_origin: Vec3::ZERO,
            emitter_rotation: Quat::IDENTITY,
            curl_noise: None,
        };
        let next = calculate_particle_behavior(&ctx, &p, &mut RandomSource::new(1));
        assert_eq!(next.position, p.position);
        assert_eq!(next.velocity, p.velocity);
    }

    #[test]
    fn collision_kill_stops_at_plane() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.max_particles = 1;
            r.emission.rate = 1.0;
            r.emission.total_limit = Some(1);
            r.emission.life = 100.0;
            r.transform = Srt::from_translation(Vec3::new(0.0, 3.0, 0.0));
            r.emission.designated_speed = -1.0;
            r.fields.push(FieldResource::Collision(CollisionField {
                height: 0.0,
                response: CollisionResponse::Kill,
                ..Default::default()
            }));
        });

        let mut killed_at = None;
        for frame in 0..10 {
            step(&calc, &mut e);
            let p = e.pool.slot(0);
            assert!(p.position.y >= -1.0 - 1e-5);
            if p.life == 0.0 && killed_at.is_none() {
                killed_at = Some(frame);
            }
        }
        // Born at y=3, moves 1 per frame: 2, 1, 0, then the step to -1 is cut
        assert_eq!(killed_at, Some(4));
        assert!(e.pool.slot(0).position.y >= 0.0);
    }

    #[test]
    fn fade_stops_emission_and_ages_out() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.emission.rate = 2.0;
            r.emission.life = 3.0;
        });
        step(&calc, &mut e);
        step(&calc, &mut e);
        assert_eq!(e.alive_count(), 4);

        let mut results = Vec::new();
        for _ in 0..3 {
            results.push(calc.calculate(&mut e, FR, BufferSwapMode::Auto, true, true, false));
        }
        assert_eq!(e.emitted_total(), 4);
        assert_eq!(results.last(), Some(&EmitterCalculationResult::Kill));
    }

    #[test]
    fn force_calc_while_fading_expires_everything() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.emission.rate = 5.0;
            r.emission.life = 50.0;
        });
        step(&calc, &mut e);
        let result = calc.calculate(&mut e, FR, BufferSwapMode::Auto, true, true, true);
        assert_eq!(result, EmitterCalculationResult::Kill);
        assert_eq!(e.alive_count(), 0);
    }

    #[test]
    fn paused_emitter_waits_unless_forced() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| r.emission.rate = 1.0);
        e.set_paused(true);
        step(&calc, &mut e);
        assert_eq!(e.time(), 0.0);
        assert_eq!(e.emitted_total(), 0);
        calc.calculate(&mut e, FR, BufferSwapMode::Auto, false, true, true);
        assert_eq!(e.time(), 1.0);
        assert_eq!(e.emitted_total(), 1);
    }

    #[test]
    fn follow_all_tracks_emitter_moves() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.follow = FollowType::All;
            r.emission.rate = 1.0;
            r.emission.total_limit = Some(1);
        });
        step(&calc, &mut e);
        e.set_parent_matrix(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        step(&calc, &mut e);
        assert!((e.attributes()[0].position().x - 10.0).abs() < 1e-5);

        let mut free = build(|r| {
            r.emission.rate = 1.0;
            r.emission.total_limit = Some(1);
        });
        step(&calc, &mut free);
        free.set_parent_matrix(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        step(&calc, &mut free);
        assert!(free.attributes()[0].position().x.abs() < 1e-5);
    }

    #[test]
    fn pos_only_follows_translation_but_not_rotation() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.follow = FollowType::PosOnly;
            r.emission.rate = 1.0;
            r.emission.total_limit = Some(1);
            r.transform.translate = Vec3::ZERO;
            r.shape.kind = ShapeKind::Line;
            r.shape.length = 0.0;
            r.shape.offset = Vec3::X;
        });
        step(&calc, &mut e);
        let turned = Mat4::from_rotation_translation(
            glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, 5.0, 0.0),
        );
        e.set_parent_matrix(turned);
        step(&calc, &mut e);
        let pos = e.attributes()[0].position();
        assert!((pos - Vec3::new(1.0, 5.0, 0.0)).length() < 1e-4, "{pos}");
    }

    #[test]
    fn spin_orbits_a_moved_and_turned_emitter() {
        let calc = EmitterCalculator::new();
        let origin = Vec3::new(10.0, 0.0, 0.0);
        let mut e = build(|r| {
            r.emission.rate = 1.0;
            r.emission.total_limit = Some(1);
            r.emission.life = 100.0;
            // Local Y, the spin axis, ends up on world X
            r.transform = Srt::from_translation(origin)
                .with_rotate(Vec3::new(0.0, 0.0, -std::f32::consts::FRAC_PI_2));
            r.shape.kind = ShapeKind::Line;
            r.shape.length = 0.0;
            r.shape.offset = Vec3::Z;
            r.fields.push(FieldResource::Spin(SpinField {
                rate: 90.0,
                ..Default::default()
            }));
        });

        step(&calc, &mut e);
        let start = e.attributes()[0].position();
        assert!((start - Vec3::new(10.0, 0.0, 1.0)).length() < 1e-4, "{start}");

        for _ in 0..3 {
            step(&calc, &mut e);
        }
        let pos = e.attributes()[0].position();
        assert!((pos.distance(origin) - 1.0).abs() < 1e-4, "{pos}");
        assert!((pos.x - origin.x).abs() < 1e-4, "{pos}");
        assert!((pos - Vec3::new(10.0, 1.0, 0.0)).length() < 1e-4, "{pos}");
    }

    #[test]
    fn gpu_mode_keeps_bookkeeping_but_skips_integration() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.calc_mode = CalcMode::Gpu;
            r.emission.rate = 3.0;
            r.emission.life = 10.0;
            r.emission.designated_speed = 1.0;
        });
        step(&calc, &mut e);
        step(&calc, &mut e);
        assert_eq!(e.alive_count(), 6);
        assert!(e.particles().all(|(_, p)| p.position == Vec3::ZERO));
    }

    #[test]
    fn child_emitters_fire_from_parent_particles() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.emission.rate = 2.0;
            r.emission.total_limit = Some(2);
            r.emission.life = 10.0;
            r.transform.translate = Vec3::new(0.0, 4.0, 0.0);
            r.children.push(ChildEmitterResource {
                emit_timing: 0.0,
                emit_count: 3,
                emit_interval: Some(2.0),
                inherit: InheritResource::default(),
                emitter: Box::new(EmitterResource {
                    max_particles: 64,
                    emission: crate::resource::EmissionResource {
                        life: 100.0,
                        ..Default::default()
                    },
                    ..EmitterResource::new("spark")
                }),
            });
        });

        step(&calc, &mut e);
        let child = e.children()[0].emitter();
        assert_eq!(child.alive_count(), 6);
        for (_, p) in child.particles() {
            assert!((p.position.y - 4.0).abs() < 1e-5);
            let handle = p.parent.unwrap();
            assert!(e.particle(handle).is_some());
        }

        step(&calc, &mut e);
        assert_eq!(e.children()[0].emitter().alive_count(), 6);
        step(&calc, &mut e);
        assert_eq!(e.children()[0].emitter().alive_count(), 12);
        assert_eq!(e.total_alive(), 14);
    }

    struct Tint;

    impl CustomAction for Tint {
        fn on_particle_emit(&self, ctx: &CustomActionContext<'_>, particle: &mut Particle) {
            particle.base_color0 = Color::new(ctx.params[0], 0.0, 0.0, 1.0);
        }

        fn on_particle_calc(&self, _ctx: &CustomActionContext<'_>, particle: &mut Particle) {
            particle.velocity = Vec3::Y;
        }
    }

    #[test]
    fn custom_action_runs_with_params() {
        let mut calc = EmitterCalculator::new();
        calc.register_action(7, Box::new(Tint));
        assert!(calc.has_action(7));
        let mut e = build(|r| {
            r.emission.rate = 1.0;
            r.custom_action = Some(CustomActionResource {
                id: 7,
                params: Some(vec![0.25]),
            });
        });
        step(&calc, &mut e);
        step(&calc, &mut e);
        let (_, first) = e.particles().next().unwrap();
        assert_eq!(first.base_color0.r, 0.25);
        assert_eq!(first.velocity, Vec3::Y);
    }

    #[test]
    fn custom_action_without_params_is_flagged() {
        let mut calc = EmitterCalculator::new();
        calc.register_action(7, Box::new(Tint));
        let mut e = build(|r| {
            r.emission.rate = 1.0;
            r.custom_action = Some(CustomActionResource { id: 7, params: None });
        });
        step(&calc, &mut e);
        assert!(e
            .warnings()
            .contains(RuntimeWarning::NO_CUSTOM_ACTION_PARAMETER));
        let (_, p) = e.particles().next().unwrap();
        assert_eq!(p.base_color0, Color::WHITE);
    }

    #[test]
    fn manual_reservations_emit_next_frame() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| r.manual = Some(ManualEmitResource::default()));
        step(&calc, &mut e);
        assert_eq!(e.alive_count(), 0);
        assert!(e.reserve_emission(EmitReservationInfo::new(4).at(Vec3::new(0.0, 1.0, 0.0))));
        step(&calc, &mut e);
        assert_eq!(e.alive_count(), 4);
        assert_eq!(e.pending_reservations(), 0);
        assert!(e.particles().all(|(_, p)| p.position.y == 1.0));
    }

    #[test]
    fn emission_rate_animation_drives_count() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.emission.life = 100.0;
            r.anim.emission_rate = Some(AnimTable::from_keys(
                vec![AnimKey::scalar(0.0, 0.0), AnimKey::scalar(2.0, 4.0)],
                Interpolation::Linear,
            ));
        });
        let counts: Vec<u32> = (0..4)
            .map(|_| {
                step(&calc, &mut e);
                e.emitted_last_frame()
            })
            .collect();
        assert_eq!(counts, vec![0, 2, 4, 4]);
    }

    #[test]
    fn constants_carry_emitter_state() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| {
            r.emission.rate = 3.0;
            r.color0 = Color::new(1.0, 0.5, 0.0, 1.0);
            r.alpha0 = 0.5;
            r.transform.translate = Vec3::new(1.0, 2.0, 3.0);
        });
        step(&calc, &mut e);
        let c = e.constants();
        assert_eq!(c.color0, [1.0, 0.5, 0.0, 0.5]);
        assert_eq!(c.time[0], 0.0);
        assert_eq!(c.time[2], 1.0);
        assert_eq!(c.time[3], 3.0);
        assert_eq!(c.emitter_srt[3][..3], [1.0, 2.0, 3.0]);
        assert_eq!(c.misc[1], 1);
    }

    #[test]
    fn auto_swap_alternates_write_buffer() {
        let calc = EmitterCalculator::new();
        let mut e = build(|r| r.emission.rate = 1.0);
        let mut seen = Vec::new();
        for _ in 0..4 {
            step(&calc, &mut e);
            seen.push(e.attributes.read_index());
        }
        assert_eq!(seen, vec![Some(0), Some(1), Some(0), Some(1)]);
    }

    #[test]
    fn space_conversions_invert() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::from_rotation_z(0.3),
            Vec3::new(1.0, -2.0, 0.5),
        );
        let p = Particle {
            position: Vec3::new(0.2, 0.4, -1.0),
            velocity: Vec3::new(1.0, 0.0, 0.0),
            ..Particle::dead()
        };
        for follow in [FollowType::None, FollowType::All, FollowType::PosOnly] {
            let (wp, wv) = world_space(follow, m, &p);
            let (sp, sv) = simulation_space(follow, m, wp, wv);
            assert!((sp - p.position).length() < 1e-4);
            assert!((sv - p.velocity).length() < 1e-4);
        }
    }
}
