//! Emitter runtime state and emitter sets

use crate::anim::EmitterAnimValue;
use crate::buffer::{EmitterDynamicConstants, MultiBuffer};
use crate::compute::ComputeState;
use crate::field::CurlNoiseTexture;
use crate::particle::{Particle, ParticleAttribute, ParticleHandle, ParticlePool};
use crate::rand::{RandomSeedMode, RandomSource};
use crate::resource::{EmitterResource, EmitterSetResource, FollowType, InheritResource};
use crate::shape::PrimitiveMesh;
use ember_core::{Color, EmitterSetId, RuntimeWarning};
use glam::{Mat4, Vec3};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Emitter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    /// Emitting new particles and integrating existing ones
    Emitting,
    /// No new particles; existing ones age out
    Fading,
    /// Terminal; the owner may drop the emitter
    Dead,
}

/// One manual emission request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmitReservationInfo {
    pub count: u32,
    /// Emitter-local position replacing the shape's sample
    pub position: Option<Vec3>,
    /// Emitter-local velocity replacing the shape's velocity
    pub velocity: Option<Vec3>,
}

impl EmitReservationInfo {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = Some(velocity);
        self
    }
}

/// Snapshot of a parent particle handed to a child emission
#[derive(Debug, Clone)]
pub struct ParentParticleInfo {
    pub handle: ParticleHandle,
    /// World-space position and velocity
    pub position: Vec3,
    pub velocity: Vec3,
    pub color0: Color,
    pub color1: Color,
    pub scale: Vec3,
    pub rotation: Vec3,
    pub inherit: InheritResource,
}

/// Per parent slot: which particle fired last and when it fires next
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChildFire {
    pub generation: u32,
    pub next_age: Option<f32>,
}

/// A child emitter attached to its parent's particles
#[derive(Debug)]
pub struct ChildEmitter {
    pub(crate) emitter: Emitter,
    pub(crate) emit_timing: f32,
    pub(crate) emit_count: u32,
    pub(crate) emit_interval: Option<f32>,
    pub(crate) inherit: InheritResource,
    pub(crate) fired: Vec<Option<ChildFire>>,
}

impl ChildEmitter {
    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }
}

/// A running instance of one [`EmitterResource`]
#[derive(Debug)]
pub struct Emitter {
    pub(crate) resource: Arc<EmitterResource>,
    pub(crate) state: EmitterState,
    /// Current emitter time in frames
    pub(crate) time: f32,
    /// Time the last calculation evaluated particles at
    pub(crate) eval_time: f32,
    pub(crate) frame: u64,
    pub(crate) seed: u32,
    pub(crate) rng: RandomSource,
    pub(crate) pool: ParticlePool,
    pub(crate) emit_saving: f32,
    pub(crate) interval_counter: f32,
    pub(crate) emitted_total: u64,
    /// Particles requested against `emission.total_limit`
    pub(crate) requested_total: u64,
    pub(crate) emitted_last_frame: u32,
    pub(crate) emission_done: bool,
    pub(crate) alive: usize,
    pub(crate) anim: EmitterAnimValue,
    pub(crate) parent_matrix: Mat4,
    pub(crate) matrix_srt: Mat4,
    pub(crate) matrix_rt: Mat4,
    pub(crate) attributes: MultiBuffer<ParticleAttribute>,
    /// Pool slot of each record in the published attribute buffer
    pub(crate) packed_slots: Vec<u32>,
    pub(crate) frame_ready: bool,
    pub(crate) constants: EmitterDynamicConstants,
    pub(crate) warnings: RuntimeWarning,
    pub(crate) reservations: VecDeque<EmitReservationInfo>,
    pub(crate) children: Vec<ChildEmitter>,
    pub(crate) curl_noise: Option<Arc<CurlNoiseTexture>>,
    pub(crate) primitive: Option<Arc<PrimitiveMesh>>,
    pub(crate) primitive_cursor: u32,
    pub(crate) paused: bool,
    pub(crate) visible: bool,
    pub(crate) is_child: bool,
    pub(crate) compute: ComputeState,
}

impl Emitter {
    /// Build an emitter and its children. `set_seed` is the shared seed of
    /// the owning emitter set.
    pub fn new(resource: Arc<EmitterResource>, seed: u32, set_seed: u32) -> Self {
        let mut emitter = Self::build(resource, seed, false);
        emitter.attach_children(set_seed);
        emitter
    }

    fn build(resource: Arc<EmitterResource>, seed: u32, is_child: bool) -> Self {
        let mut warnings = RuntimeWarning::empty();
        let capacity = resource.max_particles as usize;
        let pool = match ParticlePool::try_new(capacity) {
            Some(pool) => pool,
            None => {
                warnings |= RuntimeWarning::DYNAMIC_HEAP_ALLOCATION_FAILED;
                ParticlePool::empty()
            }
        };
        if capacity == 0 {
            warnings |= RuntimeWarning::PARTICLE_MAX_COUNT_IS_ZERO;
        }
        if !warnings.is_empty() {
            log::warn!(
                "[particles] emitter '{}': {}",
                resource.name,
                warnings.names().join(", ")
            );
        }

        let matrix = resource.transform.to_matrix();
        Self {
            state: EmitterState::Emitting,
            time: 0.0,
            eval_time: 0.0,
            frame: 0,
            seed,
            rng: RandomSource::new(seed),
            pool,
            emit_saving: 0.0,
            interval_counter: 0.0,
            emitted_total: 0,
            requested_total: 0,
            emitted_last_frame: 0,
            emission_done: false,
            alive: 0,
            anim: EmitterAnimValue::evaluate(&resource, 0.0),
            parent_matrix: Mat4::IDENTITY,
            matrix_srt: matrix,
            matrix_rt: resource.transform.to_rt_matrix(),
            attributes: MultiBuffer::new(resource.buffer_count),
            packed_slots: Vec::new(),
            frame_ready: false,
            constants: EmitterDynamicConstants::default(),
            warnings,
            reservations: VecDeque::new(),
            children: Vec::new(),
            curl_noise: None,
            primitive: None,
            primitive_cursor: 0,
            paused: false,
            visible: true,
            is_child,
            compute: ComputeState::default(),
            resource,
        }
    }

    fn attach_children(&mut self, set_seed: u32) {
        let capacity = self.pool.capacity();
        let children = self
            .resource
            .children
            .iter()
            .map(|child| {
                let res = Arc::new((*child.emitter).clone());
                let seed = resolve_seed(res.random_seed, &mut self.rng, set_seed);
                let mut emitter = Self::build(res, seed, true);
                emitter.attach_children(set_seed);
                ChildEmitter {
                    emitter,
                    emit_timing: child.emit_timing,
                    emit_count: child.emit_count,
                    emit_interval: child.emit_interval,
                    inherit: child.inherit.clone(),
                    fired: vec![None; capacity],
                }
            })
            .collect();
        self.children = children;
    }

    /// Bind externally owned resources, here and in every child
    pub fn bind_resources(
        &mut self,
        curl_noise: Option<&Arc<CurlNoiseTexture>>,
        primitives: &HashMap<String, Arc<PrimitiveMesh>>,
    ) {
        self.curl_noise = curl_noise.cloned();
        self.primitive = self
            .resource
            .shape
            .primitive
            .as_ref()
            .and_then(|name| primitives.get(name))
            .cloned();
        for child in &mut self.children {
            child.emitter.bind_resources(curl_noise, primitives);
        }
    }

    pub fn name(&self) -> &str {
        &self.resource.name
    }

    pub fn resource(&self) -> &EmitterResource {
        &self.resource
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Live particles at the last calculation
    pub fn alive_count(&self) -> usize {
        self.alive
    }

    /// Live particles here and in every child emitter
    pub fn total_alive(&self) -> usize {
        self.alive
            + self
                .children
                .iter()
                .map(|c| c.emitter.total_alive())
                .sum::<usize>()
    }

    /// One past the highest pool slot ever used
    pub fn high_water(&self) -> usize {
        self.pool.high_water()
    }

    pub fn emitted_total(&self) -> u64 {
        self.emitted_total
    }

    pub fn emitted_last_frame(&self) -> u32 {
        self.emitted_last_frame
    }

    pub fn is_emission_done(&self) -> bool {
        self.emission_done
    }

    /// Accumulated warnings of this emitter and its children
    pub fn warnings(&self) -> RuntimeWarning {
        self.children
            .iter()
            .fold(self.warnings, |acc, c| acc | c.emitter.warnings())
    }

    pub fn children(&self) -> &[ChildEmitter] {
        &self.children
    }

    pub fn anim(&self) -> &EmitterAnimValue {
        &self.anim
    }

    pub fn matrix_srt(&self) -> Mat4 {
        self.matrix_srt
    }

    pub fn matrix_rt(&self) -> Mat4 {
        self.matrix_rt
    }

    /// The attribute buffer published by the last calculation
    pub fn attributes(&self) -> &[ParticleAttribute] {
        self.attributes.read()
    }

    pub fn constants(&self) -> &EmitterDynamicConstants {
        &self.constants
    }

    /// Particles alive at the last calculation, with their pool slots
    pub fn particles(&self) -> impl Iterator<Item = (usize, &Particle)> {
        self.pool.alive(self.eval_time)
    }

    pub fn particle(&self, handle: ParticleHandle) -> Option<&Particle> {
        self.pool.get(handle)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_visible(&self) -> bool {
        self.visible && self.resource.draw.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Follow policy in effect; child particles always live in world space
    pub fn follow(&self) -> FollowType {
        if self.is_child {
            FollowType::None
        } else {
            self.resource.follow
        }
    }

    /// Transform from the owning emitter set
    pub fn set_parent_matrix(&mut self, matrix: Mat4) {
        self.parent_matrix = matrix;
    }

    /// Stop emitting; existing particles keep aging
    pub fn fade(&mut self) {
        if self.state == EmitterState::Emitting {
            log::debug!("[particles] emitter '{}' fading", self.name());
            self.state = EmitterState::Fading;
        }
    }

    /// Drop every particle and mark the emitter dead
    pub fn kill(&mut self) {
        self.pool.expire_all();
        self.alive = 0;
        self.state = EmitterState::Dead;
        for child in &mut self.children {
            child.emitter.kill();
        }
    }

    /// Queue a manual emission for the next calculation.
    ///
    /// Requests beyond the reservation capacity are rejected, and counts
    /// above the per-request limit are truncated; both raise
    /// `MANUAL_EMIT_SIZE_OVER`.
    pub fn reserve_emission(&mut self, mut info: EmitReservationInfo) -> bool {
        if self.state != EmitterState::Emitting {
            return false;
        }
        let limits = self.resource.manual.clone().unwrap_or_default();
        if self.reservations.len() >= limits.reservation_capacity {
            self.raise(RuntimeWarning::MANUAL_EMIT_SIZE_OVER);
            return false;
        }
        if info.count > limits.max_emit_count {
            self.raise(RuntimeWarning::MANUAL_EMIT_SIZE_OVER);
            info.count = limits.max_emit_count;
        }
        self.reservations.push_back(info);
        true
    }

    pub fn pending_reservations(&self) -> usize {
        self.reservations.len()
    }

    /// Record warnings, logging each flag the first time it appears
    pub(crate) fn raise(&mut self, warning: RuntimeWarning) {
        let new = warning - self.warnings;
        if !new.is_empty() {
            log::warn!(
                "[particles] emitter '{}': {}",
                self.resource.name,
                new.names().join(", ")
            );
        }
        self.warnings |= warning;
    }
}

/// Pick an emitter's seed from its seed mode
pub(crate) fn resolve_seed(mode: RandomSeedMode, source: &mut RandomSource, set_seed: u32) -> u32 {
    match mode {
        RandomSeedMode::PerEmitter => source.next_u32(),
        RandomSeedMode::EmitterSetShared => set_seed,
        RandomSeedMode::Fixed(seed) => seed,
    }
}

/// Emitters created, faded and killed together
#[derive(Debug)]
pub struct EmitterSet {
    id: EmitterSetId,
    name: String,
    seed: u32,
    matrix: Mat4,
    fading: bool,
    pub(crate) emitters: Vec<Emitter>,
}

impl EmitterSet {
    /// Instantiate every emitter of `resource`. Per-emitter seeds are drawn
    /// from `seeds` in emitter order.
    pub fn new(
        id: EmitterSetId,
        resource: &EmitterSetResource,
        matrix: Mat4,
        seeds: &mut RandomSource,
    ) -> Self {
        let seed = seeds.next_u32();
        let emitters = resource
            .emitters
            .iter()
            .map(|res| {
                let emitter_seed = resolve_seed(res.random_seed, seeds, seed);
                let mut emitter = Emitter::new(Arc::new(res.clone()), emitter_seed, seed);
                emitter.set_parent_matrix(matrix);
                emitter
            })
            .collect();
        Self {
            id,
            name: resource.name.clone(),
            seed,
            matrix,
            fading: false,
            emitters,
        }
    }

    pub fn id(&self) -> EmitterSetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.matrix = matrix;
        for emitter in &mut self.emitters {
            emitter.set_parent_matrix(matrix);
        }
    }

    pub fn is_fading(&self) -> bool {
        self.fading
    }

    pub fn fade(&mut self) {
        self.fading = true;
        for emitter in &mut self.emitters {
            emitter.fade();
        }
    }

    pub fn kill(&mut self) {
        for emitter in &mut self.emitters {
            emitter.kill();
        }
        self.emitters.clear();
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    pub fn emitters_mut(&mut self) -> &mut [Emitter] {
        &mut self.emitters
    }

    pub fn emitter(&self, name: &str) -> Option<&Emitter> {
        self.emitters.iter().find(|e| e.name() == name)
    }

    pub fn emitter_mut(&mut self, name: &str) -> Option<&mut Emitter> {
        self.emitters.iter_mut().find(|e| e.name() == name)
    }

    pub fn alive_count(&self) -> usize {
        self.emitters.iter().map(|e| e.total_alive()).sum()
    }

    /// No emitters left
    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn warnings(&self) -> RuntimeWarning {
        self.emitters
            .iter()
            .fold(RuntimeWarning::empty(), |acc, e| acc | e.warnings())
    }
}
