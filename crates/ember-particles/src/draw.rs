//! Draw submission and per-frame draw ordering.
//!
//! Rendering itself belongs to the host. The calculator talks to it through
//! [`CommandBuffer`], so the same code drives a real renderer or the
//! [`RecordingCommandBuffer`] used by tools and tests.

use crate::buffer::EmitterDynamicConstants;
use crate::calc::EmitterCalculator;
use crate::compute::ComputeDispatch;
use crate::emitter::Emitter;
use crate::particle::ParticleAttribute;
use crate::resource::{BillboardType, BlendMode, SortMode};
use ember_core::RuntimeWarning;
use glam::Vec3;
use std::collections::{HashSet, TryReserveError};
use std::sync::Arc;

/// The host graphics layer as the particle system sees it
pub trait CommandBuffer {
    /// Make `name` current. Returns false when no such shader exists.
    fn bind_shader(&mut self, name: &str) -> bool;

    /// Upload the emitter's constant block for the next draw
    fn set_constants(&mut self, constants: &EmitterDynamicConstants);

    /// Issue one instanced draw with the bound shader
    fn draw_particles(&mut self, call: &DrawCall<'_>);

    /// Queue a compute dispatch. Returns false when the shader is missing.
    fn dispatch_compute(&mut self, dispatch: &ComputeDispatch<'_>) -> bool;

    /// Submit queued work
    fn flush(&mut self) {}
}

/// Per-draw inputs from the host
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawParameter {
    /// World-space camera position, used by depth sorting
    pub camera_position: Vec3,
    /// Opaque words forwarded to every draw call
    pub user_data: [f32; 4],
}

/// One emitter's draw
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub emitter: &'a str,
    pub attributes: &'a [ParticleAttribute],
    /// Record indices in draw order; `None` draws in buffer order
    pub order: Option<&'a [u32]>,
    pub billboard: BillboardType,
    pub blend: BlendMode,
    pub user_data: [f32; 4],
}

impl DrawCall<'_> {
    pub fn instance_count(&self) -> usize {
        self.attributes.len()
    }
}

impl EmitterCalculator {
    /// Draw an emitter and its children with each emitter's own shader.
    /// Returns true when at least one draw call was issued.
    pub fn draw(
        &self,
        cmd: &mut dyn CommandBuffer,
        emitter: &mut Emitter,
        param: &DrawParameter,
    ) -> bool {
        if !emitter.is_visible() {
            return false;
        }

        let mut drawn = false;
        if emitter.frame_ready && !emitter.attributes().is_empty() {
            let res = Arc::clone(&emitter.resource);
            if cmd.bind_shader(res.draw.shader_name()) {
                drawn = self.draw_emitter_using_bound_shader(cmd, emitter, param);
            } else {
                emitter.raise(RuntimeWarning::NO_SHADER_EXISTS);
            }
        }
        for child in &mut emitter.children {
            drawn |= self.draw(cmd, &mut child.emitter, param);
        }
        drawn
    }

    /// Draw with whatever shader the caller already bound. Children are not
    /// drawn. Returns false when there was nothing to draw.
    pub fn draw_emitter_using_bound_shader(
        &self,
        cmd: &mut dyn CommandBuffer,
        emitter: &mut Emitter,
        param: &DrawParameter,
    ) -> bool {
        if !emitter.frame_ready || emitter.attributes().is_empty() {
            return false;
        }
        let res = Arc::clone(&emitter.resource);
        let order = match sort_draw_order(res.draw.sort, emitter.attributes(), param.camera_position) {
            Ok(order) => order,
            Err(_) => {
                emitter.raise(RuntimeWarning::TEMPORARY_BUFFER_ALLOCATION_FAILED);
                None
            }
        };

        cmd.set_constants(&emitter.constants);
        cmd.draw_particles(&DrawCall {
            emitter: &res.name,
            attributes: emitter.attributes(),
            order: order.as_deref(),
            billboard: res.draw.billboard,
            blend: res.draw.blend,
            user_data: param.user_data,
        });
        true
    }
}

/// Draw order of `attributes` under `mode`, `None` for buffer order.
///
/// The sort is stable, so equal keys keep buffer order. Ascending draws the
/// oldest particle first, descending the newest, and depth sorting the
/// farthest from the camera.
pub fn sort_draw_order(
    mode: SortMode,
    attributes: &[ParticleAttribute],
    camera: Vec3,
) -> Result<Option<Vec<u32>>, TryReserveError> {
    if mode == SortMode::NoSort {
        return Ok(None);
    }
    let mut order: Vec<u32> = Vec::new();
    order.try_reserve_exact(attributes.len())?;
    order.extend(0..attributes.len() as u32);

    let birth = |i: u32| attributes[i as usize].birth_time();
    let depth = |i: u32| attributes[i as usize].position().distance_squared(camera);
    match mode {
        SortMode::NoSort => {}
        SortMode::Ascending => order.sort_by(|&a, &b| birth(a).total_cmp(&birth(b))),
        SortMode::Descending => order.sort_by(|&a, &b| birth(b).total_cmp(&birth(a))),
        SortMode::ZSort => order.sort_by(|&a, &b| depth(b).total_cmp(&depth(a))),
    }
    Ok(Some(order))
}

/// A draw captured by [`RecordingCommandBuffer`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub emitter: String,
    pub shader: Option<String>,
    pub instances: usize,
    pub order: Option<Vec<u32>>,
    pub blend: BlendMode,
    pub positions: Vec<Vec3>,
}

/// A dispatch captured by [`RecordingCommandBuffer`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDispatch {
    pub emitter: String,
    pub shader: String,
    pub groups: u32,
    pub particle_count: u32,
    pub global_offset: u32,
    pub generation: u64,
    pub stream_out: bool,
}

/// Command buffer that records what it is asked to do
#[derive(Debug, Clone, Default)]
pub struct RecordingCommandBuffer {
    shaders: HashSet<String>,
    bound: Option<String>,
    pub draws: Vec<RecordedDraw>,
    pub dispatches: Vec<RecordedDispatch>,
    pub constants: Vec<EmitterDynamicConstants>,
    pub flushes: usize,
}

impl RecordingCommandBuffer {
    /// A buffer that knows the given shader names
    pub fn new<I, S>(shaders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shaders: shaders.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn add_shader(&mut self, name: impl Into<String>) {
        self.shaders.insert(name.into());
    }
}

impl CommandBuffer for RecordingCommandBuffer {
    fn bind_shader(&mut self, name: &str) -> bool {
        if self.shaders.contains(name) {
            self.bound = Some(name.to_string());
            true
        } else {
            false
        }
    }

    fn set_constants(&mut self, constants: &EmitterDynamicConstants) {
        self.constants.push(*constants);
    }

    fn draw_particles(&mut self, call: &DrawCall<'_>) {
        let positions = match call.order {
            Some(order) => order
                .iter()
                .map(|&i| call.attributes[i as usize].position())
                .collect(),
            None => call.attributes.iter().map(|a| a.position()).collect(),
        };
        self.draws.push(RecordedDraw {
            emitter: call.emitter.to_string(),
            shader: self.bound.clone(),
            instances: call.instance_count(),
            order: call.order.map(<[u32]>::to_vec),
            blend: call.blend,
            positions,
        });
    }

    fn dispatch_compute(&mut self, dispatch: &ComputeDispatch<'_>) -> bool {
        if !self.shaders.contains(&dispatch.shader.name) {
            return false;
        }
        self.dispatches.push(RecordedDispatch {
            emitter: dispatch.emitter.to_string(),
            shader: dispatch.shader.name.clone(),
            groups: dispatch.groups,
            particle_count: dispatch.particle_count,
            global_offset: dispatch.global_offset,
            generation: dispatch.generation,
            stream_out: dispatch.stream_out,
        });
        true
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
