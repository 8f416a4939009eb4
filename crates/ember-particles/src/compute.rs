//! GPU compute path.
//!
//! A dispatch is two-phase: [`EmitterCalculator::calculate_compute_shader`]
//! records work against the attribute buffer published by the last
//! calculation, and [`EmitterCalculator::collect_compute_results`] folds the
//! stream-out results back into the pool. Results tagged with a buffer
//! generation that is no longer current are dropped.

use crate::buffer::EmitterDynamicConstants;
use crate::calc::{simulation_space, EmitterCalculator};
use crate::draw::CommandBuffer;
use crate::emitter::Emitter;
use crate::particle::{ParticleAttribute, ParticleHandle};
use crate::resource::CalcMode;
use ember_core::RuntimeWarning;
use serde::{Deserialize, Serialize};

/// A compute program the host can run over particle attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeShader {
    pub name: String,
    /// Threads per workgroup
    pub group_size: u32,
}

impl ComputeShader {
    pub fn new(name: impl Into<String>, group_size: u32) -> Self {
        Self {
            name: name.into(),
            group_size: group_size.max(1),
        }
    }

    /// Workgroups needed to cover `count` particles
    pub fn group_count(&self, count: u32) -> u32 {
        count.div_ceil(self.group_size.max(1))
    }
}

/// One emitter's compute work
#[derive(Debug, Clone, Copy)]
pub struct ComputeDispatch<'a> {
    pub shader: &'a ComputeShader,
    pub emitter: &'a str,
    pub groups: u32,
    pub particle_count: u32,
    /// Offset of this emitter's records in the frame-wide output buffer
    pub global_offset: u32,
    /// Attribute buffer generation the dispatch reads
    pub generation: u64,
    /// Results must be handed back through `collect_compute_results`
    pub stream_out: bool,
    pub constants: &'a EmitterDynamicConstants,
    pub attributes: &'a [ParticleAttribute],
}

#[derive(Debug)]
struct PendingDispatch {
    generation: u64,
    handles: Vec<ParticleHandle>,
}

/// Per-emitter bookkeeping between dispatch and collection
#[derive(Debug, Default)]
pub struct ComputeState {
    pending: Option<PendingDispatch>,
}

impl ComputeState {
    /// Generation of the dispatch awaiting results, if any
    pub fn pending_generation(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.generation)
    }
}

impl EmitterCalculator {
    /// Record a compute dispatch for a GPU-mode emitter and its children.
    ///
    /// `global_counter` is the running record offset across every emitter
    /// dispatched this frame and is advanced by the particles dispatched.
    /// Returns true when at least one dispatch was recorded.
    pub fn calculate_compute_shader(
        &self,
        cmd: &mut dyn CommandBuffer,
        emitter: &mut Emitter,
        shader: Option<&ComputeShader>,
        global_counter: &mut u32,
        do_compute: bool,
        do_flush: bool,
    ) -> bool {
        if !do_compute {
            return false;
        }
        let mut dispatched = self.dispatch_one(cmd, emitter, shader, global_counter);
        for child in &mut emitter.children {
            dispatched |=
                self.calculate_compute_shader(cmd, &mut child.emitter, shader, global_counter, true, false);
        }
        if dispatched && do_flush {
            cmd.flush();
        }
        dispatched
    }

    fn dispatch_one(
        &self,
        cmd: &mut dyn CommandBuffer,
        emitter: &mut Emitter,
        shader: Option<&ComputeShader>,
        global_counter: &mut u32,
    ) -> bool {
        let mode = emitter.resource.calc_mode;
        if !mode.is_gpu() || !emitter.frame_ready || emitter.attributes().is_empty() {
            return false;
        }
        let Some(shader) = shader else {
            emitter.raise(RuntimeWarning::NO_SHADER_EXISTS);
            return false;
        };

        let stream_out = mode == CalcMode::GpuStreamOut;
        let mut handles = Vec::new();
        if stream_out {
            if handles.try_reserve_exact(emitter.packed_slots.len()).is_err() {
                emitter.raise(RuntimeWarning::TEMPORARY_BUFFER_ALLOCATION_FAILED);
                return false;
            }
            handles.extend(
                emitter
                    .packed_slots
                    .iter()
                    .map(|&slot| emitter.pool.handle(slot as usize)),
            );
        }

        let count = emitter.attributes().len() as u32;
        let generation = emitter.attributes.generation();
        let accepted = cmd.dispatch_compute(&ComputeDispatch {
            shader,
            emitter: &emitter.resource.name,
            groups: shader.group_count(count),
            particle_count: count,
            global_offset: *global_counter,
            generation,
            stream_out,
            constants: &emitter.constants,
            attributes: emitter.attributes(),
        });
        if !accepted {
            emitter.raise(RuntimeWarning::NO_SHADER_EXISTS);
            return false;
        }

        log::trace!(
            "[particles] dispatched '{}' for '{}': {} particles, gen {}",
            shader.name,
            emitter.resource.name,
            count,
            generation
        );
        *global_counter += count;
        emitter.compute.pending = stream_out.then_some(PendingDispatch {
            generation,
            handles,
        });
        true
    }

    /// Fold stream-out results for `generation` back into the emitter.
    ///
    /// `results` holds one record per dispatched particle, in dispatch
    /// order. Results for a stale generation, or of the wrong length, are
    /// ignored. Particles whose slot was reused since the dispatch are
    /// skipped. Returns true when the results were applied.
    pub fn collect_compute_results(
        &self,
        emitter: &mut Emitter,
        generation: u64,
        results: &[ParticleAttribute],
    ) -> bool {
        let current = emitter.attributes.generation();
        let matches = emitter
            .compute
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation && generation == current);
        if !matches {
            log::debug!(
                "[particles] dropping compute results for '{}': gen {} (current {})",
                emitter.resource.name,
                generation,
                current
            );
            if emitter.compute.pending_generation().is_some_and(|g| g < current) {
                emitter.compute.pending = None;
            }
            return false;
        }
        let Some(pending) = emitter.compute.pending.take() else {
            return false;
        };
        if pending.handles.len() != results.len() {
            return false;
        }

        let follow = emitter.follow();
        let m = emitter.matrix_srt;
        for (handle, record) in pending.handles.iter().zip(results) {
            if emitter.pool.handle(handle.index as usize) != *handle {
                continue;
            }
            let (position, velocity) =
                simulation_space(follow, m, record.position(), record.velocity());
            let p = emitter.pool.slot_mut(handle.index as usize);
            p.position = position;
            p.velocity = velocity;
        }
        true
    }
}
