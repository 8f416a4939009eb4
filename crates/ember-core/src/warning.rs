//! Non-fatal runtime warning flags
//!
//! The simulation never fails mid-frame. Anything that goes wrong (capacity
//! exhaustion, misconfiguration, allocation failure) is OR-ed into a
//! `RuntimeWarning` set on the emitter and the owning system, where tooling can
//! inspect it.

use bitflags::bitflags;

bitflags! {
    /// Accumulated warning bits for an emitter or a whole particle system
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuntimeWarning: u32 {
        /// No free slot was found; emission was truncated
        const PARTICLE_EMISSION_FAILURE = 0x0001;
        /// A reserved manual emission found no free particle slot and was
        /// truncated
        const MANUAL_EMITTER_IS_FULL = 0x0002;
        /// A manual reservation was rejected because the reservation queue
        /// was full, or truncated to the per-request emit limit
        const MANUAL_EMIT_SIZE_OVER = 0x0004;
        /// The emitter was authored with a max particle count of zero
        const PARTICLE_MAX_COUNT_IS_ZERO = 0x0008;
        /// The emitter's shader could not be bound at draw time
        const NO_SHADER_EXISTS = 0x0010;
        /// A custom action id is set but its parameter block is missing
        const NO_CUSTOM_ACTION_PARAMETER = 0x0020;
        /// A CPU-side dynamic allocation failed
        const DYNAMIC_HEAP_ALLOCATION_FAILED = 0x0040;
        /// A GPU-visible buffer could not be allocated
        const GPU_BUFFER_ALLOCATION_FAILED = 0x0080;
        /// A per-frame scratch buffer could not be allocated
        const TEMPORARY_BUFFER_ALLOCATION_FAILED = 0x0100;
        /// Sort-order emission overwrote a particle that was still alive
        const PARTICLE_OVERWRITTEN = 0x0200;
    }
}

impl RuntimeWarning {
    /// Flag names in bit order, for logs and tool output
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}
