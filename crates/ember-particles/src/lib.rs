//! Ember Particles - emitter calculation core
//!
//! Provides per-emitter particle simulation with:
//! - Sixteen emitter shapes and keyframe-animated emitter channels
//! - Fixed-capacity particle pools with search and ring-order slot reuse
//! - Force fields (position add, convergence, collision, spin, magnet,
//!   random, curl noise) applied in authored order
//! - Multi-buffered GPU attribute packing and per-emitter shader constants
//! - Draw-order sorting and a two-phase GPU compute path
//!
//! Per-frame work never fails; problems are accumulated as
//! [`ember_core::RuntimeWarning`] flags on the emitter and the system.

pub mod action;
pub mod anim;
pub mod buffer;
pub mod calc;
pub mod compute;
pub mod draw;
pub mod emitter;
pub mod field;
mod lifecycle;
pub mod particle;
pub mod rand;
pub mod resource;
pub mod shape;
pub mod system;

pub use action::{CustomAction, CustomActionContext};
pub use anim::{AnimKey, AnimTable, EmitterAnimValue, Interpolation};
pub use buffer::{BufferSwapMode, EmitterDynamicConstants};
pub use calc::{calculate_particle_behavior, BehaviorContext, EmitterCalculationResult, EmitterCalculator};
pub use compute::{ComputeDispatch, ComputeShader};
pub use draw::{sort_draw_order, CommandBuffer, DrawCall, DrawParameter, RecordingCommandBuffer};
pub use emitter::{EmitReservationInfo, Emitter, EmitterSet, EmitterState, ParentParticleInfo};
pub use field::{CurlNoiseTexture, FieldResource};
pub use lifecycle::inherit_parent_particle_info;
pub use particle::{Particle, ParticleAttribute, ParticleHandle};
pub use rand::{RandomSeedMode, RandomSource};
pub use resource::{CalcMode, EmitterResource, EmitterSetResource, FollowType, SortMode};
pub use shape::{evaluate_shape, PrimitiveMesh, ShapeContext, ShapeKind, ShapeResource};
pub use system::{ParticleSystem, SystemConfig};
