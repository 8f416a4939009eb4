//! Ember Core - Foundational types for the Ember VFX engine
//!
//! This crate provides the core types that the other Ember crates depend on:
//! - `EmitterSetId` - Stable emitter set handles
//! - `RuntimeWarning` - Non-fatal runtime warning flags
//! - `Color`, `Srt` - Color and transform types on top of glam
//! - Spline helpers for smooth curve evaluation
//! - Error types and Result alias

mod error;
mod id;
pub mod spline;
mod types;
mod warning;

pub use error::{EmberError, Result};
pub use id::EmitterSetId;
pub use types::{Color, Srt};
pub use warning::RuntimeWarning;

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
