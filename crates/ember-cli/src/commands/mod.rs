//! CLI command implementations

pub mod draw;
pub mod inspect;
pub mod sample;
pub mod simulate;

use anyhow::{Context, Result};
use ember_particles::EmitterSetResource;

/// Load and validate an effect file
pub fn load_effect(path: &str) -> Result<EmitterSetResource> {
    let effect = EmitterSetResource::load(path)
        .with_context(|| format!("Failed to load effect '{}'", path))?;
    log::info!("loaded '{}' with {} emitter(s)", effect.name, effect.emitters.len());
    Ok(effect)
}
