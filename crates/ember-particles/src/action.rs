//! User callbacks hooked into particle emission and simulation

use crate::particle::Particle;

/// What a callback sees besides the particle itself
#[derive(Debug, Clone, Copy)]
pub struct CustomActionContext<'a> {
    pub emitter: &'a str,
    /// Emitter time in frames
    pub time: f32,
    pub slot: usize,
    /// The emitter's authored parameter block
    pub params: &'a [f32],
}

/// Callbacks registered on the system under a numeric id and selected by
/// an emitter's `custom_action.id`.
pub trait CustomAction: Send + Sync {
    /// Runs after a particle is initialized, before it is stored
    fn on_particle_emit(&self, _ctx: &CustomActionContext<'_>, _particle: &mut Particle) {}

    /// Runs after a particle's behavior step each frame
    fn on_particle_calc(&self, _ctx: &CustomActionContext<'_>, _particle: &mut Particle) {}
}

/// A registered action resolved against one emitter's parameters
#[derive(Clone, Copy)]
pub(crate) struct BoundAction<'a> {
    pub action: &'a dyn CustomAction,
    pub params: &'a [f32],
}

impl BoundAction<'_> {
    pub fn context<'b>(&'b self, emitter: &'b str, time: f32, slot: usize) -> CustomActionContext<'b> {
        CustomActionContext {
            emitter,
            time,
            slot,
            params: self.params,
        }
    }
}
