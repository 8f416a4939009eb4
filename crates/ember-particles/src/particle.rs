//! Particle types: CPU simulation state, the fixed-slot pool and GPU attribute data

use bytemuck::{Pod, Zeroable};
use ember_core::Color;
use glam::{Mat4, Vec3};

/// Weak reference to a particle slot. Stale once the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleHandle {
    pub index: u32,
    pub generation: u32,
}

/// CPU-side particle state
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Simulation-space position (world, emitter-local or rotated-local
    /// depending on the emitter's follow type)
    pub position: Vec3,
    pub velocity: Vec3,
    /// Emitter time of birth, in frames
    pub birth_time: f32,
    /// Life in frames; zero means dead
    pub life: f32,
    pub seed: u32,
    /// Scale at birth; curves multiply it
    pub base_scale: Vec3,
    pub scale: Vec3,
    /// Euler XYZ radians
    pub rotation: Vec3,
    pub rotation_velocity: Vec3,
    pub base_color0: Color,
    pub base_color1: Color,
    pub color0: Color,
    pub color1: Color,
    /// Emitter matrix at birth
    pub birth_matrix: Mat4,
    /// Bumped each time the slot is written
    pub generation: u32,
    pub parent: Option<ParticleHandle>,
}

impl Particle {
    pub fn dead() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            birth_time: 0.0,
            life: 0.0,
            seed: 0,
            base_scale: Vec3::ONE,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
            rotation_velocity: Vec3::ZERO,
            base_color0: Color::WHITE,
            base_color1: Color::WHITE,
            color0: Color::WHITE,
            color1: Color::WHITE,
            birth_matrix: Mat4::IDENTITY,
            generation: 0,
            parent: None,
        }
    }

    /// Alive while `birth_time <= time < birth_time + life`
    pub fn is_alive(&self, time: f32) -> bool {
        self.life > 0.0 && self.birth_time <= time && time < self.birth_time + self.life
    }

    pub fn age(&self, time: f32) -> f32 {
        time - self.birth_time
    }

    /// Normalized age in [0, 1]
    pub fn life_ratio(&self, time: f32) -> f32 {
        if self.life <= 0.0 {
            1.0
        } else {
            (self.age(time) / self.life).clamp(0.0, 1.0)
        }
    }
}

/// Fixed-capacity slot pool. Slots are never freed, only overwritten once
/// their particle has died, so indices stay stable for a particle's life.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    particles: Vec<Particle>,
    /// One past the highest slot ever written
    high_water: usize,
    /// Next slot for ring-order emission
    sort_cursor: usize,
}

impl ParticlePool {
    /// Allocate every slot up front. Returns `None` if the allocation fails.
    pub fn try_new(capacity: usize) -> Option<Self> {
        let mut particles = Vec::new();
        particles.try_reserve_exact(capacity).ok()?;
        particles.resize(capacity, Particle::dead());
        Some(Self {
            particles,
            high_water: 0,
            sort_cursor: 0,
        })
    }

    pub fn empty() -> Self {
        Self {
            particles: Vec::new(),
            high_water: 0,
            sort_cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// First slot at or after `from` that holds no live particle.
    /// Slots past the high-water mark count as free.
    pub fn find_free_slot(&self, from: usize, time: f32) -> Option<usize> {
        (from..self.particles.len()).find(|&i| !self.particles[i].is_alive(time))
    }

    /// Next slot in ring order and whether it still holds a live particle
    pub fn next_sort_slot(&mut self, time: f32) -> Option<(usize, bool)> {
        if self.particles.is_empty() {
            return None;
        }
        let slot = self.sort_cursor;
        self.sort_cursor = (slot + 1) % self.particles.len();
        Some((slot, self.particles[slot].is_alive(time)))
    }

    /// Overwrite a slot, bumping its generation
    pub fn write(&mut self, slot: usize, mut particle: Particle) -> ParticleHandle {
        let generation = self.particles[slot].generation.wrapping_add(1);
        particle.generation = generation;
        self.particles[slot] = particle;
        self.high_water = self.high_water.max(slot + 1);
        ParticleHandle {
            index: slot as u32,
            generation,
        }
    }

    pub fn slot(&self, slot: usize) -> &Particle {
        &self.particles[slot]
    }

    pub fn slot_mut(&mut self, slot: usize) -> &mut Particle {
        &mut self.particles[slot]
    }

    pub fn handle(&self, slot: usize) -> ParticleHandle {
        ParticleHandle {
            index: slot as u32,
            generation: self.particles[slot].generation,
        }
    }

    /// Resolve a handle; `None` if the slot was reused since
    pub fn get(&self, handle: ParticleHandle) -> Option<&Particle> {
        self.particles
            .get(handle.index as usize)
            .filter(|p| p.generation == handle.generation)
    }

    /// Slots in use so far (live or dead)
    pub fn used_slots(&self) -> &[Particle] {
        &self.particles[..self.high_water]
    }

    pub fn used_slots_mut(&mut self) -> &mut [Particle] {
        &mut self.particles[..self.high_water]
    }

    /// `(slot, particle)` for every particle alive at `time`
    pub fn alive(&self, time: f32) -> impl Iterator<Item = (usize, &Particle)> {
        self.used_slots()
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.is_alive(time))
    }

    pub fn alive_count(&self, time: f32) -> usize {
        self.alive(time).count()
    }

    /// End every particle's life now
    pub fn expire_all(&mut self) {
        for p in self.used_slots_mut() {
            p.life = 0.0;
        }
    }
}

/// Per-particle attribute record read by the particle shader.
/// 144 bytes: six vec4 rows plus a 3x4 birth matrix.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ParticleAttribute {
    /// xyz = world position, w = birth time
    pub position_birth: [f32; 4],
    /// xyz = world velocity, w = life
    pub velocity_life: [f32; 4],
    /// xyz = scale, w = per-particle random in [0, 1)
    pub scale_random: [f32; 4],
    /// xyz = Euler XYZ radians, w = life ratio
    pub rotation: [f32; 4],
    /// Straight RGBA
    pub color0: [f32; 4],
    pub color1: [f32; 4],
    /// Emitter matrix at birth, first three rows
    pub birth_matrix: [[f32; 4]; 3],
}

impl ParticleAttribute {
    pub fn from_particle(p: &Particle, world_position: Vec3, world_velocity: Vec3, time: f32) -> Self {
        let m = p.birth_matrix.transpose();
        Self {
            position_birth: world_position.extend(p.birth_time).to_array(),
            velocity_life: world_velocity.extend(p.life).to_array(),
            scale_random: p
                .scale
                .extend((p.seed >> 8) as f32 * (1.0 / 16_777_216.0))
                .to_array(),
            rotation: p.rotation.extend(p.life_ratio(time)).to_array(),
            color0: p.color0.to_array(),
            color1: p.color1.to_array(),
            birth_matrix: [
                m.x_axis.to_array(),
                m.y_axis.to_array(),
                m.z_axis.to_array(),
            ],
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_slice(&self.position_birth[..3])
    }

    pub fn velocity(&self) -> Vec3 {
        Vec3::from_slice(&self.velocity_life[..3])
    }

    pub fn birth_time(&self) -> f32 {
        self.position_birth[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn born(time: f32, life: f32) -> Particle {
        Particle {
            birth_time: time,
            life,
            ..Particle::dead()
        }
    }

    #[test]
    fn alive_window_is_half_open() {
        let p = born(2.0, 3.0);
        assert!(!p.is_alive(1.9));
        assert!(p.is_alive(2.0));
        assert!(p.is_alive(4.9));
        assert!(!p.is_alive(5.0));
        assert!(!Particle::dead().is_alive(0.0));
    }

    #[test]
    fn pool_reuses_first_dead_slot() {
        let mut pool = ParticlePool::try_new(4).unwrap();
        for i in 0..3 {
            pool.write(i, born(0.0, if i == 1 { 1.0 } else { 10.0 }));
        }
        assert_eq!(pool.high_water(), 3);
        assert_eq!(pool.alive_count(0.5), 3);

        // Slot 1 died at t=1; it wins over the untouched slot 3
        assert_eq!(pool.find_free_slot(0, 2.0), Some(1));
        assert_eq!(pool.find_free_slot(2, 2.0), Some(3));
        pool.write(3, born(2.0, 10.0));
        assert_eq!(pool.find_free_slot(2, 2.0), None);
    }

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut pool = ParticlePool::try_new(2).unwrap();
        let first = pool.write(0, born(0.0, 1.0));
        assert!(pool.get(first).is_some());
        let second = pool.write(0, born(1.0, 1.0));
        assert!(pool.get(first).is_none());
        assert_eq!(pool.get(second).map(|p| p.birth_time), Some(1.0));
        assert_ne!(first.generation, second.generation);
    }

    #[test]
    fn sort_cursor_wraps_and_reports_live_slots() {
        let mut pool = ParticlePool::try_new(2).unwrap();
        let (a, live_a) = pool.next_sort_slot(0.0).unwrap();
        pool.write(a, born(0.0, 5.0));
        let (b, _) = pool.next_sort_slot(0.0).unwrap();
        pool.write(b, born(0.0, 5.0));
        let (c, live_c) = pool.next_sort_slot(0.0).unwrap();
        assert_eq!((a, b, c), (0, 1, 0));
        assert!(!live_a);
        assert!(live_c);
    }

    #[test]
    fn zero_capacity_pool_has_no_slots() {
        let mut pool = ParticlePool::try_new(0).unwrap();
        assert_eq!(pool.find_free_slot(0, 0.0), None);
        assert!(pool.next_sort_slot(0.0).is_none());
    }

    #[test]
    fn expire_all_kills_everything() {
        let mut pool = ParticlePool::try_new(3).unwrap();
        pool.write(0, born(0.0, 100.0));
        pool.write(2, born(0.0, 100.0));
        pool.expire_all();
        assert_eq!(pool.alive_count(1.0), 0);
    }

    #[test]
    fn attribute_layout() {
        assert_eq!(std::mem::size_of::<ParticleAttribute>(), 144);
        assert_eq!(std::mem::align_of::<ParticleAttribute>(), 4);
    }

    #[test]
    fn attribute_packs_birth_matrix_rows() {
        let mut p = born(1.0, 4.0);
        p.birth_matrix = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let a = ParticleAttribute::from_particle(&p, Vec3::ONE, Vec3::Y, 3.0);
        assert_eq!(a.birth_matrix[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(a.birth_matrix[1], [0.0, 1.0, 0.0, 2.0]);
        assert_eq!(a.birth_matrix[2], [0.0, 0.0, 1.0, 3.0]);
        assert_eq!(a.birth_time(), 1.0);
        assert_eq!(a.velocity_life[3], 4.0);
        assert!((a.rotation[3] - 0.5).abs() < 1e-6);
    }
}
