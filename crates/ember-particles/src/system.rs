//! The particle system: emitter sets, shared resources, per-frame driving

use crate::action::CustomAction;
use crate::buffer::BufferSwapMode;
use crate::calc::{EmitterCalculationResult, EmitterCalculator};
use crate::compute::ComputeShader;
use crate::draw::{CommandBuffer, DrawParameter};
use crate::emitter::{EmitReservationInfo, EmitterSet};
use crate::field::CurlNoiseTexture;
use crate::particle::ParticleAttribute;
use crate::rand::RandomSource;
use crate::resource::EmitterSetResource;
use crate::shape::PrimitiveMesh;
use ember_core::{EmberError, EmitterSetId, Result, RuntimeWarning};
use glam::Mat4;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// System-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Seed of the source that hands out emitter seeds
    pub seed: u32,
    pub swap_mode: BufferSwapMode,
    /// Live emitter sets allowed at once; creation fails beyond it
    pub max_emitter_sets: usize,
    /// Edge length of the generated curl-noise texture; 0 disables it
    pub curl_noise_size: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed_0001,
            swap_mode: BufferSwapMode::Auto,
            max_emitter_sets: 64,
            curl_noise_size: 0,
        }
    }
}

impl SystemConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        if config.max_emitter_sets == 0 {
            return Err(EmberError::ValidationError(
                "max_emitter_sets must be at least 1".into(),
            ));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EmberError::ResourceNotFound(path.display().to_string()));
        }
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

/// Owns every live emitter set and drives them frame by frame
pub struct ParticleSystem {
    config: SystemConfig,
    calculator: EmitterCalculator,
    sets: BTreeMap<EmitterSetId, EmitterSet>,
    seeds: RandomSource,
    curl_noise: Option<Arc<CurlNoiseTexture>>,
    primitives: HashMap<String, Arc<PrimitiveMesh>>,
    warnings: RuntimeWarning,
    frame: u64,
}

impl ParticleSystem {
    pub fn new(config: SystemConfig) -> Self {
        let curl_noise = (config.curl_noise_size > 0)
            .then(|| Arc::new(CurlNoiseTexture::generate(config.curl_noise_size, config.seed)));
        Self {
            seeds: RandomSource::new(config.seed),
            config,
            calculator: EmitterCalculator::new(),
            sets: BTreeMap::new(),
            curl_noise,
            primitives: HashMap::new(),
            warnings: RuntimeWarning::empty(),
            frame: 0,
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn calculator(&self) -> &EmitterCalculator {
        &self.calculator
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn register_custom_action(&mut self, id: u32, action: Box<dyn CustomAction>) {
        self.calculator.register_action(id, action);
    }

    /// Replace the curl-noise texture used by sets created from now on
    pub fn set_curl_noise_texture(&mut self, texture: CurlNoiseTexture) {
        self.curl_noise = Some(Arc::new(texture));
    }

    pub fn register_primitive(&mut self, name: impl Into<String>, mesh: PrimitiveMesh) {
        self.primitives.insert(name.into(), Arc::new(mesh));
    }

    /// Instantiate an effect at `matrix`. Returns `None` when the set limit
    /// is reached.
    pub fn create_emitter_set(
        &mut self,
        resource: &EmitterSetResource,
        matrix: Mat4,
    ) -> Option<EmitterSetId> {
        if self.sets.len() >= self.config.max_emitter_sets {
            log::warn!(
                "[particles] cannot create '{}': {} emitter sets already live",
                resource.name,
                self.sets.len()
            );
            return None;
        }
        let id = EmitterSetId::new();
        let mut set = EmitterSet::new(id, resource, matrix, &mut self.seeds);
        for emitter in set.emitters_mut() {
            emitter.bind_resources(self.curl_noise.as_ref(), &self.primitives);
        }
        self.warnings |= set.warnings();
        log::debug!(
            "[particles] created set {} '{}' with {} emitter(s)",
            id,
            set.name(),
            set.emitters().len()
        );
        self.sets.insert(id, set);
        Some(id)
    }

    pub fn emitter_set(&self, id: EmitterSetId) -> Option<&EmitterSet> {
        self.sets.get(&id)
    }

    pub fn emitter_set_mut(&mut self, id: EmitterSetId) -> Option<&mut EmitterSet> {
        self.sets.get_mut(&id)
    }

    pub fn emitter_sets(&self) -> impl Iterator<Item = &EmitterSet> {
        self.sets.values()
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Stop emission on every emitter of the set; it is removed once its
    /// particles are gone
    pub fn fade(&mut self, id: EmitterSetId) -> bool {
        match self.sets.get_mut(&id) {
            Some(set) => {
                set.fade();
                true
            }
            None => false,
        }
    }

    /// Remove the set immediately
    pub fn kill(&mut self, id: EmitterSetId) -> bool {
        match self.sets.remove(&id) {
            Some(mut set) => {
                set.kill();
                log::debug!("[particles] killed set {}", id);
                true
            }
            None => false,
        }
    }

    pub fn kill_all(&mut self) {
        let ids: Vec<EmitterSetId> = self.sets.keys().copied().collect();
        for id in ids {
            self.kill(id);
        }
    }

    pub fn set_matrix(&mut self, id: EmitterSetId, matrix: Mat4) -> bool {
        match self.sets.get_mut(&id) {
            Some(set) => {
                set.set_matrix(matrix);
                true
            }
            None => false,
        }
    }

    /// Queue a manual emission on one emitter of a set
    pub fn reserve_emission(
        &mut self,
        id: EmitterSetId,
        emitter: &str,
        info: EmitReservationInfo,
    ) -> bool {
        let Some(e) = self
            .sets
            .get_mut(&id)
            .and_then(|set| set.emitter_mut(emitter))
        else {
            return false;
        };
        let accepted = e.reserve_emission(info);
        self.warnings |= e.warnings();
        accepted
    }

    /// Advance every set by `frame_rate` frames, dropping dead emitters and
    /// empty sets. Returns the live particle count afterwards.
    pub fn calculate(&mut self, frame_rate: f32) -> usize {
        let swap_mode = self.config.swap_mode;
        let mut finished = Vec::new();
        let mut alive = 0;

        for (id, set) in self.sets.iter_mut() {
            let fading = set.is_fading();
            set.emitters.retain_mut(|emitter| {
                let result = self.calculator.calculate(
                    emitter,
                    frame_rate,
                    swap_mode,
                    fading,
                    true,
                    false,
                );
                self.warnings |= emitter.warnings();
                result != EmitterCalculationResult::Kill
            });
            alive += set.alive_count();
            if set.is_empty() {
                finished.push(*id);
            }
        }

        for id in finished {
            self.sets.remove(&id);
            log::debug!("[particles] set {} finished", id);
        }
        log::trace!(
            "[particles] frame {}: {} set(s), {} particle(s)",
            self.frame,
            self.sets.len(),
            alive
        );
        self.frame += 1;
        alive
    }

    /// Draw every visible emitter. Returns the number of emitters that
    /// issued draws.
    pub fn draw(&mut self, cmd: &mut dyn CommandBuffer, param: &DrawParameter) -> usize {
        let mut drawn = 0;
        for set in self.sets.values_mut() {
            for emitter in set.emitters_mut() {
                if self.calculator.draw(cmd, emitter, param) {
                    drawn += 1;
                }
                self.warnings |= emitter.warnings();
            }
        }
        drawn
    }

    /// Dispatch compute work for every GPU-mode emitter and flush once.
    /// Returns the total particle count dispatched.
    pub fn dispatch_compute(&mut self, cmd: &mut dyn CommandBuffer, shader: &ComputeShader) -> u32 {
        let mut counter = 0;
        let mut any = false;
        for set in self.sets.values_mut() {
            for emitter in set.emitters_mut() {
                any |= self.calculator.calculate_compute_shader(
                    cmd,
                    emitter,
                    Some(shader),
                    &mut counter,
                    true,
                    false,
                );
                self.warnings |= emitter.warnings();
            }
        }
        if any {
            cmd.flush();
        }
        counter
    }

    /// Hand stream-out results back to one emitter
    pub fn collect_compute_results(
        &mut self,
        id: EmitterSetId,
        emitter: &str,
        generation: u64,
        results: &[ParticleAttribute],
    ) -> bool {
        let calculator = &self.calculator;
        self.sets
            .get_mut(&id)
            .and_then(|set| set.emitter_mut(emitter))
            .is_some_and(|e| calculator.collect_compute_results(e, generation, results))
    }

    pub fn total_alive(&self) -> usize {
        self.sets.values().map(EmitterSet::alive_count).sum()
    }

    /// Every warning raised since the system was created
    pub fn warnings(&self) -> RuntimeWarning {
        self.warnings
    }
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(SystemConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::RecordingCommandBuffer;
    use crate::resource::{CalcMode, EmitterResource, ManualEmitResource, DEFAULT_SHADER};
    use glam::Vec3;

    fn effect(rate: f32, life: f32, duration: Option<f32>) -> EmitterSetResource {
        let mut res = EmitterResource::new("puff");
        res.emission.rate = rate;
        res.emission.life = life;
        res.emission.duration = duration;
        EmitterSetResource {
            name: "puff".into(),
            emitters: vec![res],
        }
    }

    #[test]
    fn finite_effect_is_removed_when_done() {
        let mut system = ParticleSystem::default();
        let id = system
            .create_emitter_set(&effect(10.0, 5.0, Some(3.0)), Mat4::IDENTITY)
            .unwrap();
        let counts: Vec<usize> = (0..8).map(|_| system.calculate(1.0)).collect();
        assert_eq!(&counts[..3], &[10, 20, 30]);
        assert_eq!(counts[7], 0);
        assert!(system.emitter_set(id).is_none());
        assert_eq!(system.set_count(), 0);
    }

    #[test]
    fn fade_lets_particles_finish() {
        let mut system = ParticleSystem::default();
        let id = system
            .create_emitter_set(&effect(2.0, 4.0, None), Mat4::IDENTITY)
            .unwrap();
        system.calculate(1.0);
        assert!(system.fade(id));
        assert!(system.emitter_set(id).unwrap().is_fading());
        let mut frames = 0;
        while system.emitter_set(id).is_some() {
            system.calculate(1.0);
            frames += 1;
            assert!(frames < 10);
        }
        assert_eq!(system.total_alive(), 0);
    }

    #[test]
    fn kill_removes_immediately() {
        let mut system = ParticleSystem::default();
        let id = system
            .create_emitter_set(&effect(5.0, 50.0, None), Mat4::IDENTITY)
            .unwrap();
        system.calculate(1.0);
        assert!(system.kill(id));
        assert!(!system.kill(id));
        assert_eq!(system.total_alive(), 0);
    }

    #[test]
    fn set_limit_is_enforced() {
        let mut system = ParticleSystem::new(SystemConfig {
            max_emitter_sets: 1,
            ..Default::default()
        });
        let fx = effect(1.0, 1.0, None);
        assert!(system.create_emitter_set(&fx, Mat4::IDENTITY).is_some());
        assert!(system.create_emitter_set(&fx, Mat4::IDENTITY).is_none());
    }

    #[test]
    fn set_matrix_moves_new_particles() {
        let mut system = ParticleSystem::default();
        let id = system
            .create_emitter_set(&effect(1.0, 100.0, None), Mat4::IDENTITY)
            .unwrap();
        system.calculate(1.0);
        assert!(system.set_matrix(id, Mat4::from_translation(Vec3::new(0.0, 0.0, 7.0))));
        system.calculate(1.0);
        let e = &system.emitter_set(id).unwrap().emitters()[0];
        let zs: Vec<f32> = e.particles().map(|(_, p)| p.position.z).collect();
        assert_eq!(zs, vec![0.0, 7.0]);
    }

    #[test]
    fn manual_emission_through_system() {
        let mut res = EmitterResource::new("hit");
        res.manual = Some(ManualEmitResource::default());
        res.max_particles = 8;
        let fx = EmitterSetResource {
            name: "hit".into(),
            emitters: vec![res],
        };
        let mut system = ParticleSystem::default();
        let id = system.create_emitter_set(&fx, Mat4::IDENTITY).unwrap();
        assert!(system.reserve_emission(id, "hit", EmitReservationInfo::new(3)));
        assert!(!system.reserve_emission(id, "missing", EmitReservationInfo::new(3)));
        assert_eq!(system.calculate(1.0), 3);
    }

    #[test]
    fn warnings_accumulate_on_the_system() {
        let mut res = EmitterResource::new("tiny");
        res.max_particles = 2;
        res.emission.rate = 5.0;
        let fx = EmitterSetResource {
            name: "tiny".into(),
            emitters: vec![res],
        };
        let mut system = ParticleSystem::default();
        system.create_emitter_set(&fx, Mat4::IDENTITY).unwrap();
        system.calculate(1.0);
        assert!(system
            .warnings()
            .contains(RuntimeWarning::PARTICLE_EMISSION_FAILURE));
    }

    #[test]
    fn draw_and_compute_walk_every_set() {
        let mut system = ParticleSystem::default();
        system
            .create_emitter_set(&effect(2.0, 10.0, None), Mat4::IDENTITY)
            .unwrap();
        let mut gpu = effect(3.0, 10.0, None);
        gpu.emitters[0].calc_mode = CalcMode::Gpu;
        system.create_emitter_set(&gpu, Mat4::IDENTITY).unwrap();
        system.calculate(1.0);

        let mut cmd = RecordingCommandBuffer::new([DEFAULT_SHADER, "sim"]);
        assert_eq!(system.draw(&mut cmd, &DrawParameter::default()), 2);
        let shader = ComputeShader::new("sim", 32);
        assert_eq!(system.dispatch_compute(&mut cmd, &shader), 3);
        assert_eq!(cmd.flushes, 1);
    }

    #[test]
    fn curl_noise_is_bound_when_configured() {
        let system = ParticleSystem::new(SystemConfig {
            curl_noise_size: 4,
            ..Default::default()
        });
        assert!(system.curl_noise.is_some());
    }

    #[test]
    fn demo_effects_load_and_run() {
        let config = SystemConfig::from_toml_str(include_str!("../../../demos/system.toml")).unwrap();
        let mut system = ParticleSystem::new(config);
        for source in [
            include_str!("../../../demos/fountain.toml"),
            include_str!("../../../demos/burst.toml"),
            include_str!("../../../demos/smoke.toml"),
        ] {
            let fx = EmitterSetResource::from_toml_str(source).unwrap();
            system.create_emitter_set(&fx, Mat4::IDENTITY).unwrap();
        }
        for _ in 0..200 {
            system.calculate(1.0);
        }
        assert!(system.total_alive() > 0);
        assert!(!system
            .warnings()
            .contains(RuntimeWarning::NO_CUSTOM_ACTION_PARAMETER));
    }

    #[test]
    fn config_from_toml() {
        let config = SystemConfig::from_toml_str("seed = 7\nswap_mode = \"swap\"\n").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.swap_mode, BufferSwapMode::Swap);
        assert_eq!(config.max_emitter_sets, 64);
        assert!(SystemConfig::from_toml_str("max_emitter_sets = 0").is_err());
    }
}
