//! Authored effect descriptions, parsed from TOML.
//!
//! Resources are immutable once loaded. Running emitters share them through
//! `Arc` and never write back.

use crate::anim::AnimTable;
use crate::field::FieldResource;
use crate::rand::RandomSeedMode;
use crate::shape::{ShapeKind, ShapeResource};
use ember_core::{Color, EmberError, Result, Srt};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where particle integration runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcMode {
    #[default]
    Cpu,
    /// Positions are derived on the GPU from birth state and age
    Gpu,
    /// The GPU integrates and streams results back for the next frame
    GpuStreamOut,
}

impl CalcMode {
    pub fn is_gpu(&self) -> bool {
        !matches!(self, Self::Cpu)
    }
}

/// Slot selection policy for new particles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitOrder {
    /// Reuse the first dead slot, scanning from slot 0
    #[default]
    SearchOrder,
    /// Ring order; overwrites the oldest slot when full
    SortOrder,
}

/// How particles follow the emitter after birth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowType {
    /// Particles are released into world space at birth
    #[default]
    None,
    /// Particles live in emitter space and follow every transform change
    All,
    /// Particles keep their birth rotation and scale but follow translation
    PosOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    NoSort,
    /// Oldest particle drawn first
    Ascending,
    /// Newest particle drawn first
    Descending,
    /// Farthest from the camera drawn first
    ZSort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillboardType {
    #[default]
    Billboard,
    YBillboard,
    PolygonXy,
    PolygonXz,
    Directional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Sub,
    Screen,
}

/// Shader used when an emitter does not name one
pub const DEFAULT_SHADER: &str = "particle";

/// Smallest non-zero burst interval, in frames
pub const MIN_EMIT_INTERVAL: f32 = 1e-3;

/// Render-side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawResource {
    pub sort: SortMode,
    pub billboard: BillboardType,
    pub blend: BlendMode,
    pub shader: Option<String>,
    pub visible: bool,
}

impl Default for DrawResource {
    fn default() -> Self {
        Self {
            sort: SortMode::NoSort,
            billboard: BillboardType::Billboard,
            blend: BlendMode::Normal,
            shader: None,
            visible: true,
        }
    }
}

impl DrawResource {
    pub fn shader_name(&self) -> &str {
        self.shader.as_deref().unwrap_or(DEFAULT_SHADER)
    }
}

/// Emission timing and initial motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionResource {
    /// Particles per frame, or particles per burst when `interval` is set
    pub rate: f32,
    /// Frames between bursts; zero means continuous emission
    pub interval: f32,
    /// Extra random frames added to each interval, in [0, interval_random)
    pub interval_random: f32,
    /// Emitter frame at which emission starts
    pub start_frame: f32,
    /// Frames of emission after `start_frame`; `None` emits forever
    pub duration: Option<f32>,
    /// Total particles this emitter may ever emit
    pub total_limit: Option<u32>,
    /// Particle life in frames
    pub life: f32,
    /// Fraction of life randomly removed per particle, in [0, 1]
    pub life_random: f32,
    /// Speed along the shape normal
    pub all_direction_speed: f32,
    pub designated_direction: Vec3,
    pub designated_speed: f32,
    /// Cone half-angle in degrees around `designated_direction`
    pub dispersion_angle: f32,
    /// Fraction of speed randomly removed per particle, in [0, 1]
    pub speed_random: f32,
    /// Radius of a random offset added to every birth position
    pub position_random: f32,
}

impl Default for EmissionResource {
    fn default() -> Self {
        Self {
            rate: 1.0,
            interval: 0.0,
            interval_random: 0.0,
            start_frame: 0.0,
            duration: None,
            total_limit: None,
            life: 60.0,
            life_random: 0.0,
            all_direction_speed: 0.0,
            designated_direction: Vec3::Y,
            designated_speed: 0.0,
            dispersion_angle: 0.0,
            speed_random: 0.0,
            position_random: 0.0,
        }
    }
}

/// Per-particle physics and appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleResource {
    /// Acceleration per frame squared
    pub gravity: Vec3,
    pub gravity_scale: f32,
    /// Velocity multiplier per frame; 1 means no resistance
    pub air_resist: f32,
    pub scale: Vec3,
    pub scale_random: f32,
    /// Emitter-wide particle scale, animated by the `particle_scale` channel
    pub emitter_scale: Vec3,
    /// Initial rotation in degrees (Euler XYZ)
    pub rotation: Vec3,
    pub rotation_random: Vec3,
    /// Degrees per frame
    pub rotation_velocity: Vec3,
    pub rotation_velocity_random: Vec3,
    pub color0: Color,
    pub color1: Color,
    /// Scale multiplier over normalized life
    pub scale_anim: Option<AnimTable>,
    pub color0_anim: Option<AnimTable>,
    pub color1_anim: Option<AnimTable>,
    pub alpha0_anim: Option<AnimTable>,
    pub alpha1_anim: Option<AnimTable>,
}

impl Default for ParticleResource {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            gravity_scale: 1.0,
            air_resist: 1.0,
            scale: Vec3::ONE,
            scale_random: 0.0,
            emitter_scale: Vec3::ONE,
            rotation: Vec3::ZERO,
            rotation_random: Vec3::ZERO,
            rotation_velocity: Vec3::ZERO,
            rotation_velocity_random: Vec3::ZERO,
            color0: Color::WHITE,
            color1: Color::WHITE,
            scale_anim: None,
            color0_anim: None,
            color1_anim: None,
            alpha0_anim: None,
            alpha1_anim: None,
        }
    }
}

/// Emitter-level animation tables, one per animatable channel.
/// A present table replaces the authored constant for that channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterAnimResource {
    pub scale: Option<AnimTable>,
    pub rotate: Option<AnimTable>,
    pub translate: Option<AnimTable>,
    pub color0: Option<AnimTable>,
    pub color1: Option<AnimTable>,
    pub alpha0: Option<AnimTable>,
    pub alpha1: Option<AnimTable>,
    pub emission_rate: Option<AnimTable>,
    pub life: Option<AnimTable>,
    pub all_direction_speed: Option<AnimTable>,
    pub designated_speed: Option<AnimTable>,
    pub particle_scale: Option<AnimTable>,
    pub volume_scale: Option<AnimTable>,
    pub gravity_scale: Option<AnimTable>,
}

impl EmitterAnimResource {
    /// `(name, table)` for every present channel
    pub fn channels(&self) -> impl Iterator<Item = (&'static str, &AnimTable)> {
        [
            ("scale", &self.scale),
            ("rotate", &self.rotate),
            ("translate", &self.translate),
            ("color0", &self.color0),
            ("color1", &self.color1),
            ("alpha0", &self.alpha0),
            ("alpha1", &self.alpha1),
            ("emission_rate", &self.emission_rate),
            ("life", &self.life),
            ("all_direction_speed", &self.all_direction_speed),
            ("designated_speed", &self.designated_speed),
            ("particle_scale", &self.particle_scale),
            ("volume_scale", &self.volume_scale),
            ("gravity_scale", &self.gravity_scale),
        ]
        .into_iter()
        .filter_map(|(name, table)| table.as_ref().map(|t| (name, t)))
    }
}

/// Which parent particle attributes a child particle takes over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InheritResource {
    /// Spawn at the parent particle's position
    pub position: bool,
    pub velocity: bool,
    /// Fraction of the parent velocity added when `velocity` is set
    pub velocity_rate: f32,
    pub color: bool,
    pub alpha: bool,
    pub scale: bool,
    pub rotation: bool,
}

impl Default for InheritResource {
    fn default() -> Self {
        Self {
            position: true,
            velocity: false,
            velocity_rate: 1.0,
            color: false,
            alpha: false,
            scale: false,
            rotation: false,
        }
    }
}

/// A child emitter spawned from each particle of its parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildEmitterResource {
    /// Parent life ratio at which the first burst fires, in [0, 1]
    pub emit_timing: f32,
    /// Particles per burst
    pub emit_count: u32,
    /// Frames between further bursts; `None` fires once
    pub emit_interval: Option<f32>,
    pub inherit: InheritResource,
    pub emitter: Box<EmitterResource>,
}

impl Default for ChildEmitterResource {
    fn default() -> Self {
        Self {
            emit_timing: 0.0,
            emit_count: 1,
            emit_interval: None,
            inherit: InheritResource::default(),
            emitter: Box::default(),
        }
    }
}

/// Manual emitters take particles only from explicit reservations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualEmitResource {
    /// Pending reservations held between frames
    pub reservation_capacity: usize,
    /// Largest particle count one reservation may request
    pub max_emit_count: u32,
}

impl Default for ManualEmitResource {
    fn default() -> Self {
        Self {
            reservation_capacity: 16,
            max_emit_count: 64,
        }
    }
}

/// Reference to a callback registered on the system
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomActionResource {
    pub id: u32,
    pub params: Option<Vec<f32>>,
}

/// One emitter definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterResource {
    pub name: String,
    pub max_particles: u32,
    pub calc_mode: CalcMode,
    pub emit_order: EmitOrder,
    pub follow: FollowType,
    pub random_seed: RandomSeedMode,
    /// Attribute buffer depth: 2 for double, 3 for triple buffering
    pub buffer_count: usize,
    pub transform: Srt,
    pub color0: Color,
    pub color1: Color,
    pub alpha0: f32,
    pub alpha1: f32,
    pub shape: ShapeResource,
    pub emission: EmissionResource,
    pub particle: ParticleResource,
    #[serde(rename = "field")]
    pub fields: Vec<FieldResource>,
    pub anim: EmitterAnimResource,
    pub draw: DrawResource,
    #[serde(rename = "child")]
    pub children: Vec<ChildEmitterResource>,
    pub manual: Option<ManualEmitResource>,
    pub custom_action: Option<CustomActionResource>,
}

impl Default for EmitterResource {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_particles: 256,
            calc_mode: CalcMode::Cpu,
            emit_order: EmitOrder::SearchOrder,
            follow: FollowType::None,
            random_seed: RandomSeedMode::PerEmitter,
            buffer_count: 2,
            transform: Srt::IDENTITY,
            color0: Color::WHITE,
            color1: Color::WHITE,
            alpha0: 1.0,
            alpha1: 1.0,
            shape: ShapeResource::default(),
            emission: EmissionResource::default(),
            particle: ParticleResource::default(),
            fields: Vec::new(),
            anim: EmitterAnimResource::default(),
            draw: DrawResource::default(),
            children: Vec::new(),
            manual: None,
            custom_action: None,
        }
    }
}

impl EmitterResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_manual(&self) -> bool {
        self.manual.is_some()
    }

    /// Check authored values. A zero `max_particles` is allowed here; the
    /// emitter reports it at runtime and simply emits nothing.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(EmberError::MissingRequiredField("emitter.name".into()));
        }
        let scope = |field: &str| format!("{}.{}", self.name, field);

        if !(1..=3).contains(&self.buffer_count) {
            return Err(out_of_range(
                scope("buffer_count"),
                1.0,
                3.0,
                self.buffer_count as f64,
            ));
        }

        let e = &self.emission;
        non_negative(scope("emission.rate"), e.rate)?;
        non_negative(scope("emission.interval"), e.interval)?;
        if e.interval > 0.0 && e.interval < MIN_EMIT_INTERVAL {
            return Err(out_of_range(
                scope("emission.interval"),
                MIN_EMIT_INTERVAL as f64,
                f64::INFINITY,
                e.interval as f64,
            ));
        }
        non_negative(scope("emission.interval_random"), e.interval_random)?;
        non_negative(scope("emission.life"), e.life)?;
        unit_interval(scope("emission.life_random"), e.life_random)?;
        unit_interval(scope("emission.speed_random"), e.speed_random)?;
        if let Some(d) = e.duration {
            non_negative(scope("emission.duration"), d)?;
        }
        if !(0.0..=180.0).contains(&e.dispersion_angle) {
            return Err(out_of_range(
                scope("emission.dispersion_angle"),
                0.0,
                180.0,
                e.dispersion_angle as f64,
            ));
        }

        let s = &self.shape;
        if !(0.0..1.0).contains(&s.hollowness) {
            return Err(out_of_range(
                scope("shape.hollowness"),
                0.0,
                1.0,
                s.hollowness as f64,
            ));
        }
        if s.kind == ShapeKind::Primitive && s.primitive.is_none() {
            return Err(EmberError::MissingRequiredField(scope("shape.primitive")));
        }

        unit_interval(scope("particle.scale_random"), self.particle.scale_random)?;
        unit_interval(scope("particle.air_resist"), self.particle.air_resist)?;
        for (name, table) in self.particle_curves() {
            table.validate(&scope(name))?;
        }
        for (name, table) in self.anim.channels() {
            table.validate(&scope(&format!("anim.{name}")))?;
        }
        for field in &self.fields {
            field_tables(field)
                .try_for_each(|t| t.validate(&scope(&format!("field.{}", field.label()))))?;
        }

        if let Some(manual) = &self.manual {
            if manual.reservation_capacity == 0 {
                return Err(EmberError::ValidationError(format!(
                    "{}: manual emitters need a reservation capacity",
                    self.name
                )));
            }
        }

        for child in &self.children {
            unit_interval(scope("child.emit_timing"), child.emit_timing)?;
            if let Some(interval) = child.emit_interval {
                if interval <= 0.0 {
                    return Err(EmberError::ValidationError(format!(
                        "{}: child emit_interval must be positive",
                        self.name
                    )));
                }
            }
            child.emitter.validate()?;
        }
        Ok(())
    }

    fn particle_curves(&self) -> impl Iterator<Item = (&'static str, &AnimTable)> {
        let p = &self.particle;
        [
            ("particle.scale_anim", &p.scale_anim),
            ("particle.color0_anim", &p.color0_anim),
            ("particle.color1_anim", &p.color1_anim),
            ("particle.alpha0_anim", &p.alpha0_anim),
            ("particle.alpha1_anim", &p.alpha1_anim),
        ]
        .into_iter()
        .filter_map(|(name, table)| table.as_ref().map(|t| (name, t)))
    }
}

fn field_tables(field: &FieldResource) -> impl Iterator<Item = &AnimTable> {
    let table = match field {
        FieldResource::PositionAdd(f) => f.anim.as_ref(),
        FieldResource::Convergence(f) => f.strength_curve.as_ref(),
        _ => None,
    };
    table.into_iter()
}

/// A named group of emitters created, faded and killed together
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterSetResource {
    pub name: String,
    #[serde(rename = "emitter")]
    pub emitters: Vec<EmitterResource>,
}

impl EmitterSetResource {
    /// Parse and validate an effect from TOML text
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let set: Self = toml::from_str(source)?;
        set.validate()?;
        Ok(set)
    }

    /// Read, parse and validate an effect file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EmberError::ResourceNotFound(path.display().to_string()));
        }
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(EmberError::MissingRequiredField("name".into()));
        }
        if self.emitters.is_empty() {
            return Err(EmberError::ValidationError(format!(
                "effect '{}' has no emitters",
                self.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for emitter in &self.emitters {
            emitter.validate()?;
            if !seen.insert(emitter.name.as_str()) {
                return Err(EmberError::ValidationError(format!(
                    "duplicate emitter name '{}' in '{}'",
                    emitter.name, self.name
                )));
            }
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&EmitterResource> {
        self.emitters.iter().find(|e| e.name == name)
    }
}

// ── validation helpers ──

fn out_of_range(field: String, min: f64, max: f64, value: f64) -> EmberError {
    EmberError::ValueOutOfRange {
        field,
        min,
        max,
        value,
    }
}

fn non_negative(field: String, value: f32) -> Result<()> {
    if value < 0.0 || value.is_nan() {
        return Err(out_of_range(field, 0.0, f64::INFINITY, value as f64));
    }
    Ok(())
}

fn unit_interval(field: String, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(out_of_range(field, 0.0, 1.0, value as f64));
    }
    Ok(())
}
