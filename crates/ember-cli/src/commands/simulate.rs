//! Headless simulation command

use super::load_effect;
use anyhow::{Context, Result};
use ember_core::{EmitterSetId, Mat4, Vec3};
use ember_particles::{Emitter, ParticleSystem, SystemConfig};
use serde::Serialize;

pub struct SimulateArgs {
    pub effect: String,
    pub frames: u32,
    pub frame_rate: f32,
    pub seed: Option<u32>,
    pub fade_at: Option<u32>,
    pub position: Option<[f32; 3]>,
    pub config: Option<String>,
    pub format: String,
}

#[derive(Debug, Serialize)]
struct FrameReport {
    frame: u32,
    alive: usize,
    emitted: u32,
    emitters: usize,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    effect: String,
    frames: Vec<FrameReport>,
    peak_alive: usize,
    total_emitted: u64,
    finished_at: Option<u32>,
    warnings: Vec<&'static str>,
}

pub fn run(args: SimulateArgs) -> Result<()> {
    let resource = load_effect(&args.effect)?;

    let mut config = match &args.config {
        Some(path) => SystemConfig::load(path)
            .with_context(|| format!("Failed to load config '{}'", path))?,
        None => SystemConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let mut system = ParticleSystem::new(config);
    let matrix = Mat4::from_translation(Vec3::from(args.position.unwrap_or_default()));
    let id = system
        .create_emitter_set(&resource, matrix)
        .context("Emitter set limit reached")?;

    let mut report = SimulationReport {
        effect: resource.name.clone(),
        frames: Vec::with_capacity(args.frames as usize),
        peak_alive: 0,
        total_emitted: 0,
        finished_at: None,
        warnings: Vec::new(),
    };

    for frame in 0..args.frames {
        if args.fade_at == Some(frame) {
            system.fade(id);
        }
        let alive = system.calculate(args.frame_rate);
        let (emitted, emitters) = frame_emission(&system, id);
        report.peak_alive = report.peak_alive.max(alive);
        report.total_emitted += u64::from(emitted);
        report.frames.push(FrameReport {
            frame,
            alive,
            emitted,
            emitters,
        });
        if system.emitter_set(id).is_none() {
            report.finished_at = Some(frame);
            break;
        }
    }
    report.warnings = system.warnings().names();

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_text(&report),
        _ => anyhow::bail!("Unknown format: {}", args.format),
    }

    Ok(())
}

/// Particles emitted last frame and live emitters, children included
fn frame_emission(system: &ParticleSystem, id: EmitterSetId) -> (u32, usize) {
    fn walk(emitter: &Emitter, acc: &mut (u32, usize)) {
        acc.0 += emitter.emitted_last_frame();
        acc.1 += 1;
        for child in emitter.children() {
            walk(child.emitter(), acc);
        }
    }

    let mut acc = (0, 0);
    if let Some(set) = system.emitter_set(id) {
        for emitter in set.emitters() {
            walk(emitter, &mut acc);
        }
    }
    acc
}

fn print_text(report: &SimulationReport) {
    println!("Effect: {}", report.effect);
    println!("{:>6} {:>8} {:>8} {:>9}", "frame", "alive", "emitted", "emitters");
    for f in &report.frames {
        println!(
            "{:>6} {:>8} {:>8} {:>9}",
            f.frame, f.alive, f.emitted, f.emitters
        );
    }
    println!();
    println!("Peak alive:    {}", report.peak_alive);
    println!("Total emitted: {}", report.total_emitted);
    match report.finished_at {
        Some(frame) => println!("Finished at frame {}", frame),
        None => println!("Still running after {} frame(s)", report.frames.len()),
    }
    if !report.warnings.is_empty() {
        println!("Warnings: {}", report.warnings.join(", "));
    }
}
