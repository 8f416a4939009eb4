//! Draw recording command

use super::load_effect;
use anyhow::{Context, Result};
use ember_core::{Mat4, Vec3};
use ember_particles::{DrawParameter, ParticleSystem, RecordingCommandBuffer, SystemConfig};
use serde::Serialize;

pub struct DrawArgs {
    pub effect: String,
    pub frames: u32,
    pub camera: Option<[f32; 3]>,
    pub shaders: Vec<String>,
    pub format: String,
}

#[derive(Debug, Serialize)]
struct DrawSummary {
    emitter: String,
    shader: Option<String>,
    instances: usize,
    sorted: bool,
    blend: String,
    last_drawn: Option<[f32; 3]>,
}

pub fn run(args: DrawArgs) -> Result<()> {
    let resource = load_effect(&args.effect)?;
    let mut system = ParticleSystem::new(SystemConfig::default());
    system
        .create_emitter_set(&resource, Mat4::IDENTITY)
        .context("Emitter set limit reached")?;

    for _ in 0..args.frames {
        system.calculate(1.0);
    }

    let camera = Vec3::from(args.camera.unwrap_or([0.0, 0.0, 10.0]));
    let mut cmd = RecordingCommandBuffer::new(args.shaders.iter().cloned());
    let param = DrawParameter {
        camera_position: camera,
        ..Default::default()
    };
    system.draw(&mut cmd, &param);

    let summaries: Vec<DrawSummary> = cmd
        .draws
        .iter()
        .map(|d| DrawSummary {
            emitter: d.emitter.clone(),
            shader: d.shader.clone(),
            instances: d.instances,
            sorted: d.order.is_some(),
            blend: format!("{:?}", d.blend),
            last_drawn: d.positions.last().map(|p| p.to_array()),
        })
        .collect();
    let warnings = system.warnings().names();

    match args.format.as_str() {
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "effect": resource.name,
                "frames": args.frames,
                "draws": summaries,
                "warnings": warnings,
            }))?
        ),
        "text" => {
            println!(
                "Effect: {} after {} frame(s), {} draw call(s)",
                resource.name,
                args.frames,
                summaries.len()
            );
            for s in &summaries {
                println!(
                    "  {} [{}] {} instance(s), blend {}{}",
                    s.emitter,
                    s.shader.as_deref().unwrap_or("-"),
                    s.instances,
                    s.blend,
                    if s.sorted { ", sorted" } else { "" }
                );
            }
            if !warnings.is_empty() {
                println!("Warnings: {}", warnings.join(", "));
            }
        }
        _ => anyhow::bail!("Unknown format: {}", args.format),
    }

    Ok(())
}
