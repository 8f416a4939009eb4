//! Shape sampling command

use super::load_effect;
use anyhow::Result;
use ember_particles::{evaluate_shape, EmitterAnimValue, RandomSource, ShapeContext};
use serde::Serialize;

pub struct SampleArgs {
    pub effect: String,
    pub emitter: Option<String>,
    pub count: u32,
    pub seed: u32,
    pub format: String,
}

#[derive(Debug, Serialize)]
struct ShapeSample {
    index: u32,
    position: [f32; 3],
    velocity: [f32; 3],
}

pub fn run(args: SampleArgs) -> Result<()> {
    let resource = load_effect(&args.effect)?;
    let emitter = match &args.emitter {
        Some(name) => resource
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("No emitter named '{}' in '{}'", name, resource.name))?,
        None => resource
            .emitters
            .first()
            .ok_or_else(|| anyhow::anyhow!("Effect '{}' has no emitters", resource.name))?,
    };

    let anim = EmitterAnimValue::evaluate(emitter, 0.0);
    let ctx = ShapeContext::new(&emitter.shape);
    let mut rng = RandomSource::new(args.seed);
    let samples: Vec<ShapeSample> = (0..args.count)
        .filter_map(|i| {
            evaluate_shape(&ctx, i, args.count, rng.next_u32(), &anim).map(|(pos, vel)| {
                ShapeSample {
                    index: i,
                    position: pos.to_array(),
                    velocity: vel.to_array(),
                }
            })
        })
        .collect();

    if samples.is_empty() && args.count > 0 {
        anyhow::bail!(
            "Shape {:?} of '{}' produced no samples (does it need a primitive mesh?)",
            emitter.shape.kind,
            emitter.name
        );
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&samples)?),
        "text" => {
            println!("{} ({:?}), {} sample(s)", emitter.name, emitter.shape.kind, samples.len());
            for s in &samples {
                println!(
                    "{:>4}  pos ({:>8.3}, {:>8.3}, {:>8.3})  vel ({:>6.3}, {:>6.3}, {:>6.3})",
                    s.index,
                    s.position[0],
                    s.position[1],
                    s.position[2],
                    s.velocity[0],
                    s.velocity[1],
                    s.velocity[2]
                );
            }
        }
        _ => anyhow::bail!("Unknown format: {}", args.format),
    }

    Ok(())
}
