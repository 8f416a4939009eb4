//! Effect inspection command

use super::load_effect;
use anyhow::Result;
use ember_particles::{EmitterResource, EmitterSetResource};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct EmitterSummary {
    name: String,
    depth: usize,
    shape: String,
    calc_mode: String,
    max_particles: u32,
    rate: f32,
    life: f32,
    duration: Option<f32>,
    fields: Vec<&'static str>,
    animated: Vec<&'static str>,
    manual: bool,
}

pub fn run(effect: &str, format: &str) -> Result<()> {
    let resource = load_effect(effect)?;

    match format {
        "toml" => print!("{}", resource.to_toml_string()?),
        "json" => {
            let summaries = summarize(&resource);
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        "text" => {
            println!("Effect: {} ({} emitter(s))", resource.name, resource.emitters.len());
            for s in summarize(&resource) {
                let indent = "  ".repeat(s.depth + 1);
                println!(
                    "{}{} [{}; {}] max={} rate={} life={}{}",
                    indent,
                    s.name,
                    s.shape,
                    s.calc_mode,
                    s.max_particles,
                    s.rate,
                    s.life,
                    if s.manual { " manual" } else { "" }
                );
                if let Some(d) = s.duration {
                    println!("{}  duration: {} frame(s)", indent, d);
                }
                if !s.fields.is_empty() {
                    println!("{}  fields: {}", indent, s.fields.join(", "));
                }
                if !s.animated.is_empty() {
                    println!("{}  animated: {}", indent, s.animated.join(", "));
                }
            }
            println!("OK");
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }

    Ok(())
}

fn summarize(resource: &EmitterSetResource) -> Vec<EmitterSummary> {
    fn visit(e: &EmitterResource, depth: usize, out: &mut Vec<EmitterSummary>) {
        out.push(EmitterSummary {
            name: e.name.clone(),
            depth,
            shape: format!("{:?}", e.shape.kind),
            calc_mode: format!("{:?}", e.calc_mode),
            max_particles: e.max_particles,
            rate: e.emission.rate,
            life: e.emission.life,
            duration: e.emission.duration,
            fields: e.fields.iter().map(|f| f.label()).collect(),
            animated: e.anim.channels().map(|(name, _)| name).collect(),
            manual: e.is_manual(),
        });
        for child in &e.children {
            visit(&child.emitter, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    for e in &resource.emitters {
        visit(e, 0, &mut out);
    }
    out
}
