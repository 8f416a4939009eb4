//! Ember CLI - Headless tooling for Ember particle effects

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{draw, inspect, sample, simulate};

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Run, inspect and sample particle effects without a renderer", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an effect headless and report particle counts per frame
    Simulate {
        /// Path to effect file
        effect: String,

        /// Number of frames to run
        #[arg(long, default_value = "120")]
        frames: u32,

        /// Frames advanced per calculation
        #[arg(long, default_value = "1.0")]
        frame_rate: f32,

        /// Seed for emitter seeds
        #[arg(long)]
        seed: Option<u32>,

        /// Fade the effect at this frame
        #[arg(long)]
        fade_at: Option<u32>,

        /// Effect position (comma-separated x,y,z)
        #[arg(long, value_parser = parse_vec3)]
        position: Option<[f32; 3]>,

        /// Path to a system config file
        #[arg(long)]
        config: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate an effect and summarise its emitters
    Inspect {
        /// Path to effect file
        effect: String,

        /// Output format (text, json or toml)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Dump emitter shape samples
    Sample {
        /// Path to effect file
        effect: String,

        /// Emitter to sample (defaults to the first)
        #[arg(long)]
        emitter: Option<String>,

        /// Number of samples
        #[arg(long, default_value = "32")]
        count: u32,

        /// Seed for the sample sequence
        #[arg(long, default_value = "1")]
        seed: u32,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Run an effect and record the draw calls it would issue
    Draw {
        /// Path to effect file
        effect: String,

        /// Frames to run before drawing
        #[arg(long, default_value = "30")]
        frames: u32,

        /// Camera position for depth sorting (comma-separated x,y,z)
        #[arg(long, value_parser = parse_vec3)]
        camera: Option<[f32; 3]>,

        /// Shader names the recording renderer knows
        #[arg(long, value_delimiter = ',', default_value = "particle")]
        shaders: Vec<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn parse_vec3(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected 3 comma-separated values, got {}", parts.len()));
    }
    let x: f32 = parts[0].trim().parse().map_err(|e| format!("invalid x: {}", e))?;
    let y: f32 = parts[1].trim().parse().map_err(|e| format!("invalid y: {}", e))?;
    let z: f32 = parts[2].trim().parse().map_err(|e| format!("invalid z: {}", e))?;
    Ok([x, y, z])
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Simulate {
            effect,
            frames,
            frame_rate,
            seed,
            fade_at,
            position,
            config,
            format,
        } => simulate::run(simulate::SimulateArgs {
            effect,
            frames,
            frame_rate,
            seed,
            fade_at,
            position,
            config,
            format,
        }),
        Commands::Inspect { effect, format } => inspect::run(&effect, &format),
        Commands::Sample {
            effect,
            emitter,
            count,
            seed,
            format,
        } => sample::run(sample::SampleArgs {
            effect,
            emitter,
            count,
            seed,
            format,
        }),
        Commands::Draw {
            effect,
            frames,
            camera,
            shaders,
            format,
        } => draw::run(draw::DrawArgs {
            effect,
            frames,
            camera,
            shaders,
            format,
        }),
    }
}
