// ============================================================================
// cli.rs - alife-canvas
// Command-line flags for the headless runner.
// ============================================================================

use std::path::PathBuf;

use alife_canvas::{Channel, FillSpec, Size};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "alife-canvas",
    version,
    about = "Headless reaction-diffusion runner with brush and fill tools"
)]
pub struct Cli {
    /// Surface resolution (e.g. `512x512`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "512x512")]
    pub size: Size,

    /// Number of simulation steps to run.
    #[arg(long, default_value_t = 2_000)]
    pub frames: u64,

    /// Log throughput every N frames (0 = never).
    #[arg(long, value_name = "FRAMES", default_value_t = 500)]
    pub progress_interval: u64,

    /// Read back and log surface statistics every N frames (0 = never).
    #[arg(long, value_name = "FRAMES", default_value_t = 500)]
    pub metrics_interval: u64,

    /// Fill applied before the first step: `CHANNEL:uniform:INTENSITY` or
    /// `CHANNEL:random:INTENSITY:THRESHOLD`. May be repeated.
    #[arg(long, value_name = "SPEC", value_parser = parse_fill)]
    pub fill: Vec<FillSpec>,

    /// JSON file with simulation parameter overrides.
    #[arg(long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// JSON file with palette control points.
    #[arg(long, value_name = "PATH")]
    pub palette: Option<PathBuf>,

    /// Load WGSL sources from this directory instead of the built-in ones.
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Seed for random fills.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip the scripted brush stroke across the middle of the surface.
    #[arg(long)]
    pub no_stroke: bool,

    /// Root directory for run output.
    #[arg(long, value_name = "DIR", default_value = "runs")]
    pub out_dir: PathBuf,

    /// Do not write any run output.
    #[arg(long)]
    pub no_export: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<Size, String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{value}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = w.parse().map_err(|_| format!("invalid width '{w}'"))?;
    let height: u32 = h.parse().map_err(|_| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size '{value}' must be non-zero"));
    }
    Ok(Size::new(width, height))
}

pub fn parse_fill(value: &str) -> Result<FillSpec, String> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    let channel = match parts.first().map(|c| c.to_ascii_uppercase()).as_deref() {
        Some("R") => Channel::R,
        Some("G") => Channel::G,
        Some("B") => Channel::B,
        Some("A") => Channel::A,
        _ => return Err(format!("invalid fill '{value}'; channel must be R, G, B or A")),
    };
    let intensity = |s: &str| {
        s.parse::<u8>()
            .map_err(|_| format!("invalid fill intensity '{s}'; expected 0-255"))
    };
    match parts.as_slice() {
        [_, "uniform", level] => Ok(FillSpec::uniform(channel, intensity(*level)?)),
        [_, "random", level, threshold] => {
            let threshold: f32 = threshold
                .parse()
                .map_err(|_| format!("invalid fill threshold '{threshold}'"))?;
            Ok(FillSpec::random(channel, intensity(*level)?, threshold))
        }
        _ => Err(format!(
            "invalid fill '{value}'; use CHANNEL:uniform:INTENSITY or CHANNEL:random:INTENSITY:THRESHOLD"
        )),
    }
}
