// ============================================================================
// main.rs - alife-canvas
// Entry point. Initializes logging, builds the engine from the command line
// and runs it headless.
// ============================================================================

mod cli;
mod headless;

use std::path::Path;

use alife_canvas::{
    block_on, ControlPoint, EngineConfig, GpuContext, ParamOverrides, ProgramSources, SimulationEngine,
    SimulationParams,
};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use headless::HeadlessConfig;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::parse();

    let mut config = EngineConfig {
        seed: args.seed,
        ..Default::default()
    };
    if let Some(path) = &args.params {
        let overrides: ParamOverrides = read_json(path)?;
        config.params = SimulationParams::default().with_overrides(&overrides);
    }
    if let Some(path) = &args.palette {
        config.palette = read_json::<Vec<ControlPoint>>(path)?;
    }

    let sources = match &args.shader_dir {
        Some(dir) => ProgramSources::from_dir(dir)?,
        None => ProgramSources::builtin(),
    };

    let context = block_on(GpuContext::headless()).context("failed to acquire a GPU")?;
    let mut engine = SimulationEngine::new(context, config, sources)?;
    block_on(engine.initialize(args.size)).context("engine initialization failed")?;

    let run = HeadlessConfig {
        frames: args.frames,
        progress_interval: args.progress_interval,
        metrics_interval: args.metrics_interval,
        fills: args.fill,
        stroke: !args.no_stroke,
        export_root: (!args.no_export).then_some(args.out_dir),
    };
    let result = headless::run_headless(&mut engine, &run);
    engine.teardown();
    result
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}
