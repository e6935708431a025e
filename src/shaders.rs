// ============================================================================
// shaders.rs - alife-canvas
// WGSL sources for the shared vertex stage and the three fragment programs.
// ============================================================================

use std::path::Path;

use crate::error::{EngineError, Result};

#[derive(Clone, Debug)]
pub struct ProgramSources {
    pub vertex: String,
    pub simulation: String,
    pub render: String,
    pub paint: String,
}

impl ProgramSources {
    /// Shaders compiled into the crate.
    pub fn builtin() -> Self {
        Self {
            vertex: include_str!("shaders/quad.wgsl").to_string(),
            simulation: include_str!("shaders/simulation.wgsl").to_string(),
            render: include_str!("shaders/render.wgsl").to_string(),
            paint: include_str!("shaders/paint.wgsl").to_string(),
        }
    }

    /// Loads `quad.wgsl`, `simulation.wgsl`, `render.wgsl` and `paint.wgsl`
    /// from `dir`, so shaders can be edited without rebuilding.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|source| EngineError::ShaderSource { path, source })
        };
        let sources = Self {
            vertex: read("quad.wgsl")?,
            simulation: read("simulation.wgsl")?,
            render: read("render.wgsl")?,
            paint: read("paint.wgsl")?,
        };
        log::info!("loaded shader sources from {}", dir.display());
        Ok(sources)
    }
}
