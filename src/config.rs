// ============================================================================
// config.rs - alife-canvas
// Simulation tunables, render-side values and engine construction settings.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::brush::BrushSettings;
use crate::palette::ControlPoint;

/// Surface dimensions in texels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ======================== Simulation Parameters ========================

/// Reaction-diffusion tunables. Values are passed to the simulation pass as
/// given; nothing here is range-checked.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub feed: f32,
    pub kill: f32,
    pub diffusion_a: f32,
    pub diffusion_b: f32,
    pub time_step: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            feed: 0.0367,
            kill: 0.0649,
            diffusion_a: 1.0,
            diffusion_b: 0.5,
            time_step: 1.0,
        }
    }
}

impl SimulationParams {
    /// New value with every `Some` field of `overrides` applied.
    pub fn with_overrides(&self, overrides: &ParamOverrides) -> Self {
        Self {
            feed: overrides.feed.unwrap_or(self.feed),
            kill: overrides.kill.unwrap_or(self.kill),
            diffusion_a: overrides.diffusion_a.unwrap_or(self.diffusion_a),
            diffusion_b: overrides.diffusion_b.unwrap_or(self.diffusion_b),
            time_step: overrides.time_step.unwrap_or(self.time_step),
        }
    }
}

/// Partial update for [`SimulationParams`]; missing JSON keys stay `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamOverrides {
    pub feed: Option<f32>,
    pub kill: Option<f32>,
    pub diffusion_a: Option<f32>,
    pub diffusion_b: Option<f32>,
    pub time_step: Option<f32>,
}

impl ParamOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ======================== Render Data ========================

/// Lighting applied by the display pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderData {
    pub light_color: [f32; 3],
    pub light_intensity: f32,
}

impl Default for RenderData {
    fn default() -> Self {
        Self {
            light_color: [1.0, 1.0, 1.0],
            light_intensity: 0.5,
        }
    }
}

// ======================== Engine Config ========================

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub params: SimulationParams,
    pub palette: Vec<ControlPoint>,
    pub render: RenderData,
    pub brush: BrushSettings,
    /// Seed for the random fill tool. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            params: SimulationParams::default(),
            palette: Vec::new(),
            render: RenderData::default(),
            brush: BrushSettings::default(),
            seed: None,
        }
    }
}
