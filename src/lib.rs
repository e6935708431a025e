// ============================================================================
// lib.rs - alife-canvas
// Double-buffered GPU cellular simulation: ping-pong state surface, brush
// and fill editing, palette-mapped display.
// ============================================================================

pub mod brush;
pub mod config;
pub mod engine;
pub mod error;
pub mod fill;
pub mod gpu;
pub mod metrics;
pub mod palette;
pub mod pipeline;
pub mod shaders;
pub mod surface;
pub mod uniforms;

pub use brush::{
    BrushEvent, BrushInk, BrushMode, BrushSettings, BrushStrokeTracker, PaintCommand, PointerAction,
    StrokeState,
};
pub use config::{EngineConfig, ParamOverrides, RenderData, SimulationParams, Size};
pub use engine::{EngineState, SimulationEngine};
pub use error::{EngineError, Result};
pub use fill::{apply_fill, Channel, FillMode, FillSpec};
pub use gpu::{block_on, GpuContext, ResourceFactory, Texture, TextureDescriptor};
pub use metrics::{MetricsRecord, SurfaceStats};
pub use palette::{ControlPoint, PaletteBuilder, Rgb};
pub use shaders::ProgramSources;
pub use surface::PingPongSurface;
