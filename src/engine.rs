// ============================================================================
// engine.rs - alife-canvas
// SimulationEngine: owns the programs, the ping-pong surface, the palette
// and the display canvas, and sequences every pass over them.
// ============================================================================

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::brush::{BrushEvent, BrushMode, BrushSettings, BrushStrokeTracker, PaintCommand, StrokeState};
use crate::config::{EngineConfig, ParamOverrides, RenderData, SimulationParams, Size};
use crate::error::{EngineError, Result};
use crate::fill::{apply_fill, FillSpec};
use crate::gpu::{Framebuffer, GpuContext, ResourceFactory, Texture, TextureDescriptor, TEXTURE_FORMAT};
use crate::palette::{ControlPoint, PaletteBuilder};
use crate::pipeline::{Program, ProgramDescriptor};
use crate::shaders::ProgramSources;
use crate::surface::PingPongSurface;
use crate::uniforms::{PaintUniform, RenderUniform, SimulationUniform, UniformValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Destroyed,
}

// ======================== Owned GPU Objects ========================

struct Programs {
    simulation: Program<SimulationUniform>,
    render: Program<RenderUniform>,
    paint: Program<PaintUniform>,
}

impl Programs {
    async fn compile(factory: &ResourceFactory, sources: &ProgramSources) -> Result<Self> {
        let simulation =
            Program::new(factory, &descriptor("simulation", &sources.vertex, &sources.simulation, 1)).await?;
        // unit 0 = state, unit 1 = palette
        let render = Program::new(factory, &descriptor("render", &sources.vertex, &sources.render, 2)).await?;
        let paint = Program::new(factory, &descriptor("paint", &sources.vertex, &sources.paint, 1)).await?;
        Ok(Self {
            simulation,
            render,
            paint,
        })
    }
}

fn descriptor<'a>(
    label: &'a str,
    vertex_source: &'a str,
    fragment_source: &'a str,
    texture_units: u32,
) -> ProgramDescriptor<'a> {
    ProgramDescriptor {
        label,
        vertex_source,
        fragment_source,
        texture_units,
        target_format: TEXTURE_FORMAT,
    }
}

/// Display target the render pass draws into.
struct Canvas {
    texture: Texture,
    framebuffer: Framebuffer,
}

impl Canvas {
    fn new(factory: &ResourceFactory, size: Size) -> Result<Self> {
        let mut desc = TextureDescriptor::state(size.width, size.height);
        desc.label = "canvas";
        let texture = factory.create_texture(&desc)?;
        let framebuffer = factory.create_framebuffer(&texture)?;
        Ok(Self {
            texture,
            framebuffer,
        })
    }
}

// ======================== Engine ========================

pub struct SimulationEngine {
    factory: ResourceFactory,
    sources: ProgramSources,
    state: EngineState,

    surface: PingPongSurface,
    canvas: Option<Canvas>,
    programs: Option<Programs>,
    palette: Option<Texture>,

    params: SimulationParams,
    palette_points: Vec<ControlPoint>,
    render_data: RenderData,
    brush_settings: BrushSettings,
    tracker: BrushStrokeTracker,
    rng: StdRng,
}

impl SimulationEngine {
    /// Creates the engine and its palette texture. No surface exists until
    /// [`initialize`](Self::initialize) completes.
    pub fn new(context: GpuContext, config: EngineConfig, sources: ProgramSources) -> Result<Self> {
        let factory = ResourceFactory::new(context);
        let palette = PaletteBuilder::create_texture(&factory)?;
        PaletteBuilder::upload(&factory, &palette, &config.palette)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            factory,
            sources,
            state: EngineState::Uninitialized,
            surface: PingPongSurface::new(),
            canvas: None,
            programs: None,
            palette: Some(palette),
            params: config.params,
            palette_points: config.palette,
            render_data: config.render,
            brush_settings: config.brush,
            tracker: BrushStrokeTracker::new(),
            rng,
        })
    }

    /// Compiles every program and allocates the surface and canvas at
    /// `size`. Programs are compiled before any allocation so a broken
    /// program never discards an existing surface. On error a previously
    /// Ready engine whose frame is intact stays Ready; otherwise it stays
    /// `Initializing`, where every pass is a no-op, until a later call
    /// succeeds.
    pub async fn initialize(&mut self, size: Size) -> Result<()> {
        let previous = self.state;
        if previous == EngineState::Destroyed {
            return Err(EngineError::Destroyed);
        }
        self.state = EngineState::Initializing;
        log::info!("initializing engine at {}", size);

        let programs = match Programs::compile(&self.factory, &self.sources).await {
            Ok(programs) => programs,
            Err(err) => {
                log::error!("engine initialization failed: {err}");
                self.restore(previous);
                return Err(err);
            }
        };
        if let Err(err) = self.allocate_frame(size).await {
            log::error!("engine initialization failed: {err}");
            self.restore(previous);
            return Err(err);
        }

        self.programs = Some(programs);
        self.tracker.reset();
        self.state = EngineState::Ready;
        log::info!("engine ready ({} textures created so far)", self.factory.textures_created());
        Ok(())
    }

    /// Reallocates the surface and canvas at `size`. Simulation content is
    /// discarded; the new surface starts zeroed. A failed allocation leaves
    /// the previous surface, its contents and the Ready state untouched.
    pub async fn resize(&mut self, size: Size) -> Result<()> {
        match self.state {
            EngineState::Ready => {}
            EngineState::Destroyed => return Err(EngineError::Destroyed),
            _ => return Err(EngineError::NotReady),
        }
        self.state = EngineState::Initializing;

        if let Err(err) = self.allocate_frame(size).await {
            log::error!("resize to {} failed: {err}", size);
            self.restore(EngineState::Ready);
            return Err(err);
        }

        self.tracker.reset();
        self.state = EngineState::Ready;
        log::info!("engine resized to {}", size);
        Ok(())
    }

    /// Builds the canvas before touching the surface, whose `allocate` keeps
    /// the old slots on failure, so a failed call commits nothing.
    async fn allocate_frame(&mut self, size: Size) -> Result<()> {
        let factory = &self.factory;
        let surface = &mut self.surface;
        let canvas = factory
            .guarded("surface", || {
                let canvas = Canvas::new(factory, size)?;
                surface.allocate(factory, size, None)?;
                Ok(canvas)
            })
            .await?;
        self.canvas = Some(canvas);
        Ok(())
    }

    /// Returns to `previous` after a failed (re)allocation when it was Ready
    /// and the programs, surface and canvas still agree.
    fn restore(&mut self, previous: EngineState) {
        let intact = self.programs.is_some()
            && self.surface.size().is_some()
            && self.surface.size() == self.canvas.as_ref().map(|canvas| canvas.texture.size());
        if previous == EngineState::Ready && intact {
            self.state = EngineState::Ready;
            log::warn!("kept previous surface at {:?}", self.surface.size());
        }
    }

    // ======================== Passes ========================

    /// One simulation step from the read slot into the write slot, then swap.
    pub fn update(&mut self) {
        if !self.is_ready() {
            log::trace!("update ignored: engine is {:?}", self.state);
            return;
        }
        let (Some(programs), Ok((read, write))) = (self.programs.as_mut(), self.surface.current()) else {
            return;
        };

        let size = write.texture().size();
        let params = self.params;
        let program = &mut programs.simulation;
        program.set(SimulationUniform::Resolution, resolution(size));
        program.set(SimulationUniform::Feed, UniformValue::F32(params.feed));
        program.set(SimulationUniform::Kill, UniformValue::F32(params.kill));
        program.set(SimulationUniform::DiffusionA, UniformValue::F32(params.diffusion_a));
        program.set(SimulationUniform::DiffusionB, UniformValue::F32(params.diffusion_b));
        program.set(SimulationUniform::TimeStep, UniformValue::F32(params.time_step));
        if program.draw(self.factory.context(), write.framebuffer(), &[read.texture()]) {
            self.swap();
        }
    }

    /// Draws the read slot through the palette into the canvas. Never swaps.
    pub fn render(&mut self) {
        if !self.is_ready() {
            log::trace!("render ignored: engine is {:?}", self.state);
            return;
        }
        let (Some(programs), Some(canvas), Some(palette), Ok((read, _))) = (
            self.programs.as_mut(),
            self.canvas.as_ref(),
            self.palette.as_ref(),
            self.surface.current(),
        ) else {
            return;
        };

        let (cursor, cursor_radius) = match self.tracker.last_pointer() {
            Some(position) => (position, self.brush_settings.radius),
            None => ([0.0, 0.0], 0.0),
        };

        let program = &mut programs.render;
        program.set(RenderUniform::Resolution, resolution(canvas.texture.size()));
        program.set(RenderUniform::BrushPosition, UniformValue::Vec2(cursor));
        program.set(RenderUniform::LightColor, UniformValue::Vec3(self.render_data.light_color));
        program.set(RenderUniform::LightIntensity, UniformValue::F32(self.render_data.light_intensity));
        program.set(RenderUniform::BrushRadius, UniformValue::F32(cursor_radius));
        if !program.draw(self.factory.context(), &canvas.framebuffer, &[read.texture(), palette]) {
            log::warn!("render pass skipped; canvas keeps the previous frame");
        }
    }

    /// Feeds a pointer event to the stroke tracker and executes the
    /// resulting paint command, if any, as one write pass plus a swap.
    pub fn brush(&mut self, event: &BrushEvent) {
        if !self.is_ready() {
            log::trace!("brush event ignored: engine is {:?}", self.state);
            return;
        }
        let Some(size) = self.surface.size() else {
            return;
        };
        let Some(command) = self.tracker.apply(event, size.height, &self.brush_settings) else {
            log::trace!("stray {:?} ignored", event.action);
            return;
        };
        if self.paint(&command) {
            self.swap();
        }
    }

    fn paint(&mut self, command: &PaintCommand) -> bool {
        let (Some(programs), Ok((read, write))) = (self.programs.as_mut(), self.surface.current()) else {
            return false;
        };

        let program = &mut programs.paint;
        program.set(PaintUniform::Resolution, resolution(write.texture().size()));
        program.set(PaintUniform::Start, UniformValue::Vec2(command.start));
        program.set(PaintUniform::End, UniformValue::Vec2(command.end));
        program.set(PaintUniform::Radius, UniformValue::F32(command.radius));
        program.set(
            PaintUniform::Erase,
            UniformValue::U32(u32::from(command.mode == BrushMode::Erase)),
        );
        program.set(PaintUniform::Color, UniformValue::Vec4(command.color()));
        program.set(PaintUniform::Mask, UniformValue::Vec4(command.mask()));
        if !program.draw(self.factory.context(), write.framebuffer(), &[read.texture()]) {
            return false;
        }

        log::debug!(
            "{:?} {} at {:?} -> {:?}",
            command.mode,
            if command.is_dab() { "dab" } else { "segment" },
            command.start,
            command.end
        );
        true
    }

    /// Reads back the read slot, rewrites one channel on the host, uploads the
    /// result into the write slot and swaps. Blocks on the GPU; keep it out of
    /// per-frame paths.
    pub fn fill(&mut self, spec: &FillSpec) -> Result<()> {
        if !self.is_ready() {
            log::trace!("fill ignored: engine is {:?}", self.state);
            return Ok(());
        }
        let (read, write) = self.surface.current()?;

        let mut pixels = self.factory.read_texture(read.texture())?;
        let filled = apply_fill(&mut pixels, spec, &mut self.rng);
        self.factory.write_texture(write.texture(), &pixels)?;
        self.surface.swap()?;

        log::debug!(
            "fill {:?} on {:?}: {} of {} texels set to {}",
            spec.mode,
            spec.channel,
            filled,
            pixels.len() / 4,
            spec.intensity
        );
        Ok(())
    }

    fn swap(&mut self) {
        if let Err(err) = self.surface.swap() {
            log::error!("surface swap failed: {err}");
        }
    }

    /// Releases every GPU object. Safe to call repeatedly and from any state.
    pub fn teardown(&mut self) {
        self.surface.release();
        self.canvas = None;
        self.programs = None;
        self.palette = None;
        self.tracker.reset();
        if self.state != EngineState::Destroyed {
            log::info!("engine torn down after {} swaps", self.surface.swap_count());
            self.state = EngineState::Destroyed;
        }
    }

    // ======================== Setters ========================

    pub fn set_params(&mut self, params: SimulationParams) {
        self.params = params;
    }

    pub fn merge_params(&mut self, overrides: &ParamOverrides) {
        self.params = self.params.with_overrides(overrides);
    }

    /// Replaces the control points and rewrites the palette texture in place.
    pub fn set_palette(&mut self, points: Vec<ControlPoint>) -> Result<()> {
        if let Some(palette) = &self.palette {
            PaletteBuilder::upload(&self.factory, palette, &points)?;
        }
        self.palette_points = points;
        Ok(())
    }

    pub fn set_light_color(&mut self, color: [f32; 3]) {
        self.render_data.light_color = color;
    }

    pub fn set_light_intensity(&mut self, intensity: f32) {
        self.render_data.light_intensity = intensity;
    }

    pub fn set_brush(&mut self, settings: BrushSettings) {
        self.brush_settings = settings;
    }

    // ======================== Observers ========================

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    pub fn size(&self) -> Option<Size> {
        self.surface.size()
    }

    pub fn params(&self) -> SimulationParams {
        self.params
    }

    pub fn palette_points(&self) -> &[ControlPoint] {
        &self.palette_points
    }

    pub fn render_data(&self) -> RenderData {
        self.render_data
    }

    pub fn brush_settings(&self) -> BrushSettings {
        self.brush_settings
    }

    pub fn stroke_state(&self) -> StrokeState {
        self.tracker.state()
    }

    pub fn swap_count(&self) -> u64 {
        self.surface.swap_count()
    }

    pub fn read_index(&self) -> usize {
        self.surface.read_index()
    }

    /// Blocking readback of the slot the next pass will read.
    pub fn read_state(&self) -> Result<Vec<u8>> {
        self.check_ready()?;
        let (read, _) = self.surface.current()?;
        self.factory.read_texture(read.texture())
    }

    /// Blocking readback of the last rendered frame.
    pub fn read_canvas(&self) -> Result<Vec<u8>> {
        self.check_ready()?;
        let canvas = self.canvas.as_ref().ok_or(EngineError::NotReady)?;
        self.factory.read_texture(&canvas.texture)
    }

    pub fn canvas(&self) -> Option<&Texture> {
        self.canvas.as_ref().map(|canvas| &canvas.texture)
    }

    fn check_ready(&self) -> Result<()> {
        match self.state {
            EngineState::Ready => Ok(()),
            EngineState::Destroyed => Err(EngineError::Destroyed),
            _ => Err(EngineError::NotReady),
        }
    }
}

fn resolution(size: Size) -> UniformValue {
    UniformValue::Vec2([size.width as f32, size.height as f32])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::BrushInk;
    use crate::fill::{Channel, FillSpec};
    use crate::gpu::block_on;
    use crate::gpu::tests::test_context;

    fn engine_with(config: EngineConfig, sources: ProgramSources) -> Option<SimulationEngine> {
        let context = test_context()?;
        Some(SimulationEngine::new(context, config, sources).unwrap())
    }

    fn ready_engine(size: Size) -> Option<SimulationEngine> {
        let config = EngineConfig {
            seed: Some(3),
            ..Default::default()
        };
        let mut engine = engine_with(config, ProgramSources::builtin())?;
        block_on(engine.initialize(size)).unwrap();
        Some(engine)
    }

    fn channel(pixels: &[u8], c: usize) -> impl Iterator<Item = u8> + '_ {
        pixels.chunks(4).map(move |texel| texel[c])
    }

    #[test]
    fn swap_parity_across_pass_kinds() {
        let Some(mut engine) = ready_engine(Size::new(16, 16)) else { return };
        assert_eq!(engine.read_index(), 0);

        engine.update();
        engine.brush(&BrushEvent::down(4.0, 4.0));
        engine.brush(&BrushEvent::moved(8.0, 4.0));
        engine.fill(&FillSpec::uniform(Channel::B, 10)).unwrap();
        engine.brush(&BrushEvent::up(8.0, 4.0));
        // stray events do not swap
        engine.brush(&BrushEvent::moved(1.0, 1.0));
        engine.render();

        assert_eq!(engine.swap_count(), 5);
        assert_eq!(engine.read_index(), 1);
        engine.update();
        assert_eq!(engine.read_index(), 0);
    }

    #[test]
    fn uniform_fill_reads_back() {
        let Some(mut engine) = ready_engine(Size::new(8, 8)) else { return };
        engine.fill(&FillSpec::uniform(Channel::R, 200)).unwrap();
        let state = engine.read_state().unwrap();
        assert_eq!(state.len(), 8 * 8 * 4);
        assert!(channel(&state, 0).all(|v| v == 200));
        for c in 1..4 {
            assert!(channel(&state, c).all(|v| v == 0));
        }
    }

    #[test]
    fn random_fill_thresholds() {
        let Some(mut engine) = ready_engine(Size::new(8, 8)) else { return };
        engine.fill(&FillSpec::random(Channel::G, 255, 0.0)).unwrap();
        assert!(channel(&engine.read_state().unwrap(), 1).all(|v| v == 0));

        engine.fill(&FillSpec::random(Channel::G, 255, 1.0)).unwrap();
        assert!(channel(&engine.read_state().unwrap(), 1).all(|v| v == 255));
    }

    #[test]
    fn brush_dab_lands_under_pointer() {
        let Some(mut engine) = ready_engine(Size::new(16, 8)) else { return };
        engine.set_brush(BrushSettings {
            mode: BrushMode::Draw,
            radius: 1.5,
            ink: BrushInk::Channel { channel: Channel::R, intensity: 255 },
        });
        engine.brush(&BrushEvent::down(5.0, 3.0));

        let state = engine.read_state().unwrap();
        let texel = |x: usize, y: usize| state[(y * 16 + x) * 4];
        assert_eq!(texel(5, 3), 255);
        assert_eq!(texel(12, 6), 0);
        assert_eq!(engine.stroke_state(), StrokeState::Active { x: 5.0, y: 5.0 });

        engine.set_brush(BrushSettings {
            mode: BrushMode::Erase,
            radius: 1.5,
            ink: BrushInk::Channel { channel: Channel::R, intensity: 255 },
        });
        engine.brush(&BrushEvent::down(5.0, 3.0));
        assert_eq!(engine.read_state().unwrap()[(3 * 16 + 5) * 4], 0);
    }

    #[test]
    fn update_applies_feed_to_empty_state() {
        let Some(mut engine) = ready_engine(Size::new(8, 8)) else { return };
        engine.update();
        let state = engine.read_state().unwrap();
        // A grows from the feed term, B stays absent
        assert!(channel(&state, 0).all(|v| v > 0));
        assert!(channel(&state, 1).all(|v| v == 0));
    }

    #[test]
    fn render_fills_canvas_without_swapping() {
        let Some(mut engine) = ready_engine(Size::new(8, 4)) else { return };
        engine.render();
        engine.render();
        assert_eq!(engine.swap_count(), 0);
        assert_eq!(engine.read_index(), 0);

        let canvas = engine.read_canvas().unwrap();
        assert_eq!(canvas.len(), 8 * 4 * 4);
        assert!(channel(&canvas, 3).all(|a| a == 255));
        assert_eq!(engine.canvas().map(|c| c.size()), Some(Size::new(8, 4)));
    }

    #[test]
    fn render_maps_state_through_palette() {
        let Some(mut engine) = ready_engine(Size::new(8, 4)) else { return };
        engine.set_light_intensity(0.0);

        engine.fill(&FillSpec::uniform(Channel::G, 128)).unwrap();
        engine.render();
        for texel in engine.read_canvas().unwrap().chunks(4) {
            assert!(texel[..3].iter().all(|&c| c.abs_diff(128) <= 1), "{texel:?}");
            assert_eq!(texel[3], 255);
        }

        engine.fill(&FillSpec::uniform(Channel::G, 0)).unwrap();
        engine.render();
        assert!(engine.read_canvas().unwrap().chunks(4).all(|t| t == [0, 0, 0, 255]));

        engine
            .set_palette(vec![ControlPoint::new(0.0, "#ff0000".parse().unwrap())])
            .unwrap();
        engine.render();
        assert!(engine.read_canvas().unwrap().chunks(4).all(|t| t == [255, 0, 0, 255]));
    }

    #[test]
    fn failed_resize_keeps_previous_surface() {
        let Some(mut engine) = ready_engine(Size::new(8, 8)) else { return };
        engine.fill(&FillSpec::uniform(Channel::R, 200)).unwrap();
        let before = engine.read_state().unwrap();

        let result = block_on(engine.resize(Size::new(0, 8)));
        assert!(matches!(result, Err(EngineError::ResourceCreation(_))));
        assert!(engine.is_ready());
        assert_eq!(engine.size(), Some(Size::new(8, 8)));
        assert_eq!(engine.read_state().unwrap(), before);

        let swaps = engine.swap_count();
        engine.update();
        assert_eq!(engine.swap_count(), swaps + 1);

        block_on(engine.resize(Size::new(16, 16))).unwrap();
        assert_eq!(engine.size(), Some(Size::new(16, 16)));
    }

    #[test]
    fn failed_reinitialize_keeps_ready_engine() {
        let Some(mut engine) = ready_engine(Size::new(8, 8)) else { return };
        engine.fill(&FillSpec::uniform(Channel::B, 50)).unwrap();
        let before = engine.read_state().unwrap();

        assert!(block_on(engine.initialize(Size::new(0, 0))).is_err());
        assert!(engine.is_ready());
        assert_eq!(engine.read_state().unwrap(), before);
        assert_eq!(engine.canvas().map(|c| c.size()), Some(Size::new(8, 8)));
    }

    #[test]
    fn resize_discards_state() {
        let Some(mut engine) = ready_engine(Size::new(8, 8)) else { return };
        engine.fill(&FillSpec::uniform(Channel::R, 255)).unwrap();
        engine.brush(&BrushEvent::down(2.0, 2.0));

        block_on(engine.resize(Size::new(12, 6))).unwrap();
        assert!(engine.is_ready());
        assert_eq!(engine.size(), Some(Size::new(12, 6)));
        assert_eq!(engine.stroke_state(), StrokeState::Idle);

        let state = engine.read_state().unwrap();
        assert_eq!(state.len(), 12 * 6 * 4);
        assert!(state.iter().all(|&b| b == 0));
    }

    #[test]
    fn operations_before_ready_are_no_ops() {
        let Some(mut engine) = engine_with(EngineConfig::default(), ProgramSources::builtin()) else {
            return;
        };
        assert_eq!(engine.state(), EngineState::Uninitialized);

        engine.update();
        engine.render();
        engine.brush(&BrushEvent::down(1.0, 1.0));
        engine.fill(&FillSpec::uniform(Channel::R, 1)).unwrap();

        assert_eq!(engine.swap_count(), 0);
        assert_eq!(engine.stroke_state(), StrokeState::Idle);
        assert!(matches!(engine.read_state(), Err(EngineError::NotReady)));
        assert!(matches!(
            block_on(engine.resize(Size::new(4, 4))),
            Err(EngineError::NotReady)
        ));
    }

    #[test]
    fn broken_program_leaves_engine_initializing() {
        let mut sources = ProgramSources::builtin();
        sources.paint = String::from("@fragment fn fs_main() -> @location(0) vec4<f32> { return missing; }");
        let Some(mut engine) = engine_with(EngineConfig::default(), sources) else { return };

        let result = block_on(engine.initialize(Size::new(4, 4)));
        assert!(matches!(result, Err(EngineError::Compile { .. })));
        assert_eq!(engine.state(), EngineState::Initializing);

        engine.update();
        assert_eq!(engine.swap_count(), 0);
    }

    #[test]
    fn zero_size_fails_initialization() {
        let Some(mut engine) = engine_with(EngineConfig::default(), ProgramSources::builtin()) else {
            return;
        };
        let result = block_on(engine.initialize(Size::new(0, 0)));
        assert!(matches!(result, Err(EngineError::ResourceCreation(_))));
        assert!(!engine.is_ready());
    }

    #[test]
    fn teardown_is_idempotent_and_final() {
        let Some(mut engine) = ready_engine(Size::new(4, 4)) else { return };
        engine.teardown();
        engine.teardown();
        assert_eq!(engine.state(), EngineState::Destroyed);
        assert!(engine.canvas().is_none());
        assert!(engine.size().is_none());

        engine.update();
        assert!(matches!(engine.read_state(), Err(EngineError::Destroyed)));
        assert!(matches!(
            block_on(engine.initialize(Size::new(4, 4))),
            Err(EngineError::Destroyed)
        ));
    }

    #[test]
    fn setters_replace_values() {
        let Some(mut engine) = ready_engine(Size::new(4, 4)) else { return };
        engine.merge_params(&ParamOverrides {
            feed: Some(0.055),
            ..Default::default()
        });
        assert_eq!(engine.params().feed, 0.055);
        assert_eq!(engine.params().kill, SimulationParams::default().kill);

        engine.set_light_intensity(0.9);
        engine.set_light_color([1.0, 0.5, 0.0]);
        assert_eq!(engine.render_data().light_intensity, 0.9);

        let points = vec![ControlPoint::new(0.5, "#ff0000".parse().unwrap())];
        engine.set_palette(points.clone()).unwrap();
        assert_eq!(engine.palette_points(), points.as_slice());
        engine.render();
        assert_eq!(engine.swap_count(), 0);
    }
}
