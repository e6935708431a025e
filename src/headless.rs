// ============================================================================
// headless.rs - alife-canvas
// Headless runner: seeds the surface, paints a scripted stroke, steps the
// simulation and exports the run (config, metrics CSV, final frame).
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use alife_canvas::{BrushEvent, FillSpec, MetricsRecord, SimulationEngine, Size, SurfaceStats};
use anyhow::{Context, Result};
use chrono::Local;

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    pub frames: u64,
    pub progress_interval: u64,
    pub metrics_interval: u64,
    pub fills: Vec<FillSpec>,
    pub stroke: bool,
    /// Root under which a timestamped run directory is created.
    pub export_root: Option<PathBuf>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            frames: 2_000,
            progress_interval: 500,
            metrics_interval: 500,
            fills: Vec::new(),
            stroke: true,
            export_root: None,
        }
    }
}

/// Horizontal stroke across the middle of the surface, in pointer space.
pub fn scripted_stroke(size: Size) -> Vec<BrushEvent> {
    const STEPS: u32 = 8;
    let y = size.height as f32 / 2.0;
    let x0 = size.width as f32 / 4.0;
    let x1 = size.width as f32 * 3.0 / 4.0;

    let mut events = vec![BrushEvent::down(x0, y)];
    for i in 1..=STEPS {
        events.push(BrushEvent::moved(x0 + (x1 - x0) * i as f32 / STEPS as f32, y));
    }
    events.push(BrushEvent::up(x1, y));
    events
}

/// Drives a Ready engine through the configured run.
pub fn run_headless(engine: &mut SimulationEngine, config: &HeadlessConfig) -> Result<()> {
    let size = engine.size().context("engine has no surface; initialize it first")?;
    let output = match &config.export_root {
        Some(root) => Some(RunOutput::create(root)?),
        None => None,
    };
    if let Some(output) = &output {
        output.save_config(engine, config)?;
    }

    for spec in &config.fills {
        engine.fill(spec).with_context(|| format!("fill {spec:?} failed"))?;
    }
    if config.stroke {
        for event in scripted_stroke(size) {
            engine.brush(&event);
        }
    }

    log::info!("Headless run started: {} frames on {}", config.frames, size);

    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut last_report_frame = 0u64;
    let mut prev_stats: Option<SurfaceStats> = None;
    let mut records = Vec::new();

    for step in 0..config.frames {
        engine.update();
        let done = step + 1;

        if config.progress_interval > 0 && done % config.progress_interval == 0 {
            let total_elapsed = started.elapsed().as_secs_f64().max(1e-6);
            let total_fps = done as f64 / total_elapsed;

            let window_elapsed = last_report.elapsed().as_secs_f64().max(1e-6);
            let window_fps = (done - last_report_frame) as f64 / window_elapsed;

            let remaining = config.frames.saturating_sub(done);
            let eta_secs = if total_fps > 1e-6 {
                remaining as f64 / total_fps
            } else {
                0.0
            };

            log::info!(
                "Headless progress: {}/{} | fps={:.0} (window {:.0}) | ETA={:.1} min",
                done,
                config.frames,
                total_fps,
                window_fps,
                eta_secs / 60.0,
            );

            last_report = Instant::now();
            last_report_frame = done;
        }

        if config.metrics_interval > 0 && done % config.metrics_interval == 0 {
            let stats = SurfaceStats::from_pixels(&engine.read_state()?);
            stats.log(done, prev_stats.as_ref());
            let elapsed = started.elapsed().as_secs_f64();
            let fps = (done as f64 / elapsed.max(1e-6)) as f32;
            records.push(MetricsRecord::new(done, elapsed * 1000.0, fps, &stats));
            prev_stats = Some(stats);
        }
    }

    engine.render();
    log::info!(
        "Headless run finished in {:.1}s ({} swaps)",
        started.elapsed().as_secs_f64(),
        engine.swap_count()
    );

    if let Some(output) = &output {
        output.export_metrics_csv(&records)?;
        let frame = engine.read_canvas()?;
        output.save_frame(size, &frame)?;
        log::info!("Run exported to {}", output.dir().display());
    }
    Ok(())
}

// ======================== Run Output ========================

struct RunOutput {
    run_id: String,
    started_at: String,
    dir: PathBuf,
}

impl RunOutput {
    /// `<root>/<YYYY-MM-DD>/run_<YYYYmmdd_HHMMSS>`
    fn create(root: &Path) -> Result<Self> {
        let now = Local::now();
        let run_id = format!("run_{}", now.format("%Y%m%d_%H%M%S"));
        let dir = root.join(now.format("%Y-%m-%d").to_string()).join(&run_id);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self {
            run_id,
            started_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            dir,
        })
    }

    fn dir(&self) -> &Path {
        &self.dir
    }

    fn save_config(&self, engine: &SimulationEngine, config: &HeadlessConfig) -> Result<()> {
        let json = serde_json::json!({
            "run_id": self.run_id,
            "timestamp": self.started_at,
            "app_version": env!("CARGO_PKG_VERSION"),
            "size": engine.size(),
            "frames": config.frames,
            "params": engine.params(),
            "palette": engine.palette_points(),
            "render": engine.render_data(),
            "brush": engine.brush_settings(),
            "fills": config.fills,
            "stroke": config.stroke,
        });
        let path = self.dir.join("config.json");
        fs::write(&path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("Saved config to {:?}", path);
        Ok(())
    }

    fn export_metrics_csv(&self, records: &[MetricsRecord]) -> Result<PathBuf> {
        let path = self.dir.join("metrics.csv");
        let mut file =
            fs::File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        writeln!(file, "{}", MetricsRecord::csv_header())?;
        for record in records {
            writeln!(file, "{}", record.to_csv_line())?;
        }
        log::info!("Exported {} metrics records to {:?}", records.len(), path);
        Ok(path)
    }

    fn save_frame(&self, size: Size, rgba: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join("final.png");
        image::save_buffer(&path, rgba, size.width, size.height, image::ColorType::Rgba8)
            .with_context(|| format!("failed to save {}", path.display()))?;
        log::info!("Frame saved: {:?}", path);
        Ok(path)
    }
}
