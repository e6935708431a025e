// ============================================================================
// gpu.rs - alife-canvas
// Device wiring and the resource factory: textures, framebuffers, partial
// texture updates and blocking readback.
// ============================================================================

use std::cell::Cell;
use std::future::Future;
use std::sync::Arc;

use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::config::Size;
use crate::error::{EngineError, Result};

/// Every texture the crate creates is 8-bit RGBA.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const BYTES_PER_TEXEL: usize = 4;

// ======================== Context ========================

/// Device and queue handed to every component that touches the GPU.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Adapter and device with no presentation surface. Uncaptured GPU
    /// errors are logged rather than aborting the process.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(EngineError::NoAdapter)?;

        log::info!("GPU: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("alife_headless_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("uncaptured GPU error: {error}");
        }));

        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }
}

// ======================== Textures ========================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
}

impl From<FilterMode> for wgpu::FilterMode {
    fn from(value: FilterMode) -> Self {
        match value {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl From<WrapMode> for wgpu::AddressMode {
    fn from(value: WrapMode) -> Self {
        match value {
            WrapMode::Clamp => wgpu::AddressMode::ClampToEdge,
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextureDescriptor<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub data: Option<&'a [u8]>,
    pub filter: FilterMode,
    pub wrap: WrapMode,
    /// Whether a framebuffer may be attached to the texture.
    pub render_target: bool,
}

impl<'a> TextureDescriptor<'a> {
    /// Simulation state: exact texel reads, renderable.
    pub fn state(width: u32, height: u32) -> Self {
        Self {
            label: "state",
            width,
            height,
            data: None,
            filter: FilterMode::Nearest,
            wrap: WrapMode::Clamp,
            render_target: true,
        }
    }

    /// Lookup tables such as the palette: smoothed, sample-only.
    pub fn lookup(width: u32, height: u32) -> Self {
        Self {
            label: "lookup",
            width,
            height,
            data: None,
            filter: FilterMode::Linear,
            wrap: WrapMode::Clamp,
            render_target: false,
        }
    }

    pub fn with_data(mut self, data: &'a [u8]) -> Self {
        self.data = Some(data);
        self
    }
}

pub struct Texture {
    label: String,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    size: Size,
    render_target: bool,
}

impl Texture {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn is_render_target(&self) -> bool {
        self.render_target
    }
}

/// Render target whose only colour attachment is one texture.
pub struct Framebuffer {
    view: wgpu::TextureView,
    size: Size,
}

impl Framebuffer {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> Size {
        self.size
    }
}

/// Rejects a pixel buffer whose length disagrees with `size`.
pub fn check_shape(size: Size, len: usize) -> Result<()> {
    let expected = size.texel_count() * BYTES_PER_TEXEL;
    if len != expected {
        return Err(EngineError::ShapeMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}

// ======================== Factory ========================

pub struct ResourceFactory {
    context: GpuContext,
    textures_created: Cell<usize>,
}

impl ResourceFactory {
    pub fn new(context: GpuContext) -> Self {
        Self {
            context,
            textures_created: Cell::new(0),
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Number of textures allocated through this factory so far.
    pub fn textures_created(&self) -> usize {
        self.textures_created.get()
    }

    pub fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<Texture> {
        let size = Size::new(desc.width, desc.height);
        if let Some(data) = desc.data {
            check_shape(size, data.len())?;
        }

        let max = self.context.device.limits().max_texture_dimension_2d;
        if size.is_empty() || size.width > max || size.height > max {
            return Err(EngineError::ResourceCreation(format!(
                "texture '{}' of {} is outside 1..={} per side",
                desc.label, size, max
            )));
        }

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        if desc.render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let descriptor = wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        };

        let device = &self.context.device;
        let texture = match desc.data {
            Some(data) => device.create_texture_with_data(
                &self.context.queue,
                &descriptor,
                TextureDataOrder::LayerMajor,
                data,
            ),
            None => device.create_texture(&descriptor),
        };

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            address_mode_u: desc.wrap.into(),
            address_mode_v: desc.wrap.into(),
            address_mode_w: desc.wrap.into(),
            mag_filter: desc.filter.into(),
            min_filter: desc.filter.into(),
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        self.textures_created.set(self.textures_created.get() + 1);
        log::debug!("created texture '{}' ({})", desc.label, size);

        Ok(Texture {
            label: desc.label.to_string(),
            texture,
            view,
            sampler,
            size,
            render_target: desc.render_target,
        })
    }

    pub fn create_framebuffer(&self, color: &Texture) -> Result<Framebuffer> {
        if !color.render_target {
            return Err(EngineError::AttachmentError(color.label.clone()));
        }
        let view = color.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{}_framebuffer", color.label)),
            ..Default::default()
        });
        Ok(Framebuffer {
            view,
            size: color.size,
        })
    }

    /// Replaces the full contents of `texture` without reallocating it.
    pub fn write_texture(&self, texture: &Texture, data: &[u8]) -> Result<()> {
        let size = texture.size;
        check_shape(size, data.len())?;
        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * BYTES_PER_TEXEL as u32),
                rows_per_image: Some(size.height),
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Copies `texture` back to host memory, rows top to bottom, padding
    /// stripped. Blocks until the GPU has finished all prior work.
    pub fn read_texture(&self, texture: &Texture) -> Result<Vec<u8>> {
        let device = &self.context.device;
        let size = texture.size;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let unpadded_bpr = size.width * BYTES_PER_TEXEL as u32;
        let padded_bpr = (unpadded_bpr + align - 1) / align * align;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: u64::from(padded_bpr) * u64::from(size.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(size.height),
                },
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(EngineError::Readback(err.to_string())),
            Err(_) => {
                return Err(EngineError::Readback(String::from(
                    "map callback dropped before completion",
                )))
            }
        }

        let mut pixels = Vec::with_capacity(size.texel_count() * BYTES_PER_TEXEL);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded_bpr as usize).take(size.height as usize) {
                pixels.extend_from_slice(&row[..unpadded_bpr as usize]);
            }
        }
        staging.unmap();
        Ok(pixels)
    }

    /// Runs `build` under out-of-memory and validation error scopes so that
    /// allocation failures surface as `ResourceCreation` instead of being
    /// reported asynchronously.
    pub async fn guarded<T>(&self, what: &str, build: impl FnOnce() -> Result<T>) -> Result<T> {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let built = build();

        let validation = device.pop_error_scope().await;
        let out_of_memory = device.pop_error_scope().await;
        let value = built?;
        match validation.or(out_of_memory) {
            Some(error) => {
                log::error!("allocating {what} failed: {error}");
                Err(EngineError::ResourceCreation(format!("{what}: {error}")))
            }
            None => Ok(value),
        }
    }
}

/// Blocks on a GPU future from synchronous code.
pub fn block_on<F: Future>(future: F) -> F::Output {
    pollster::block_on(future)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Headless context for GPU-backed tests; `None` when the machine has no
    /// usable adapter, in which case the caller skips.
    pub(crate) fn test_context() -> Option<GpuContext> {
        match block_on(GpuContext::headless()) {
            Ok(context) => Some(context),
            Err(err) => {
                eprintln!("skipping GPU test: {err}");
                None
            }
        }
    }

    #[test]
    fn shape_check_counts_four_channels() {
        let size = Size::new(4, 4);
        assert!(check_shape(size, 64).is_ok());
        assert!(matches!(
            check_shape(size, 10),
            Err(EngineError::ShapeMismatch { expected: 64, actual: 10 })
        ));
    }

    #[test]
    fn descriptor_presets() {
        let state = TextureDescriptor::state(8, 8);
        assert_eq!(state.filter, FilterMode::Nearest);
        assert_eq!(state.wrap, WrapMode::Clamp);
        assert!(state.render_target);

        let lookup = TextureDescriptor::lookup(256, 1);
        assert_eq!(lookup.filter, FilterMode::Linear);
        assert_eq!(lookup.wrap, WrapMode::Clamp);
        assert!(!lookup.render_target);
    }

    #[test]
    fn mismatched_data_is_rejected_before_allocation() {
        let Some(context) = test_context() else { return };
        let factory = ResourceFactory::new(context);
        let data = [0u8; 10];
        let result = factory.create_texture(&TextureDescriptor::state(4, 4).with_data(&data));
        assert!(matches!(result, Err(EngineError::ShapeMismatch { .. })));
        assert_eq!(factory.textures_created(), 0);
    }

    #[test]
    fn zero_sized_texture_is_a_creation_failure() {
        let Some(context) = test_context() else { return };
        let factory = ResourceFactory::new(context);
        let result = factory.create_texture(&TextureDescriptor::state(0, 4));
        assert!(matches!(result, Err(EngineError::ResourceCreation(_))));
    }

    #[test]
    fn lookup_texture_cannot_be_attached() {
        let Some(context) = test_context() else { return };
        let factory = ResourceFactory::new(context);
        let lookup = factory.create_texture(&TextureDescriptor::lookup(256, 1)).unwrap();
        assert!(matches!(
            factory.create_framebuffer(&lookup),
            Err(EngineError::AttachmentError(_))
        ));
        let state = factory.create_texture(&TextureDescriptor::state(4, 4)).unwrap();
        let framebuffer = factory.create_framebuffer(&state).unwrap();
        assert_eq!(framebuffer.size(), Size::new(4, 4));
    }

    #[test]
    fn initial_data_reads_back_unchanged() {
        let Some(context) = test_context() else { return };
        let factory = ResourceFactory::new(context);
        // 3 texels wide so rows need padding on readback
        let data: Vec<u8> = (0..3 * 2 * 4).map(|i| i as u8).collect();
        let texture = factory
            .create_texture(&TextureDescriptor::state(3, 2).with_data(&data))
            .unwrap();
        assert_eq!(factory.read_texture(&texture).unwrap(), data);

        let blank = factory.create_texture(&TextureDescriptor::state(3, 2)).unwrap();
        assert!(factory.read_texture(&blank).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn partial_update_replaces_contents() {
        let Some(context) = test_context() else { return };
        let factory = ResourceFactory::new(context);
        let texture = factory.create_texture(&TextureDescriptor::state(2, 2)).unwrap();
        let data = [7u8; 16];
        factory.write_texture(&texture, &data).unwrap();
        assert_eq!(factory.read_texture(&texture).unwrap(), data.to_vec());
        assert!(matches!(
            factory.write_texture(&texture, &data[..8]),
            Err(EngineError::ShapeMismatch { .. })
        ));
    }
}
