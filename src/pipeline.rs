// ============================================================================
// pipeline.rs - alife-canvas
// Program compilation (WGSL -> render pipeline), uniform resolution and the
// full-surface draw shared by every pass.
// ============================================================================

use wgpu::naga;

use crate::error::{EngineError, Result, ShaderStage};
use crate::gpu::{Framebuffer, GpuContext, ResourceFactory, Texture};
use crate::uniforms::{UniformBlock, UniformLayout, UniformSlot, UniformTable, UniformValue};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

// ======================== Descriptors ========================

pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    pub vertex_source: &'a str,
    pub fragment_source: &'a str,
    /// Texture/sampler pairs bound after the uniform block.
    pub texture_units: u32,
    pub target_format: wgpu::TextureFormat,
}

/// A linked pipeline plus the uniform layout reflected from its fragment
/// stage.
pub struct CompiledProgram {
    label: String,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniforms: UniformLayout,
    texture_units: u32,
}

impl CompiledProgram {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn uniform_layout(&self) -> &UniformLayout {
        &self.uniforms
    }

    pub fn texture_units(&self) -> u32 {
        self.texture_units
    }
}

// ======================== Compilation ========================

impl ResourceFactory {
    /// Compiles and links a program. Any compile or link problem is logged
    /// with its source diagnostic and returned as an error; no handle is
    /// produced for a broken program.
    pub async fn compile_program(&self, desc: &ProgramDescriptor<'_>) -> Result<CompiledProgram> {
        parse_stage(desc.label, ShaderStage::Vertex, desc.vertex_source)?;
        let fragment_ir = parse_stage(desc.label, ShaderStage::Fragment, desc.fragment_source)?;
        let uniforms = UniformLayout::reflect(&fragment_ir);

        let device = &self.context().device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = load_shader(device, &format!("{}_vs", desc.label), desc.vertex_source);
        let fragment_module =
            load_shader(device, &format!("{}_fs", desc.label), desc.fragment_source);

        let mut entries = vec![bgl_uniform(0)];
        for unit in 0..desc.texture_units {
            entries.push(bgl_texture(1 + unit * 2));
            entries.push(bgl_sampler(2 + unit * 2));
        }
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{}_bgl", desc.label)),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}_pipeline_layout", desc.label)),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{}_pipeline", desc.label)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(error) = device.pop_error_scope().await {
            log::error!("error linking program '{}': {}", desc.label, error);
            return Err(EngineError::Link {
                label: desc.label.to_string(),
                message: error.to_string(),
            });
        }

        log::debug!(
            "compiled program '{}' ({} texture units, {} byte uniform block)",
            desc.label,
            desc.texture_units,
            uniforms.buffer_size()
        );

        Ok(CompiledProgram {
            label: desc.label.to_string(),
            pipeline,
            bind_group_layout,
            uniforms,
            texture_units: desc.texture_units,
        })
    }

    pub fn resolve_uniforms<S: UniformSlot>(&self, program: &CompiledProgram) -> Result<UniformTable<S>> {
        UniformTable::resolve(&program.label, &program.uniforms)
    }
}

/// Parses and validates one stage, emitting the rendered diagnostic on
/// failure.
fn parse_stage(label: &str, stage: ShaderStage, source: &str) -> Result<naga::Module> {
    let compile_error = |message: String| {
        log::error!("error compiling {stage} shader of '{label}':\n{message}");
        EngineError::Compile {
            label: label.to_string(),
            stage,
            message,
        }
    };

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| compile_error(err.emit_to_string(source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| compile_error(err.emit_to_string(source)))?;

    let (naga_stage, entry) = match stage {
        ShaderStage::Vertex => (naga::ShaderStage::Vertex, VERTEX_ENTRY),
        ShaderStage::Fragment => (naga::ShaderStage::Fragment, FRAGMENT_ENTRY),
    };
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.stage == naga_stage && ep.name == entry)
    {
        return Err(compile_error(format!("missing {stage} entry point '{entry}'")));
    }

    Ok(module)
}

// ======================== Programs ========================

/// A compiled program bound to its statically declared uniform slots.
pub struct Program<S: UniformSlot> {
    compiled: CompiledProgram,
    table: UniformTable<S>,
    block: UniformBlock,
    buffer: wgpu::Buffer,
}

impl<S: UniformSlot> Program<S> {
    /// Compiles `desc` and resolves every slot of `S` against it.
    pub async fn new(factory: &ResourceFactory, desc: &ProgramDescriptor<'_>) -> Result<Self> {
        let compiled = factory.compile_program(desc).await?;
        let table = factory.resolve_uniforms::<S>(&compiled)?;
        let size = compiled.uniforms.buffer_size();
        let buffer = factory.context().device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}_uniforms", desc.label)),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(Self {
            compiled,
            table,
            block: UniformBlock::new(size),
            buffer,
        })
    }

    pub fn label(&self) -> &str {
        self.compiled.label()
    }

    pub fn set(&mut self, slot: S, value: UniformValue) {
        self.block.set(&self.table, slot, value);
    }

    /// One full-surface pass into `target`, sampling `textures` in unit
    /// order. Submitted immediately so passes execute in call order.
    /// Returns `false`, encoding nothing, when the texture count does not
    /// match the program's units.
    #[must_use]
    pub fn draw(&self, context: &GpuContext, target: &Framebuffer, textures: &[&Texture]) -> bool {
        if textures.len() != self.compiled.texture_units as usize {
            log::error!(
                "program '{}' expects {} textures, got {}; pass skipped",
                self.label(),
                self.compiled.texture_units,
                textures.len()
            );
            return false;
        }

        context
            .queue
            .write_buffer(&self.buffer, 0, self.block.as_bytes());

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: self.buffer.as_entire_binding(),
        }];
        for (unit, texture) in textures.iter().enumerate() {
            let unit = unit as u32;
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + unit * 2,
                resource: wgpu::BindingResource::TextureView(texture.view()),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + unit * 2,
                resource: wgpu::BindingResource::Sampler(texture.sampler()),
            });
        }

        let bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_bg", self.label())),
            layout: &self.compiled.bind_group_layout,
            entries: &entries,
        });

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&format!("{}_encoder", self.label())),
            });
        {
            let size = target.size();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&format!("{}_pass", self.label())),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_viewport(0.0, 0.0, size.width as f32, size.height as f32, 0.0, 1.0);
            pass.set_pipeline(&self.compiled.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..4, 0..1);
        }
        context.queue.submit(std::iter::once(encoder.finish()));
        true
    }
}

// ======================== Helpers ========================

fn load_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn bgl_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn bgl_sampler(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::tests::test_context;
    use crate::gpu::{block_on, TextureDescriptor, TEXTURE_FORMAT};
    use crate::shaders::ProgramSources;
    use crate::uniforms::{PaintUniform, SimulationUniform};

    #[test]
    fn syntax_error_is_a_compile_diagnostic() {
        let err = parse_stage("broken", ShaderStage::Fragment, "fn fs_main( {").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Compile { stage: ShaderStage::Fragment, .. }
        ));
    }

    #[test]
    fn missing_entry_point_is_rejected() {
        let source = "@fragment fn other() -> @location(0) vec4<f32> { return vec4<f32>(0.0); }";
        let err = parse_stage("renamed", ShaderStage::Fragment, source).unwrap_err();
        assert!(err.to_string().contains("fs_main"));
    }

    #[test]
    fn builtin_sources_parse() {
        let sources = ProgramSources::builtin();
        parse_stage("quad", ShaderStage::Vertex, &sources.vertex).unwrap();
        for (label, source) in [
            ("simulation", &sources.simulation),
            ("render", &sources.render),
            ("paint", &sources.paint),
        ] {
            parse_stage(label, ShaderStage::Fragment, source).unwrap();
        }
    }

    #[test]
    fn broken_program_fails_closed() {
        let Some(context) = test_context() else { return };
        let factory = ResourceFactory::new(context);
        let sources = ProgramSources::builtin();
        let result = block_on(factory.compile_program(&ProgramDescriptor {
            label: "broken",
            vertex_source: &sources.vertex,
            fragment_source: "@fragment fn fs_main() -> @location(0) vec4<f32> { return nope; }",
            texture_units: 0,
            target_format: TEXTURE_FORMAT,
        }));
        assert!(matches!(result, Err(EngineError::Compile { .. })));
    }

    #[test]
    fn program_with_wrong_slots_is_rejected_at_creation() {
        let Some(context) = test_context() else { return };
        let factory = ResourceFactory::new(context);
        let sources = ProgramSources::builtin();
        let desc = ProgramDescriptor {
            label: "paint",
            vertex_source: &sources.vertex,
            fragment_source: &sources.paint,
            texture_units: 1,
            target_format: TEXTURE_FORMAT,
        };
        assert!(block_on(Program::<PaintUniform>::new(&factory, &desc)).is_ok());
        let err = block_on(Program::<SimulationUniform>::new(&factory, &desc))
            .err()
            .expect("simulation slots do not exist in the paint program");
        assert!(matches!(err, EngineError::UnknownUniform { .. }));
    }

    #[test]
    fn texture_count_mismatch_skips_the_pass() {
        let Some(context) = test_context() else { return };
        let factory = ResourceFactory::new(context);
        let sources = ProgramSources::builtin();
        let desc = ProgramDescriptor {
            label: "paint",
            vertex_source: &sources.vertex,
            fragment_source: &sources.paint,
            texture_units: 1,
            target_format: TEXTURE_FORMAT,
        };
        let program = block_on(Program::<PaintUniform>::new(&factory, &desc)).unwrap();

        let seed = vec![7u8; 4 * 4 * 4];
        let source = factory
            .create_texture(&TextureDescriptor::state(4, 4).with_data(&seed))
            .unwrap();
        let target = factory
            .create_texture(&TextureDescriptor::state(4, 4).with_data(&seed))
            .unwrap();
        let framebuffer = factory.create_framebuffer(&target).unwrap();

        assert!(!program.draw(factory.context(), &framebuffer, &[]));
        assert!(!program.draw(factory.context(), &framebuffer, &[&source, &source]));
        // nothing was encoded, so the target keeps its contents
        assert_eq!(factory.read_texture(&target).unwrap(), seed);

        assert!(program.draw(factory.context(), &framebuffer, &[&source]));
    }
}
