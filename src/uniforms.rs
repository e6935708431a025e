// ============================================================================
// uniforms.rs - alife-canvas
// Statically declared uniform slots per program, reflected from the WGSL
// uniform block and resolved once at program creation.
// ============================================================================

use std::collections::HashMap;
use std::marker::PhantomData;

use wgpu::naga;

use crate::error::{EngineError, Result};

/// Bind group 0, binding 0 holds every program's uniform block.
pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;

// ======================== Kinds & Values ========================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    U32,
    I32,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformKind {
    fn from_naga(inner: &naga::TypeInner) -> Option<Self> {
        use naga::{ScalarKind, TypeInner, VectorSize};
        match inner {
            TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
                ScalarKind::Float => Some(UniformKind::F32),
                ScalarKind::Uint => Some(UniformKind::U32),
                ScalarKind::Sint => Some(UniformKind::I32),
                _ => None,
            },
            TypeInner::Vector { size, scalar }
                if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
            {
                match size {
                    VectorSize::Bi => Some(UniformKind::Vec2),
                    VectorSize::Tri => Some(UniformKind::Vec3),
                    VectorSize::Quad => Some(UniformKind::Vec4),
                }
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    F32(f32),
    U32(u32),
    I32(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::F32(_) => UniformKind::F32,
            UniformValue::U32(_) => UniformKind::U32,
            UniformValue::I32(_) => UniformKind::I32,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            UniformValue::F32(v) => bytemuck::bytes_of(v),
            UniformValue::U32(v) => bytemuck::bytes_of(v),
            UniformValue::I32(v) => bytemuck::bytes_of(v),
            UniformValue::Vec2(v) => bytemuck::cast_slice(v),
            UniformValue::Vec3(v) => bytemuck::cast_slice(v),
            UniformValue::Vec4(v) => bytemuck::cast_slice(v),
        }
    }
}

// ======================== Reflection ========================

/// Resolved location of one uniform inside the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformHandle {
    pub offset: u32,
    pub kind: UniformKind,
}

/// Member table of a program's uniform block, as laid out by the shader.
#[derive(Clone, Debug, Default)]
pub struct UniformLayout {
    size: u32,
    members: HashMap<String, UniformHandle>,
}

impl UniformLayout {
    /// Reads the struct bound at `@group(0) @binding(0)` in `var<uniform>`
    /// space. Members of unsupported types are skipped; a program without a
    /// uniform block gets an empty layout.
    pub fn reflect(module: &naga::Module) -> Self {
        let block = module.global_variables.iter().find(|(_, var)| {
            var.space == naga::AddressSpace::Uniform
                && var.binding.as_ref().is_some_and(|b| {
                    b.group == UNIFORM_GROUP && b.binding == UNIFORM_BINDING
                })
        });

        let Some((_, var)) = block else {
            return Self::default();
        };

        match &module.types[var.ty].inner {
            naga::TypeInner::Struct { members, span } => {
                let members = members
                    .iter()
                    .filter_map(|member| {
                        let name = member.name.clone()?;
                        let kind = UniformKind::from_naga(&module.types[member.ty].inner)?;
                        Some((
                            name,
                            UniformHandle {
                                offset: member.offset,
                                kind,
                            },
                        ))
                    })
                    .collect();
                Self {
                    size: *span,
                    members,
                }
            }
            inner => match UniformKind::from_naga(inner) {
                // A bare scalar/vector block is addressable under the variable name.
                Some(kind) => {
                    let mut members = HashMap::new();
                    if let Some(name) = var.name.clone() {
                        members.insert(name, UniformHandle { offset: 0, kind });
                    }
                    Self {
                        size: inner.size(module.to_ctx()),
                        members,
                    }
                }
                None => Self::default(),
            },
        }
    }

    /// Block size in bytes, rounded up to the 16-byte uniform alignment.
    pub fn buffer_size(&self) -> u64 {
        (u64::from(self.size).max(16) + 15) / 16 * 16
    }

    pub fn get(&self, name: &str) -> Option<UniformHandle> {
        self.members.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// ======================== Slots ========================

/// A closed set of uniforms a program is required to expose.
pub trait UniformSlot: Copy + std::fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;
    fn kind(self) -> UniformKind;
    fn index(self) -> usize;
}

/// Handles for every slot of `S`, indexed by `S::index`.
#[derive(Debug)]
pub struct UniformTable<S: UniformSlot> {
    handles: Vec<UniformHandle>,
    _slots: PhantomData<S>,
}

impl<S: UniformSlot> UniformTable<S> {
    /// Resolves all of `S::ALL` against `layout`. Any missing name or
    /// kind disagreement rejects the whole table.
    pub fn resolve(program: &str, layout: &UniformLayout) -> Result<Self> {
        let mut handles = Vec::with_capacity(S::ALL.len());
        for (position, &slot) in S::ALL.iter().enumerate() {
            debug_assert_eq!(slot.index(), position, "slot order must match index()");
            let handle = layout
                .get(slot.name())
                .ok_or_else(|| EngineError::UnknownUniform {
                    program: program.to_string(),
                    name: slot.name().to_string(),
                })?;
            if handle.kind != slot.kind() {
                return Err(EngineError::UniformKindMismatch {
                    program: program.to_string(),
                    name: slot.name().to_string(),
                    expected: slot.kind(),
                    found: handle.kind,
                });
            }
            handles.push(handle);
        }
        Ok(Self {
            handles,
            _slots: PhantomData,
        })
    }

    pub fn handle(&self, slot: S) -> UniformHandle {
        self.handles[slot.index()]
    }
}

/// CPU copy of a uniform block, written through the queue before each pass.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(size: u64) -> Self {
        Self {
            bytes: vec![0; size as usize],
        }
    }

    /// Writes `value` at the slot's offset. Kinds were checked at resolve
    /// time, so a mismatch here is a caller bug and is dropped with a warning.
    pub fn set<S: UniformSlot>(&mut self, table: &UniformTable<S>, slot: S, value: UniformValue) {
        let handle = table.handle(slot);
        if handle.kind != value.kind() {
            log::warn!(
                "uniform {:?} expects {:?}, got {:?}; value ignored",
                slot,
                handle.kind,
                value.kind()
            );
            return;
        }
        let start = handle.offset as usize;
        let data = value.bytes();
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

// ======================== Program Slots ========================

macro_rules! uniform_slots {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($uniform:literal, $kind:ident)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl UniformSlot for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $uniform),+
                }
            }

            fn kind(self) -> UniformKind {
                match self {
                    $($name::$variant => UniformKind::$kind),+
                }
            }

            fn index(self) -> usize {
                self as usize
            }
        }
    };
}

uniform_slots! {
    /// Uniforms of the simulation step program.
    SimulationUniform {
        Resolution => ("resolution", Vec2),
        Feed => ("feed", F32),
        Kill => ("kill", F32),
        DiffusionA => ("diffusion_a", F32),
        DiffusionB => ("diffusion_b", F32),
        TimeStep => ("time_step", F32),
    }
}

uniform_slots! {
    /// Uniforms of the display program.
    RenderUniform {
        Resolution => ("resolution", Vec2),
        BrushPosition => ("brush_position", Vec2),
        LightColor => ("light_color", Vec3),
        LightIntensity => ("light_intensity", F32),
        BrushRadius => ("brush_radius", F32),
    }
}

uniform_slots! {
    /// Uniforms of the brush stamping program.
    PaintUniform {
        Resolution => ("resolution", Vec2),
        Start => ("start", Vec2),
        End => ("end", Vec2),
        Radius => ("radius", F32),
        Erase => ("erase", U32),
        Color => ("color", Vec4),
        Mask => ("mask", Vec4),
    }
}
