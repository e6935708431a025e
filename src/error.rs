// ============================================================================
// error.rs - alife-canvas
// Error taxonomy shared by the resource factory, the surface and the engine.
// ============================================================================

use std::path::PathBuf;

use crate::uniforms::UniformKind;

/// Shader stage a diagnostic refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("GPU resource creation failed: {0}")]
    ResourceCreation(String),

    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("texture '{0}' cannot be used as a render target")]
    AttachmentError(String),

    #[error("program '{program}' has no uniform named '{name}'")]
    UnknownUniform { program: String, name: String },

    #[error("uniform '{name}' in program '{program}' is {found:?}, expected {expected:?}")]
    UniformKindMismatch {
        program: String,
        name: String,
        expected: UniformKind,
        found: UniformKind,
    },

    #[error("{stage} shader of program '{label}' failed to compile:\n{message}")]
    Compile {
        label: String,
        stage: ShaderStage,
        message: String,
    },

    #[error("program '{label}' failed to link: {message}")]
    Link { label: String, message: String },

    #[error("ping-pong surface is not allocated")]
    NotInitialized,

    #[error("engine is not ready")]
    NotReady,

    #[error("engine has been torn down")]
    Destroyed,

    #[error("GPU readback failed: {0}")]
    Readback(String),

    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to read shader source {path}")]
    ShaderSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
