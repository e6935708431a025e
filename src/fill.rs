// ============================================================================
// fill.rs - alife-canvas
// Host-side fill tool: rewrites one channel of a read-back state buffer.
// ============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::gpu::BYTES_PER_TEXEL;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[default]
    R,
    G,
    B,
    A,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::R, Channel::G, Channel::B, Channel::A];

    /// Byte offset inside an RGBA texel.
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FillMode {
    Uniform,
    /// Each texel fires independently with probability `threshold`.
    Random { threshold: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillSpec {
    pub channel: Channel,
    #[serde(flatten)]
    pub mode: FillMode,
    pub intensity: u8,
}

impl FillSpec {
    pub fn uniform(channel: Channel, intensity: u8) -> Self {
        Self {
            channel,
            mode: FillMode::Uniform,
            intensity,
        }
    }

    pub fn random(channel: Channel, intensity: u8, threshold: f32) -> Self {
        Self {
            channel,
            mode: FillMode::Random { threshold },
            intensity,
        }
    }
}

/// Rewrites `spec.channel` of every texel in `pixels`; the other channels
/// are left as they were. Returns how many texels ended up at `intensity`.
pub fn apply_fill<R: Rng + ?Sized>(pixels: &mut [u8], spec: &FillSpec, rng: &mut R) -> usize {
    let offset = spec.channel.index();
    let mut filled = 0;
    for texel in pixels.chunks_exact_mut(BYTES_PER_TEXEL) {
        let fire = match spec.mode {
            FillMode::Uniform => true,
            // gen::<f32>() is in [0, 1): threshold 0 never fires, 1 always does
            FillMode::Random { threshold } => rng.gen::<f32>() < threshold,
        };
        texel[offset] = if fire { spec.intensity } else { 0 };
        if fire {
            filled += 1;
        }
    }
    filled
}
