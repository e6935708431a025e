// ============================================================================
// metrics.rs - alife-canvas
// Surface statistics computed from a state readback: per-channel summary,
// coverage of chemical B and pattern entropy.
// ============================================================================

use serde::Serialize;

use crate::fill::Channel;
use crate::gpu::BYTES_PER_TEXEL;

/// A texel counts as covered when its B (green) channel exceeds this.
pub const COVERAGE_THRESHOLD: u8 = 26;

const ENTROPY_BINS: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ChannelStats {
    pub mean: f32,
    pub min: u8,
    pub max: u8,
}

/// Snapshot of one state readback.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurfaceStats {
    pub texels: usize,
    pub channels: [ChannelStats; 4],
    /// Fraction of texels with B above [`COVERAGE_THRESHOLD`].
    pub coverage: f32,
    /// Shannon entropy of the B histogram, in bits.
    pub entropy: f32,
}

impl SurfaceStats {
    pub fn from_pixels(pixels: &[u8]) -> Self {
        let texels = pixels.len() / BYTES_PER_TEXEL;
        let mut sums = [0u64; 4];
        let mut mins = [u8::MAX; 4];
        let mut maxs = [0u8; 4];
        let mut covered = 0usize;
        let mut histogram = [0usize; ENTROPY_BINS];

        for texel in pixels.chunks_exact(BYTES_PER_TEXEL) {
            for c in 0..4 {
                sums[c] += u64::from(texel[c]);
                mins[c] = mins[c].min(texel[c]);
                maxs[c] = maxs[c].max(texel[c]);
            }
            let b = texel[Channel::G.index()];
            if b > COVERAGE_THRESHOLD {
                covered += 1;
            }
            histogram[b as usize * ENTROPY_BINS / 256] += 1;
        }

        if texels == 0 {
            return Self {
                texels,
                channels: [ChannelStats::default(); 4],
                coverage: 0.0,
                entropy: 0.0,
            };
        }

        let mut channels = [ChannelStats::default(); 4];
        for (c, stats) in channels.iter_mut().enumerate() {
            *stats = ChannelStats {
                mean: sums[c] as f32 / texels as f32,
                min: mins[c],
                max: maxs[c],
            };
        }

        let mut entropy = 0.0f32;
        for &count in &histogram {
            let p = count as f32 / texels as f32;
            if p > 1e-9 {
                entropy -= p * p.log2();
            }
        }

        Self {
            texels,
            channels,
            coverage: covered as f32 / texels as f32,
            entropy,
        }
    }

    pub fn channel(&self, channel: Channel) -> ChannelStats {
        self.channels[channel.index()]
    }

    /// Logs the snapshot at INFO, with deltas against `prev` when given.
    pub fn log(&self, frame: u64, prev: Option<&SurfaceStats>) {
        log::info!("---------- frame {} surface ----------", frame);

        if let Some(p) = prev {
            log::info!(
                "TRENDS: dA={:+.2} | dB={:+.2} | dcoverage={:+.2}% | dentropy={:+.3}",
                self.channel(Channel::R).mean - p.channel(Channel::R).mean,
                self.channel(Channel::G).mean - p.channel(Channel::G).mean,
                (self.coverage - p.coverage) * 100.0,
                self.entropy - p.entropy,
            );
        }

        for (name, channel) in [("A", Channel::R), ("B", Channel::G)] {
            let stats = self.channel(channel);
            log::info!(
                "{}: mean={:.2} | min={} | max={}",
                name,
                stats.mean,
                stats.min,
                stats.max
            );
        }
        log::info!(
            "PATTERN: coverage={:.1}% | entropy={:.3} bits",
            self.coverage * 100.0,
            self.entropy
        );
    }
}

// ======================== Records ========================

/// One CSV row of a headless run.
#[derive(Clone, Debug, Serialize)]
pub struct MetricsRecord {
    pub frame: u64,
    pub time_ms: f64,
    pub fps: f32,
    pub mean_a: f32,
    pub mean_b: f32,
    pub coverage: f32,
    pub entropy: f32,
}

impl MetricsRecord {
    pub fn new(frame: u64, time_ms: f64, fps: f32, stats: &SurfaceStats) -> Self {
        Self {
            frame,
            time_ms,
            fps,
            mean_a: stats.channel(Channel::R).mean,
            mean_b: stats.channel(Channel::G).mean,
            coverage: stats.coverage,
            entropy: stats.entropy,
        }
    }

    pub fn csv_header() -> &'static str {
        "frame,time_ms,fps,mean_a,mean_b,coverage,entropy"
    }

    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{:.1},{:.1},{:.3},{:.3},{:.4},{:.4}",
            self.frame, self.time_ms, self.fps, self.mean_a, self.mean_b, self.coverage, self.entropy,
        )
    }
}
