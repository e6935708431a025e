// ============================================================================
// palette.rs - alife-canvas
// 256-entry colour ramp built from sparse control points.
// ============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::gpu::{ResourceFactory, Texture, TextureDescriptor};

pub const PALETTE_SIZE: u32 = 256;

// ======================== Colors ========================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
}

impl FromStr for Rgb {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || EngineError::InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let mut rgb = [0u8; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Rgb(rgb))
    }
}

impl TryFrom<String> for Rgb {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub position: f32,
    pub color: Rgb,
}

impl ControlPoint {
    pub const fn new(position: f32, color: Rgb) -> Self {
        Self { position, color }
    }
}

pub fn default_palette() -> [ControlPoint; 2] {
    [
        ControlPoint::new(0.0, Rgb::BLACK),
        ControlPoint::new(1.0, Rgb::WHITE),
    ]
}

// ======================== Builder ========================

pub struct PaletteBuilder;

impl PaletteBuilder {
    /// RGBA bytes for `PALETTE_SIZE` samples of the piecewise-linear ramp.
    ///
    /// Each sample interpolates between the nearest point at or below it and
    /// the nearest point above it. Past either end the ramp is constant. Input
    /// order does not matter.
    pub fn build(points: &[ControlPoint]) -> Vec<u8> {
        let fallback = default_palette();
        let points = if points.is_empty() {
            &fallback[..]
        } else {
            points
        };

        let last = points
            .iter()
            .fold(&points[0], |best, p| if p.position > best.position { p } else { best });

        let mut out = Vec::with_capacity(PALETTE_SIZE as usize * 4);
        for i in 0..PALETTE_SIZE {
            let x = i as f32 / (PALETTE_SIZE - 1) as f32;

            let next = points
                .iter()
                .filter(|p| p.position > x)
                .fold(None::<&ControlPoint>, |best, p| match best {
                    Some(b) if b.position <= p.position => Some(b),
                    _ => Some(p),
                });
            let (prev, next) = match next {
                None => (last, last),
                Some(next) => {
                    let prev = points
                        .iter()
                        .filter(|p| p.position <= x)
                        .fold(None::<&ControlPoint>, |best, p| match best {
                            Some(b) if b.position >= p.position => Some(b),
                            _ => Some(p),
                        });
                    (prev.unwrap_or(next), next)
                }
            };

            let t = if std::ptr::eq(prev, next) {
                0.0
            } else {
                (x - prev.position) / (next.position - prev.position)
            };

            for c in 0..3 {
                let a = prev.color.0[c] as f32;
                let b = next.color.0[c] as f32;
                out.push((a + (b - a) * t).round().clamp(0.0, 255.0) as u8);
            }
            out.push(255);
        }
        out
    }

    /// Texture the ramp is uploaded into. Allocated once per engine.
    pub fn create_texture(factory: &ResourceFactory) -> Result<Texture> {
        let mut desc = TextureDescriptor::lookup(PALETTE_SIZE, 1);
        desc.label = "palette";
        factory.create_texture(&desc)
    }

    /// Rebuilds the ramp and overwrites `texture` in place.
    pub fn upload(factory: &ResourceFactory, texture: &Texture, points: &[ControlPoint]) -> Result<()> {
        let ramp = Self::build(points);
        factory.write_texture(texture, &ramp)?;
        log::debug!("palette uploaded from {} control points", points.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ramp: &[u8], i: usize) -> [u8; 4] {
        [ramp[i * 4], ramp[i * 4 + 1], ramp[i * 4 + 2], ramp[i * 4 + 3]]
    }

    #[test]
    fn black_to_white_round_trip() {
        let ramp = PaletteBuilder::build(&[
            ControlPoint::new(0.0, "#000000".parse().unwrap()),
            ControlPoint::new(1.0, "#ffffff".parse().unwrap()),
        ]);
        assert_eq!(ramp.len(), 1024);
        assert_eq!(entry(&ramp, 0), [0, 0, 0, 255]);
        assert_eq!(entry(&ramp, 255), [255, 255, 255, 255]);
        let mid = entry(&ramp, 128);
        for c in &mid[..3] {
            assert!((*c as i32 - 128).abs() <= 1, "mid entry {mid:?}");
        }
    }

    #[test]
    fn empty_input_matches_default() {
        assert_eq!(
            PaletteBuilder::build(&[]),
            PaletteBuilder::build(&default_palette())
        );
    }

    #[test]
    fn single_point_is_constant() {
        let ramp = PaletteBuilder::build(&[ControlPoint::new(0.5, "#ff0000".parse().unwrap())]);
        for i in 0..256 {
            assert_eq!(entry(&ramp, i), [255, 0, 0, 255]);
        }
    }

    #[test]
    fn ends_are_clamped_outside_points() {
        let ramp = PaletteBuilder::build(&[
            ControlPoint::new(0.25, Rgb([10, 20, 30])),
            ControlPoint::new(0.75, Rgb([200, 100, 50])),
        ]);
        assert_eq!(entry(&ramp, 0), [10, 20, 30, 255]);
        assert_eq!(entry(&ramp, 50), [10, 20, 30, 255]);
        assert_eq!(entry(&ramp, 255), [200, 100, 50, 255]);
    }

    #[test]
    fn unsorted_points_give_same_ramp() {
        let red = Rgb([255, 0, 0]);
        let green = Rgb([0, 255, 0]);
        let blue = Rgb([0, 0, 255]);
        let sorted = PaletteBuilder::build(&[
            ControlPoint::new(0.0, red),
            ControlPoint::new(0.5, green),
            ControlPoint::new(1.0, blue),
        ]);
        let shuffled = PaletteBuilder::build(&[
            ControlPoint::new(1.0, blue),
            ControlPoint::new(0.0, red),
            ControlPoint::new(0.5, green),
        ]);
        assert_eq!(sorted, shuffled);
    }

    #[test]
    fn parses_and_prints_hex_colors() {
        let c: Rgb = "#1a2B3c".parse().unwrap();
        assert_eq!(c, Rgb([0x1a, 0x2b, 0x3c]));
        assert_eq!(c.to_string(), "#1a2b3c");
        assert!("1a2b3c".parse::<Rgb>().is_err());
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn control_points_load_from_json() {
        let points: Vec<ControlPoint> =
            serde_json::from_str(r##"[{"position": 0.0, "color": "#102030"}]"##).unwrap();
        assert_eq!(points[0].color, Rgb([0x10, 0x20, 0x30]));
        assert!(serde_json::from_str::<Vec<ControlPoint>>(
            r##"[{"position": 0.0, "color": "red"}]"##
        )
        .is_err());
    }
}
