// ============================================================================
// brush.rs - alife-canvas
// Pointer-drag tracking that turns pointer events into paint commands for
// the brush pass.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::fill::Channel;

// ======================== Events & Settings ========================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerAction {
    Down,
    Move,
    Up,
}

/// A pointer event in surface pixels, y growing downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushEvent {
    pub action: PointerAction,
    pub x: f32,
    pub y: f32,
}

impl BrushEvent {
    pub fn down(x: f32, y: f32) -> Self {
        Self { action: PointerAction::Down, x, y }
    }

    pub fn moved(x: f32, y: f32) -> Self {
        Self { action: PointerAction::Move, x, y }
    }

    pub fn up(x: f32, y: f32) -> Self {
        Self { action: PointerAction::Up, x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushMode {
    #[default]
    Draw,
    Erase,
}

/// What the brush deposits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BrushInk {
    /// `intensity` written into a single channel.
    Channel { channel: Channel, intensity: u8 },
    /// Population marker: density in R, faction id in G.
    Faction { faction: u8, intensity: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrushSettings {
    pub mode: BrushMode,
    pub radius: f32,
    pub ink: BrushInk,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            mode: BrushMode::Draw,
            radius: 8.0,
            ink: BrushInk::Channel {
                channel: Channel::G,
                intensity: 255,
            },
        }
    }
}

// ======================== Paint Commands ========================

/// One stamp along `start -> end` in bottom-up simulation coordinates. A
/// zero-length segment is a dab.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintCommand {
    pub mode: BrushMode,
    pub start: [f32; 2],
    pub end: [f32; 2],
    pub radius: f32,
    pub ink: BrushInk,
}

impl PaintCommand {
    pub fn is_dab(&self) -> bool {
        self.start == self.end
    }

    /// Normalised value written into the masked channels.
    pub fn color(&self) -> [f32; 4] {
        match self.ink {
            BrushInk::Channel { channel, intensity } => {
                let mut color = [0.0; 4];
                color[channel.index()] = f32::from(intensity) / 255.0;
                color
            }
            BrushInk::Faction { faction, intensity } => [
                f32::from(intensity) / 255.0,
                f32::from(faction) / 255.0,
                0.0,
                0.0,
            ],
        }
    }

    /// 1.0 for every channel the stamp replaces.
    pub fn mask(&self) -> [f32; 4] {
        match self.ink {
            BrushInk::Channel { channel, .. } => {
                let mut mask = [0.0; 4];
                mask[channel.index()] = 1.0;
                mask
            }
            BrushInk::Faction { .. } => [1.0, 1.0, 0.0, 0.0],
        }
    }
}

// ======================== Tracker ========================

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum StrokeState {
    #[default]
    Idle,
    Active { x: f32, y: f32 },
}

#[derive(Debug, Default)]
pub struct BrushStrokeTracker {
    state: StrokeState,
    last_pointer: Option<[f32; 2]>,
}

impl BrushStrokeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StrokeState {
        self.state
    }

    /// Last pointer position seen, in input coordinates. Drives the cursor
    /// ring of the display pass.
    pub fn last_pointer(&self) -> Option<[f32; 2]> {
        self.last_pointer
    }

    /// Advances the stroke and returns the command to execute, if any.
    /// Move and Up without an active stroke are ignored.
    pub fn apply(
        &mut self,
        event: &BrushEvent,
        surface_height: u32,
        settings: &BrushSettings,
    ) -> Option<PaintCommand> {
        self.last_pointer = Some([event.x, event.y]);
        let point = [event.x, surface_height as f32 - event.y];

        let (next, segment) = match (self.state, event.action) {
            (_, PointerAction::Down) => (active(point), Some((point, point))),
            (StrokeState::Active { x, y }, PointerAction::Move) => (active(point), Some(([x, y], point))),
            (StrokeState::Active { x, y }, PointerAction::Up) => (StrokeState::Idle, Some(([x, y], [x, y]))),
            (StrokeState::Idle, PointerAction::Move | PointerAction::Up) => (StrokeState::Idle, None),
        };

        if matches!(
            (self.state, event.action),
            (StrokeState::Active { .. }, PointerAction::Down)
        ) {
            log::debug!("pointer down during an active stroke; restarting stroke");
        }
        self.state = next;

        segment.map(|(start, end)| PaintCommand {
            mode: settings.mode,
            start,
            end,
            radius: settings.radius,
            ink: settings.ink,
        })
    }

    pub fn reset(&mut self) {
        self.state = StrokeState::Idle;
    }
}

fn active(point: [f32; 2]) -> StrokeState {
    StrokeState::Active {
        x: point[0],
        y: point[1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEIGHT: u32 = 100;

    fn apply(tracker: &mut BrushStrokeTracker, event: BrushEvent) -> Option<PaintCommand> {
        tracker.apply(&event, HEIGHT, &BrushSettings::default())
    }

    #[test]
    fn down_starts_stroke_with_a_dab() {
        let mut tracker = BrushStrokeTracker::new();
        let cmd = apply(&mut tracker, BrushEvent::down(10.0, 30.0)).unwrap();
        assert!(cmd.is_dab());
        assert_eq!(cmd.start, [10.0, 70.0]);
        assert_eq!(tracker.state(), StrokeState::Active { x: 10.0, y: 70.0 });
    }

    #[test]
    fn move_paints_segment_from_previous_point() {
        let mut tracker = BrushStrokeTracker::new();
        apply(&mut tracker, BrushEvent::down(10.0, 30.0));
        let cmd = apply(&mut tracker, BrushEvent::moved(20.0, 40.0)).unwrap();
        assert_eq!(cmd.start, [10.0, 70.0]);
        assert_eq!(cmd.end, [20.0, 60.0]);

        let cmd = apply(&mut tracker, BrushEvent::moved(25.0, 40.0)).unwrap();
        assert_eq!(cmd.start, [20.0, 60.0]);
    }

    #[test]
    fn up_dabs_at_last_point_and_clears() {
        let mut tracker = BrushStrokeTracker::new();
        apply(&mut tracker, BrushEvent::down(10.0, 30.0));
        apply(&mut tracker, BrushEvent::moved(20.0, 40.0));
        // the up position itself is not painted
        let cmd = apply(&mut tracker, BrushEvent::up(90.0, 90.0)).unwrap();
        assert!(cmd.is_dab());
        assert_eq!(cmd.start, [20.0, 60.0]);
        assert_eq!(tracker.state(), StrokeState::Idle);
    }

    #[test]
    fn stray_events_are_ignored() {
        let mut tracker = BrushStrokeTracker::new();
        assert!(apply(&mut tracker, BrushEvent::moved(1.0, 1.0)).is_none());
        assert!(apply(&mut tracker, BrushEvent::up(1.0, 1.0)).is_none());
        assert_eq!(tracker.state(), StrokeState::Idle);
        // the cursor still follows the pointer
        assert_eq!(tracker.last_pointer(), Some([1.0, 1.0]));
    }

    #[test]
    fn second_down_restarts_stroke() {
        let mut tracker = BrushStrokeTracker::new();
        apply(&mut tracker, BrushEvent::down(10.0, 10.0));
        let cmd = apply(&mut tracker, BrushEvent::down(50.0, 50.0)).unwrap();
        assert!(cmd.is_dab());
        assert_eq!(cmd.start, [50.0, 50.0]);
        let cmd = apply(&mut tracker, BrushEvent::moved(60.0, 50.0)).unwrap();
        assert_eq!(cmd.start, [50.0, 50.0]);
    }

    #[test]
    fn commands_carry_current_settings() {
        let mut tracker = BrushStrokeTracker::new();
        let settings = BrushSettings {
            mode: BrushMode::Erase,
            radius: 3.0,
            ink: BrushInk::Faction { faction: 2, intensity: 255 },
        };
        let cmd = tracker.apply(&BrushEvent::down(0.0, 0.0), HEIGHT, &settings).unwrap();
        assert_eq!(cmd.mode, BrushMode::Erase);
        assert_eq!(cmd.radius, 3.0);
        assert_eq!(cmd.mask(), [1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn ink_encoding() {
        let mut cmd = PaintCommand {
            mode: BrushMode::Draw,
            start: [0.0; 2],
            end: [0.0; 2],
            radius: 1.0,
            ink: BrushInk::Channel { channel: Channel::B, intensity: 51 },
        };
        assert_eq!(cmd.color(), [0.0, 0.0, 0.2, 0.0]);
        assert_eq!(cmd.mask(), [0.0, 0.0, 1.0, 0.0]);

        cmd.ink = BrushInk::Faction { faction: 255, intensity: 255 };
        assert_eq!(cmd.color(), [1.0, 1.0, 0.0, 0.0]);
    }
}
