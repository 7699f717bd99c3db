//! Cursor geometry
//!
//! Positions are logical pixels measured from the top-left corner of the
//! screen. The marker occupies a `CURSOR_SIZE` square whose top-left corner is
//! the cursor position, so the largest valid position on each axis is the
//! screen extent minus the marker size.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width and height of the cursor marker in logical pixels
pub const CURSOR_SIZE: f32 = 50.0;

/// Top-left corner of the cursor marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f32,
    pub y: f32,
}

impl CursorPosition {
    pub const ORIGIN: CursorPosition = CursorPosition { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Whole-pixel coordinates, as used by window layout and input devices
    pub fn to_pixels(self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

impl fmt::Display for CursorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Visible screen size at the moment it was sampled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenBounds {
    pub width: f32,
    pub height: f32,
}

impl ScreenBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }

    /// Largest position at which a marker of `size` still fits on screen
    pub fn max_position(&self, size: f32) -> CursorPosition {
        CursorPosition {
            x: (self.width - size).max(0.0),
            y: (self.height - size).max(0.0),
        }
    }

    /// Check whether a marker of `size` at `position` lies fully on screen
    pub fn contains(&self, position: CursorPosition, size: f32) -> bool {
        let max = self.max_position(size);
        (0.0..=max.x).contains(&position.x) && (0.0..=max.y).contains(&position.y)
    }
}

impl fmt::Display for ScreenBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Apply a relative move and constrain the result to the screen.
///
/// Every input is valid: deltas of any sign or magnitude produce an in-bounds
/// position, and a screen smaller than the marker pins that axis to 0.
pub fn clamp(
    current: CursorPosition,
    delta_x: i32,
    delta_y: i32,
    bounds: ScreenBounds,
    size: f32,
) -> CursorPosition {
    CursorPosition {
        x: clamp_axis(current.x + delta_x as f32, bounds.width - size),
        y: clamp_axis(current.y + delta_y as f32, bounds.height - size),
    }
}

fn clamp_axis(value: f32, upper: f32) -> f32 {
    // max(0, min(upper, value)): a negative upper bound collapses to 0
    value.min(upper).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tall_screen() -> ScreenBounds {
        ScreenBounds::new(1000.0, 2000.0)
    }

    #[test]
    fn test_clamp_to_right_and_left_edges() {
        let right = clamp(CursorPosition::ORIGIN, 2000, 0, tall_screen(), CURSOR_SIZE);
        assert_eq!(right, CursorPosition::new(950.0, 0.0));

        let left = clamp(right, -2000, 0, tall_screen(), CURSOR_SIZE);
        assert_eq!(left, CursorPosition::ORIGIN);
    }

    #[test]
    fn test_clamp_inside_bounds_is_plain_addition() {
        let moved = clamp(CursorPosition::new(100.0, 200.0), 15, -40, tall_screen(), CURSOR_SIZE);
        assert_eq!(moved, CursorPosition::new(115.0, 160.0));
    }

    #[test]
    fn test_clamp_idempotent_at_boundary() {
        let bounds = tall_screen();
        let mut position = clamp(CursorPosition::ORIGIN, 5000, 5000, bounds, CURSOR_SIZE);
        assert_eq!(position, CursorPosition::new(950.0, 1950.0));

        for _ in 0..5 {
            let next = clamp(position, 1, 1, bounds, CURSOR_SIZE);
            assert_eq!(next, position);
            position = next;
        }
    }

    #[test]
    fn test_screen_smaller_than_cursor_pins_to_zero() {
        let tiny = ScreenBounds::new(30.0, 40.0);
        let position = clamp(CursorPosition::ORIGIN, 25, 100, tiny, CURSOR_SIZE);
        assert_eq!(position, CursorPosition::ORIGIN);
        assert_eq!(tiny.max_position(CURSOR_SIZE), CursorPosition::ORIGIN);
    }

    #[test]
    fn test_clamp_always_in_bounds() {
        let bounds = ScreenBounds::new(1920.0, 1080.0);
        let deltas = [i32::MIN, -100_000, -951, -1, 0, 1, 49, 951, 100_000, i32::MAX];
        let starts = [
            CursorPosition::ORIGIN,
            CursorPosition::new(935.0, 515.0),
            bounds.max_position(CURSOR_SIZE),
        ];

        for start in starts {
            for dx in deltas {
                for dy in deltas {
                    let position = clamp(start, dx, dy, bounds, CURSOR_SIZE);
                    assert!(
                        bounds.contains(position, CURSOR_SIZE),
                        "{} + ({}, {}) escaped to {}",
                        start,
                        dx,
                        dy,
                        position
                    );
                }
            }
        }
    }

    #[test]
    fn test_to_pixels_truncates() {
        assert_eq!(CursorPosition::new(12.9, 7.2).to_pixels(), (12, 7));
    }
}
