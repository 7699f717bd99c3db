//! Authoritative cursor position

use super::geometry::{clamp, CursorPosition, ScreenBounds, CURSOR_SIZE};

/// Holds the one position the overlay and the gesture dispatcher agree on.
///
/// A `CursorState` belongs to a single running service; it is not shared
/// between overlay lifetimes and is not synchronised on its own.
#[derive(Debug, Default)]
pub struct CursorState {
    position: CursorPosition,
    initialized: bool,
}

impl CursorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the cursor to the origin
    pub fn initialize(&mut self) {
        self.position = CursorPosition::ORIGIN;
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Apply a relative move against freshly sampled screen bounds and
    /// return the stored, clamped position.
    pub fn apply_move(&mut self, delta_x: i32, delta_y: i32, bounds: ScreenBounds) -> CursorPosition {
        if !self.initialized {
            tracing::warn!("Cursor moved before initialization; starting from the origin");
            self.initialize();
        }

        self.position = clamp(self.position, delta_x, delta_y, bounds, CURSOR_SIZE);
        self.position
    }

    pub fn current_position(&self) -> CursorPosition {
        self.position
    }
}
