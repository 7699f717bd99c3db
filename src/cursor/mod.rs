//! Cursor module - The on-screen pointer
//!
//! This module provides:
//! - Screen geometry and clamping
//! - The authoritative cursor position
//! - Overlay rendering that follows the cursor
//! - Tap dispatch at the cursor position

mod controller;
mod geometry;
mod gesture;
mod overlay;
mod state;

pub use controller::{CursorController, MoveOutcome};
pub use geometry::{clamp, CursorPosition, ScreenBounds, CURSOR_SIZE};
pub use gesture::{
    GestureDispatcher, GestureRequest, GestureTiming, DEFAULT_ACK_TIMEOUT_MS, TAP_DURATION_MS,
};
pub use overlay::{cursor_overlay_spec, OverlayRenderer, RenderOutcome, DEFAULT_CURSOR_COLOR};
pub use state::CursorState;

use thiserror::Error;

/// Errors reported by cursor operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Overlay unavailable: {0}")]
    OverlayUnavailable(String),

    #[error("Gesture dispatch failed: {0}")]
    GestureDispatchFailed(String),

    #[error("A tap is already in flight")]
    GestureBusy,
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Out-of-band notifications from the cursor controller
#[derive(Debug, Clone, PartialEq)]
pub enum CursorEvent {
    /// The overlay surface was acquired
    OverlayCreated,
    /// The overlay could not be created or moved
    OverlayUnavailable { reason: String },
    /// The overlay surface was released
    OverlayReleased,
    /// The cursor position changed
    Moved {
        position: CursorPosition,
        /// Whether the marker is visibly at `position`
        rendered: bool,
    },
    /// A tap was played back by the platform
    GestureCompleted { position: CursorPosition },
    /// A tap could not be dispatched or was not acknowledged
    GestureFailed {
        position: CursorPosition,
        reason: String,
    },
    /// A click arrived while a tap was still in flight
    GestureBusy { position: CursorPosition },
}
