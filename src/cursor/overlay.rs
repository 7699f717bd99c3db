//! Cursor overlay rendering
//!
//! Keeps the on-screen marker at the cursor position. The overlay surface is
//! a scoped resource: it is released by `destroy()` and, failing that, when
//! the renderer is dropped.

use super::geometry::{CursorPosition, CURSOR_SIZE};
use super::{ControlError, ControlResult};
use crate::platform::{OverlayHandle, OverlaySpec, OverlaySurface};

/// Default marker colour (opaque red)
pub const DEFAULT_CURSOR_COLOR: u32 = 0xFFFF_0000;

/// Result of asking the renderer to follow the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The surface was moved
    Moved,
    /// The surface already sat at this position
    Unchanged,
    /// There is no surface; the move had no visible effect
    NoOverlay,
    /// The platform refused to move the surface
    Failed,
}

impl RenderOutcome {
    /// Whether the marker is visibly at the requested position
    pub fn is_visible(self) -> bool {
        matches!(self, RenderOutcome::Moved | RenderOutcome::Unchanged)
    }
}

/// Build the overlay spec for the cursor marker
pub fn cursor_overlay_spec(color: u32) -> OverlaySpec {
    OverlaySpec {
        width: CURSOR_SIZE,
        height: CURSOR_SIZE,
        color,
        touchable: false,
        focusable: false,
    }
}

/// Owns the overlay surface and its handle
pub struct OverlayRenderer {
    surface: Box<dyn OverlaySurface>,
    spec: OverlaySpec,
    handle: Option<OverlayHandle>,
    last_position: Option<CursorPosition>,
}

impl OverlayRenderer {
    pub fn new(surface: Box<dyn OverlaySurface>, spec: OverlaySpec) -> Self {
        Self {
            surface,
            spec,
            handle: None,
            last_position: None,
        }
    }

    /// Acquire the overlay surface at `origin`.
    ///
    /// Calling this while a surface is held is a no-op.
    pub fn create(&mut self, origin: CursorPosition) -> ControlResult<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let handle = self
            .surface
            .create(&self.spec, origin)
            .map_err(|e| ControlError::OverlayUnavailable(e.to_string()))?;

        tracing::info!("Cursor overlay created ({:?}) at {}", handle, origin);
        self.handle = Some(handle);
        self.last_position = Some(origin);
        Ok(())
    }

    /// Move the marker to `position`
    pub fn reposition(&mut self, position: CursorPosition) -> ControlResult<RenderOutcome> {
        let Some(handle) = self.handle else {
            return Ok(RenderOutcome::NoOverlay);
        };

        if self.last_position == Some(position) {
            return Ok(RenderOutcome::Unchanged);
        }

        self.surface
            .reposition(handle, position)
            .map_err(|e| ControlError::OverlayUnavailable(e.to_string()))?;

        self.last_position = Some(position);
        Ok(RenderOutcome::Moved)
    }

    /// Release the surface. Returns whether a surface was actually released;
    /// repeated calls return `false`.
    pub fn destroy(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        self.last_position = None;

        if let Err(e) = self.surface.destroy(handle) {
            tracing::warn!("Failed to release cursor overlay {:?}: {}", handle, e);
        } else {
            tracing::info!("Cursor overlay released ({:?})", handle);
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Position the marker was last drawn at
    pub fn rendered_position(&self) -> Option<CursorPosition> {
        self.last_position
    }
}

impl Drop for OverlayRenderer {
    fn drop(&mut self) {
        self.destroy();
    }
}
