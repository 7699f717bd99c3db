//! Headless backend
//!
//! Used when the host has no compositor the daemon can draw into, and as the
//! fallback on platforms without a native backend. The overlay keeps track of
//! where the marker would be and logs it; taps are logged and acknowledged
//! after their press duration.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::traits::{
    GestureInjector, OverlayHandle, OverlaySpec, OverlaySurface, PlatformError, PlatformResult,
    ScreenMetrics,
};
use crate::cursor::{CursorPosition, GestureRequest, ScreenBounds};

/// Get the default screen dimensions for the current platform
#[cfg(target_os = "macos")]
pub fn default_screen_dimensions() -> (u32, u32) {
    (2560, 1600)
}

#[cfg(target_os = "android")]
pub fn default_screen_dimensions() -> (u32, u32) {
    (1080, 2400)
}

#[cfg(not(any(target_os = "macos", target_os = "android")))]
pub fn default_screen_dimensions() -> (u32, u32) {
    (1920, 1080)
}

/// Screen of a fixed, configured size
#[derive(Debug, Clone)]
pub struct FixedScreen {
    bounds: ScreenBounds,
}

impl FixedScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            bounds: ScreenBounds::from_pixels(width, height),
        }
    }
}

impl Default for FixedScreen {
    fn default() -> Self {
        let (width, height) = default_screen_dimensions();
        Self::new(width, height)
    }
}

impl ScreenMetrics for FixedScreen {
    fn screen_bounds(&self) -> ScreenBounds {
        self.bounds
    }
}

/// Detected screen with one side pinned by configuration
pub struct ScreenOverride {
    inner: Arc<dyn ScreenMetrics>,
    width: Option<u32>,
    height: Option<u32>,
}

impl ScreenOverride {
    pub fn new(inner: Arc<dyn ScreenMetrics>, width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            inner,
            width,
            height,
        }
    }
}

impl ScreenMetrics for ScreenOverride {
    fn screen_bounds(&self) -> ScreenBounds {
        let detected = self.inner.screen_bounds();
        ScreenBounds::new(
            self.width.map_or(detected.width, |w| w as f32),
            self.height.map_or(detected.height, |h| h as f32),
        )
    }
}

/// Overlay that only tracks and logs marker placement
#[derive(Debug, Default)]
pub struct LoggingOverlay {
    next_id: u64,
    surfaces: HashMap<OverlayHandle, CursorPosition>,
}

impl LoggingOverlay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlaySurface for LoggingOverlay {
    fn create(&mut self, spec: &OverlaySpec, origin: CursorPosition) -> PlatformResult<OverlayHandle> {
        self.next_id += 1;
        let handle = OverlayHandle(self.next_id);
        self.surfaces.insert(handle, origin);
        tracing::info!(
            "Overlay {:?}: {}x{} marker #{:08X} at {}",
            handle,
            spec.width,
            spec.height,
            spec.color,
            origin
        );
        Ok(handle)
    }

    fn reposition(&mut self, handle: OverlayHandle, position: CursorPosition) -> PlatformResult<()> {
        let current = self
            .surfaces
            .get_mut(&handle)
            .ok_or_else(|| PlatformError::Platform(format!("unknown overlay {:?}", handle)))?;
        *current = position;
        let (x, y) = position.to_pixels();
        tracing::debug!("Overlay {:?} -> x={} y={}", handle, x, y);
        Ok(())
    }

    fn destroy(&mut self, handle: OverlayHandle) -> PlatformResult<()> {
        self.surfaces
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| PlatformError::Platform(format!("unknown overlay {:?}", handle)))
    }
}

/// Gesture injector that logs taps instead of injecting them
#[derive(Debug, Default)]
pub struct LoggingGestureInjector;

impl LoggingGestureInjector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GestureInjector for LoggingGestureInjector {
    fn is_available(&self) -> bool {
        true
    }

    async fn dispatch_tap(&self, request: &GestureRequest) -> PlatformResult<()> {
        let (x, y) = request.start_point.to_pixels();
        tracing::info!("Tap at x={} y={} ({} ms)", x, y, request.duration_ms);
        tokio::time::sleep(Duration::from_millis(request.duration_ms)).await;
        Ok(())
    }
}
