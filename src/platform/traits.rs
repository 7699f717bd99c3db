//! Platform capability definitions
//!
//! The cursor core reaches the host only through these traits: screen
//! metrics, an overlay surface, gesture injection and settings navigation.
//! Each backend implements the subset it can provide and the service is
//! assembled from a [`Platform`] bundle.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::cursor::{CursorPosition, GestureRequest, ScreenBounds};

/// Errors raised at the platform boundary
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Not supported on this platform")]
    NotSupported,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Opaque identifier for an overlay surface owned by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayHandle(pub u64);

/// How the cursor overlay should be created
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    /// Marker width in logical pixels
    pub width: f32,
    /// Marker height in logical pixels
    pub height: f32,
    /// Fill colour as 0xAARRGGBB
    pub color: u32,
    /// Whether touches may land on the overlay (always false for the cursor)
    pub touchable: bool,
    /// Whether the overlay may take input focus (always false for the cursor)
    pub focusable: bool,
}

/// Source of the current screen size
pub trait ScreenMetrics: Send + Sync {
    /// Return the visible screen size right now. Implementations must not
    /// cache the answer across calls; rotation changes it.
    fn screen_bounds(&self) -> ScreenBounds;
}

/// Borderless, always-on-top surface that draws the cursor marker
pub trait OverlaySurface: Send {
    /// Create the surface with its top-left corner at `origin`
    fn create(&mut self, spec: &OverlaySpec, origin: CursorPosition) -> PlatformResult<OverlayHandle>;

    /// Move an existing surface
    fn reposition(&mut self, handle: OverlayHandle, position: CursorPosition) -> PlatformResult<()>;

    /// Release the surface
    fn destroy(&mut self, handle: OverlayHandle) -> PlatformResult<()>;
}

/// Synthetic pointer input
#[async_trait]
pub trait GestureInjector: Send + Sync {
    /// Whether gestures can be submitted at all (service connected, permission granted)
    fn is_available(&self) -> bool;

    /// Submit a single-point tap; resolves once the platform has played it back
    async fn dispatch_tap(&self, request: &GestureRequest) -> PlatformResult<()>;
}

/// Navigation to the host's accessibility/permission settings
#[async_trait]
pub trait SettingsLauncher: Send + Sync {
    /// Launch the settings screen and return without waiting for it to close
    async fn open_accessibility_settings(&self) -> PlatformResult<()>;
}

/// Every capability the cursor service needs, supplied at startup
pub struct Platform {
    pub screen: Arc<dyn ScreenMetrics>,
    pub overlay: Box<dyn OverlaySurface>,
    pub gestures: Arc<dyn GestureInjector>,
    pub settings: Arc<dyn SettingsLauncher>,
}
