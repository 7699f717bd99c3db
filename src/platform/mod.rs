//! Platform module - Host capabilities used by the cursor service
//!
//! This module provides:
//! - Capability traits for screen metrics, overlay, gestures and settings
//! - A headless backend that logs instead of drawing or injecting
//! - A Linux backend (framebuffer screen size and drawing, uinput taps)
//! - Recording test doubles

mod headless;
mod settings;
mod traits;

#[cfg(target_os = "linux")]
mod fbdev;
#[cfg(target_os = "linux")]
mod linux;

#[cfg(test)]
pub mod mock;

use std::sync::Arc;

pub use headless::{
    default_screen_dimensions, FixedScreen, LoggingGestureInjector, LoggingOverlay, ScreenOverride,
};
pub use settings::{default_settings_command, CommandSettingsLauncher};
pub use traits::*;

#[cfg(target_os = "linux")]
pub use fbdev::{FramebufferGeometry, FramebufferOverlay, DEFAULT_FRAMEBUFFER_DEVICE};
#[cfg(target_os = "linux")]
pub use linux::{FramebufferScreen, UinputTapInjector, DEFAULT_FRAMEBUFFER_SIZE};

use crate::config::{Config, GestureBackend, OverlayBackend};

/// Get the current platform name
pub fn platform_name() -> &'static str {
    #[cfg(target_os = "android")]
    return "Android";

    #[cfg(target_os = "macos")]
    return "macOS";

    #[cfg(target_os = "linux")]
    return "Linux";

    #[cfg(target_os = "windows")]
    return "Windows";

    #[cfg(not(any(
        target_os = "android",
        target_os = "macos",
        target_os = "linux",
        target_os = "windows"
    )))]
    return "Unknown";
}

/// Assemble the platform capabilities selected by `config`
pub fn build_platform(config: &Config) -> PlatformResult<Platform> {
    let screen = build_screen(config);
    let gestures = build_gestures(config, screen.screen_bounds())?;

    Ok(Platform {
        screen,
        overlay: build_overlay(config),
        gestures,
        settings: Arc::new(CommandSettingsLauncher::new(config.settings.command.clone())),
    })
}

fn build_screen(config: &Config) -> Arc<dyn ScreenMetrics> {
    if let Some((width, height)) = config.screen.fixed_size() {
        return Arc::new(FixedScreen::new(width, height));
    }

    let detected = detect_screen(config);
    if config.screen.is_partial_override() {
        tracing::warn!(
            "Only one screen dimension configured (width={:?}, height={:?}); the other is detected",
            config.screen.width,
            config.screen.height
        );
        return Arc::new(ScreenOverride::new(
            detected,
            config.screen.width,
            config.screen.height,
        ));
    }
    detected
}

fn detect_screen(config: &Config) -> Arc<dyn ScreenMetrics> {
    #[cfg(target_os = "linux")]
    {
        let path = config
            .screen
            .framebuffer
            .clone()
            .unwrap_or_else(|| DEFAULT_FRAMEBUFFER_SIZE.into());
        let fallback = FixedScreen::default().screen_bounds();
        return Arc::new(FramebufferScreen::new(path, fallback));
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = config;
        Arc::new(FixedScreen::default())
    }
}

/// Pick the overlay surface. A backend that cannot be opened falls back to
/// the logging overlay so the service still tracks and taps.
fn build_overlay(config: &Config) -> Box<dyn OverlaySurface> {
    match config.overlay.backend {
        OverlayBackend::Log => Box::new(LoggingOverlay::new()),

        #[cfg(target_os = "linux")]
        OverlayBackend::Framebuffer => {
            let device = config
                .overlay
                .device
                .clone()
                .unwrap_or_else(|| DEFAULT_FRAMEBUFFER_DEVICE.into());
            match FramebufferOverlay::open(&device) {
                Ok(overlay) => Box::new(overlay),
                Err(e) => {
                    tracing::warn!(
                        "Framebuffer overlay on {} unavailable ({}), logging cursor instead",
                        device.display(),
                        e
                    );
                    Box::new(LoggingOverlay::new())
                }
            }
        }

        #[cfg(not(target_os = "linux"))]
        OverlayBackend::Framebuffer => {
            tracing::warn!("Framebuffer overlay is Linux-only, logging cursor instead");
            Box::new(LoggingOverlay::new())
        }
    }
}

fn build_gestures(
    config: &Config,
    bounds: crate::cursor::ScreenBounds,
) -> PlatformResult<Arc<dyn GestureInjector>> {
    match config.gesture.backend {
        GestureBackend::Log => Ok(Arc::new(LoggingGestureInjector::new())),

        #[cfg(target_os = "linux")]
        GestureBackend::Uinput => Ok(Arc::new(UinputTapInjector::open(bounds)?)),

        #[cfg(not(target_os = "linux"))]
        GestureBackend::Uinput => {
            let _ = bounds;
            Err(PlatformError::NotSupported)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ScreenBounds;

    #[test]
    fn test_platform_name() {
        assert!(!platform_name().is_empty());
    }

    #[test]
    fn test_screen_override_wins() {
        let mut config = Config::default();
        config.screen.width = Some(1280);
        config.screen.height = Some(720);

        let platform = build_platform(&config).unwrap();
        assert_eq!(
            platform.screen.screen_bounds(),
            ScreenBounds::new(1280.0, 720.0)
        );
        assert!(platform.gestures.is_available());
    }

    #[test]
    fn test_partial_screen_override_keeps_configured_side() {
        let mut config = Config::default();
        config.screen.width = Some(1280);
        config.screen.framebuffer = Some("/nonexistent/virtual_size".into());

        let platform = build_platform(&config).unwrap();
        let bounds = platform.screen.screen_bounds();
        assert_eq!(bounds.width, 1280.0);
        assert_eq!(bounds.height, FixedScreen::default().screen_bounds().height);
    }

    #[test]
    fn test_missing_framebuffer_falls_back_to_logging_overlay() {
        let mut config = Config::default();
        config.overlay.backend = OverlayBackend::Framebuffer;
        config.overlay.device = Some("/nonexistent/fb9".into());

        let mut overlay = build_overlay(&config);
        let spec = crate::cursor::cursor_overlay_spec(crate::cursor::DEFAULT_CURSOR_COLOR);
        let handle = overlay.create(&spec, crate::cursor::CursorPosition::ORIGIN).unwrap();
        assert!(overlay.destroy(handle).is_ok());
    }
}
