//! Configuration module
//!
//! Handles loading and saving pointerd configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cursor::{DEFAULT_ACK_TIMEOUT_MS, DEFAULT_CURSOR_COLOR, TAP_DURATION_MS};
use crate::protocol::DEFAULT_PORT;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Screen settings
    #[serde(default)]
    pub screen: ScreenConfig,

    /// Cursor overlay settings
    #[serde(default)]
    pub overlay: OverlayConfig,

    /// Tap gesture settings
    #[serde(default)]
    pub gesture: GestureConfig,

    /// Controller bridge settings
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Settings navigation
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Unique device identifier (auto-generated if not set)
    pub device_id: Option<String>,
    /// Human-readable name for this device
    pub name: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            name: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            verbose: false,
        }
    }
}

/// Screen configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Screen width override (detected if not set)
    pub width: Option<u32>,
    /// Screen height override (detected if not set)
    pub height: Option<u32>,
    /// Framebuffer size node to read the screen size from (Linux)
    pub framebuffer: Option<PathBuf>,
}

impl ScreenConfig {
    /// Fixed size, when both dimensions are overridden
    pub fn fixed_size(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    /// Whether exactly one dimension is overridden; the other is detected
    pub fn is_partial_override(&self) -> bool {
        self.width.is_some() != self.height.is_some()
    }
}

/// Which overlay surface draws the marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverlayBackend {
    /// Log marker placement without drawing
    #[default]
    Log,
    /// Draw straight into the Linux framebuffer device
    Framebuffer,
}

/// Overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Draw the cursor marker
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overlay backend
    #[serde(default)]
    pub backend: OverlayBackend,
    /// Framebuffer device drawn into by the framebuffer backend (default /dev/fb0)
    pub device: Option<PathBuf>,
    /// Marker colour as "#AARRGGBB" or "#RRGGBB"
    #[serde(default = "default_overlay_color")]
    pub color: String,
}

fn default_overlay_color() -> String {
    format!("#{:08X}", DEFAULT_CURSOR_COLOR)
}

fn default_true() -> bool {
    true
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            backend: OverlayBackend::default(),
            device: None,
            color: default_overlay_color(),
        }
    }
}

impl OverlayConfig {
    /// Marker colour as 0xAARRGGBB
    pub fn argb(&self) -> ConfigResult<u32> {
        parse_color(&self.color)
    }
}

fn parse_color(value: &str) -> ConfigResult<u32> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: "overlay.color",
        reason: format!("{:?}: {}", value, reason),
    };

    let hex = value
        .strip_prefix('#')
        .ok_or_else(|| invalid("expected a leading '#'"))?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("not hexadecimal"));
    }
    let rgb = u32::from_str_radix(hex, 16).map_err(|_| invalid("not hexadecimal"))?;

    match hex.len() {
        6 => Ok(0xFF00_0000 | rgb),
        8 => Ok(rgb),
        _ => Err(invalid("expected 6 or 8 hex digits")),
    }
}

/// Which gesture injector to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GestureBackend {
    /// Log taps without injecting them
    #[default]
    Log,
    /// Inject taps through a uinput touchscreen (Linux)
    Uinput,
}

/// Gesture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Gesture injector backend
    #[serde(default)]
    pub backend: GestureBackend,
    /// Press duration of a tap in ms
    #[serde(default = "default_tap_duration")]
    pub tap_duration_ms: u64,
    /// How long to wait for a tap to be acknowledged in ms
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_ms: u64,
}

impl GestureConfig {
    /// A tap is only acknowledged after its press duration, so the
    /// acknowledgment timeout has to outlast it
    pub fn validate(&self) -> ConfigResult<()> {
        if self.ack_timeout_ms <= self.tap_duration_ms {
            return Err(ConfigError::Invalid {
                key: "gesture.ack_timeout_ms",
                reason: format!(
                    "{} ms must be longer than gesture.tap_duration_ms ({} ms)",
                    self.ack_timeout_ms, self.tap_duration_ms
                ),
            });
        }
        Ok(())
    }
}

fn default_tap_duration() -> u64 {
    TAP_DURATION_MS
}

fn default_ack_timeout() -> u64 {
    DEFAULT_ACK_TIMEOUT_MS
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            backend: GestureBackend::default(),
            tap_duration_ms: default_tap_duration(),
            ack_timeout_ms: default_ack_timeout(),
        }
    }
}

/// Controller bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface to bind to (default: all)
    pub bind_address: Option<String>,
    /// Commands buffered ahead of the cursor controller
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_queue_capacity() -> usize {
    256
}

fn default_connect_timeout() -> u64 {
    5000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: None,
            queue_capacity: default_queue_capacity(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

/// Settings navigation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Command (argv) that opens the accessibility settings
    #[serde(default = "crate::platform::default_settings_command")]
    pub command: Vec<String>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            command: crate::platform::default_settings_command(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("pointerd/config.toml")),
            Some(PathBuf::from("./pointerd.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the device ID, generating one if not set
    pub fn device_id(&self) -> String {
        self.general
            .device_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            device_id: Some("living-room-tv".to_string()),
            name: "Living Room TV".to_string(),
            verbose: false,
        },
        screen: ScreenConfig {
            width: Some(1920),
            height: Some(1080),
            framebuffer: None,
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}
