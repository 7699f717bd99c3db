//! Accessibility settings launcher
//!
//! Opens the host's accessibility/permission settings by spawning a
//! configured command. The command is detached: the launcher returns as soon
//! as the process has started.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::traits::{PlatformError, PlatformResult, SettingsLauncher};

/// Command that opens the accessibility settings on this platform
pub fn default_settings_command() -> Vec<String> {
    #[cfg(target_os = "macos")]
    let argv: &[&str] = &[
        "open",
        "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility",
    ];

    #[cfg(target_os = "windows")]
    let argv: &[&str] = &["cmd", "/C", "start", "ms-settings:easeofaccess"];

    #[cfg(target_os = "android")]
    let argv: &[&str] = &[
        "am",
        "start",
        "-a",
        "android.settings.ACCESSIBILITY_SETTINGS",
        "-f",
        "0x10000000",
    ];

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "android")))]
    let argv: &[&str] = &["gnome-control-center", "universal-access"];

    argv.iter().map(|s| s.to_string()).collect()
}

/// Launches the settings screen through an external command
#[derive(Debug, Clone)]
pub struct CommandSettingsLauncher {
    argv: Vec<String>,
}

impl CommandSettingsLauncher {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Default for CommandSettingsLauncher {
    fn default() -> Self {
        Self::new(default_settings_command())
    }
}

#[async_trait]
impl SettingsLauncher for CommandSettingsLauncher {
    async fn open_accessibility_settings(&self) -> PlatformResult<()> {
        let (program, args) = self.argv.split_first().ok_or(PlatformError::NotSupported)?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PlatformError::Platform(format!("Failed to launch {}: {}", program, e)))?;

        tracing::info!(
            "Opened accessibility settings via {} (pid {:?})",
            program,
            child.id()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_command_not_supported() {
        let launcher = CommandSettingsLauncher::new(Vec::new());
        let result = launcher.open_accessibility_settings().await;
        assert!(matches!(result, Err(PlatformError::NotSupported)));
    }

    #[tokio::test]
    async fn test_missing_program_reports_platform_error() {
        let launcher =
            CommandSettingsLauncher::new(vec!["pointerd-no-such-settings-app".to_string()]);
        let result = launcher.open_accessibility_settings().await;
        assert!(matches!(result, Err(PlatformError::Platform(_))));
    }

    #[test]
    fn test_default_command_is_not_empty() {
        assert!(!default_settings_command().is_empty());
    }
}
