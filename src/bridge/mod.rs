//! Bridge module - Turns controller method calls into cursor commands
//!
//! This module provides:
//! - Decoding of method calls into typed commands
//! - A fire-and-forget command bridge in front of the cursor service
//! - The cursor service lifecycle

mod service;

pub use service::{
    ControlHandle, CursorService, ServiceError, ServiceOptions, ServiceResult, ServiceState,
};

use std::sync::Arc;
use thiserror::Error;

use crate::cursor::CursorPosition;
use crate::platform::SettingsLauncher;
use crate::protocol::{methods, MethodCall};

/// Acknowledgment that a command was received.
///
/// Says nothing about whether the command had a visible effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Bridge errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Method not implemented: {0}")]
    UnsupportedCommand(String),
}

/// A decoded controller command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MoveCursor { delta_x: i32, delta_y: i32 },
    PerformClick,
    OpenAccessibilitySettings,
}

impl TryFrom<&MethodCall> for Command {
    type Error = BridgeError;

    fn try_from(call: &MethodCall) -> Result<Self, Self::Error> {
        match call.method.as_str() {
            methods::MOVE_CURSOR => Ok(Command::MoveCursor {
                delta_x: call.int_argument("deltaX").unwrap_or(0),
                delta_y: call.int_argument("deltaY").unwrap_or(0),
            }),
            methods::PERFORM_CLICK => Ok(Command::PerformClick),
            methods::OPEN_ACCESSIBILITY_SETTINGS => Ok(Command::OpenAccessibilitySettings),
            other => Err(BridgeError::UnsupportedCommand(other.to_string())),
        }
    }
}

/// Forwards controller commands to the cursor service.
///
/// Every command is acknowledged as soon as it is queued. When the service is
/// not running the command is logged and dropped, but still acknowledged.
#[derive(Clone)]
pub struct CommandBridge {
    control: ControlHandle,
    settings: Arc<dyn SettingsLauncher>,
}

impl CommandBridge {
    pub fn new(control: ControlHandle, settings: Arc<dyn SettingsLauncher>) -> Self {
        Self { control, settings }
    }

    /// Bridge in front of a started service
    pub fn for_service(service: &CursorService) -> ServiceResult<Self> {
        let control = service.handle().ok_or(ServiceError::NotRunning)?;
        Ok(Self::new(control, service.settings()))
    }

    pub async fn move_cursor(&self, delta_x: i32, delta_y: i32) -> Ack {
        if let Err(e) = self.control.move_cursor(delta_x, delta_y).await {
            tracing::warn!("Move ({}, {}) dropped: {}", delta_x, delta_y, e);
        }
        Ack
    }

    pub async fn perform_click(&self) -> Ack {
        if let Err(e) = self.control.click().await {
            tracing::warn!("Click dropped: {}", e);
        }
        Ack
    }

    /// Ask the host to show its accessibility settings
    pub async fn open_accessibility_settings(&self) -> Ack {
        match self.settings.open_accessibility_settings().await {
            Ok(()) => tracing::info!("Opened accessibility settings"),
            Err(e) => tracing::warn!("Could not open accessibility settings: {}", e),
        }
        Ack
    }

    pub async fn execute(&self, command: Command) -> Ack {
        tracing::debug!("Executing {:?}", command);

        match command {
            Command::MoveCursor { delta_x, delta_y } => self.move_cursor(delta_x, delta_y).await,
            Command::PerformClick => self.perform_click().await,
            Command::OpenAccessibilitySettings => self.open_accessibility_settings().await,
        }
    }

    /// Decode and execute a method call
    pub async fn handle_call(&self, call: &MethodCall) -> Result<Ack, BridgeError> {
        let command = Command::try_from(call).map_err(|e| {
            tracing::debug!("Rejecting method call: {}", e);
            e
        })?;
        Ok(self.execute(command).await)
    }

    /// Current cursor position, once every earlier command has been applied
    pub async fn cursor_position(&self) -> Option<CursorPosition> {
        self.control.position().await.ok()
    }
}
