//! Cursor service lifecycle
//!
//! The service moves through `Uninitialized -> Running -> Stopped`. Entering
//! `Running` resets the cursor, acquires the overlay and spawns the controller
//! task; entering `Stopped` drains the command queue, cancels any in-flight
//! tap and releases the overlay before `stop()` returns. `Stopped` is
//! terminal: a new service is built for the next session.
//!
//! The controller task is the only writer of cursor state. Every command
//! goes through one FIFO channel, so moves, repaints and taps apply in the
//! order the commands were sent.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::Config;
use crate::cursor::{
    cursor_overlay_spec, ControlError, CursorController, CursorEvent, CursorPosition,
    GestureDispatcher, GestureTiming, OverlayRenderer, DEFAULT_CURSOR_COLOR,
};
use crate::platform::{OverlaySpec, Platform, SettingsLauncher};

/// Service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Cursor service already running")]
    AlreadyRunning,

    #[error("Cursor service not running")]
    NotRunning,

    #[error("Cursor service was stopped and cannot be restarted")]
    Stopped,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Lifecycle state of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Running,
    Stopped,
}

/// Tunables for a cursor service
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Commands buffered ahead of the controller task
    pub queue_capacity: usize,
    /// Whether to draw the cursor marker at all
    pub overlay_enabled: bool,
    pub overlay_spec: OverlaySpec,
    pub gesture_timing: GestureTiming,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            overlay_enabled: true,
            overlay_spec: cursor_overlay_spec(DEFAULT_CURSOR_COLOR),
            gesture_timing: GestureTiming::default(),
        }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> crate::config::ConfigResult<Self> {
        config.gesture.validate()?;

        Ok(Self {
            queue_capacity: config.bridge.queue_capacity.max(1),
            overlay_enabled: config.overlay.enabled,
            overlay_spec: cursor_overlay_spec(config.overlay.argb()?),
            gesture_timing: GestureTiming {
                tap_duration_ms: config.gesture.tap_duration_ms,
                ack_timeout: Duration::from_millis(config.gesture.ack_timeout_ms),
            },
        })
    }
}

/// Messages processed by the controller task
enum ControlMessage {
    Move { delta_x: i32, delta_y: i32 },
    Click,
    Position { reply: oneshot::Sender<CursorPosition> },
    Shutdown,
}

/// A handle for sending commands to a running cursor service
#[derive(Clone, Debug)]
pub struct ControlHandle {
    sender: mpsc::Sender<ControlMessage>,
}

impl std::fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMessage::Move { delta_x, delta_y } => {
                write!(f, "Move({}, {})", delta_x, delta_y)
            }
            ControlMessage::Click => write!(f, "Click"),
            ControlMessage::Position { .. } => write!(f, "Position"),
            ControlMessage::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl ControlHandle {
    /// Queue a relative move. Waits only for queue space, never for the repaint.
    pub async fn move_cursor(&self, delta_x: i32, delta_y: i32) -> ServiceResult<()> {
        self.send(ControlMessage::Move { delta_x, delta_y }).await
    }

    /// Queue a tap at whatever the position is when the tap is reached
    pub async fn click(&self) -> ServiceResult<()> {
        self.send(ControlMessage::Click).await
    }

    /// Position after every previously queued command has been applied
    pub async fn position(&self) -> ServiceResult<CursorPosition> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlMessage::Position { reply }).await?;
        rx.await.map_err(|_| ServiceError::NotRunning)
    }

    /// Check if the controller task is still accepting commands
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn shutdown(&self) -> ServiceResult<()> {
        self.send(ControlMessage::Shutdown).await
    }

    async fn send(&self, message: ControlMessage) -> ServiceResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| ServiceError::NotRunning)
    }
}

/// Owns the controller task and the platform capabilities for one session
pub struct CursorService {
    id: Uuid,
    state: ServiceState,
    options: ServiceOptions,
    platform: Option<Platform>,
    settings: Arc<dyn SettingsLauncher>,
    handle: Option<ControlHandle>,
    actor: Option<JoinHandle<()>>,
    event_tx: mpsc::Sender<CursorEvent>,
    event_rx: Option<mpsc::Receiver<CursorEvent>>,
}

impl CursorService {
    /// Create a new service
    pub fn new(platform: Platform, options: ServiceOptions) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);

        Self {
            id: Uuid::new_v4(),
            state: ServiceState::Uninitialized,
            options,
            settings: platform.settings.clone(),
            platform: Some(platform),
            handle: None,
            actor: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<CursorEvent>> {
        self.event_rx.take()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Settings launcher supplied with the platform
    pub fn settings(&self) -> Arc<dyn SettingsLauncher> {
        self.settings.clone()
    }

    /// Handle to the running controller, if any
    pub fn handle(&self) -> Option<ControlHandle> {
        self.handle.clone()
    }

    /// Start the service
    pub fn start(&mut self) -> ServiceResult<ControlHandle> {
        match self.state {
            ServiceState::Running => return Err(ServiceError::AlreadyRunning),
            ServiceState::Stopped => return Err(ServiceError::Stopped),
            ServiceState::Uninitialized => {}
        }

        let platform = self.platform.take().ok_or(ServiceError::Stopped)?;

        let overlay = OverlayRenderer::new(platform.overlay, self.options.overlay_spec.clone());
        let gestures = GestureDispatcher::new(platform.gestures, self.options.gesture_timing.clone());
        let mut controller = CursorController::new(platform.screen, overlay, gestures)
            .with_events(self.event_tx.clone());

        let overlay_ready = if self.options.overlay_enabled {
            match controller.start() {
                Ok(()) => true,
                // Already reported; commands are still accepted
                Err(ControlError::OverlayUnavailable(_)) => false,
                Err(e) => {
                    tracing::warn!("Unexpected error while starting cursor: {}", e);
                    false
                }
            }
        } else {
            controller.start_hidden();
            false
        };

        let (sender, receiver) = mpsc::channel(self.options.queue_capacity);
        self.actor = Some(tokio::spawn(run_controller(self.id, controller, receiver)));

        let handle = ControlHandle { sender };
        self.handle = Some(handle.clone());
        self.state = ServiceState::Running;

        tracing::info!(
            "Cursor service {} running (overlay: {})",
            self.id,
            if overlay_ready { "visible" } else { "none" }
        );
        Ok(handle)
    }

    /// Stop the service, draining queued commands and releasing the overlay
    pub async fn stop(&mut self) -> ServiceResult<()> {
        if self.state != ServiceState::Running {
            return Err(ServiceError::NotRunning);
        }

        if let Some(handle) = self.handle.take() {
            if handle.shutdown().await.is_err() {
                tracing::debug!("Cursor controller already gone");
            }
        }

        if let Some(actor) = self.actor.take() {
            if let Err(e) = actor.await {
                tracing::error!("Cursor controller task ended abnormally: {}", e);
            }
        }

        self.state = ServiceState::Stopped;
        tracing::info!("Cursor service {} stopped", self.id);
        Ok(())
    }
}

impl Drop for CursorService {
    fn drop(&mut self) {
        // Dropping the task drops the controller, which releases the overlay
        if let Some(actor) = self.actor.take() {
            actor.abort();
        }
    }
}

async fn run_controller(
    id: Uuid,
    mut controller: CursorController,
    mut receiver: mpsc::Receiver<ControlMessage>,
) {
    tracing::debug!("Cursor controller {} started", id);

    while let Some(message) = receiver.recv().await {
        match message {
            ControlMessage::Move { delta_x, delta_y } => {
                controller.move_cursor(delta_x, delta_y);
            }
            ControlMessage::Click => {
                // Failures are reported through cursor events
                let _ = controller.click();
            }
            ControlMessage::Position { reply } => {
                let _ = reply.send(controller.position());
            }
            ControlMessage::Shutdown => break,
        }
    }

    receiver.close();
    controller.shutdown();
    tracing::debug!("Cursor controller {} finished", id);
}
