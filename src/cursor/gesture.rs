//! Tap gesture dispatch
//!
//! A click becomes exactly one single-point tap. Submission is
//! fire-and-forget: the platform acknowledgment is awaited on a spawned task
//! with a timeout, and its outcome is reported as a [`CursorEvent`].
//!
//! Busy policy: while a tap is in flight a new click is rejected with
//! [`ControlError::GestureBusy`]. Clicks are never queued and never replace
//! the pending tap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::geometry::CursorPosition;
use super::{ControlError, ControlResult, CursorEvent};
use crate::platform::GestureInjector;

/// Press duration of a tap. Short enough to never register as a long-press.
pub const TAP_DURATION_MS: u64 = 10;

/// How long to wait for the platform to acknowledge a tap
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 500;

/// A single tap, built fresh for every click
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureRequest {
    pub start_point: CursorPosition,
    pub duration_ms: u64,
}

impl GestureRequest {
    pub fn tap(start_point: CursorPosition, duration_ms: u64) -> Self {
        Self {
            start_point,
            duration_ms,
        }
    }
}

/// Timing for tap gestures
#[derive(Debug, Clone)]
pub struct GestureTiming {
    pub tap_duration_ms: u64,
    pub ack_timeout: Duration,
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self {
            tap_duration_ms: TAP_DURATION_MS,
            ack_timeout: Duration::from_millis(DEFAULT_ACK_TIMEOUT_MS),
        }
    }
}

/// Converts click intents into taps on the gesture injector
pub struct GestureDispatcher {
    injector: Arc<dyn GestureInjector>,
    timing: GestureTiming,
    in_flight: Arc<AtomicBool>,
    pending: Option<JoinHandle<()>>,
    events: Option<mpsc::Sender<CursorEvent>>,
}

impl GestureDispatcher {
    pub fn new(injector: Arc<dyn GestureInjector>, timing: GestureTiming) -> Self {
        Self {
            injector,
            timing,
            in_flight: Arc::new(AtomicBool::new(false)),
            pending: None,
            events: None,
        }
    }

    /// Report tap outcomes on `events`
    pub fn set_event_sender(&mut self, events: mpsc::Sender<CursorEvent>) {
        self.events = Some(events);
    }

    /// Submit one tap at `position`.
    ///
    /// Returns the submitted request. The tap itself completes later; its
    /// outcome arrives as `GestureCompleted` or `GestureFailed`.
    pub fn click(&mut self, position: CursorPosition) -> ControlResult<GestureRequest> {
        if self.is_busy() {
            return Err(ControlError::GestureBusy);
        }

        if !self.injector.is_available() {
            return Err(ControlError::GestureDispatchFailed(
                "gesture injection is not available".to_string(),
            ));
        }

        let request = GestureRequest::tap(position, self.timing.tap_duration_ms);
        self.in_flight.store(true, Ordering::SeqCst);

        let injector = self.injector.clone();
        let in_flight = self.in_flight.clone();
        let events = self.events.clone();
        let ack_timeout = self.timing.ack_timeout;

        self.pending = Some(tokio::spawn(async move {
            let event = match tokio::time::timeout(ack_timeout, injector.dispatch_tap(&request)).await {
                Ok(Ok(())) => {
                    tracing::debug!("Tap completed at {}", request.start_point);
                    CursorEvent::GestureCompleted {
                        position: request.start_point,
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!("Tap at {} failed: {}", request.start_point, e);
                    CursorEvent::GestureFailed {
                        position: request.start_point,
                        reason: e.to_string(),
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        "Tap at {} not acknowledged within {:?}",
                        request.start_point,
                        ack_timeout
                    );
                    CursorEvent::GestureFailed {
                        position: request.start_point,
                        reason: format!("no acknowledgment within {:?}", ack_timeout),
                    }
                }
            };

            in_flight.store(false, Ordering::SeqCst);

            if let Some(events) = events {
                if let Err(e) = events.try_send(event) {
                    tracing::debug!("Tap outcome dropped: {}", e);
                }
            }
        }));

        Ok(request)
    }

    /// Whether a previous tap has not been acknowledged yet
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Abandon the in-flight tap, if any
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            if !pending.is_finished() {
                tracing::debug!("Cancelling in-flight tap");
            }
            pending.abort();
        }
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

impl Drop for GestureDispatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}
