//! Cursor controller
//!
//! Owns the cursor state, the overlay renderer and the gesture dispatcher
//! together, so a move and its repaint can never interleave with another
//! command. The controller is driven by exactly one task (see
//! `bridge::service`).

use std::sync::Arc;
use tokio::sync::mpsc;

use super::geometry::CursorPosition;
use super::gesture::{GestureDispatcher, GestureRequest};
use super::overlay::{OverlayRenderer, RenderOutcome};
use super::state::CursorState;
use super::{ControlError, ControlResult, CursorEvent};
use crate::platform::ScreenMetrics;

/// What a move did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    /// Clamped position now stored
    pub position: CursorPosition,
    /// What happened on screen
    pub render: RenderOutcome,
}

pub struct CursorController {
    state: CursorState,
    overlay: OverlayRenderer,
    gestures: GestureDispatcher,
    screen: Arc<dyn ScreenMetrics>,
    events: Option<mpsc::Sender<CursorEvent>>,
}

impl CursorController {
    pub fn new(
        screen: Arc<dyn ScreenMetrics>,
        overlay: OverlayRenderer,
        gestures: GestureDispatcher,
    ) -> Self {
        Self {
            state: CursorState::new(),
            overlay,
            gestures,
            screen,
            events: None,
        }
    }

    /// Report moves, overlay changes and tap outcomes on `events`
    pub fn with_events(mut self, events: mpsc::Sender<CursorEvent>) -> Self {
        self.gestures.set_event_sender(events.clone());
        self.events = Some(events);
        self
    }

    /// Reset the cursor to the origin and acquire the overlay.
    ///
    /// An overlay failure is reported but leaves the controller usable: moves
    /// still update the position, they just have no visible effect.
    pub fn start(&mut self) -> ControlResult<()> {
        self.state.initialize();

        match self.overlay.create(self.state.current_position()) {
            Ok(()) => {
                self.emit(CursorEvent::OverlayCreated);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Cursor will be invisible: {}", e);
                self.emit(CursorEvent::OverlayUnavailable {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Reset the cursor to the origin without drawing anything
    pub fn start_hidden(&mut self) {
        self.state.initialize();
    }

    /// Move the cursor by a relative amount against the current screen size
    pub fn move_cursor(&mut self, delta_x: i32, delta_y: i32) -> MoveOutcome {
        let bounds = self.screen.screen_bounds();
        let position = self.state.apply_move(delta_x, delta_y, bounds);

        let render = match self.overlay.reposition(position) {
            Ok(RenderOutcome::NoOverlay) => {
                tracing::debug!("No overlay present; cursor moved to {} without visible effect", position);
                RenderOutcome::NoOverlay
            }
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Overlay did not follow cursor to {}: {}", position, e);
                self.emit(CursorEvent::OverlayUnavailable {
                    reason: e.to_string(),
                });
                RenderOutcome::Failed
            }
        };

        tracing::debug!(
            "Cursor moved by ({}, {}) to {} on {} screen ({:?})",
            delta_x,
            delta_y,
            position,
            bounds,
            render
        );
        self.emit(CursorEvent::Moved {
            position,
            rendered: render.is_visible(),
        });

        MoveOutcome { position, render }
    }

    /// Tap at the current cursor position
    pub fn click(&mut self) -> ControlResult<GestureRequest> {
        let position = self.state.current_position();

        match self.gestures.click(position) {
            Ok(request) => {
                tracing::debug!("Tap submitted at {}", position);
                Ok(request)
            }
            Err(ControlError::GestureBusy) => {
                tracing::debug!("Tap at {} rejected: previous tap still in flight", position);
                self.emit(CursorEvent::GestureBusy { position });
                Err(ControlError::GestureBusy)
            }
            Err(e) => {
                tracing::warn!("Tap at {} not dispatched: {}", position, e);
                self.emit(CursorEvent::GestureFailed {
                    position,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn position(&self) -> CursorPosition {
        self.state.current_position()
    }

    pub fn overlay_active(&self) -> bool {
        self.overlay.is_active()
    }

    /// Drop any in-flight tap and release the overlay
    pub fn shutdown(&mut self) {
        self.gestures.cancel();
        if self.overlay.destroy() {
            self.emit(CursorEvent::OverlayReleased);
        }
    }

    fn emit(&self, event: CursorEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(event) {
                tracing::debug!("Cursor event dropped: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::gesture::{GestureTiming, TAP_DURATION_MS};
    use crate::cursor::overlay::{cursor_overlay_spec, DEFAULT_CURSOR_COLOR};
    use crate::platform::mock::{MockGestureInjector, MockOverlay, MockScreen};

    struct Fixture {
        controller: CursorController,
        screen: Arc<MockScreen>,
        overlay: MockOverlay,
        injector: Arc<MockGestureInjector>,
        events: mpsc::Receiver<CursorEvent>,
    }

    fn fixture(overlay: MockOverlay) -> Fixture {
        let screen = Arc::new(MockScreen::new(1000.0, 2000.0));
        let injector = Arc::new(MockGestureInjector::new());
        let (tx, events) = mpsc::channel(64);

        let controller = CursorController::new(
            screen.clone(),
            OverlayRenderer::new(
                Box::new(overlay.clone()),
                cursor_overlay_spec(DEFAULT_CURSOR_COLOR),
            ),
            GestureDispatcher::new(injector.clone(), GestureTiming::default()),
        )
        .with_events(tx);

        Fixture {
            controller,
            screen,
            overlay,
            injector,
            events,
        }
    }

    async fn next_tap_event(events: &mut mpsc::Receiver<CursorEvent>) -> CursorEvent {
        loop {
            let event = events.recv().await.unwrap();
            if matches!(
                event,
                CursorEvent::GestureCompleted { .. } | CursorEvent::GestureFailed { .. }
            ) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_scenario_clamp_and_click() {
        let mut f = fixture(MockOverlay::new());
        f.controller.start().unwrap();

        let outcome = f.controller.move_cursor(2000, 0);
        assert_eq!(outcome.position, CursorPosition::new(950.0, 0.0));
        assert_eq!(outcome.render, RenderOutcome::Moved);

        let outcome = f.controller.move_cursor(-2000, 0);
        assert_eq!(outcome.position, CursorPosition::ORIGIN);

        f.controller.click().unwrap();
        next_tap_event(&mut f.events).await;

        assert_eq!(
            f.injector.taps(),
            vec![GestureRequest::tap(CursorPosition::ORIGIN, TAP_DURATION_MS)]
        );
    }

    #[tokio::test]
    async fn test_click_uses_post_move_position() {
        let mut f = fixture(MockOverlay::new());
        f.controller.start().unwrap();

        f.controller.move_cursor(300, 700);
        f.controller.move_cursor(900, 0);
        f.controller.click().unwrap();
        next_tap_event(&mut f.events).await;

        let taps = f.injector.taps();
        assert_eq!(taps.len(), 1);
        assert_eq!(taps[0].start_point, CursorPosition::new(950.0, 700.0));
    }

    #[tokio::test]
    async fn test_overlay_tracks_every_move_in_order() {
        let mut f = fixture(MockOverlay::new());
        f.controller.start().unwrap();

        f.controller.move_cursor(10, 0);
        f.controller.move_cursor(0, 10);
        f.controller.move_cursor(-5, -5);

        assert_eq!(
            f.overlay.record().repositions,
            vec![
                CursorPosition::new(10.0, 0.0),
                CursorPosition::new(10.0, 10.0),
                CursorPosition::new(5.0, 5.0),
            ]
        );
        assert_eq!(f.controller.position(), CursorPosition::new(5.0, 5.0));
    }

    #[tokio::test]
    async fn test_moves_without_overlay_are_explicit_noops() {
        let mut f = fixture(MockOverlay::denied());
        assert!(matches!(
            f.controller.start(),
            Err(ControlError::OverlayUnavailable(_))
        ));
        assert!(matches!(
            f.events.recv().await.unwrap(),
            CursorEvent::OverlayUnavailable { .. }
        ));

        let outcome = f.controller.move_cursor(100, 100);
        assert_eq!(outcome.position, CursorPosition::new(100.0, 100.0));
        assert_eq!(outcome.render, RenderOutcome::NoOverlay);
        assert!(matches!(
            f.events.recv().await.unwrap(),
            CursorEvent::Moved { rendered: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_rotation_is_picked_up_on_next_move() {
        let mut f = fixture(MockOverlay::new());
        f.controller.start().unwrap();

        f.controller.move_cursor(900, 1900);
        assert_eq!(f.controller.position(), CursorPosition::new(900.0, 1900.0));

        f.screen.set_bounds(2000.0, 1000.0);
        let outcome = f.controller.move_cursor(0, 0);
        assert_eq!(outcome.position, CursorPosition::new(900.0, 950.0));
    }

    #[tokio::test]
    async fn test_busy_click_is_reported() {
        let mut f = fixture(MockOverlay::new());
        f.injector.set_hanging(true);
        f.controller.start().unwrap();

        f.controller.click().unwrap();
        assert!(matches!(f.controller.click(), Err(ControlError::GestureBusy)));

        let mut saw_busy = false;
        while let Ok(event) = f.events.try_recv() {
            saw_busy |= matches!(event, CursorEvent::GestureBusy { .. });
        }
        assert!(saw_busy);
        assert_eq!(f.injector.wait_for_taps(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_releases_overlay_once() {
        let mut f = fixture(MockOverlay::new());
        f.controller.start().unwrap();
        assert!(f.controller.overlay_active());

        f.controller.shutdown();
        f.controller.shutdown();
        drop(f.controller);

        assert_eq!(f.overlay.record().destroyed, 1);
    }
}
