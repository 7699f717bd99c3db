//! Recording test doubles for every platform capability.
//!
//! Each double records what it was asked to do in shared, lock-protected
//! state so a test can keep a clone (or an `Arc`) after handing the double to
//! the code under test, and assert on the calls afterwards. Failure switches
//! let tests drive the error paths without a real host.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{
    GestureInjector, OverlayHandle, OverlaySpec, OverlaySurface, Platform, PlatformError,
    PlatformResult, ScreenMetrics, SettingsLauncher,
};
use crate::cursor::{CursorPosition, GestureRequest, ScreenBounds};

/// Screen whose size can be changed mid-test (rotation)
pub struct MockScreen {
    bounds: Mutex<ScreenBounds>,
}

impl MockScreen {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bounds: Mutex::new(ScreenBounds::new(width, height)),
        }
    }

    pub fn set_bounds(&self, width: f32, height: f32) {
        *self.bounds.lock().unwrap() = ScreenBounds::new(width, height);
    }
}

impl ScreenMetrics for MockScreen {
    fn screen_bounds(&self) -> ScreenBounds {
        *self.bounds.lock().unwrap()
    }
}

/// Everything a [`MockOverlay`] has been asked to do
#[derive(Debug, Clone, Default)]
pub struct OverlayRecord {
    /// Spec of every successful `create`
    pub created: Vec<OverlaySpec>,
    /// Every position passed to `reposition`, in call order
    pub repositions: Vec<CursorPosition>,
    /// Number of successful `destroy` calls
    pub destroyed: usize,
    /// Surfaces currently alive and where they are
    pub live: HashMap<OverlayHandle, CursorPosition>,
}

/// Overlay surface that records calls instead of drawing
#[derive(Clone, Default)]
pub struct MockOverlay {
    record: Arc<Mutex<OverlayRecord>>,
    deny: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl MockOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay whose creation is refused, as when the permission is missing
    pub fn denied() -> Self {
        let overlay = Self::default();
        overlay.revoke();
        overlay
    }

    /// Refuse every later create/reposition
    pub fn revoke(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    pub fn record(&self) -> OverlayRecord {
        self.record.lock().unwrap().clone()
    }

    fn check_permission(&self) -> PlatformResult<()> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(PlatformError::PermissionDenied(
                "overlay permission not granted".to_string(),
            ));
        }
        Ok(())
    }
}

impl OverlaySurface for MockOverlay {
    fn create(&mut self, spec: &OverlaySpec, origin: CursorPosition) -> PlatformResult<OverlayHandle> {
        self.check_permission()?;
        let handle = OverlayHandle(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut record = self.record.lock().unwrap();
        record.created.push(spec.clone());
        record.live.insert(handle, origin);
        Ok(handle)
    }

    fn reposition(&mut self, handle: OverlayHandle, position: CursorPosition) -> PlatformResult<()> {
        self.check_permission()?;
        let mut record = self.record.lock().unwrap();
        match record.live.get_mut(&handle) {
            Some(current) => *current = position,
            None => return Err(PlatformError::Platform(format!("unknown overlay {:?}", handle))),
        }
        record.repositions.push(position);
        Ok(())
    }

    fn destroy(&mut self, handle: OverlayHandle) -> PlatformResult<()> {
        let mut record = self.record.lock().unwrap();
        if record.live.remove(&handle).is_none() {
            return Err(PlatformError::Platform(format!("unknown overlay {:?}", handle)));
        }
        record.destroyed += 1;
        Ok(())
    }
}

/// Gesture injector that records taps
pub struct MockGestureInjector {
    taps: Mutex<Vec<GestureRequest>>,
    available: AtomicBool,
    failing: AtomicBool,
    hanging: AtomicBool,
}

impl MockGestureInjector {
    pub fn new() -> Self {
        Self {
            taps: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            hanging: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every tap fail after being recorded
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every tap wait forever for an acknowledgment
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub fn taps(&self) -> Vec<GestureRequest> {
        self.taps.lock().unwrap().clone()
    }

    /// Yield until at least `count` taps have been recorded
    pub async fn wait_for_taps(&self, count: usize) -> Vec<GestureRequest> {
        tokio::time::timeout(Duration::from_secs(1), async {
            while self.taps.lock().unwrap().len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("taps were not recorded in time");
        self.taps()
    }
}

impl Default for MockGestureInjector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GestureInjector for MockGestureInjector {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn dispatch_tap(&self, request: &GestureRequest) -> PlatformResult<()> {
        self.taps.lock().unwrap().push(*request);

        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PlatformError::Platform("gesture cancelled by host".to_string()));
        }
        Ok(())
    }
}

/// Settings launcher that counts launches
#[derive(Default)]
pub struct MockSettings {
    opened: AtomicUsize,
    failing: AtomicBool,
}

impl MockSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsLauncher for MockSettings {
    async fn open_accessibility_settings(&self) -> PlatformResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PlatformError::NotSupported);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handles onto the doubles inside a [`mock_platform`]
pub struct MockDoubles {
    pub screen: Arc<MockScreen>,
    pub overlay: MockOverlay,
    pub gestures: Arc<MockGestureInjector>,
    pub settings: Arc<MockSettings>,
}

/// Build a platform made of test doubles, plus handles to inspect them
pub fn mock_platform(width: f32, height: f32) -> (Platform, MockDoubles) {
    mock_platform_with_overlay(width, height, MockOverlay::new())
}

pub fn mock_platform_with_overlay(
    width: f32,
    height: f32,
    overlay: MockOverlay,
) -> (Platform, MockDoubles) {
    let doubles = MockDoubles {
        screen: Arc::new(MockScreen::new(width, height)),
        overlay,
        gestures: Arc::new(MockGestureInjector::new()),
        settings: Arc::new(MockSettings::new()),
    };

    let platform = Platform {
        screen: doubles.screen.clone(),
        overlay: Box::new(doubles.overlay.clone()),
        gestures: doubles.gestures.clone(),
        settings: doubles.settings.clone(),
    };

    (platform, doubles)
}
