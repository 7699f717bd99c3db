//! Linux backend
//!
//! Screen size comes from the framebuffer sysfs node, read on every call so
//! rotation and mode changes are picked up. Taps are injected through a
//! virtual direct-touch device created with uinput.
//!
//! Requirements:
//! - /dev/uinput must be writable (uinput module loaded, user in the 'input'
//!   group or running as root)

use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use super::traits::{GestureInjector, PlatformError, PlatformResult, ScreenMetrics};
use crate::cursor::{GestureRequest, ScreenBounds};

/// Default sysfs node holding "width,height" of the primary framebuffer
pub const DEFAULT_FRAMEBUFFER_SIZE: &str = "/sys/class/graphics/fb0/virtual_size";

const UINPUT_PATH: &str = "/dev/uinput";

// Linux input event constants
const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const EV_ABS: u16 = 0x03;

const SYN_REPORT: u16 = 0x00;

const ABS_X: u16 = 0x00;
const ABS_Y: u16 = 0x01;

const BTN_TOUCH: u16 = 0x14a;

const INPUT_PROP_DIRECT: u16 = 0x01;

// uinput_user_dev: name[80], input_id(8), ff_effects_max(4), then
// absmax/absmin/absfuzz/absflat as [i32; 64] each
const UINPUT_MAX_NAME_SIZE: usize = 80;
const ABS_CNT: usize = 64;
const ABSMAX_OFFSET: usize = UINPUT_MAX_NAME_SIZE + 8 + 4;
const UINPUT_USER_DEV_SIZE: usize = ABSMAX_OFFSET + 4 * ABS_CNT * 4;

/// Raw input_event structure (matches Linux kernel structure)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct InputEventRaw {
    tv_sec: i64,
    tv_usec: i64,
    type_: u16,
    code: u16,
    value: i32,
}

impl InputEventRaw {
    fn new(type_: u16, code: u16, value: i32) -> Self {
        // The kernel stamps injected events itself
        Self {
            type_,
            code,
            value,
            ..Default::default()
        }
    }

    fn to_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(std::mem::size_of::<Self>());
        bytes.extend_from_slice(&self.tv_sec.to_ne_bytes());
        bytes.extend_from_slice(&self.tv_usec.to_ne_bytes());
        bytes.extend_from_slice(&self.type_.to_ne_bytes());
        bytes.extend_from_slice(&self.code.to_ne_bytes());
        bytes.extend_from_slice(&self.value.to_ne_bytes());
        bytes
    }
}

/// Screen size read from the framebuffer on every call
#[derive(Debug, Clone)]
pub struct FramebufferScreen {
    path: PathBuf,
    fallback: ScreenBounds,
}

impl FramebufferScreen {
    pub fn new(path: impl Into<PathBuf>, fallback: ScreenBounds) -> Self {
        Self {
            path: path.into(),
            fallback,
        }
    }

    fn read_size(path: &Path) -> Option<ScreenBounds> {
        let contents = std::fs::read_to_string(path).ok()?;
        parse_virtual_size(&contents)
    }
}

impl ScreenMetrics for FramebufferScreen {
    fn screen_bounds(&self) -> ScreenBounds {
        Self::read_size(&self.path).unwrap_or_else(|| {
            tracing::debug!(
                "Cannot read {}; using {} screen",
                self.path.display(),
                self.fallback
            );
            self.fallback
        })
    }
}

/// Parse the "width,height" format of the framebuffer virtual_size node
fn parse_virtual_size(contents: &str) -> Option<ScreenBounds> {
    let (width, height) = contents.trim().split_once(',')?;
    let width: u32 = width.trim().parse().ok()?;
    let height: u32 = height.trim().parse().ok()?;
    Some(ScreenBounds::from_pixels(width, height))
}

/// Taps through a virtual uinput touchscreen
pub struct UinputTapInjector {
    device: Mutex<Option<File>>,
}

impl UinputTapInjector {
    /// Check if uinput is available
    pub fn is_uinput_available() -> bool {
        Path::new(UINPUT_PATH).exists()
    }

    /// Create a virtual touchscreen covering `bounds`.
    ///
    /// The axis range is fixed at creation; a later resolution change needs a
    /// new device.
    pub fn open(bounds: ScreenBounds) -> PlatformResult<Self> {
        if !Self::is_uinput_available() {
            return Err(PlatformError::DeviceNotFound(
                "/dev/uinput not found. Load the module: sudo modprobe uinput".to_string(),
            ));
        }

        let mut file = OpenOptions::new()
            .write(true)
            .open(UINPUT_PATH)
            .map_err(|e| {
                PlatformError::PermissionDenied(format!(
                    "Cannot open {}: {}. Add the user to the 'input' group",
                    UINPUT_PATH, e
                ))
            })?;

        let fd = file.as_raw_fd();

        unsafe {
            libc::ioctl(fd, 0x40045564, EV_KEY as libc::c_int); // UI_SET_EVBIT
            libc::ioctl(fd, 0x40045564, EV_ABS as libc::c_int);
            libc::ioctl(fd, 0x40045564, EV_SYN as libc::c_int);

            libc::ioctl(fd, 0x40045565, BTN_TOUCH as libc::c_int); // UI_SET_KEYBIT

            libc::ioctl(fd, 0x40045567, ABS_X as libc::c_int); // UI_SET_ABSBIT
            libc::ioctl(fd, 0x40045567, ABS_Y as libc::c_int);

            libc::ioctl(fd, 0x4004556e, INPUT_PROP_DIRECT as libc::c_int); // UI_SET_PROPBIT
        }

        file.write_all(&user_dev_bytes(bounds))?;

        unsafe {
            let ret = libc::ioctl(fd, 0x5501); // UI_DEV_CREATE
            if ret < 0 {
                return Err(PlatformError::Platform(format!(
                    "UI_DEV_CREATE failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
        }

        // Give udev a moment to publish the device
        std::thread::sleep(Duration::from_millis(100));

        tracing::info!("uinput touchscreen created for {} screen", bounds);
        Ok(Self {
            device: Mutex::new(Some(file)),
        })
    }

    fn write_events(&self, events: &[(u16, u16, i32)]) -> PlatformResult<()> {
        let mut device = self
            .device
            .lock()
            .map_err(|_| PlatformError::Platform("uinput device lock poisoned".to_string()))?;
        let file = device
            .as_mut()
            .ok_or_else(|| PlatformError::DeviceNotFound("uinput device closed".to_string()))?;

        for &(type_, code, value) in events {
            file.write_all(&InputEventRaw::new(type_, code, value).to_bytes())?;
        }
        Ok(())
    }

    fn release_touch(&self) -> PlatformResult<()> {
        self.write_events(&[(EV_KEY, BTN_TOUCH, 0), (EV_SYN, SYN_REPORT, 0)])
    }
}

#[async_trait]
impl GestureInjector for UinputTapInjector {
    fn is_available(&self) -> bool {
        self.device.lock().map(|d| d.is_some()).unwrap_or(false)
    }

    async fn dispatch_tap(&self, request: &GestureRequest) -> PlatformResult<()> {
        let (x, y) = request.start_point.to_pixels();

        self.write_events(&[
            (EV_ABS, ABS_X, x),
            (EV_ABS, ABS_Y, y),
            (EV_KEY, BTN_TOUCH, 1),
            (EV_SYN, SYN_REPORT, 0),
        ])?;

        // Lift the finger even if this future is dropped mid-press
        let mut guard = TouchGuard {
            injector: self,
            armed: true,
        };
        tokio::time::sleep(Duration::from_millis(request.duration_ms)).await;
        guard.armed = false;

        self.release_touch()
    }
}

impl Drop for UinputTapInjector {
    fn drop(&mut self) {
        if let Ok(mut device) = self.device.lock() {
            if let Some(file) = device.take() {
                unsafe {
                    libc::ioctl(file.as_raw_fd(), 0x5502); // UI_DEV_DESTROY
                }
            }
        }
    }
}

struct TouchGuard<'a> {
    injector: &'a UinputTapInjector,
    armed: bool,
}

impl Drop for TouchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.injector.release_touch() {
                tracing::warn!("Failed to lift cancelled tap: {}", e);
            }
        }
    }
}

/// Build the legacy uinput_user_dev setup block
fn user_dev_bytes(bounds: ScreenBounds) -> Vec<u8> {
    let mut setup = vec![0u8; UINPUT_USER_DEV_SIZE];

    let name = b"pointerd virtual touchscreen";
    setup[..name.len()].copy_from_slice(name);

    setup[80..82].copy_from_slice(&0x06u16.to_ne_bytes()); // BUS_VIRTUAL
    setup[82..84].copy_from_slice(&0x1234u16.to_ne_bytes()); // vendor
    setup[84..86].copy_from_slice(&0x5679u16.to_ne_bytes()); // product
    setup[86..88].copy_from_slice(&1u16.to_ne_bytes()); // version

    let (max_x, max_y) = (
        (bounds.width as i32 - 1).max(0),
        (bounds.height as i32 - 1).max(0),
    );
    let absmax_x = ABSMAX_OFFSET + 4 * ABS_X as usize;
    let absmax_y = ABSMAX_OFFSET + 4 * ABS_Y as usize;
    setup[absmax_x..absmax_x + 4].copy_from_slice(&max_x.to_ne_bytes());
    setup[absmax_y..absmax_y + 4].copy_from_slice(&max_y.to_ne_bytes());

    setup
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_virtual_size() {
        assert_eq!(
            parse_virtual_size("1080,2400\n"),
            Some(ScreenBounds::new(1080.0, 2400.0))
        );
        assert_eq!(parse_virtual_size("garbage"), None);
        assert_eq!(parse_virtual_size("1080,"), None);
    }

    #[test]
    fn test_framebuffer_screen_rereads_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "1080,2400").unwrap();
        let screen = FramebufferScreen::new(file.path(), ScreenBounds::new(1.0, 1.0));
        assert_eq!(screen.screen_bounds(), ScreenBounds::new(1080.0, 2400.0));

        std::fs::write(file.path(), "2400,1080\n").unwrap();
        assert_eq!(screen.screen_bounds(), ScreenBounds::new(2400.0, 1080.0));
    }

    #[test]
    fn test_framebuffer_screen_falls_back() {
        let fallback = ScreenBounds::new(800.0, 600.0);
        let screen = FramebufferScreen::new("/nonexistent/virtual_size", fallback);
        assert_eq!(screen.screen_bounds(), fallback);
    }

    #[test]
    fn test_user_dev_layout() {
        let bytes = user_dev_bytes(ScreenBounds::new(1080.0, 2400.0));
        assert_eq!(bytes.len(), 1116);
        assert_eq!(&bytes[92..96], &1079i32.to_ne_bytes());
        assert_eq!(&bytes[96..100], &2399i32.to_ne_bytes());
    }

    #[test]
    fn test_input_event_size() {
        let bytes = InputEventRaw::new(EV_KEY, BTN_TOUCH, 1).to_bytes();
        assert_eq!(bytes.len(), 24);
    }
}
