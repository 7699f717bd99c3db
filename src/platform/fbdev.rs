//! Framebuffer overlay
//!
//! Paints the cursor marker straight into a Linux framebuffer device
//! (`/dev/fbN`). The pixels under the marker are saved before painting and
//! written back when the marker moves or is destroyed, so the marker never
//! leaves a trail. Nothing here takes input: the marker is just pixels, so it
//! cannot receive touches or focus.
//!
//! Requirements:
//! - the framebuffer device must be readable and writable (user in the
//!   'video' group or running as root)

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use super::traits::{OverlayHandle, OverlaySpec, OverlaySurface, PlatformError, PlatformResult};
use crate::cursor::CursorPosition;

/// Default framebuffer device
pub const DEFAULT_FRAMEBUFFER_DEVICE: &str = "/dev/fb0";

const SYSFS_GRAPHICS: &str = "/sys/class/graphics";

/// Memory layout of a framebuffer, as published in sysfs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferGeometry {
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
    pub bits_per_pixel: u32,
}

impl FramebufferGeometry {
    /// Read `virtual_size`, `stride` and `bits_per_pixel` from a sysfs
    /// directory such as `/sys/class/graphics/fb0`
    pub fn from_sysfs(dir: &Path) -> PlatformResult<Self> {
        let read = |name: &str| -> PlatformResult<String> {
            std::fs::read_to_string(dir.join(name)).map_err(|e| {
                PlatformError::DeviceNotFound(format!("{}: {}", dir.join(name).display(), e))
            })
        };
        let number = |name: &str, value: &str| -> PlatformResult<u32> {
            value.trim().parse().map_err(|_| {
                PlatformError::Platform(format!("unexpected {} value {:?}", name, value.trim()))
            })
        };

        let size = read("virtual_size")?;
        let (width, height) = size
            .trim()
            .split_once(',')
            .ok_or_else(|| PlatformError::Platform(format!("unexpected virtual_size {:?}", size.trim())))?;

        let geometry = Self {
            width: number("virtual_size", width)?,
            height: number("virtual_size", height)?,
            stride: number("stride", &read("stride")?)?,
            bits_per_pixel: number("bits_per_pixel", &read("bits_per_pixel")?)?,
        };

        if geometry.stride < geometry.width * geometry.bytes_per_pixel() as u32 {
            return Err(PlatformError::Platform(format!(
                "stride {} too small for {} pixels at {} bpp",
                geometry.stride, geometry.width, geometry.bits_per_pixel
            )));
        }
        Ok(geometry)
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.bits_per_pixel as usize).div_ceil(8)
    }

    fn offset(&self, x: u32, y: u32) -> u64 {
        y as u64 * self.stride as u64 + x as u64 * self.bytes_per_pixel() as u64
    }

    /// The part of a `width` x `height` box at (`x`, `y`) that lies on screen
    fn clip(&self, x: i32, y: i32, width: u32, height: u32) -> Option<Rect> {
        let left = x.max(0) as u32;
        let top = y.max(0) as u32;
        let right = (x as i64 + width as i64).clamp(0, self.width as i64) as u32;
        let bottom = (y as i64 + height as i64).clamp(0, self.height as i64) as u32;

        if left >= right || top >= bottom {
            return None;
        }
        Some(Rect {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }
}

/// Encode 0xAARRGGBB for a framebuffer pixel format. Alpha is dropped: the
/// framebuffer has no compositor to blend with.
fn encode_pixel(argb: u32, bits_per_pixel: u32) -> PlatformResult<Vec<u8>> {
    let [_, r, g, b] = argb.to_be_bytes();
    match bits_per_pixel {
        32 => Ok(vec![b, g, r, 0xFF]),
        24 => Ok(vec![b, g, r]),
        16 => {
            let rgb565 = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
            Ok(rgb565.to_le_bytes().to_vec())
        }
        other => {
            tracing::warn!("Framebuffer depth of {} bits is not supported", other);
            Err(PlatformError::NotSupported)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// A painted marker and the pixels it covers
#[derive(Debug)]
struct Marker {
    width: u32,
    height: u32,
    row: Vec<u8>,
    covered: Option<(Rect, Vec<u8>)>,
}

/// Overlay surface that draws into a framebuffer device
pub struct FramebufferOverlay {
    device: File,
    geometry: FramebufferGeometry,
    next_id: u64,
    markers: HashMap<OverlayHandle, Marker>,
}

impl FramebufferOverlay {
    /// Open a framebuffer device and read its layout from sysfs
    pub fn open(device: impl Into<PathBuf>) -> PlatformResult<Self> {
        let device = device.into();
        let name = device
            .file_name()
            .ok_or_else(|| PlatformError::DeviceNotFound(device.display().to_string()))?;
        let geometry = FramebufferGeometry::from_sysfs(&Path::new(SYSFS_GRAPHICS).join(name))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&device)
            .map_err(|e| {
                PlatformError::PermissionDenied(format!(
                    "Cannot open {}: {}. Add the user to the 'video' group",
                    device.display(),
                    e
                ))
            })?;

        tracing::info!(
            "Drawing cursor into {} ({}x{}, {} bpp)",
            device.display(),
            geometry.width,
            geometry.height,
            geometry.bits_per_pixel
        );
        Ok(Self::with_geometry(file, geometry))
    }

    /// Draw into an already opened device with a known layout
    pub fn with_geometry(device: File, geometry: FramebufferGeometry) -> Self {
        Self {
            device,
            geometry,
            next_id: 0,
            markers: HashMap::new(),
        }
    }

    fn paint(&self, marker: &mut Marker, position: CursorPosition) -> PlatformResult<()> {
        let (x, y) = position.to_pixels();
        let Some(rect) = self.geometry.clip(x, y, marker.width, marker.height) else {
            marker.covered = None;
            return Ok(());
        };

        let row_len = rect.width as usize * self.geometry.bytes_per_pixel();
        let mut saved = vec![0u8; row_len * rect.height as usize];
        for (i, chunk) in saved.chunks_mut(row_len).enumerate() {
            self.device
                .read_exact_at(chunk, self.geometry.offset(rect.x, rect.y + i as u32))?;
        }

        let fill = &marker.row[..row_len];
        for i in 0..rect.height {
            self.device
                .write_all_at(fill, self.geometry.offset(rect.x, rect.y + i))?;
        }

        marker.covered = Some((rect, saved));
        Ok(())
    }

    fn restore(&self, marker: &mut Marker) -> PlatformResult<()> {
        if let Some((rect, saved)) = marker.covered.take() {
            let row_len = rect.width as usize * self.geometry.bytes_per_pixel();
            for (i, chunk) in saved.chunks(row_len).enumerate() {
                self.device
                    .write_all_at(chunk, self.geometry.offset(rect.x, rect.y + i as u32))?;
            }
        }
        Ok(())
    }

    fn unknown(handle: OverlayHandle) -> PlatformError {
        PlatformError::Platform(format!("unknown overlay {:?}", handle))
    }
}

impl OverlaySurface for FramebufferOverlay {
    fn create(&mut self, spec: &OverlaySpec, origin: CursorPosition) -> PlatformResult<OverlayHandle> {
        let pixel = encode_pixel(spec.color, self.geometry.bits_per_pixel)?;
        let width = spec.width.round().max(1.0) as u32;
        let height = spec.height.round().max(1.0) as u32;

        let mut marker = Marker {
            width,
            height,
            row: pixel.repeat(width as usize),
            covered: None,
        };
        self.paint(&mut marker, origin)?;

        self.next_id += 1;
        let handle = OverlayHandle(self.next_id);
        self.markers.insert(handle, marker);
        Ok(handle)
    }

    fn reposition(&mut self, handle: OverlayHandle, position: CursorPosition) -> PlatformResult<()> {
        let mut marker = self.markers.remove(&handle).ok_or_else(|| Self::unknown(handle))?;
        let result = self.restore(&mut marker).and_then(|_| self.paint(&mut marker, position));
        self.markers.insert(handle, marker);
        result
    }

    fn destroy(&mut self, handle: OverlayHandle) -> PlatformResult<()> {
        let mut marker = self.markers.remove(&handle).ok_or_else(|| Self::unknown(handle))?;
        self.restore(&mut marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{cursor_overlay_spec, DEFAULT_CURSOR_COLOR};
    use tempfile::NamedTempFile;

    const RED: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

    fn geometry() -> FramebufferGeometry {
        FramebufferGeometry {
            width: 8,
            height: 6,
            stride: 40,
            bits_per_pixel: 32,
        }
    }

    fn small_spec() -> OverlaySpec {
        OverlaySpec {
            width: 2.0,
            height: 2.0,
            ..cursor_overlay_spec(DEFAULT_CURSOR_COLOR)
        }
    }

    /// A file standing in for the device, filled with a background byte
    fn fake_device(background: u8) -> (NamedTempFile, FramebufferOverlay) {
        let file = NamedTempFile::new().unwrap();
        let g = geometry();
        std::fs::write(file.path(), vec![background; (g.stride * g.height) as usize]).unwrap();
        let device = OpenOptions::new().read(true).write(true).open(file.path()).unwrap();
        (file, FramebufferOverlay::with_geometry(device, g))
    }

    fn pixel_at(file: &NamedTempFile, x: u32, y: u32) -> Vec<u8> {
        let bytes = std::fs::read(file.path()).unwrap();
        let offset = geometry().offset(x, y) as usize;
        bytes[offset..offset + 4].to_vec()
    }

    #[test]
    fn test_encode_pixel() {
        assert_eq!(encode_pixel(0xFFFF_0000, 32).unwrap(), RED.to_vec());
        assert_eq!(encode_pixel(0xFF12_3456, 24).unwrap(), vec![0x56, 0x34, 0x12]);
        assert_eq!(encode_pixel(0xFFFF_0000, 16).unwrap(), vec![0x00, 0xF8]);
        assert!(matches!(encode_pixel(0xFFFF_0000, 8), Err(PlatformError::NotSupported)));
    }

    #[test]
    fn test_offsets_follow_stride() {
        let g = geometry();
        assert_eq!(g.offset(0, 0), 0);
        assert_eq!(g.offset(3, 0), 12);
        assert_eq!(g.offset(1, 2), 84);
    }

    #[test]
    fn test_clip() {
        let g = geometry();
        assert_eq!(
            g.clip(6, 4, 50, 50),
            Some(Rect {
                x: 6,
                y: 4,
                width: 2,
                height: 2
            })
        );
        assert_eq!(g.clip(8, 0, 2, 2), None);
        assert_eq!(g.clip(-1, 0, 2, 2).map(|r| (r.x, r.width)), Some((0, 1)));
    }

    #[test]
    fn test_geometry_from_sysfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("virtual_size"), "1920,1080\n").unwrap();
        std::fs::write(dir.path().join("stride"), "7680\n").unwrap();
        std::fs::write(dir.path().join("bits_per_pixel"), "32\n").unwrap();

        assert_eq!(
            FramebufferGeometry::from_sysfs(dir.path()).unwrap(),
            FramebufferGeometry {
                width: 1920,
                height: 1080,
                stride: 7680,
                bits_per_pixel: 32
            }
        );

        std::fs::write(dir.path().join("stride"), "100\n").unwrap();
        assert!(FramebufferGeometry::from_sysfs(dir.path()).is_err());
        assert!(FramebufferGeometry::from_sysfs(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_marker_follows_and_restores_background() {
        let (file, mut overlay) = fake_device(0x11);
        let background = vec![0x11; 4];

        let handle = overlay.create(&small_spec(), CursorPosition::new(1.0, 1.0)).unwrap();
        assert_eq!(pixel_at(&file, 1, 1), RED.to_vec());
        assert_eq!(pixel_at(&file, 2, 2), RED.to_vec());
        assert_eq!(pixel_at(&file, 3, 3), background);

        overlay.reposition(handle, CursorPosition::new(4.0, 3.0)).unwrap();
        assert_eq!(pixel_at(&file, 1, 1), background);
        assert_eq!(pixel_at(&file, 4, 3), RED.to_vec());
        assert_eq!(pixel_at(&file, 5, 4), RED.to_vec());

        overlay.destroy(handle).unwrap();
        let bytes = std::fs::read(file.path()).unwrap();
        assert!(bytes.iter().all(|b| *b == 0x11));
        assert!(overlay.destroy(handle).is_err());
    }

    #[test]
    fn test_full_size_marker_is_clipped_to_screen() {
        let (file, mut overlay) = fake_device(0);
        let spec = cursor_overlay_spec(DEFAULT_CURSOR_COLOR);

        let handle = overlay.create(&spec, CursorPosition::new(6.0, 4.0)).unwrap();
        assert_eq!(pixel_at(&file, 7, 5), RED.to_vec());
        assert_eq!(pixel_at(&file, 5, 5), vec![0; 4]);

        // Row padding past the visible width is left alone
        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(bytes.len(), 240);
        assert!(bytes[184..192].iter().all(|b| *b != 0));
        assert!(bytes[192..200].iter().all(|b| *b == 0));

        overlay.destroy(handle).unwrap();
    }
}
