//! Screen sampling. The coach only ever reads two shapes from the screen: one
//! pixel row (the telemetry strip) and one rectangle (nameplate search).

use crate::constants::BYTES_PER_PIXEL;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    pub logical_width: u32,
    pub logical_height: u32,
    pub physical_width: u32,
    pub physical_height: u32,
}

impl DisplayGeometry {
    pub fn uniform(width: u32, height: u32, scale: u32) -> Self {
        Self {
            logical_width: width,
            logical_height: height,
            physical_width: width * scale,
            physical_height: height * scale,
        }
    }

    /// Logical screen centre.
    pub fn center(&self) -> (f64, f64) {
        (
            self.logical_width as f64 / 2.0,
            self.logical_height as f64 / 2.0,
        )
    }
}

/// Physical-pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Screen sampler. Calls are independent; a failed capture is an empty buffer.
/// Returned bytes are BGRA, row-major, `width * 4` bytes per row.
pub trait FrameSource: Send + Sync {
    fn geometry(&self) -> DisplayGeometry;
    fn grab_region(&self, rect: Rect) -> Vec<u8>;

    fn grab_strip(&self, y: u32, width_px: u32) -> Vec<u8> {
        self.grab_region(Rect {
            x: 0,
            y,
            width: width_px,
            height: 1,
        })
    }
}

/// Full physical screen held in memory.
#[derive(Clone, Debug)]
pub struct ScreenBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ScreenBuffer {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    pub fn from_bgra(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame size mismatch: {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let at = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.pixels[at] = rgb[2];
        self.pixels[at + 1] = rgb[1];
        self.pixels[at + 2] = rgb[0];
        self.pixels[at + 3] = 255;
    }

    pub fn fill_rect(&mut self, rect: Rect, rgb: [u8; 3]) {
        for y in rect.y..rect.y.saturating_add(rect.height) {
            for x in rect.x..rect.x.saturating_add(rect.width) {
                self.set_rgb(x, y, rgb);
            }
        }
    }

    /// Paints a row of already-encoded BGRA bytes starting at `(0, y)`.
    pub fn paint_row(&mut self, y: u32, bgra: &[u8]) {
        if y >= self.height {
            return;
        }
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        let start = y as usize * row_bytes;
        let len = bgra.len().min(row_bytes);
        self.pixels[start..start + len].copy_from_slice(&bgra[..len]);
    }

    pub fn region(&self, rect: Rect) -> Vec<u8> {
        if rect.x >= self.width || rect.y >= self.height {
            return Vec::new();
        }
        let width = rect.width.min(self.width - rect.x) as usize;
        let height = rect.height.min(self.height - rect.y) as usize;
        let mut out = Vec::with_capacity(width * height * BYTES_PER_PIXEL);
        for row in 0..height {
            let start = ((rect.y as usize + row) * self.width as usize + rect.x as usize)
                * BYTES_PER_PIXEL;
            out.extend_from_slice(&self.pixels[start..start + width * BYTES_PER_PIXEL]);
        }
        out
    }
}

/// In-memory frame source; the screen can be swapped between pulses.
pub struct MemoryFrameSource {
    geometry: DisplayGeometry,
    screen: RwLock<ScreenBuffer>,
}

impl MemoryFrameSource {
    pub fn new(geometry: DisplayGeometry, screen: ScreenBuffer) -> Self {
        Self {
            geometry,
            screen: RwLock::new(screen),
        }
    }

    pub fn replace(&self, screen: ScreenBuffer) {
        if let Ok(mut guard) = self.screen.write() {
            *guard = screen;
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    fn grab_region(&self, rect: Rect) -> Vec<u8> {
        match self.screen.read() {
            Ok(screen) => screen.region(rect),
            Err(_) => Vec::new(),
        }
    }
}

/// Raw frame dump written by an external capture helper:
/// `u32 LE width`, `u32 LE height`, then `width * height` BGRA pixels.
/// Re-read on every grab so the producer can overwrite it in place.
pub struct FrameFile {
    path: PathBuf,
    geometry: DisplayGeometry,
}

impl FrameFile {
    pub fn open(path: &Path, logical_width: u32, logical_height: u32) -> Result<Self> {
        let screen = read_frame_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            geometry: DisplayGeometry {
                logical_width,
                logical_height,
                physical_width: screen.width(),
                physical_height: screen.height(),
            },
        })
    }
}

impl FrameSource for FrameFile {
    fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    fn grab_region(&self, rect: Rect) -> Vec<u8> {
        match read_frame_file(&self.path) {
            Ok(screen) => screen.region(rect),
            Err(err) => {
                tracing::debug!("frame file unreadable: {err:#}");
                Vec::new()
            }
        }
    }
}

pub fn read_frame_file(path: &Path) -> Result<ScreenBuffer> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.len() < 8 {
        return Err(anyhow!("frame file {} too short", path.display()));
    }
    let width = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let height = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    ScreenBuffer::from_bgra(width, height, bytes[8..].to_vec())
        .with_context(|| format!("malformed frame file {}", path.display()))
}

pub fn write_frame_file(path: &Path, screen: &ScreenBuffer) -> Result<()> {
    let mut bytes = Vec::with_capacity(8 + screen.pixels.len());
    bytes.extend_from_slice(&screen.width.to_le_bytes());
    bytes.extend_from_slice(&screen.height.to_le_bytes());
    bytes.extend_from_slice(&screen.pixels);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed writing {}", path.display()))
}
