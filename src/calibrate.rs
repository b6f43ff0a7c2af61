use crate::constants::{
    BYTES_PER_PIXEL, CALIBRATION_BAND_ROWS, CALIBRATION_BAND_WIDTH, MAX_STRIDE,
    SENTINEL_MIN_COMPONENT,
};
use crate::error::CoachError;
use crate::frame::{DisplayGeometry, FrameSource, Rect};
use serde::Serialize;

/// Where the strip lives on the physical screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Calibration {
    pub y: u32,
    pub stride: u32,
}

/// Physical pixels per logical pixel, rounded to a small integer.
pub fn derive_stride(geometry: &DisplayGeometry) -> u32 {
    if geometry.logical_width == 0 {
        return 1;
    }
    let ratio = geometry.physical_width as f64 / geometry.logical_width as f64;
    (ratio.round() as u32).clamp(1, MAX_STRIDE)
}

pub fn is_sentinel_pixel(bgra: &[u8]) -> bool {
    bgra.len() >= 3 && bgra[..3].iter().all(|c| *c >= SENTINEL_MIN_COMPONENT)
}

/// Scans the bottom band of the screen top-down for the first row whose
/// leftmost pixel is the white sentinel.
pub fn calibrate(source: &dyn FrameSource) -> Result<Calibration, CoachError> {
    let geometry = source.geometry();
    let rows = CALIBRATION_BAND_ROWS.min(geometry.physical_height);
    let width = CALIBRATION_BAND_WIDTH.min(geometry.physical_width).max(1);
    let top = geometry.physical_height - rows;

    let band = source.grab_region(Rect {
        x: 0,
        y: top,
        width,
        height: rows,
    });
    if band.is_empty() {
        return Err(CoachError::EmptyCapture);
    }

    let row_bytes = width as usize * BYTES_PER_PIXEL;
    for (row, pixels) in band.chunks_exact(row_bytes).enumerate() {
        if is_sentinel_pixel(&pixels[..BYTES_PER_PIXEL]) {
            let calibration = Calibration {
                y: top + row as u32,
                stride: derive_stride(&geometry),
            };
            tracing::info!(
                "strip locked at y={} stride={}",
                calibration.y,
                calibration.stride
            );
            return Ok(calibration);
        }
    }

    Err(CoachError::NoSentinelRow {
        scanned_rows: rows,
    })
}
