//! Nameplate search and ground aim point.

use crate::constants::{
    AIM_JITTER_X_PX, AIM_JITTER_Y_PX, BYTES_PER_PIXEL, ESCAPE_CLEARANCE_PX, ESCAPE_DISTANCE_PX,
    FEET_OFFSET_FALLOFF, FEET_OFFSET_MAX_PX, FEET_OFFSET_MIN_PX, PLATE_BAND_GAP_PX, PLATE_GLOW_MARGIN_PX, PLATE_MIN_BAND_PIXELS,
    PLATE_REGION_HEIGHT, PLATE_REGION_LEFT, PLATE_REGION_TOP, PLATE_REGION_WIDTH, PX_PER_YARD,
    VELOCITY_SIGHTING_MAX_AGE_SECS,
};
use crate::frame::{DisplayGeometry, FrameSource, Rect};
use crate::humanize::JitterRng;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_1_SQRT_2;
use std::sync::Arc;

/// Escape headings, clockwise from straight up the screen.
const ESCAPE_HEADINGS: [(f64, f64); 8] = [
    (0.0, -1.0),
    (FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    (1.0, 0.0),
    (FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (0.0, 1.0),
    (-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (-1.0, 0.0),
    (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
];

/// Ground point under a nameplate, logical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeetPoint {
    pub x: f64,
    pub y: f64,
    /// Logical px per second, 0 without a recent sighting.
    #[serde(default)]
    pub velocity_x: f64,
}

/// What the engine needs to aim.
pub trait AimResolver {
    fn screen_center(&self) -> (f64, f64);
    fn locate_feet(&mut self, range_yards: f64, now_secs: f64) -> Option<FeetPoint>;
    /// Landing point for a movement escape, logical pixels. `None` when every
    /// heading ends next to a nameplate.
    fn safe_escape_point(&mut self) -> Option<(f64, f64)>;
}

/// Resolver with a preset answer, for replays and headless runs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixedAim {
    pub center: (f64, f64),
    pub feet: Option<FeetPoint>,
    #[serde(default)]
    pub escape: Option<(f64, f64)>,
}

impl FixedAim {
    pub fn none(center: (f64, f64)) -> Self {
        Self {
            center,
            feet: None,
            escape: None,
        }
    }
}

impl AimResolver for FixedAim {
    fn screen_center(&self) -> (f64, f64) {
        self.center
    }

    fn locate_feet(&mut self, _range_yards: f64, _now_secs: f64) -> Option<FeetPoint> {
        self.feet
    }

    fn safe_escape_point(&mut self) -> Option<(f64, f64)> {
        self.escape
    }
}

#[derive(Clone, Copy, Debug)]
struct Sighting {
    x: f64,
    at_secs: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    /// Logical centroid.
    x: f64,
    y: f64,
    score: u64,
    distance: f64,
}

pub struct TargetLocator {
    source: Arc<dyn FrameSource>,
    rng: JitterRng,
    last_sighting: Option<Sighting>,
}

impl TargetLocator {
    pub fn new(source: Arc<dyn FrameSource>, rng: JitterRng) -> Self {
        Self {
            source,
            rng,
            last_sighting: None,
        }
    }

    fn search_rect(geometry: &DisplayGeometry) -> Rect {
        let w = geometry.physical_width as f64;
        let h = geometry.physical_height as f64;
        Rect {
            x: (w * PLATE_REGION_LEFT) as u32,
            y: (h * PLATE_REGION_TOP) as u32,
            width: (w * PLATE_REGION_WIDTH) as u32,
            height: (h * PLATE_REGION_HEIGHT) as u32,
        }
    }

    /// Every nameplate in the search region, logical coordinates.
    fn plates(&self) -> Vec<Candidate> {
        let geometry = self.source.geometry();
        if geometry.logical_width == 0 || geometry.logical_height == 0 {
            return Vec::new();
        }
        let rect = Self::search_rect(&geometry);
        let pixels = self.source.grab_region(rect);
        let width = rect.width.min(geometry.physical_width.saturating_sub(rect.x)) as usize;
        if pixels.is_empty() || width == 0 {
            return Vec::new();
        }
        let region = Region {
            pixels: &pixels,
            width,
            height: pixels.len() / (width * BYTES_PER_PIXEL),
        };

        let scale_x = geometry.physical_width as f64 / geometry.logical_width as f64;
        let scale_y = geometry.physical_height as f64 / geometry.logical_height as f64;
        let (center_x, center_y) = geometry.center();

        region
            .bands()
            .into_iter()
            .filter(|band| band.count >= PLATE_MIN_BAND_PIXELS)
            .map(|band| {
                let local_x = band.sum_x as f64 / band.count as f64;
                let local_y = band.sum_y as f64 / band.count as f64;
                let x = (rect.x as f64 + local_x) / scale_x;
                let y = (rect.y as f64 + local_y) / scale_y;
                Candidate {
                    x,
                    y,
                    score: region.glow(local_x as usize, local_y as usize),
                    distance: ((x - center_x).powi(2) + (y - center_y).powi(2)).sqrt(),
                }
            })
            .collect()
    }

    fn best_candidate(&self, range_yards: f64) -> Option<Candidate> {
        let max_distance = range_yards * PX_PER_YARD;
        self.plates()
            .into_iter()
            .filter(|plate| plate.distance <= max_distance)
            .max_by(|a, b| {
                a.score
                    .cmp(&b.score)
                    .then_with(|| b.distance.total_cmp(&a.distance))
            })
    }
}

/// Closer plates mean a closer camera, so the feet sit further below.
pub fn feet_offset(distance_to_center: f64) -> f64 {
    (FEET_OFFSET_MAX_PX - FEET_OFFSET_FALLOFF * distance_to_center)
        .clamp(FEET_OFFSET_MIN_PX, FEET_OFFSET_MAX_PX)
}

impl AimResolver for TargetLocator {
    fn screen_center(&self) -> (f64, f64) {
        self.source.geometry().center()
    }

    fn locate_feet(&mut self, range_yards: f64, now_secs: f64) -> Option<FeetPoint> {
        let Some(plate) = self.best_candidate(range_yards) else {
            tracing::trace!("no nameplate within {range_yards} yd");
            return None;
        };

        let velocity_x = match self.last_sighting {
            Some(last)
                if now_secs > last.at_secs
                    && now_secs - last.at_secs <= VELOCITY_SIGHTING_MAX_AGE_SECS =>
            {
                (plate.x - last.x) / (now_secs - last.at_secs)
            }
            _ => 0.0,
        };
        self.last_sighting = Some(Sighting {
            x: plate.x,
            at_secs: now_secs,
        });

        Some(FeetPoint {
            x: plate.x + self.rng.symmetric(AIM_JITTER_X_PX),
            y: plate.y + self.rng.symmetric(AIM_JITTER_Y_PX) + feet_offset(plate.distance),
            velocity_x,
        })
    }

    /// First heading whose landing point, [`ESCAPE_DISTANCE_PX`] from the
    /// player, keeps clear of every visible nameplate.
    fn safe_escape_point(&mut self) -> Option<(f64, f64)> {
        let (center_x, center_y) = self.screen_center();
        let plates = self.plates();
        let point = ESCAPE_HEADINGS
            .iter()
            .map(|(hx, hy)| {
                (
                    center_x + hx * ESCAPE_DISTANCE_PX,
                    center_y + hy * ESCAPE_DISTANCE_PX,
                )
            })
            .find(|(x, y)| {
                plates.iter().all(|plate| {
                    ((plate.x - x).powi(2) + (plate.y - y).powi(2)).sqrt() >= ESCAPE_CLEARANCE_PX
                })
            });
        if point.is_none() {
            tracing::debug!("no safe escape heading among {} plates", plates.len());
        }
        point
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Band {
    sum_x: u64,
    sum_y: u64,
    count: usize,
    last_row: usize,
}

struct Region<'a> {
    pixels: &'a [u8],
    width: usize,
    height: usize,
}

impl Region<'_> {
    fn rgb(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let at = (y * self.width + x) * BYTES_PER_PIXEL;
        (self.pixels[at + 2], self.pixels[at + 1], self.pixels[at])
    }

    /// Hostile red or neutral grey nameplate pixel.
    fn is_plate(&self, x: usize, y: usize) -> bool {
        let (r, g, b) = self.rgb(x, y);
        let hostile = r > 180 && g < 100 && b < 100;
        let neutral = r >= 80 && r.abs_diff(g) < 15 && r.abs_diff(b) < 15;
        hostile || neutral
    }

    /// Groups plate pixels into horizontal bands split by vertical gaps.
    fn bands(&self) -> Vec<Band> {
        let mut bands: Vec<Band> = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.is_plate(x, y) {
                    continue;
                }
                let starts_new = bands
                    .last()
                    .map(|band| y - band.last_row > PLATE_BAND_GAP_PX as usize)
                    .unwrap_or(true);
                if starts_new {
                    bands.push(Band::default());
                }
                if let Some(band) = bands.last_mut() {
                    band.sum_x += x as u64;
                    band.sum_y += y as u64;
                    band.count += 1;
                    band.last_row = y;
                }
            }
        }
        bands
    }

    fn glow(&self, cx: usize, cy: usize) -> u64 {
        let margin = PLATE_GLOW_MARGIN_PX as usize;
        let x0 = cx.saturating_sub(margin);
        let y0 = cy.saturating_sub(margin);
        let x1 = (cx + margin).min(self.width.saturating_sub(1));
        let y1 = (cy + margin).min(self.height.saturating_sub(1));
        let mut sum = 0u64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let (r, g, b) = self.rgb(x, y);
                sum += r as u64 + g as u64 + b as u64;
            }
        }
        sum
    }
}
