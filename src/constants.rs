//! Coach constants: strip layout, pulse timing, locator geometry.

// Strip layout
pub const STRIP_CHANNELS: usize = 48;
pub const BYTES_PER_PIXEL: usize = 4; // BGRA, alpha ignored
pub const SENTINEL_MIN_COMPONENT: u8 = 245;
pub const FLAG_THRESHOLD: u8 = 128;

// Calibration
pub const CALIBRATION_BAND_ROWS: u32 = 100;
pub const CALIBRATION_BAND_WIDTH: u32 = 8;
pub const MAX_STRIDE: u32 = 4;

// Logical cooldown/charge slots carried by the strip (slots 1..=24)
pub const COOLDOWN_SLOTS: usize = 24;
pub const MAX_SLOT_ID: u8 = 40;
pub const TRACKED_AURA_CHANNELS: usize = 8;
pub const ENEMY_FRAME_CHANNELS: usize = 3;
pub const PARTY_FRAME_CHANNELS: usize = 4;

// Decoder sentinels
pub const UNKNOWN_COOLDOWN_SECS: f64 = 99.0;
pub const UNKNOWN_HEALTH_PERCENT: f64 = 100.0;
pub const COOLDOWN_UNKNOWN_BYTE: u8 = 255;
pub const REMAINING_NOISE_FLOOR_SECS: f64 = 1.0;
pub const SPEC_SNAP_TOLERANCE: u32 = 4;
pub const SPEC_BANK_OFFSET: u32 = 1000;
pub const TARGET_HP_HISTORY_DEPTH: usize = 16;

// Pulse timing
pub const DEBOUNCE_MS: u64 = 150;
pub const GCD_ALIGN_WINDOW_SECS: f64 = 0.1;
pub const GCD_ALIGN_PAD_SECS: f64 = 0.01;
pub const MANUAL_OVERRIDE_SECS: u64 = 30;
pub const GHOST_SYNC_DELAY_MS: u64 = 20;
pub const FLICK_SETTLE_MS: i64 = 20;
pub const HUMANIZE_AMPLITUDE_MS: f64 = 15.0;
pub const HUMANIZE_PHASE_RATE: f64 = 10.0; // radians per wall-clock second
pub const CAST_HISTORY_DEPTH: usize = 8;

// Engine defaults
pub const DEFAULT_PANIC_THRESHOLD: f64 = 30.0;
pub const DEFAULT_INTERRUPT_WINDOW: (f64, f64) = (88.0, 94.0); // lag-compensated late kick
pub const DEFAULT_DEFENSIVE_SLOT: u8 = 15;
pub const DEFAULT_INTERRUPT_SLOT: u8 = 11;
pub const DEFAULT_FOCUS_KICK_SLOT: u8 = 26;
pub const DEFAULT_DR_THRESHOLD: f64 = 0.5;
pub const PANDEMIC_FRACTION: f64 = 0.3;
pub const TTD_CRITICAL_SECS: f64 = 10.0;
pub const VELOCITY_LEAD_SECS: f64 = 0.15;
pub const HEALING_TARGET_BELOW_PERCENT: f64 = 95.0;
pub const DEFAULT_RANGE_YARDS: f64 = 40.0;

// Target locator (fractions of the physical screen)
pub const PLATE_REGION_LEFT: f64 = 0.20;
pub const PLATE_REGION_WIDTH: f64 = 0.60;
pub const PLATE_REGION_TOP: f64 = 0.10;
pub const PLATE_REGION_HEIGHT: f64 = 0.35;
pub const PLATE_BAND_GAP_PX: u32 = 25;
pub const PLATE_MIN_BAND_PIXELS: usize = 40;
pub const PLATE_GLOW_MARGIN_PX: u32 = 12;
pub const ESCAPE_DISTANCE_PX: f64 = 150.0;
pub const ESCAPE_CLEARANCE_PX: f64 = 100.0; // no plate centroid closer to the landing point
pub const PX_PER_YARD: f64 = 24.0;
pub const AIM_JITTER_X_PX: f64 = 5.0;
pub const AIM_JITTER_Y_PX: f64 = 3.0;
pub const FEET_OFFSET_MIN_PX: f64 = 30.0;
pub const FEET_OFFSET_MAX_PX: f64 = 120.0;
pub const FEET_OFFSET_FALLOFF: f64 = 0.25; // px of offset lost per px from centre
pub const VELOCITY_SIGHTING_MAX_AGE_SECS: f64 = 1.0;

/// Every playable specialization id, ascending. Frame channels carry `index + 1`.
pub const KNOWN_SPEC_IDS: [u32; 39] = [
    62, 63, 64, // mage
    65, 66, 70, // paladin
    71, 72, 73, // warrior
    102, 103, 104, 105, // druid
    250, 251, 252, // death knight
    253, 254, 255, // hunter
    256, 257, 258, // priest
    259, 260, 261, // rogue
    262, 263, 264, // shaman
    265, 266, 267, // warlock
    268, 269, 270, // monk
    577, 581, // demon hunter
    1467, 1468, 1473, // evoker
];

/// Healer externals on the player that make a personal defensive redundant.
pub const EXTERNAL_DEFENSIVE_IDS: [u32; 5] = [
    33206,  // Pain Suppression
    47788,  // Guardian Spirit
    6940,   // Blessing of Sacrifice
    116849, // Life Cocoon
    1022,   // Blessing of Protection
];

/// Priority focus role for arena auto-focus.
pub const HEALER_SPEC_IDS: [u32; 7] = [65, 105, 256, 257, 264, 270, 1468];
