//! Strip channel table.
//!
//! Each logical channel is one pixel (repeated `stride` times on high-DPI
//! displays). Flags are true at >= 128; 16-bit ids are `hi * 256 + lo`.
//!
//! | #     | R                     | G                    | B                    |
//! |-------|-----------------------|----------------------|----------------------|
//! | 0     | 255 (sentinel)        | 255                  | 255                  |
//! | 1     | spec coarse R/255*1000| spec id low byte     | +1000 bank flag      |
//! | 2     | health %              | race id              | chat open flag       |
//! | 3     | primary %             | raw value hi         | raw value lo         |
//! | 4     | secondary value       | secondary max        |                      |
//! | 5     | in combat             | moving               | in melee             |
//! | 6     | target exists         | target alive         | target enemy         |
//! | 7     | target aggro          | target in range      | target moving        |
//! | 8     | target health %       | target spec index    |                      |
//! | 9     | target casting        | target interruptible | target cast progress |
//! | 10    | target cast id hi     | target cast id lo    | channeling flag      |
//! | 11    | player cast id hi     | player cast id lo    | player cast progress |
//! | 12    | gcd centiseconds      |                      |                      |
//! | 13    | proc id hi            | proc id lo           |                      |
//! | 14    | nearby enemies        | melee enemies        | instance code        |
//! | 15    | focus exists          | focus enemy          | focus casting        |
//! | 16    | focus cast id hi      | focus cast id lo     | focus interruptible  |
//! | 17    | focus health %        | focus spec index     | focus cast progress  |
//! | 18    | standing in fire      | target stun DR /255  |                      |
//! | 20-27 | cooldown secs, 3 slots per channel (255 = unknown)                  |
//! | 28-29 | charges, 2 bits per slot, slots 1-24                                |
//! | 30-37 | tracked aura i: remaining secs (R), stacks (G)                      |
//! | 38-40 | enemy frames: health %, spec index, casting flag                    |
//! | 41-44 | party frames: health %, spec index, casting flag                    |

use crate::constants::{
    BYTES_PER_PIXEL, COOLDOWN_SLOTS, FLAG_THRESHOLD, KNOWN_SPEC_IDS, SPEC_BANK_OFFSET,
    STRIP_CHANNELS,
};

pub const SENTINEL: usize = 0;
pub const SPEC: usize = 1;
pub const PLAYER: usize = 2;
pub const PRIMARY: usize = 3;
pub const SECONDARY: usize = 4;
pub const PLAYER_FLAGS: usize = 5;
pub const TARGET_FLAGS: usize = 6;
pub const TARGET_FLAGS_2: usize = 7;
pub const TARGET_HEALTH: usize = 8;
pub const TARGET_CAST: usize = 9;
pub const TARGET_CAST_ID: usize = 10;
pub const PLAYER_CAST: usize = 11;
pub const TIMING: usize = 12;
pub const PROC: usize = 13;
pub const GROUP: usize = 14;
pub const FOCUS_FLAGS: usize = 15;
pub const FOCUS_CAST: usize = 16;
pub const FOCUS_STATE: usize = 17;
pub const HAZARD: usize = 18;
pub const COOLDOWNS: usize = 20;
pub const CHARGES: usize = 28;
pub const AURAS: usize = 30;
pub const ENEMY_FRAMES: usize = 38;
pub const PARTY_FRAMES: usize = 41;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn component(&self, index: usize) -> u8 {
        match index {
            0 => self.r,
            1 => self.g,
            _ => self.b,
        }
    }

    pub fn set_component(&mut self, index: usize, value: u8) {
        match index {
            0 => self.r = value,
            1 => self.g = value,
            _ => self.b = value,
        }
    }

    pub fn id16(&self) -> u32 {
        (self.r as u32) << 8 | self.g as u32
    }
}

/// Reads logical channel `channel` from a BGRA strip captured at `stride`.
/// `None` when the strip is too short to contain it.
pub fn read_channel(strip: &[u8], stride: u32, channel: usize) -> Option<Rgb> {
    let at = channel * stride.max(1) as usize * BYTES_PER_PIXEL;
    let px = strip.get(at..at + 3)?;
    Some(Rgb {
        r: px[2],
        g: px[1],
        b: px[0],
    })
}

#[inline]
pub fn flag(byte: u8) -> bool {
    byte >= FLAG_THRESHOLD
}

#[inline]
pub fn flag_byte(value: bool) -> u8 {
    if value {
        255
    } else {
        0
    }
}

/// Coarse reverse scale of the spec channel; bank flag adds 1000.
pub fn coarse_spec_id(px: Rgb) -> u32 {
    let coarse = (px.r as f64 / 255.0 * 1000.0).round() as u32;
    if flag(px.b) {
        coarse + SPEC_BANK_OFFSET
    } else {
        coarse
    }
}

pub fn encode_spec_id(spec_id: u32) -> Rgb {
    let (bank, rest) = if spec_id >= SPEC_BANK_OFFSET {
        (true, spec_id - SPEC_BANK_OFFSET)
    } else {
        (false, spec_id)
    };
    Rgb {
        r: ((rest.min(SPEC_BANK_OFFSET) as f64 / 1000.0) * 255.0).round() as u8,
        g: (spec_id & 0xFF) as u8,
        b: flag_byte(bank),
    }
}

/// Frame/target channels carry a 1-based index into `KNOWN_SPEC_IDS`.
pub fn spec_from_index(index: u8) -> u32 {
    match index {
        0 => 0,
        i => KNOWN_SPEC_IDS.get(i as usize - 1).copied().unwrap_or(0),
    }
}

pub fn spec_index(spec_id: u32) -> u8 {
    KNOWN_SPEC_IDS
        .iter()
        .position(|id| *id == spec_id)
        .map(|i| i as u8 + 1)
        .unwrap_or(0)
}

/// 2-bit charge count for slot index `slot` (0-based) from the charge channels.
pub fn charge_bits(bytes: &[u8; 6], slot: usize) -> u8 {
    let byte = bytes[slot / 4];
    (byte >> ((slot % 4) * 2)) & 0b11
}

/// Producer-side writer for a strip. Used to stage frames for tests and
/// for recording replay fixtures.
#[derive(Clone, Debug)]
pub struct StripEncoder {
    channels: [Rgb; STRIP_CHANNELS],
}

impl Default for StripEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StripEncoder {
    pub fn new() -> Self {
        let mut channels = [Rgb::default(); STRIP_CHANNELS];
        channels[SENTINEL] = Rgb::WHITE;
        Self { channels }
    }

    pub fn set(&mut self, channel: usize, rgb: Rgb) -> &mut Self {
        if let Some(slot) = self.channels.get_mut(channel) {
            *slot = rgb;
        }
        self
    }

    pub fn set_component(&mut self, channel: usize, component: usize, value: u8) -> &mut Self {
        if let Some(slot) = self.channels.get_mut(channel) {
            slot.set_component(component, value);
        }
        self
    }

    pub fn get(&self, channel: usize) -> Rgb {
        self.channels.get(channel).copied().unwrap_or_default()
    }

    pub fn set_id16(&mut self, channel: usize, id: u32) -> &mut Self {
        self.set_component(channel, 0, (id >> 8) as u8);
        self.set_component(channel, 1, (id & 0xFF) as u8)
    }

    /// Cooldown seconds for 1-based `slot`.
    pub fn set_cooldown(&mut self, slot: usize, secs: u8) -> &mut Self {
        if slot == 0 || slot > COOLDOWN_SLOTS {
            return self;
        }
        let index = slot - 1;
        self.set_component(COOLDOWNS + index / 3, index % 3, secs)
    }

    pub fn set_charges(&mut self, slot: usize, charges: u8) -> &mut Self {
        if slot == 0 || slot > COOLDOWN_SLOTS {
            return self;
        }
        let index = slot - 1;
        let byte_index = index / 4;
        let channel = CHARGES + byte_index / 3;
        let component = byte_index % 3;
        let shift = (index % 4) * 2;
        let mut byte = self.get(channel).component(component);
        byte &= !(0b11 << shift);
        byte |= (charges.min(3)) << shift;
        self.set_component(channel, component, byte)
    }

    pub fn to_bgra(&self, stride: u32) -> Vec<u8> {
        let stride = stride.max(1) as usize;
        let mut out = Vec::with_capacity(STRIP_CHANNELS * stride * BYTES_PER_PIXEL);
        for px in &self.channels {
            for _ in 0..stride {
                out.extend_from_slice(&[px.b, px.g, px.r, 255]);
            }
        }
        out
    }
}
