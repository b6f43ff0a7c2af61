//! Strip bytes to [`StateSnapshot`].
//!
//! Decoding is total. Channels missing from a short strip read as their
//! fail-safe sentinel, and an unreadable sentinel channel leaves
//! `sentinel_ok` false so the scheduler suppresses output.

use crate::calibrate::{is_sentinel_pixel, Calibration};
use crate::channels::{self, flag, read_channel, Rgb};
use crate::constants::{
    COOLDOWN_SLOTS, COOLDOWN_UNKNOWN_BYTE, ENEMY_FRAME_CHANNELS, KNOWN_SPEC_IDS, PARTY_FRAME_CHANNELS,
    REMAINING_NOISE_FLOOR_SECS, SPEC_SNAP_TOLERANCE, TARGET_HP_HISTORY_DEPTH,
    TRACKED_AURA_CHANNELS, UNKNOWN_COOLDOWN_SECS,
};
use crate::registry::{AuraScope, Registry, TrackedAura};
use crate::snapshot::{
    AuraState, CastState, FrameUnit, HpSample, InstanceKind, Resource, StateSnapshot, UnitState,
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default)]
pub struct Decoder {
    known_specs: Vec<u32>,
    aura_layouts: BTreeMap<u32, Vec<TrackedAura>>,
    hazard_auras: BTreeSet<u32>,
}

impl Decoder {
    pub fn new(
        known_specs: Vec<u32>,
        aura_layouts: BTreeMap<u32, Vec<TrackedAura>>,
        hazard_auras: BTreeSet<u32>,
    ) -> Self {
        let mut known_specs = known_specs;
        known_specs.sort_unstable();
        known_specs.dedup();
        Self {
            known_specs,
            aura_layouts,
            hazard_auras,
        }
    }

    /// Snaps against every playable spec id, not only the loaded ones: a
    /// spec without data must decode as itself so the engine stays silent.
    pub fn from_registry(registry: &Registry) -> Self {
        let loaded = registry.known_spec_ids();
        let layouts = loaded
            .iter()
            .filter_map(|id| registry.spec(*id).map(|spec| (*id, spec.tracked_auras.clone())))
            .collect();
        let mut known_specs = KNOWN_SPEC_IDS.to_vec();
        known_specs.extend(loaded);
        Self::new(known_specs, layouts, registry.hazard_auras().clone())
    }

    /// Nearest known spec id within tolerance; the low-byte channel breaks
    /// ties and disambiguates neighbouring ids.
    pub fn snap_spec_id(&self, px: Rgb) -> u32 {
        let coarse = channels::coarse_spec_id(px);
        if coarse == 0 {
            return 0;
        }
        let candidates: Vec<u32> = self
            .known_specs
            .iter()
            .copied()
            .filter(|id| id.abs_diff(coarse) <= SPEC_SNAP_TOLERANCE)
            .collect();
        if let Some(exact) = candidates.iter().find(|id| (**id & 0xFF) as u8 == px.g) {
            return *exact;
        }
        candidates
            .into_iter()
            .min_by_key(|id| (id.abs_diff(coarse), *id))
            .unwrap_or(0)
    }

    pub fn decode(
        &self,
        strip: &[u8],
        calibration: &Calibration,
        previous: Option<&StateSnapshot>,
        now_secs: f64,
    ) -> StateSnapshot {
        let mut snap = StateSnapshot::unreadable(now_secs);
        if strip.is_empty() {
            tracing::trace!("empty strip at t={now_secs:.3}");
            return snap;
        }
        let stride = calibration.stride;
        let px = |channel: usize| read_channel(strip, stride, channel);

        snap.sentinel_ok = px(channels::SENTINEL)
            .map(|rgb| is_sentinel_pixel(&[rgb.b, rgb.g, rgb.r]))
            .unwrap_or(false);
        if let Some(spec) = px(channels::SPEC) {
            snap.spec_id = self.snap_spec_id(spec);
        }
        if let Some(player) = px(channels::PLAYER) {
            snap.health_percent = percent(player.r);
            snap.race_id = player.g;
            snap.chat_open = flag(player.b);
        }
        if let Some(primary) = px(channels::PRIMARY) {
            snap.primary = Resource {
                value: (primary.g as u32) << 8 | primary.b as u32,
                percent: percent(primary.r),
            };
        }
        if let Some(secondary) = px(channels::SECONDARY) {
            let max = secondary.g.max(1) as f64;
            snap.secondary = Resource {
                value: secondary.r as u32,
                percent: (secondary.r as f64 / max * 100.0).min(100.0),
            };
        }
        if let Some(flags) = px(channels::PLAYER_FLAGS) {
            snap.in_combat = flag(flags.r);
            snap.moving = flag(flags.g);
            snap.in_melee = flag(flags.b);
        }

        snap.target = decode_target(&px);
        snap.focus = decode_focus(&px);

        if let Some(cast) = px(channels::PLAYER_CAST) {
            snap.player_cast = CastState {
                id: cast.id16(),
                casting: cast.id16() != 0,
                channeling: false,
                interruptible: false,
                progress: percent(cast.b),
            };
        }
        if let Some(timing) = px(channels::TIMING) {
            snap.gcd_remaining = timing.r as f64 / 100.0;
        }
        if let Some(proc_px) = px(channels::PROC) {
            snap.active_proc_id = proc_px.id16();
        }
        if let Some(group) = px(channels::GROUP) {
            snap.nearby_enemies = group.r;
            snap.melee_enemies = group.g;
            snap.instance = InstanceKind::from_code(group.b);
        }
        if let Some(hazard) = px(channels::HAZARD) {
            snap.standing_in_fire = flag(hazard.r);
            snap.target_stun_dr = hazard.g as f64 / 255.0;
        }

        for slot in 0..COOLDOWN_SLOTS {
            snap.cooldowns[slot] = px(channels::COOLDOWNS + slot / 3)
                .map(|rgb| cooldown_secs(rgb.component(slot % 3)))
                .unwrap_or(UNKNOWN_COOLDOWN_SECS);
        }
        if let (Some(a), Some(b)) = (px(channels::CHARGES), px(channels::CHARGES + 1)) {
            let bytes = [a.r, a.g, a.b, b.r, b.g, b.b];
            for slot in 0..COOLDOWN_SLOTS {
                snap.charges[slot] = channels::charge_bits(&bytes, slot);
            }
        }

        self.decode_auras(&px, &mut snap);
        if snap
            .player_debuffs
            .ids()
            .any(|id| self.hazard_auras.contains(&id))
        {
            snap.standing_in_fire = true;
        }

        snap.enemies = decode_frames(&px, channels::ENEMY_FRAMES, ENEMY_FRAME_CHANNELS);
        snap.party = decode_frames(&px, channels::PARTY_FRAMES, PARTY_FRAME_CHANNELS);
        if let Some(prev) = previous {
            mark_damage_taken(&mut snap.party, &prev.party);
        }

        track_target_hp(&mut snap, previous);
        snap.refresh_derived();
        snap
    }

    /// Tracked-aura channels are rebuilt every pulse, so an aura that was
    /// live last pulse and is missing now reads remaining 0.
    fn decode_auras(&self, px: &dyn Fn(usize) -> Option<Rgb>, snap: &mut StateSnapshot) {
        let Some(layout) = self.aura_layouts.get(&snap.spec_id) else {
            return;
        };
        for (index, aura) in layout.iter().take(TRACKED_AURA_CHANNELS).enumerate() {
            let Some(rgb) = px(channels::AURAS + index) else {
                continue;
            };
            let remaining = remaining_secs(rgb.r);
            if remaining <= 0.0 {
                continue;
            }
            let state = AuraState {
                remaining,
                stacks: rgb.g,
            };
            let set = match aura.scope {
                AuraScope::PlayerBuff => &mut snap.player_buffs,
                AuraScope::PlayerDebuff => &mut snap.player_debuffs,
                AuraScope::TargetBuff => &mut snap.target_buffs,
                AuraScope::TargetDebuff => &mut snap.target_debuffs,
            };
            set.insert(aura.id, state);
        }
    }
}

fn percent(byte: u8) -> f64 {
    (byte as f64).min(100.0)
}

fn remaining_secs(byte: u8) -> f64 {
    let secs = byte as f64;
    if secs < REMAINING_NOISE_FLOOR_SECS {
        0.0
    } else {
        secs
    }
}

fn cooldown_secs(byte: u8) -> f64 {
    if byte == COOLDOWN_UNKNOWN_BYTE {
        UNKNOWN_COOLDOWN_SECS
    } else {
        remaining_secs(byte)
    }
}

fn decode_target(px: &dyn Fn(usize) -> Option<Rgb>) -> UnitState {
    let mut target = UnitState::default();
    if let Some(flags) = px(channels::TARGET_FLAGS) {
        target.exists = flag(flags.r);
        target.alive = flag(flags.g);
        target.enemy = flag(flags.b);
    }
    if let Some(flags) = px(channels::TARGET_FLAGS_2) {
        target.aggro = flag(flags.r);
        target.in_range = flag(flags.g);
        target.moving = flag(flags.b);
    }
    if let Some(health) = px(channels::TARGET_HEALTH) {
        if target.exists {
            target.health_percent = percent(health.r);
        }
        target.spec_id = channels::spec_from_index(health.g);
    }
    if let Some(cast) = px(channels::TARGET_CAST) {
        target.cast.casting = flag(cast.r);
        target.cast.interruptible = flag(cast.g);
        target.cast.progress = percent(cast.b);
    }
    if let Some(cast_id) = px(channels::TARGET_CAST_ID) {
        target.cast.id = cast_id.id16();
        target.cast.channeling = flag(cast_id.b);
    }
    target
}

fn decode_focus(px: &dyn Fn(usize) -> Option<Rgb>) -> UnitState {
    let mut focus = UnitState::default();
    if let Some(flags) = px(channels::FOCUS_FLAGS) {
        focus.exists = flag(flags.r);
        focus.enemy = flag(flags.g);
        focus.cast.casting = flag(flags.b);
    }
    if let Some(cast) = px(channels::FOCUS_CAST) {
        focus.cast.id = cast.id16();
        focus.cast.interruptible = flag(cast.b);
    }
    if let Some(state) = px(channels::FOCUS_STATE) {
        if focus.exists {
            focus.health_percent = percent(state.r);
            focus.alive = state.r > 0;
        }
        focus.spec_id = channels::spec_from_index(state.g);
        focus.cast.progress = percent(state.b);
    }
    focus
}

fn decode_frames(
    px: &dyn Fn(usize) -> Option<Rgb>,
    first: usize,
    count: usize,
) -> Vec<FrameUnit> {
    (first..first + count)
        .filter_map(|channel| px(channel))
        .filter(|rgb| rgb.r > 0 || rgb.g > 0)
        .map(|rgb| FrameUnit {
            health_percent: percent(rgb.r),
            spec_id: channels::spec_from_index(rgb.g),
            casting: flag(rgb.b),
            taking_damage: false,
        })
        .collect()
}

/// Frames are matched by position, so a roster change resets the flags.
fn mark_damage_taken(frames: &mut [FrameUnit], previous: &[FrameUnit]) {
    if frames.len() != previous.len() {
        return;
    }
    for (frame, before) in frames.iter_mut().zip(previous) {
        frame.taking_damage =
            frame.spec_id == before.spec_id && frame.health_percent < before.health_percent;
    }
}

/// Appends the target's HP to the bounded history and derives HP lost per
/// second across it. The history restarts when the target disappears or
/// changes spec.
fn track_target_hp(snap: &mut StateSnapshot, previous: Option<&StateSnapshot>) {
    if !snap.target.exists {
        return;
    }
    let mut history = match previous {
        Some(prev) if prev.target.exists && prev.target.spec_id == snap.target.spec_id => {
            prev.target_hp_history.clone()
        }
        _ => Vec::new(),
    };
    history.push(HpSample {
        health_percent: snap.target.health_percent,
        at_secs: snap.taken_at_secs,
    });
    if history.len() > TARGET_HP_HISTORY_DEPTH {
        let excess = history.len() - TARGET_HP_HISTORY_DEPTH;
        history.drain(..excess);
    }

    snap.target_hp_velocity = match (history.first(), history.last()) {
        (Some(oldest), Some(newest)) if newest.at_secs > oldest.at_secs => {
            (oldest.health_percent - newest.health_percent) / (newest.at_secs - oldest.at_secs)
        }
        _ => 0.0,
    };
    snap.target_hp_history = history;
}
