//! Typed game state for one pulse.

use crate::constants::{
    CAST_HISTORY_DEPTH, COOLDOWN_SLOTS, EXTERNAL_DEFENSIVE_IDS, HEALING_TARGET_BELOW_PERCENT,
    UNKNOWN_COOLDOWN_SECS, UNKNOWN_HEALTH_PERCENT,
};
use crate::registry::SlotId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    #[default]
    World,
    Party,
    Raid,
    Pvp,
    Arena,
}

impl InstanceKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Party,
            2 => Self::Raid,
            3 => Self::Pvp,
            4 => Self::Arena,
            _ => Self::World,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::World => 0,
            Self::Party => 1,
            Self::Raid => 2,
            Self::Pvp => 3,
            Self::Arena => 4,
        }
    }

    pub fn is_pvp(self) -> bool {
        matches!(self, Self::Pvp | Self::Arena)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "world" | "none" => Some(Self::World),
            "party" | "dungeon" => Some(Self::Party),
            "raid" => Some(Self::Raid),
            "pvp" | "battleground" => Some(Self::Pvp),
            "arena" => Some(Self::Arena),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
    pub value: u32,
    pub percent: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastState {
    pub id: u32,
    pub casting: bool,
    pub channeling: bool,
    pub interruptible: bool,
    pub progress: f64,
}

/// Target or focus.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitState {
    pub exists: bool,
    pub alive: bool,
    pub enemy: bool,
    pub aggro: bool,
    pub in_range: bool,
    pub moving: bool,
    pub health_percent: f64,
    pub spec_id: u32,
    pub cast: CastState,
}

impl Default for UnitState {
    fn default() -> Self {
        Self {
            exists: false,
            alive: false,
            enemy: false,
            aggro: false,
            in_range: false,
            moving: false,
            health_percent: UNKNOWN_HEALTH_PERCENT,
            spec_id: 0,
            cast: CastState::default(),
        }
    }
}

impl UnitState {
    /// Enemy and alive.
    pub fn is_valid_enemy(&self) -> bool {
        self.exists && self.enemy && self.alive
    }

    pub fn is_interruptible_cast(&self) -> bool {
        (self.cast.casting || self.cast.channeling) && self.cast.interruptible
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameUnit {
    pub health_percent: f64,
    pub spec_id: u32,
    pub casting: bool,
    /// Health fell since the previous snapshot.
    pub taking_damage: bool,
}

impl Default for FrameUnit {
    fn default() -> Self {
        Self {
            health_percent: UNKNOWN_HEALTH_PERCENT,
            spec_id: 0,
            casting: false,
            taking_damage: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuraState {
    pub remaining: f64,
    pub stacks: u8,
}

/// Live auras on one unit, keyed by aura id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuraSet(BTreeMap<u32, AuraState>);

impl AuraSet {
    pub fn insert(&mut self, id: u32, state: AuraState) {
        self.0.insert(id, state);
    }

    pub fn contains(&self, id: u32) -> bool {
        self.0.contains_key(&id)
    }

    /// 0 when the aura is not live.
    pub fn remaining(&self, id: u32) -> f64 {
        self.0.get(&id).map(|aura| aura.remaining).unwrap_or(0.0)
    }

    pub fn stacks(&self, id: u32) -> u8 {
        self.0.get(&id).map(|aura| aura.stacks).unwrap_or(0)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(u32, AuraState)> for AuraSet {
    fn from_iter<T: IntoIterator<Item = (u32, AuraState)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CastRecord {
    pub slot: SlotId,
    pub action: String,
    pub at_secs: f64,
}

/// Most recent emits, newest last.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CastHistory(VecDeque<CastRecord>);

impl CastHistory {
    pub fn push(&mut self, record: CastRecord) {
        if self.0.len() == CAST_HISTORY_DEPTH {
            self.0.pop_front();
        }
        self.0.push_back(record);
    }

    pub fn last(&self) -> Option<&CastRecord> {
        self.0.back()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CastRecord> {
        self.0.iter()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HpSample {
    pub health_percent: f64,
    pub at_secs: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSnapshot {
    pub taken_at_secs: f64,
    pub sentinel_ok: bool,
    pub spec_id: u32,
    pub race_id: u8,
    pub health_percent: f64,
    pub primary: Resource,
    pub secondary: Resource,
    pub moving: bool,
    pub in_melee: bool,
    pub chat_open: bool,
    pub player_cast: CastState,
    pub gcd_remaining: f64,
    pub target: UnitState,
    pub focus: UnitState,
    pub nearby_enemies: u8,
    pub melee_enemies: u8,
    pub player_buffs: AuraSet,
    pub player_debuffs: AuraSet,
    pub target_buffs: AuraSet,
    pub target_debuffs: AuraSet,
    pub cooldowns: [f64; COOLDOWN_SLOTS],
    pub charges: [u8; COOLDOWN_SLOTS],
    pub party: Vec<FrameUnit>,
    pub enemies: Vec<FrameUnit>,
    pub cast_history: CastHistory,
    pub active_proc_id: u32,
    pub instance: InstanceKind,
    pub standing_in_fire: bool,
    pub target_stun_dr: f64,
    pub target_hp_history: Vec<HpSample>,
    pub target_hp_velocity: f64,
    // derived
    pub in_combat: bool,
    pub target_valid: bool,
    pub interruptible: bool,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            taken_at_secs: 0.0,
            sentinel_ok: false,
            spec_id: 0,
            race_id: 0,
            health_percent: UNKNOWN_HEALTH_PERCENT,
            primary: Resource::default(),
            secondary: Resource::default(),
            moving: false,
            in_melee: false,
            chat_open: false,
            player_cast: CastState::default(),
            gcd_remaining: 0.0,
            target: UnitState::default(),
            focus: UnitState::default(),
            nearby_enemies: 0,
            melee_enemies: 0,
            player_buffs: AuraSet::default(),
            player_debuffs: AuraSet::default(),
            target_buffs: AuraSet::default(),
            target_debuffs: AuraSet::default(),
            cooldowns: [UNKNOWN_COOLDOWN_SECS; COOLDOWN_SLOTS],
            charges: [0; COOLDOWN_SLOTS],
            party: Vec::new(),
            enemies: Vec::new(),
            cast_history: CastHistory::default(),
            active_proc_id: 0,
            instance: InstanceKind::World,
            standing_in_fire: false,
            target_stun_dr: 0.0,
            target_hp_history: Vec::new(),
            target_hp_velocity: 0.0,
            in_combat: false,
            target_valid: false,
            interruptible: false,
        }
    }
}

impl StateSnapshot {
    /// Snapshot used when no strip could be read; every gate reads it as unsafe.
    pub fn unreadable(taken_at_secs: f64) -> Self {
        Self {
            taken_at_secs,
            ..Self::default()
        }
    }

    /// Recomputes the derived booleans from primitive fields.
    pub fn refresh_derived(&mut self) {
        self.target_valid = self.target.is_valid_enemy();
        self.interruptible = self.target.is_interruptible_cast();
    }

    /// Cooldown remaining for a 1-based slot; slots without telemetry read
    /// the unknown sentinel so "ready" checks fail.
    pub fn cooldown(&self, slot: SlotId) -> f64 {
        slot.telemetry_index()
            .map(|index| self.cooldowns[index])
            .unwrap_or(UNKNOWN_COOLDOWN_SECS)
    }

    pub fn charges_of(&self, slot: SlotId) -> u8 {
        slot.telemetry_index()
            .map(|index| self.charges[index])
            .unwrap_or(0)
    }

    pub fn lowest_party_member(&self) -> Option<&FrameUnit> {
        self.party
            .iter()
            .min_by(|a, b| a.health_percent.total_cmp(&b.health_percent))
    }

    /// Lowest party member when they are hurt enough to be worth a heal.
    pub fn healing_target(&self) -> Option<&FrameUnit> {
        self.lowest_party_member()
            .filter(|member| member.health_percent < HEALING_TARGET_BELOW_PERCENT)
    }

    pub fn party_taking_damage(&self) -> usize {
        self.party.iter().filter(|member| member.taking_damage).count()
    }

    pub fn has_external_defensive(&self) -> bool {
        EXTERNAL_DEFENSIVE_IDS
            .iter()
            .any(|id| self.player_buffs.contains(*id))
    }

    /// Seconds until the target dies at the current HP velocity.
    pub fn time_to_death(&self) -> Option<f64> {
        if self.target_hp_velocity <= 0.0 || !self.target.exists {
            return None;
        }
        Some(self.target.health_percent / self.target_hp_velocity)
    }
}
