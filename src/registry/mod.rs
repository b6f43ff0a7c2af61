//! Declarative spec and matchup data, loaded once per controller lifecycle.

use crate::constants::{
    DEFAULT_DEFENSIVE_SLOT, DEFAULT_DR_THRESHOLD, DEFAULT_FOCUS_KICK_SLOT,
    DEFAULT_INTERRUPT_SLOT, DEFAULT_INTERRUPT_WINDOW, DEFAULT_PANIC_THRESHOLD,
    DEFAULT_RANGE_YARDS, KNOWN_SPEC_IDS, MAX_SLOT_ID, COOLDOWN_SLOTS,
};
use crate::engine::guard::Guard;
use crate::error::CoachError;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

/// Universal slot id, 1..=40. Spelled `slot_07` in data files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotId(u8);

impl SlotId {
    pub fn new(id: u8) -> Option<Self> {
        (1..=MAX_SLOT_ID).contains(&id).then_some(Self(id))
    }

    /// Accepts `slot_07`, `SLOT_07`, `07` and `7`.
    pub fn parse(raw: &str) -> Result<Self, CoachError> {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        let digits = lower.strip_prefix("slot_").unwrap_or(&lower);
        digits
            .parse::<u8>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| CoachError::InvalidSlotId {
                raw: trimmed.to_string(),
            })
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Index into the snapshot's cooldown/charge arrays, if this slot has
    /// telemetry.
    pub fn telemetry_index(self) -> Option<usize> {
        let index = self.0 as usize - 1;
        (index < COOLDOWN_SLOTS).then_some(index)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot_{:02}", self.0)
    }
}

impl TryFrom<String> for SlotId {
    type Error = CoachError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SlotId> for String {
    fn from(value: SlotId) -> Self {
        value.to_string()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AimMode {
    #[default]
    Flick,
    Warp,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Slot {
    pub id: SlotId,
    pub action: String,
    pub priority: i32,
    pub min_resource: u32,
    pub requires_aim: bool,
    pub key: String,
    pub conditions: Vec<Guard>,
    pub follow_up: Option<SlotId>,
    pub aim_mode: AimMode,
    pub velocity_lead: bool,
    pub ground_on_feet: bool,
    pub range_yards: f64,
    pub offensive: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuraScope {
    PlayerBuff,
    PlayerDebuff,
    TargetBuff,
    TargetDebuff,
}

/// Binds tracked-aura channel `i` to an aura id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedAura {
    pub id: u32,
    pub scope: AuraScope,
    #[serde(default)]
    pub base_duration: f64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafetyBuffer {
    pub amount: u32,
    /// Slots the buffer is reserved for; they may spend into it.
    #[serde(default)]
    pub slots: Vec<SlotId>,
    #[serde(default = "default_threat_health")]
    pub threat_health_below: f64,
    #[serde(default = "default_threat_enemies")]
    pub threat_melee_enemies: u8,
}

fn default_threat_health() -> f64 {
    50.0
}

fn default_threat_enemies() -> u8 {
    3
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicOverrides {
    pub panic_threshold: f64,
    pub defensive_slot: SlotId,
    pub interrupt_slot: SlotId,
    pub focus_kick_slot: SlotId,
    pub hazard_escape_slot: Option<SlotId>,
    pub interrupt_window: (f64, f64),
    pub extra_lethal_ids: Vec<u32>,
    pub extra_stop_attack_ids: Vec<u32>,
    pub moving_cast_buffs: Vec<u32>,
    pub safety_buffer: Option<SafetyBuffer>,
    /// Set-focus keys for enemy frames 1..=3, in frame order.
    pub focus_keys: Vec<String>,
    pub dr_threshold: f64,
}

impl Default for LogicOverrides {
    fn default() -> Self {
        Self {
            panic_threshold: DEFAULT_PANIC_THRESHOLD,
            defensive_slot: SlotId(DEFAULT_DEFENSIVE_SLOT),
            interrupt_slot: SlotId(DEFAULT_INTERRUPT_SLOT),
            focus_kick_slot: SlotId(DEFAULT_FOCUS_KICK_SLOT),
            hazard_escape_slot: None,
            interrupt_window: DEFAULT_INTERRUPT_WINDOW,
            extra_lethal_ids: Vec::new(),
            extra_stop_attack_ids: Vec::new(),
            moving_cast_buffs: Vec::new(),
            safety_buffer: None,
            focus_keys: Vec::new(),
            dr_threshold: DEFAULT_DR_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProcEntry {
    pub slot: SlotId,
    pub name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SpecData {
    pub spec_id: u32,
    pub name: String,
    /// Priority descending, slot id ascending on ties.
    pub slots: Vec<Slot>,
    pub proc_priority: BTreeMap<u32, ProcEntry>,
    pub overrides: LogicOverrides,
    pub talent_loadouts: serde_json::Value,
    pub hero_talent_latency: BTreeMap<SlotId, u64>,
    pub tracked_auras: Vec<TrackedAura>,
    pub moving_alternatives: BTreeMap<SlotId, SlotId>,
}

impl SpecData {
    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    pub fn tracked_aura(&self, id: u32) -> Option<&TrackedAura> {
        self.tracked_auras.iter().find(|aura| aura.id == id)
    }

    pub fn hero_latency_ms(&self, id: SlotId) -> u64 {
        self.hero_talent_latency.get(&id).copied().unwrap_or(0)
    }

    fn check_slot(&self, context: &str, id: SlotId) -> Result<(), CoachError> {
        if self.slot(id).is_some() {
            Ok(())
        } else {
            Err(CoachError::UnknownSlot {
                context: format!("spec {} {context}", self.spec_id),
                slot: id.to_string(),
            })
        }
    }

    fn validate(&self) -> Result<(), CoachError> {
        for slot in &self.slots {
            if let Some(follow_up) = slot.follow_up {
                self.check_slot(&format!("{} follow_up", slot.id), follow_up)?;
            }
            for guard in &slot.conditions {
                if let Some(target) = guard.slot_ref() {
                    self.check_slot(&format!("{} conditions", slot.id), target)?;
                }
            }
        }
        for (proc_id, entry) in &self.proc_priority {
            self.check_slot(&format!("proc_priority {proc_id}"), entry.slot)?;
        }
        for (from, to) in &self.moving_alternatives {
            self.check_slot("moving_alternatives", *from)?;
            self.check_slot("moving_alternatives", *to)?;
        }
        for slot in self.hero_talent_latency.keys() {
            self.check_slot("hero_talent_latency", *slot)?;
        }
        if let Some(slot) = self.overrides.hazard_escape_slot {
            self.check_slot("hazard_escape_slot", slot)?;
        }
        if let Some(buffer) = &self.overrides.safety_buffer {
            for slot in &buffer.slots {
                self.check_slot("safety_buffer", *slot)?;
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct SlotFile {
    action: String,
    priority: i32,
    #[serde(default)]
    min_resource: u32,
    #[serde(default)]
    requires_aim: bool,
    key: String,
    #[serde(default)]
    conditions: Vec<String>,
    #[serde(default)]
    follow_up: Option<SlotId>,
    #[serde(default)]
    aim_mode: AimMode,
    #[serde(default)]
    velocity_lead: bool,
    #[serde(default)]
    ground_on_feet: bool,
    #[serde(default = "default_range_yards")]
    range_yards: f64,
    #[serde(default = "default_offensive")]
    offensive: bool,
}

fn default_range_yards() -> f64 {
    DEFAULT_RANGE_YARDS
}

fn default_offensive() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProcEntryFile {
    Slot(SlotId),
    Named {
        slot: SlotId,
        #[serde(default)]
        name: Option<String>,
    },
}

#[derive(Deserialize)]
struct SpecFile {
    #[serde(default)]
    spec_id: Option<u32>,
    #[serde(default)]
    name: Option<String>,
    universal_slots: BTreeMap<SlotId, SlotFile>,
    #[serde(default)]
    proc_priority: BTreeMap<u32, ProcEntryFile>,
    #[serde(default)]
    logic_overrides: LogicOverrides,
    #[serde(default)]
    talent_loadouts: serde_json::Value,
    #[serde(default)]
    hero_talent_latency: BTreeMap<SlotId, u64>,
    #[serde(default)]
    tracked_auras: Vec<TrackedAura>,
    #[serde(default)]
    moving_alternatives: BTreeMap<SlotId, SlotId>,
}

fn parse_conditions(slot: SlotId, raw: &[String]) -> Result<Vec<Guard>, CoachError> {
    raw.iter()
        .map(|name| {
            Guard::parse(name).ok_or_else(|| CoachError::UnknownGuard {
                slot: slot.to_string(),
                guard: name.clone(),
            })
        })
        .collect()
}

impl SpecFile {
    fn into_spec(self, spec_id: u32, fallback_name: &str) -> Result<SpecData, CoachError> {
        let mut slots = Vec::with_capacity(self.universal_slots.len());
        for (id, raw) in self.universal_slots {
            slots.push(Slot {
                id,
                conditions: parse_conditions(id, &raw.conditions)?,
                action: raw.action,
                priority: raw.priority,
                min_resource: raw.min_resource,
                requires_aim: raw.requires_aim,
                key: raw.key,
                follow_up: raw.follow_up,
                aim_mode: raw.aim_mode,
                velocity_lead: raw.velocity_lead,
                ground_on_feet: raw.ground_on_feet,
                range_yards: raw.range_yards,
                offensive: raw.offensive,
            });
        }
        slots.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

        let proc_priority = self
            .proc_priority
            .into_iter()
            .map(|(proc_id, entry)| {
                let entry = match entry {
                    ProcEntryFile::Slot(slot) => ProcEntry { slot, name: None },
                    ProcEntryFile::Named { slot, name } => ProcEntry { slot, name },
                };
                (proc_id, entry)
            })
            .collect();

        let spec = SpecData {
            spec_id,
            name: self.name.unwrap_or_else(|| fallback_name.to_string()),
            slots,
            proc_priority,
            overrides: self.logic_overrides,
            talent_loadouts: self.talent_loadouts,
            hero_talent_latency: self.hero_talent_latency,
            tracked_auras: self.tracked_auras,
            moving_alternatives: self.moving_alternatives,
        };
        spec.validate()?;
        Ok(spec)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    EnemyCast,
    EnemyBuff,
    TargetDebuff,
    LethalFocusCast,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchupRule {
    pub trigger_kind: TriggerKind,
    pub trigger_id: u32,
    pub response_slot: SlotId,
    #[serde(default, alias = "optional_note")]
    pub note: Option<String>,
}

/// Reaction rules for one player spec, keyed by enemy spec.
#[derive(Clone, Debug, Default)]
pub struct MatchupTable {
    by_enemy: BTreeMap<u32, Vec<MatchupRule>>,
    any_enemy: Vec<MatchupRule>,
}

impl MatchupTable {
    /// Rules for `enemy_spec` first, then the `*` rules.
    pub fn rules_for(&self, enemy_spec: u32) -> impl Iterator<Item = &MatchupRule> {
        self.by_enemy
            .get(&enemy_spec)
            .into_iter()
            .flatten()
            .chain(self.any_enemy.iter())
    }

    pub fn rule_count(&self) -> usize {
        self.by_enemy.values().map(Vec::len).sum::<usize>() + self.any_enemy.len()
    }

    fn all_rules(&self) -> impl Iterator<Item = &MatchupRule> {
        self.by_enemy.values().flatten().chain(self.any_enemy.iter())
    }
}

#[derive(Clone, Debug)]
pub struct RacialAugment {
    pub race_id: u8,
    pub name: String,
    pub key: String,
    /// Slots this racial is paired with; empty pairs it with every offensive slot.
    pub augments: Vec<SlotId>,
    pub conditions: Vec<Guard>,
}

impl RacialAugment {
    pub fn pairs_with(&self, slot: &Slot) -> bool {
        if self.augments.is_empty() {
            slot.offensive
        } else {
            self.augments.contains(&slot.id)
        }
    }
}

#[derive(Deserialize)]
struct RacialFile {
    name: String,
    key: String,
    #[serde(default)]
    augments: Vec<SlotId>,
    #[serde(default)]
    conditions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LethalEntry {
    Id(u32),
    Named { id: u32 },
}

#[derive(Deserialize, Default)]
struct EncounterFile {
    #[serde(default)]
    stop_attack: Vec<u32>,
    #[serde(default)]
    hazard_auras: Vec<u32>,
}

#[derive(Deserialize, Default)]
struct PveMechanicsFile {
    #[serde(default)]
    stop_attack: Vec<u32>,
    #[serde(default)]
    hazard_auras: Vec<u32>,
    #[serde(default)]
    encounters: BTreeMap<String, EncounterFile>,
}

/// Per-spec row of `check-data` output.
#[derive(Clone, Debug, Serialize)]
pub struct SpecSummary {
    pub spec_id: u32,
    pub name: String,
    pub slots: usize,
    pub procs: usize,
    pub tracked_auras: usize,
    pub matchup_rules: usize,
    pub talent_loadouts: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    specs: BTreeMap<u32, SpecData>,
    matchups: BTreeMap<u32, MatchupTable>,
    lethal_spells: BTreeSet<u32>,
    stop_attack: BTreeSet<u32>,
    hazard_auras: BTreeSet<u32>,
    racials: BTreeMap<u8, RacialAugment>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads `<data_dir>/specs`, `<data_dir>/matchups` and `<data_dir>/config`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut registry = Self::empty();

        let specs_dir = data_dir.join("specs");
        for path in json_files(&specs_dir)? {
            let stem = file_stem(&path)?;
            let (prefix, name) = stem.split_once('_').unwrap_or((stem.as_str(), ""));
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed reading {}", path.display()))?;
            let file_spec_id = prefix.parse::<u32>().ok();
            registry
                .insert_spec_json(file_spec_id, name, &raw)
                .with_context(|| format!("invalid spec file {}", path.display()))?;
        }
        if registry.specs.is_empty() {
            return Err(CoachError::MissingSpecData {
                data_dir: data_dir.to_path_buf(),
            }
            .into());
        }

        let matchups_dir = data_dir.join("matchups");
        if matchups_dir.is_dir() {
            for path in json_files(&matchups_dir)? {
                let stem = file_stem(&path)?;
                let spec_id = stem
                    .strip_suffix("_vs_all")
                    .and_then(|id| id.parse::<u32>().ok())
                    .ok_or_else(|| {
                        anyhow!("matchup file {} must be named <spec_id>_vs_all.json", path.display())
                    })?;
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed reading {}", path.display()))?;
                registry
                    .insert_matchups_json(spec_id, &raw)
                    .with_context(|| format!("invalid matchup file {}", path.display()))?;
            }
        }

        let config_dir = data_dir.join("config");
        if let Some(raw) = read_optional(&config_dir.join("lethal_spells.json"))? {
            registry.insert_lethal_json(&raw).context("invalid lethal_spells.json")?;
        }
        if let Some(raw) = read_optional(&config_dir.join("pve_mechanics.json"))? {
            registry
                .insert_pve_mechanics_json(&raw)
                .context("invalid pve_mechanics.json")?;
        }
        if let Some(raw) = read_optional(&config_dir.join("racials.json"))? {
            registry.insert_racials_json(&raw).context("invalid racials.json")?;
        }

        tracing::info!(
            "registry loaded from {}: {} specs, {} matchup tables, {} lethal spells",
            data_dir.display(),
            registry.specs.len(),
            registry.matchups.len(),
            registry.lethal_spells.len()
        );
        Ok(registry)
    }

    /// Parses one spec document. `spec_id` inside the document wins over the
    /// id taken from the file name.
    pub fn insert_spec_json(
        &mut self,
        file_spec_id: Option<u32>,
        fallback_name: &str,
        raw: &str,
    ) -> Result<u32> {
        let file: SpecFile = serde_json::from_str(raw)?;
        let spec_id = file
            .spec_id
            .or(file_spec_id)
            .ok_or_else(|| anyhow!("spec document has no spec_id and no id in its file name"))?;
        let spec = file.into_spec(spec_id, fallback_name)?;
        if let Some(table) = self.matchups.get(&spec_id) {
            check_matchups(&spec, table)?;
        }
        self.specs.insert(spec_id, spec);
        Ok(spec_id)
    }

    /// Matchup documents map an enemy spec id (or `*`) to reaction rules.
    pub fn insert_matchups_json(&mut self, spec_id: u32, raw: &str) -> Result<()> {
        let file: BTreeMap<String, Vec<MatchupRule>> = serde_json::from_str(raw)?;
        let mut table = MatchupTable::default();
        for (enemy, rules) in file {
            if enemy.trim() == "*" {
                table.any_enemy.extend(rules);
            } else {
                let enemy_spec = enemy
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| anyhow!("matchup key {enemy:?} is neither a spec id nor \"*\""))?;
                table.by_enemy.entry(enemy_spec).or_default().extend(rules);
            }
        }
        if let Some(spec) = self.specs.get(&spec_id) {
            check_matchups(spec, &table)?;
        }
        self.matchups.insert(spec_id, table);
        Ok(())
    }

    pub fn insert_lethal_json(&mut self, raw: &str) -> Result<()> {
        let entries: Vec<LethalEntry> = serde_json::from_str(raw)?;
        self.lethal_spells.extend(entries.into_iter().map(|entry| match entry {
            LethalEntry::Id(id) | LethalEntry::Named { id } => id,
        }));
        Ok(())
    }

    pub fn insert_pve_mechanics_json(&mut self, raw: &str) -> Result<()> {
        let file: PveMechanicsFile = serde_json::from_str(raw)?;
        self.stop_attack.extend(file.stop_attack);
        self.hazard_auras.extend(file.hazard_auras);
        for encounter in file.encounters.into_values() {
            self.stop_attack.extend(encounter.stop_attack);
            self.hazard_auras.extend(encounter.hazard_auras);
        }
        Ok(())
    }

    pub fn insert_racials_json(&mut self, raw: &str) -> Result<()> {
        let file: BTreeMap<u8, RacialFile> = serde_json::from_str(raw)?;
        for (race_id, racial) in file {
            let label = format!("racial {race_id}");
            let conditions = racial
                .conditions
                .iter()
                .map(|name| {
                    Guard::parse(name).ok_or_else(|| CoachError::UnknownGuard {
                        slot: label.clone(),
                        guard: name.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            self.racials.insert(
                race_id,
                RacialAugment {
                    race_id,
                    name: racial.name,
                    key: racial.key,
                    augments: racial.augments,
                    conditions,
                },
            );
        }
        Ok(())
    }

    pub fn spec(&self, spec_id: u32) -> Option<&SpecData> {
        self.specs.get(&spec_id)
    }

    pub fn matchups(&self, spec_id: u32) -> Option<&MatchupTable> {
        self.matchups.get(&spec_id)
    }

    pub fn lethal_spells(&self) -> &BTreeSet<u32> {
        &self.lethal_spells
    }

    pub fn stop_attack_ids(&self) -> &BTreeSet<u32> {
        &self.stop_attack
    }

    pub fn hazard_auras(&self) -> &BTreeSet<u32> {
        &self.hazard_auras
    }

    pub fn racial(&self, race_id: u8) -> Option<&RacialAugment> {
        self.racials.get(&race_id)
    }

    pub fn panic_threshold(&self, spec_id: u32) -> f64 {
        self.spec(spec_id)
            .map(|spec| spec.overrides.panic_threshold)
            .unwrap_or(DEFAULT_PANIC_THRESHOLD)
    }

    /// Spec ids the decoder may snap to: loaded specs when there are any,
    /// otherwise every playable spec.
    pub fn known_spec_ids(&self) -> Vec<u32> {
        if self.specs.is_empty() {
            KNOWN_SPEC_IDS.to_vec()
        } else {
            self.specs.keys().copied().collect()
        }
    }

    pub fn is_lethal(&self, spec: &SpecData, spell_id: u32) -> bool {
        self.lethal_spells.contains(&spell_id) || spec.overrides.extra_lethal_ids.contains(&spell_id)
    }

    pub fn is_stop_attack(&self, spec: Option<&SpecData>, aura_id: u32) -> bool {
        self.stop_attack.contains(&aura_id)
            || spec
                .map(|spec| spec.overrides.extra_stop_attack_ids.contains(&aura_id))
                .unwrap_or(false)
    }

    pub fn summaries(&self) -> Vec<SpecSummary> {
        self.specs
            .values()
            .map(|spec| SpecSummary {
                spec_id: spec.spec_id,
                name: spec.name.clone(),
                slots: spec.slots.len(),
                procs: spec.proc_priority.len(),
                tracked_auras: spec.tracked_auras.len(),
                matchup_rules: self
                    .matchups(spec.spec_id)
                    .map(MatchupTable::rule_count)
                    .unwrap_or(0),
                talent_loadouts: match &spec.talent_loadouts {
                    serde_json::Value::Object(map) => map.len(),
                    serde_json::Value::Array(list) => list.len(),
                    _ => 0,
                },
            })
            .collect()
    }
}

fn check_matchups(spec: &SpecData, table: &MatchupTable) -> Result<(), CoachError> {
    for rule in table.all_rules() {
        spec.check_slot(
            &format!("matchup {:?} {}", rule.trigger_kind, rule.trigger_id),
            rule.response_slot,
        )?;
    }
    Ok(())
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed reading directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed listing {}", dir.display()))?
            .path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("unreadable file name {}", path.display()))
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("failed reading {}", path.display()))
}
