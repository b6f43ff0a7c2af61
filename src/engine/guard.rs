//! Slot guard predicates.
//!
//! Spec files name guards as strings; every name is parsed into a [`Guard`]
//! when the registry loads so a typo fails at startup instead of silently
//! never matching.

use crate::constants::{PANDEMIC_FRACTION, TTD_CRITICAL_SECS};
use crate::registry::{Slot, SlotId, SpecData};
use crate::snapshot::{InstanceKind, StateSnapshot};

#[derive(Clone, Debug, PartialEq)]
pub enum Guard {
    Always,
    InCombat,
    InMelee,
    InRange,
    Moving,
    /// Passes while moving when a moving-cast buff is up.
    NotMoving,
    TargetValid,
    TargetCasting,
    TargetInterruptible,
    FocusValid,
    FocusCasting,
    FocusInterruptible,
    TargetHpBelow(f64),
    TargetHpAbove(f64),
    HealthBelow(f64),
    ResourceAtLeast(u32),
    ResourceBelow(u32),
    SecondaryAtLeast(u32),
    SecondaryBelow(u32),
    OffCooldown,
    HasCharge,
    Ready(SlotId),
    Buff(u32),
    NoBuff(u32),
    BuffStacks(u32, u8),
    Debuff(u32),
    NoDebuff(u32),
    DebuffBelow(u32, f64),
    Pandemic(u32),
    Proc(u32),
    TtdCritical,
    DrSafe,
    ComboStrikes,
    PoolFor { slot: SlotId, within_secs: f64 },
    InFire,
    NotInFire,
    EnemiesAtLeast(u8),
    MeleeEnemiesAtLeast(u8),
    Instance(InstanceKind),
    Pvp,
    /// Some party member is hurt enough to heal.
    PartyNeedsHealing,
    PartyHpBelow(f64),
    PartyTakingDamageAtLeast(u8),
    ExternalDefensive,
    NoExternalDefensive,
}

impl Guard {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let simple = match raw {
            "always" => Some(Self::Always),
            "in_combat" => Some(Self::InCombat),
            "in_melee" => Some(Self::InMelee),
            "in_range" => Some(Self::InRange),
            "moving" => Some(Self::Moving),
            "not_moving" => Some(Self::NotMoving),
            "target_valid" => Some(Self::TargetValid),
            "target_casting" => Some(Self::TargetCasting),
            "target_interruptible" => Some(Self::TargetInterruptible),
            "focus_valid" => Some(Self::FocusValid),
            "focus_casting" => Some(Self::FocusCasting),
            "focus_interruptible" => Some(Self::FocusInterruptible),
            "off_cooldown" => Some(Self::OffCooldown),
            "has_charge" => Some(Self::HasCharge),
            "ttd_critical" => Some(Self::TtdCritical),
            "dr_safe" | "target_not_dr_stun" => Some(Self::DrSafe),
            "combo_strikes" | "hit_combo" => Some(Self::ComboStrikes),
            "in_fire" => Some(Self::InFire),
            "not_in_fire" => Some(Self::NotInFire),
            "pvp" => Some(Self::Pvp),
            "party_needs_healing" => Some(Self::PartyNeedsHealing),
            "external_defensive" => Some(Self::ExternalDefensive),
            "no_external_defensive" => Some(Self::NoExternalDefensive),
            _ => None,
        };
        if simple.is_some() {
            return simple;
        }
        if let Some((name, args)) = raw.split_once(':') {
            return Self::parse_parameterized(name, args);
        }
        Self::parse_legacy(raw)
    }

    fn parse_parameterized(name: &str, args: &str) -> Option<Self> {
        let mut parts = args.split(':');
        let first = parts.next()?;
        let second = parts.next();
        if parts.next().is_some() {
            return None;
        }
        let guard = match (name, second) {
            ("target_hp_lt", None) => Self::TargetHpBelow(first.parse().ok()?),
            ("target_hp_gt", None) => Self::TargetHpAbove(first.parse().ok()?),
            ("hp_lt", None) => Self::HealthBelow(first.parse().ok()?),
            ("resource_gte", None) => Self::ResourceAtLeast(first.parse().ok()?),
            ("resource_lt", None) => Self::ResourceBelow(first.parse().ok()?),
            ("secondary_gte", None) => Self::SecondaryAtLeast(first.parse().ok()?),
            ("secondary_lt", None) => Self::SecondaryBelow(first.parse().ok()?),
            ("ready", None) => Self::Ready(SlotId::parse(first).ok()?),
            ("buff", None) => Self::Buff(first.parse().ok()?),
            ("no_buff", None) => Self::NoBuff(first.parse().ok()?),
            ("buff_stacks", Some(n)) => Self::BuffStacks(first.parse().ok()?, n.parse().ok()?),
            ("debuff", None) => Self::Debuff(first.parse().ok()?),
            ("no_debuff", None) => Self::NoDebuff(first.parse().ok()?),
            ("debuff_lt", Some(s)) => Self::DebuffBelow(first.parse().ok()?, s.parse().ok()?),
            ("pandemic", None) => Self::Pandemic(first.parse().ok()?),
            ("proc", None) => Self::Proc(first.parse().ok()?),
            ("pool_for", Some(s)) => Self::PoolFor {
                slot: SlotId::parse(first).ok()?,
                within_secs: s.parse().ok()?,
            },
            ("enemies_gte", None) => Self::EnemiesAtLeast(first.parse().ok()?),
            ("melee_enemies_gte", None) => Self::MeleeEnemiesAtLeast(first.parse().ok()?),
            ("instance", None) => Self::Instance(InstanceKind::parse(first)?),
            ("party_hp_lt", None) => Self::PartyHpBelow(first.parse().ok()?),
            ("party_taking_damage_gte", None) => {
                Self::PartyTakingDamageAtLeast(first.parse().ok()?)
            }
            _ => return None,
        };
        Some(guard)
    }

    /// Older spec files spell thresholds into the name: `target_hp_lt_35`,
    /// `rage_gt_60`, `combo_points_4_plus`.
    fn parse_legacy(raw: &str) -> Option<Self> {
        if let Some(value) = raw.strip_prefix("target_hp_lt_") {
            return Some(Self::TargetHpBelow(value.parse().ok()?));
        }
        if let Some(value) = raw.strip_prefix("target_hp_gt_") {
            return Some(Self::TargetHpAbove(value.parse().ok()?));
        }
        for prefix in ["resource_gt_", "rage_gt_", "energy_gt_", "focus_gt_", "mana_gt_"] {
            if let Some(value) = raw.strip_prefix(prefix) {
                let threshold: u32 = value.parse().ok()?;
                return Some(Self::ResourceAtLeast(threshold.saturating_add(1)));
            }
        }
        if let Some(rest) = raw.strip_prefix("combo_points_") {
            let value = rest.strip_suffix("_plus")?;
            return Some(Self::SecondaryAtLeast(value.parse().ok()?));
        }
        None
    }

    /// Slot referenced by this guard, checked for existence at load time.
    pub fn slot_ref(&self) -> Option<SlotId> {
        match self {
            Self::Ready(slot) | Self::PoolFor { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

/// Everything a guard may look at besides the snapshot.
pub struct GuardScope<'a> {
    pub snapshot: &'a StateSnapshot,
    pub spec: &'a SpecData,
    pub slot: &'a Slot,
}

impl GuardScope<'_> {
    pub fn passes(&self, guard: &Guard) -> bool {
        let snap = self.snapshot;
        match guard {
            Guard::Always => true,
            Guard::InCombat => snap.in_combat,
            Guard::InMelee => snap.in_melee,
            Guard::InRange => snap.target.in_range,
            Guard::Moving => snap.moving,
            Guard::NotMoving => {
                !snap.moving
                    || self
                        .spec
                        .overrides
                        .moving_cast_buffs
                        .iter()
                        .any(|id| snap.player_buffs.contains(*id))
            }
            Guard::TargetValid => snap.target_valid,
            Guard::TargetCasting => snap.target.cast.casting || snap.target.cast.channeling,
            Guard::TargetInterruptible => snap.interruptible,
            Guard::FocusValid => snap.focus.is_valid_enemy(),
            Guard::FocusCasting => snap.focus.cast.casting || snap.focus.cast.channeling,
            Guard::FocusInterruptible => snap.focus.is_interruptible_cast(),
            Guard::TargetHpBelow(x) => snap.target.health_percent < *x,
            Guard::TargetHpAbove(x) => snap.target.health_percent > *x,
            Guard::HealthBelow(x) => snap.health_percent < *x,
            Guard::ResourceAtLeast(x) => snap.primary.value >= *x,
            Guard::ResourceBelow(x) => snap.primary.value < *x,
            Guard::SecondaryAtLeast(x) => snap.secondary.value >= *x,
            Guard::SecondaryBelow(x) => snap.secondary.value < *x,
            Guard::OffCooldown => snap.cooldown(self.slot.id) <= 0.0,
            Guard::HasCharge => snap.charges_of(self.slot.id) >= 1,
            Guard::Ready(slot) => snap.cooldown(*slot) <= 0.0,
            Guard::Buff(id) => snap.player_buffs.contains(*id),
            Guard::NoBuff(id) => !snap.player_buffs.contains(*id),
            Guard::BuffStacks(id, n) => snap.player_buffs.stacks(*id) >= *n,
            Guard::Debuff(id) => snap.target_debuffs.contains(*id),
            Guard::NoDebuff(id) => !snap.target_debuffs.contains(*id),
            Guard::DebuffBelow(id, secs) => snap.target_debuffs.remaining(*id) < *secs,
            Guard::Pandemic(id) => self.pandemic_window(*id),
            Guard::Proc(id) => snap.active_proc_id == *id || snap.player_buffs.contains(*id),
            Guard::TtdCritical => snap
                .time_to_death()
                .map(|ttd| ttd < TTD_CRITICAL_SECS)
                .unwrap_or(false),
            Guard::DrSafe => snap.target_stun_dr < self.spec.overrides.dr_threshold,
            Guard::ComboStrikes => snap
                .cast_history
                .last()
                .map(|last| last.action != self.slot.action)
                .unwrap_or(true),
            Guard::PoolFor { slot, within_secs } => self.pool_allows(*slot, *within_secs),
            Guard::InFire => snap.standing_in_fire,
            Guard::NotInFire => !snap.standing_in_fire,
            Guard::EnemiesAtLeast(n) => snap.nearby_enemies >= *n,
            Guard::MeleeEnemiesAtLeast(n) => snap.melee_enemies >= *n,
            Guard::Instance(kind) => snap.instance == *kind,
            Guard::Pvp => snap.instance.is_pvp(),
            Guard::PartyNeedsHealing => snap.healing_target().is_some(),
            Guard::PartyHpBelow(x) => snap
                .lowest_party_member()
                .is_some_and(|member| member.health_percent < *x),
            Guard::PartyTakingDamageAtLeast(n) => snap.party_taking_damage() >= *n as usize,
            Guard::ExternalDefensive => snap.has_external_defensive(),
            Guard::NoExternalDefensive => !snap.has_external_defensive(),
        }
    }

    pub fn all_pass(&self, guards: &[Guard]) -> bool {
        guards.iter().all(|guard| self.passes(guard))
    }

    fn pandemic_window(&self, aura_id: u32) -> bool {
        let remaining = self.snapshot.target_debuffs.remaining(aura_id);
        match self.spec.tracked_aura(aura_id) {
            Some(aura) => remaining < PANDEMIC_FRACTION * aura.base_duration,
            // Untracked: refresh only once it has fallen off.
            None => !self.snapshot.target_debuffs.contains(aura_id),
        }
    }

    /// False when `slot` comes off cooldown within `within_secs` and casting
    /// the current slot would leave too little resource for it.
    fn pool_allows(&self, slot: SlotId, within_secs: f64) -> bool {
        let Some(burst) = self.spec.slot(slot) else {
            return true;
        };
        if self.snapshot.cooldown(slot) > within_secs {
            return true;
        }
        let left = self
            .snapshot
            .primary
            .value
            .saturating_sub(self.slot.min_resource);
        left >= burst.min_resource
    }
}
