//! Four-stage priority scan.
//!
//! Candidates are visited in stage order: matchup reactions, proc
//! overrides, life safety (panic defensive, then hazard escape), tactical
//! interruption (focus kick, then the late target interrupt) and finally
//! the rotation in priority order. An aimed hazard-escape slot lands on the
//! first heading clear of nameplates rather than on the target. Every candidate goes through the same
//! gate: the slot must exist, afford its resource cost and pass its guards.
//! The first candidate that clears the gate wins.

pub mod emit;
pub mod guard;


use crate::constants::VELOCITY_LEAD_SECS;
use crate::locate::AimResolver;
use crate::registry::{AimMode, Registry, Slot, SlotId, SpecData, TriggerKind};
use crate::snapshot::StateSnapshot;
use guard::GuardScope;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Matchup,
    Proc,
    LifeSafety,
    HazardEscape,
    FocusKick,
    Interrupt,
    Rotation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AimCommand {
    Flick { dx: i32, dy: i32 },
    Warp { x: i32, y: i32 },
}

/// Second key of a ghost-synced pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FollowUp {
    /// `None` for a racial augmentation.
    pub slot: Option<SlotId>,
    pub action: String,
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Decision {
    pub stage: Stage,
    pub slot: SlotId,
    pub action: String,
    pub key: String,
    pub aim: Option<AimCommand>,
    pub follow_up: Option<FollowUp>,
    /// Hero-talent latency added before the press.
    pub pre_press_ms: u64,
}

enum Verdict {
    Take(Decision),
    Skip,
    /// Ground-targeted slot without a target: stay silent this pulse.
    Suppress,
}

fn aim_at(mode: AimMode, (x, y): (f64, f64), (center_x, center_y): (f64, f64)) -> AimCommand {
    match mode {
        AimMode::Flick => AimCommand::Flick {
            dx: (x - center_x).round() as i32,
            dy: (y - center_y).round() as i32,
        },
        AimMode::Warp => AimCommand::Warp {
            x: x.round() as i32,
            y: y.round() as i32,
        },
    }
}

pub struct DecisionEngine {
    registry: Arc<Registry>,
}

impl DecisionEngine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Picks at most one action for `snap`. Pure apart from the aim resolver.
    pub fn decide(&self, snap: &StateSnapshot, aim: &mut dyn AimResolver) -> Option<Decision> {
        let Some(spec) = self.registry.spec(snap.spec_id) else {
            tracing::trace!("no spec data for spec {}", snap.spec_id);
            return None;
        };

        for (stage, slot_id) in self.candidates(spec, snap) {
            match self.try_slot(spec, snap, slot_id, stage, aim) {
                Verdict::Take(decision) => {
                    tracing::debug!(
                        "{:?}: {} {} -> {}",
                        decision.stage,
                        decision.slot,
                        decision.action,
                        decision.key
                    );
                    return Some(decision);
                }
                Verdict::Skip => continue,
                Verdict::Suppress => {
                    tracing::debug!("{slot_id} needs a ground target; holding");
                    return None;
                }
            }
        }
        None
    }

    fn candidates(&self, spec: &SpecData, snap: &StateSnapshot) -> Vec<(Stage, SlotId)> {
        let mut out = Vec::new();
        let overrides = &spec.overrides;

        if let Some(table) = self.registry.matchups(spec.spec_id) {
            for rule in table.rules_for(snap.target.spec_id) {
                if self.rule_fires(rule.trigger_kind, rule.trigger_id, snap) {
                    out.push((Stage::Matchup, rule.response_slot));
                }
            }
        }

        if snap.active_proc_id != 0 {
            if let Some(entry) = spec.proc_priority.get(&snap.active_proc_id) {
                out.push((Stage::Proc, entry.slot));
            }
        }

        if snap.health_percent < overrides.panic_threshold {
            out.push((Stage::LifeSafety, overrides.defensive_slot));
        }
        if snap.standing_in_fire {
            if let Some(slot) = overrides.hazard_escape_slot {
                out.push((Stage::HazardEscape, slot));
            }
        }

        let focus = &snap.focus;
        if focus.exists
            && focus.enemy
            && focus.is_interruptible_cast()
            && self.registry.is_lethal(spec, focus.cast.id)
        {
            out.push((Stage::FocusKick, overrides.focus_kick_slot));
        }
        let (window_start, window_end) = overrides.interrupt_window;
        if snap.interruptible
            && (window_start..=window_end).contains(&snap.target.cast.progress)
        {
            out.push((Stage::Interrupt, overrides.interrupt_slot));
        }

        for slot in &spec.slots {
            let id = if snap.moving {
                spec.moving_alternatives
                    .get(&slot.id)
                    .copied()
                    .unwrap_or(slot.id)
            } else {
                slot.id
            };
            out.push((Stage::Rotation, id));
        }
        out
    }

    fn rule_fires(&self, kind: TriggerKind, id: u32, snap: &StateSnapshot) -> bool {
        let casting = |unit: &crate::snapshot::UnitState| {
            (unit.cast.casting || unit.cast.channeling) && unit.cast.id == id
        };
        match kind {
            TriggerKind::EnemyCast => casting(&snap.target) || casting(&snap.focus),
            TriggerKind::EnemyBuff => snap.target_buffs.contains(id),
            TriggerKind::TargetDebuff => snap.target_debuffs.contains(id),
            TriggerKind::LethalFocusCast => {
                casting(&snap.focus) && snap.focus.cast.interruptible
            }
        }
    }

    /// Resource needed for `slot`, including the safety buffer under threat.
    fn required_resource(&self, spec: &SpecData, snap: &StateSnapshot, slot: &Slot) -> u32 {
        let Some(buffer) = &spec.overrides.safety_buffer else {
            return slot.min_resource;
        };
        let high_threat = snap.health_percent < buffer.threat_health_below
            || snap.melee_enemies >= buffer.threat_melee_enemies;
        if high_threat && slot.offensive && !buffer.slots.contains(&slot.id) {
            slot.min_resource.saturating_add(buffer.amount)
        } else {
            slot.min_resource
        }
    }

    fn try_slot(
        &self,
        spec: &SpecData,
        snap: &StateSnapshot,
        slot_id: SlotId,
        stage: Stage,
        aim: &mut dyn AimResolver,
    ) -> Verdict {
        let Some(slot) = spec.slot(slot_id) else {
            return Verdict::Skip;
        };
        if snap.primary.value < self.required_resource(spec, snap, slot) {
            return Verdict::Skip;
        }
        let scope = GuardScope {
            snapshot: snap,
            spec,
            slot,
        };
        if !scope.all_pass(&slot.conditions) {
            return Verdict::Skip;
        }

        let aim_command = if !slot.requires_aim {
            None
        } else if stage == Stage::HazardEscape {
            match aim.safe_escape_point() {
                Some(point) => Some(aim_at(slot.aim_mode, point, aim.screen_center())),
                None => return Verdict::Skip,
            }
        } else {
            match aim.locate_feet(slot.range_yards, snap.taken_at_secs) {
                Some(feet) => {
                    let lead = if slot.velocity_lead && snap.target.moving {
                        feet.velocity_x * VELOCITY_LEAD_SECS
                    } else {
                        0.0
                    };
                    Some(aim_at(
                        slot.aim_mode,
                        (feet.x + lead, feet.y),
                        aim.screen_center(),
                    ))
                }
                None if slot.ground_on_feet => return Verdict::Suppress,
                None => return Verdict::Skip,
            }
        };

        Verdict::Take(Decision {
            stage,
            slot: slot.id,
            action: slot.action.clone(),
            key: slot.key.clone(),
            aim: aim_command,
            follow_up: self.ghost_sync(spec, snap, slot),
            pre_press_ms: spec.hero_latency_ms(slot.id),
        })
    }

    /// The slot's follow-up, or failing that a paired racial, when its
    /// guards pass against the same snapshot.
    fn ghost_sync(&self, spec: &SpecData, snap: &StateSnapshot, slot: &Slot) -> Option<FollowUp> {
        if let Some(follow) = slot.follow_up.and_then(|id| spec.slot(id)) {
            let scope = GuardScope {
                snapshot: snap,
                spec,
                slot: follow,
            };
            if scope.all_pass(&follow.conditions) {
                return Some(FollowUp {
                    slot: Some(follow.id),
                    action: follow.action.clone(),
                    key: follow.key.clone(),
                });
            }
        }

        let racial = self.registry.racial(snap.race_id)?;
        let scope = GuardScope {
            snapshot: snap,
            spec,
            slot,
        };
        (racial.pairs_with(slot) && scope.all_pass(&racial.conditions)).then(|| FollowUp {
            slot: None,
            action: racial.name.clone(),
            key: racial.key.clone(),
        })
    }
}
