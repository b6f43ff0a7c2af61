//! One pulse per user input: debounce, capture, gates, engine, emission.

use crate::calibrate::Calibration;
use crate::clock::Clock;
use crate::constants::{
    DEBOUNCE_MS, GCD_ALIGN_PAD_SECS, GCD_ALIGN_WINDOW_SECS, HEALER_SPEC_IDS,
    MANUAL_OVERRIDE_SECS, STRIP_CHANNELS,
};
use crate::decode::Decoder;
use crate::engine::emit::{emission_plan, execute};
use crate::engine::{Decision, DecisionEngine};
use crate::frame::FrameSource;
use crate::locate::TargetLocator;
use crate::registry::Registry;
use crate::sink::InputSink;
use crate::snapshot::{CastHistory, CastRecord, StateSnapshot};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsafeReason {
    SentinelLost,
    PlayerDead,
    ChatOpen,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PulseOutcome {
    Debounced,
    Degraded,
    Unsafe { reason: UnsafeReason },
    Held,
    MechanicHold { aura_id: u32 },
    Idle,
    Emitted { decision: Decision },
    /// The sink refused the key; nothing reaches the cast history.
    Dropped { decision: Decision },
}

impl PulseOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Debounced => "debounced",
            Self::Degraded => "degraded",
            Self::Unsafe { .. } => "unsafe",
            Self::Held => "held",
            Self::MechanicHold { .. } => "mechanic_hold",
            Self::Idle => "idle",
            Self::Emitted { .. } => "emitted",
            Self::Dropped { .. } => "dropped",
        }
    }
}

/// Safety gates that need only the snapshot. Shared with the replay tool.
pub fn safety_gate(snap: &StateSnapshot) -> Option<PulseOutcome> {
    if !snap.sentinel_ok {
        return Some(PulseOutcome::Unsafe {
            reason: UnsafeReason::SentinelLost,
        });
    }
    if snap.health_percent <= 0.0 {
        return Some(PulseOutcome::Unsafe {
            reason: UnsafeReason::PlayerDead,
        });
    }
    if snap.chat_open {
        return Some(PulseOutcome::Unsafe {
            reason: UnsafeReason::ChatOpen,
        });
    }
    None
}

/// First stop-attack aura on the player (debuffs) or the target (buffs).
pub fn mechanic_guard(snap: &StateSnapshot, registry: &Registry) -> Option<u32> {
    let spec = registry.spec(snap.spec_id);
    snap.player_debuffs
        .ids()
        .chain(snap.target_buffs.ids())
        .find(|id| registry.is_stop_attack(spec, *id))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub debounce: Duration,
    pub override_window: Duration,
    pub debug: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEBOUNCE_MS),
            override_window: Duration::from_secs(MANUAL_OVERRIDE_SECS),
            debug: false,
        }
    }
}

pub struct PulseScheduler {
    engine: DecisionEngine,
    decoder: Decoder,
    frames: Arc<dyn FrameSource>,
    calibration: Option<Calibration>,
    locator: TargetLocator,
    sink: Box<dyn InputSink>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    last_input: Option<Duration>,
    last_snapshot: Option<StateSnapshot>,
    history: CastHistory,
    manual_override_until: Option<Duration>,
    emission_hold_until: Option<Duration>,
    coach_focus_pending: bool,
}

impl PulseScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<Registry>,
        frames: Arc<dyn FrameSource>,
        calibration: Option<Calibration>,
        locator: TargetLocator,
        sink: Box<dyn InputSink>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            decoder: Decoder::from_registry(&registry),
            engine: DecisionEngine::new(registry),
            frames,
            calibration,
            locator,
            sink,
            clock,
            settings,
            last_input: None,
            last_snapshot: None,
            history: CastHistory::default(),
            manual_override_until: None,
            emission_hold_until: None,
            coach_focus_pending: false,
        }
    }

    pub fn calibration(&self) -> Option<Calibration> {
        self.calibration
    }

    pub fn clear_calibration(&mut self) {
        self.calibration = None;
    }

    pub fn history(&self) -> &CastHistory {
        &self.history
    }

    pub fn last_snapshot(&self) -> Option<&StateSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn manual_override_until(&self) -> Option<Duration> {
        self.manual_override_until
    }

    /// Starts or cancels the emission hold. Returns whether it is now active.
    pub fn toggle_emission_hold(&mut self) -> bool {
        let now = self.clock.now();
        if self.hold_active(now) {
            self.emission_hold_until = None;
            false
        } else {
            self.emission_hold_until = Some(now + self.settings.override_window);
            true
        }
    }

    fn hold_active(&self, now: Duration) -> bool {
        self.emission_hold_until.is_some_and(|until| now < until)
    }

    fn capture(&self, calibration: Calibration) -> StateSnapshot {
        let now = self.clock.now();
        let width = STRIP_CHANNELS as u32 * calibration.stride;
        let strip = self.frames.grab_strip(calibration.y, width);
        let mut snap = self.decoder.decode(
            &strip,
            &calibration,
            self.last_snapshot.as_ref(),
            now.as_secs_f64(),
        );
        snap.cast_history = self.history.clone();
        snap
    }

    pub fn pulse(&mut self) -> PulseOutcome {
        let now = self.clock.now();
        let admitted = self
            .last_input
            .map_or(true, |previous| now.saturating_sub(previous) >= self.settings.debounce);
        self.last_input = Some(now);
        if !admitted {
            tracing::trace!("pulse debounced");
            return PulseOutcome::Debounced;
        }

        let Some(calibration) = self.calibration else {
            return PulseOutcome::Degraded;
        };

        let mut snap = self.capture(calibration);
        if snap.gcd_remaining > 0.0 && snap.gcd_remaining <= GCD_ALIGN_WINDOW_SECS {
            let wait = Duration::from_secs_f64(snap.gcd_remaining + GCD_ALIGN_PAD_SECS);
            tracing::trace!("aligning to gcd: sleeping {wait:?}");
            self.clock.sleep(wait);
            snap = self.capture(calibration);
        }
        let previous = self.last_snapshot.replace(snap.clone());

        if let Some(blocked) = safety_gate(&snap) {
            tracing::trace!("pulse blocked: {blocked:?}");
            return blocked;
        }
        if self.hold_active(self.clock.now()) {
            return PulseOutcome::Held;
        }
        if let Some(aura_id) = mechanic_guard(&snap, self.engine.registry()) {
            tracing::debug!("stop-attack aura {aura_id} active; holding");
            return PulseOutcome::MechanicHold { aura_id };
        }

        if snap.instance.is_pvp() {
            self.manage_focus(&snap, previous.as_ref());
        }

        let Some(decision) = self.engine.decide(&snap, &mut self.locator) else {
            return PulseOutcome::Idle;
        };
        if self.settings.debug {
            tracing::info!(
                "{:?} {} {} [{}]",
                decision.stage,
                decision.slot,
                decision.action,
                decision.key
            );
        }

        let steps = emission_plan(&decision, self.clock.now());
        let report = execute(&steps, self.sink.as_mut(), self.clock.as_ref());

        let at_secs = self.clock.now().as_secs_f64();
        if report.primary_pressed() {
            self.history.push(CastRecord {
                slot: decision.slot,
                action: decision.action.clone(),
                at_secs,
            });
        }
        if let Some(follow) = &decision.follow_up {
            if let (Some(slot), true) = (follow.slot, report.follow_up_pressed()) {
                self.history.push(CastRecord {
                    slot,
                    action: follow.action.clone(),
                    at_secs,
                });
            }
        }
        if report.primary_pressed() {
            PulseOutcome::Emitted { decision }
        } else {
            PulseOutcome::Dropped { decision }
        }
    }

    /// Arena/battleground focus handling. A focus change the coach did not
    /// cause starts the manual-override window; otherwise an unfocused
    /// player gets the first enemy healer focused.
    fn manage_focus(&mut self, snap: &StateSnapshot, previous: Option<&StateSnapshot>) {
        let now = self.clock.now();
        if let Some(prev) = previous {
            let changed = prev.focus.exists != snap.focus.exists
                || (snap.focus.exists && prev.focus.spec_id != snap.focus.spec_id);
            // A coach press is credited for one pulse only.
            let coach_pressed = std::mem::take(&mut self.coach_focus_pending);
            if changed && !coach_pressed {
                self.manual_override_until = Some(now + self.settings.override_window);
                tracing::debug!("manual focus change; auto-focus paused");
            } else if !changed && coach_pressed {
                tracing::debug!("auto-focus press had no effect");
            }
        }

        let overridden = self.manual_override_until.is_some_and(|until| now < until);
        if overridden || snap.focus.exists {
            return;
        }
        let Some(spec) = self.engine.registry().spec(snap.spec_id) else {
            return;
        };
        let healer = snap
            .enemies
            .iter()
            .position(|frame| HEALER_SPEC_IDS.contains(&frame.spec_id));
        let Some(key) = healer.and_then(|index| spec.overrides.focus_keys.get(index)) else {
            return;
        };
        tracing::info!("auto-focusing enemy healer with {key}");
        let key = key.clone();
        match self.sink.press(&key) {
            Ok(()) => self.coach_focus_pending = true,
            Err(err) => tracing::debug!("input sink dropped focus key {key}: {err:#}"),
        }
    }
}
