use anyhow::{anyhow, Result};
use rotation_coach::channels::{self, encode_spec_id, spec_index, Rgb, StripEncoder};
use rotation_coach::clock::ManualClock;
use rotation_coach::config::{CoachConfig, InputEvent};
use rotation_coach::controller::Controller;
use rotation_coach::engine::Stage;
use rotation_coach::frame::{DisplayGeometry, MemoryFrameSource, Rect, ScreenBuffer};
use rotation_coach::scheduler::{PulseOutcome, UnsafeReason};
use rotation_coach::sink::{RecordingSink, SinkCall};
use rotation_coach::snapshot::InstanceKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;
const STRIP_ROW: u32 = HEIGHT - 1;

fn repo_path(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(path)
}

/// Arms warrior in melee with a live hostile target and every cooldown ready.
fn arms_in_melee() -> StripEncoder {
    let mut strip = StripEncoder::new();
    strip
        .set(channels::SPEC, encode_spec_id(71))
        .set(channels::PLAYER, Rgb::new(100, 0, 0))
        .set(channels::PRIMARY, Rgb::new(50, 0, 50))
        .set(channels::PLAYER_FLAGS, Rgb::new(255, 0, 255))
        .set(channels::TARGET_FLAGS, Rgb::new(255, 255, 255))
        .set(channels::TARGET_FLAGS_2, Rgb::new(255, 255, 0))
        .set(channels::TARGET_HEALTH, Rgb::new(60, spec_index(250), 0))
        .set(channels::GROUP, Rgb::new(1, 1, InstanceKind::World.code()));
    strip
}

fn target_casting(strip: &mut StripEncoder, spell_id: u32, progress: u8) {
    strip
        .set(channels::TARGET_CAST, Rgb::new(255, 255, progress))
        .set_id16(channels::TARGET_CAST_ID, spell_id);
}

fn screen_with(strip: &StripEncoder, plate_at: Option<(u32, u32)>) -> ScreenBuffer {
    let mut screen = ScreenBuffer::blank(WIDTH, HEIGHT);
    screen.paint_row(STRIP_ROW, &strip.to_bgra(1));
    if let Some((cx, cy)) = plate_at {
        screen.fill_rect(
            Rect {
                x: cx - 40,
                y: cy - 4,
                width: 80,
                height: 8,
            },
            [220, 30, 30],
        );
    }
    screen
}

struct Rig {
    controller: Controller,
    sink: RecordingSink,
    frames: Arc<MemoryFrameSource>,
    clock: ManualClock,
}

impl Rig {
    fn start(screen: ScreenBuffer) -> Result<Self> {
        let config = CoachConfig {
            data_dir: repo_path("data"),
            jitter_seed: Some(7),
            ..CoachConfig::default()
        };
        let frames = Arc::new(MemoryFrameSource::new(
            DisplayGeometry::uniform(WIDTH, HEIGHT, 1),
            screen,
        ));
        let sink = RecordingSink::new();
        let clock = ManualClock::at(Duration::from_secs(10_000));
        let controller = Controller::start(
            &config,
            frames.clone(),
            Box::new(sink.clone()),
            Arc::new(clock.clone()),
        )?;
        Ok(Self {
            controller,
            sink,
            frames,
            clock,
        })
    }

    fn pulse(&mut self) -> Result<PulseOutcome> {
        self.controller
            .handle(InputEvent::Pulse)
            .ok_or_else(|| anyhow!("pulse produced no outcome"))
    }

    /// Moves past the debounce window before the next pulse.
    fn later(&self) {
        self.clock.advance_ms(200);
    }
}

fn emitted_stage(outcome: &PulseOutcome) -> Option<Stage> {
    match outcome {
        PulseOutcome::Emitted { decision } => Some(decision.stage),
        _ => None,
    }
}

#[test]
fn cold_boot_without_strip_stays_silent() -> Result<()> {
    let mut rig = Rig::start(ScreenBuffer::blank(WIDTH, HEIGHT))?;
    assert!(rig.controller.is_degraded());
    assert_eq!(rig.controller.calibration(), None);
    for _ in 0..3 {
        assert_eq!(rig.pulse()?, PulseOutcome::Degraded);
        rig.later();
    }
    assert!(rig.sink.calls().is_empty());
    Ok(())
}

#[test]
fn late_cast_is_interrupted() -> Result<()> {
    let mut strip = arms_in_melee();
    target_casting(&mut strip, 2061, 90);
    let mut rig = Rig::start(screen_with(&strip, None))?;
    assert!(!rig.controller.is_degraded());

    let outcome = rig.pulse()?;
    assert_eq!(emitted_stage(&outcome), Some(Stage::Interrupt));
    assert_eq!(
        rig.sink.calls(),
        vec![SinkCall::Press {
            key: "F1".to_string()
        }]
    );
    Ok(())
}

#[test]
fn early_cast_falls_through_to_rotation() -> Result<()> {
    let mut strip = arms_in_melee();
    target_casting(&mut strip, 2061, 70);
    let mut rig = Rig::start(screen_with(&strip, None))?;

    let outcome = rig.pulse()?;
    assert_eq!(emitted_stage(&outcome), Some(Stage::Rotation));
    assert_eq!(rig.sink.presses(), vec!["7".to_string()]);
    Ok(())
}

#[test]
fn proc_beats_higher_priority_slot() -> Result<()> {
    let mut strip = arms_in_melee();
    strip.set_id16(channels::PROC, 52437);
    let mut rig = Rig::start(screen_with(&strip, None))?;

    let outcome = rig.pulse()?;
    assert_eq!(emitted_stage(&outcome), Some(Stage::Proc));
    assert_eq!(rig.sink.presses(), vec!["9".to_string()]);
    Ok(())
}

#[test]
fn low_health_presses_the_defensive() -> Result<()> {
    let mut strip = arms_in_melee();
    strip.set(channels::PLAYER, Rgb::new(20, 0, 0));
    let mut rig = Rig::start(screen_with(&strip, None))?;

    let outcome = rig.pulse()?;
    assert_eq!(emitted_stage(&outcome), Some(Stage::LifeSafety));
    assert_eq!(rig.sink.presses(), vec!["F5".to_string()]);
    Ok(())
}

#[test]
fn aimed_leap_leads_a_moving_target() -> Result<()> {
    let mut strip = arms_in_melee();
    strip
        .set(channels::PLAYER_FLAGS, Rgb::new(255, 0, 0))
        .set(channels::TARGET_FLAGS_2, Rgb::new(255, 255, 255));
    let mut rig = Rig::start(screen_with(&strip, Some((660, 300))))?;

    // First sighting: no velocity yet.
    let first = rig.pulse()?;
    assert_eq!(emitted_stage(&first), Some(Stage::Rotation));
    let seen_at = rig
        .controller
        .scheduler()
        .last_snapshot()
        .map(|snap| snap.taken_at_secs)
        .ok_or_else(|| anyhow!("no snapshot"))?;

    rig.sink.clear();
    rig.frames.replace(screen_with(&strip, Some((700, 300))));
    rig.clock.set(Duration::from_secs_f64(seen_at + 0.2));
    rig.pulse()?;

    let calls = rig.sink.calls();
    assert_eq!(calls.len(), 2, "calls={calls:?}");
    let SinkCall::Flick { dx, dy } = calls[0] else {
        return Err(anyhow!("expected a flick first, got {:?}", calls[0]));
    };
    // Plate centroid 699.5 plus 200 px/s * 0.15 s of lead, jitter within 5 px.
    assert!((-236..=-225).contains(&dx), "dx={dx}");
    // Centroid 299.5 plus the feet offset for ~354 px from centre, jitter within 3 px.
    assert!((-213..=-205).contains(&dy), "dy={dy}");
    assert_eq!(
        calls[1],
        SinkCall::Press {
            key: "5".to_string()
        }
    );
    Ok(())
}

#[test]
fn debounce_admits_one_pulse_per_quiet_gap() -> Result<()> {
    // Degraded so admitted pulses return immediately without sleeping.
    let mut rig = Rig::start(ScreenBuffer::blank(WIDTH, HEIGHT))?;
    let gaps_ms = [100, 100, 200, 50, 150, 149, 149, 300, 10, 151];
    let mut admitted = usize::from(rig.pulse()? == PulseOutcome::Degraded);
    for gap in gaps_ms {
        rig.clock.advance_ms(gap);
        if rig.pulse()? == PulseOutcome::Degraded {
            admitted += 1;
        }
    }
    let quiet_gaps = gaps_ms.iter().filter(|gap| **gap >= 150).count();
    assert_eq!(admitted, quiet_gaps + 1);
    Ok(())
}

#[test]
fn lost_sentinel_blocks_every_call() -> Result<()> {
    let mut strip = arms_in_melee();
    strip.set(channels::PLAYER, Rgb::new(20, 0, 0));
    let mut rig = Rig::start(screen_with(&strip, None))?;

    strip.set(channels::SENTINEL, Rgb::new(128, 128, 128));
    rig.frames.replace(screen_with(&strip, None));
    assert_eq!(
        rig.pulse()?,
        PulseOutcome::Unsafe {
            reason: UnsafeReason::SentinelLost
        }
    );
    assert!(rig.sink.calls().is_empty());
    Ok(())
}

#[test]
fn dead_player_and_open_chat_are_unsafe() -> Result<()> {
    let mut strip = arms_in_melee();
    strip.set(channels::PLAYER, Rgb::new(0, 0, 0));
    let mut rig = Rig::start(screen_with(&strip, None))?;
    assert_eq!(
        rig.pulse()?,
        PulseOutcome::Unsafe {
            reason: UnsafeReason::PlayerDead
        }
    );

    strip.set(channels::PLAYER, Rgb::new(100, 0, 255));
    rig.frames.replace(screen_with(&strip, None));
    rig.later();
    assert_eq!(
        rig.pulse()?,
        PulseOutcome::Unsafe {
            reason: UnsafeReason::ChatOpen
        }
    );
    assert!(rig.sink.calls().is_empty());
    Ok(())
}

#[test]
fn stop_attack_aura_holds_offensive_output() -> Result<()> {
    let mut strip = arms_in_melee();
    // Tracked aura channel 5 is the stop-attack debuff in the Arms layout.
    strip.set(channels::AURAS + 5, Rgb::new(6, 1, 0));
    let mut rig = Rig::start(screen_with(&strip, None))?;

    assert_eq!(
        rig.pulse()?,
        PulseOutcome::MechanicHold { aura_id: 209915 }
    );
    assert!(rig.sink.calls().is_empty());
    Ok(())
}

#[test]
fn hazard_debuff_triggers_escape() -> Result<()> {
    let mut strip = arms_in_melee();
    // Tracked aura channel 4 is a hazard debuff.
    strip.set(channels::AURAS + 4, Rgb::new(3, 1, 0));
    let mut rig = Rig::start(screen_with(&strip, None))?;

    let outcome = rig.pulse()?;
    assert_eq!(emitted_stage(&outcome), Some(Stage::HazardEscape));
    assert_eq!(rig.sink.presses(), vec!["F6".to_string()]);
    Ok(())
}

#[test]
fn emission_hold_toggles() -> Result<()> {
    let strip = arms_in_melee();
    let mut rig = Rig::start(screen_with(&strip, None))?;

    assert_eq!(rig.controller.handle(InputEvent::ToggleOverride), None);
    assert_eq!(rig.pulse()?, PulseOutcome::Held);
    assert!(rig.sink.calls().is_empty());

    rig.controller.handle(InputEvent::ToggleOverride);
    rig.later();
    assert_eq!(emitted_stage(&rig.pulse()?), Some(Stage::Rotation));
    assert_eq!(rig.sink.presses(), vec!["7".to_string()]);
    Ok(())
}

#[test]
fn gcd_tail_is_slept_before_deciding() -> Result<()> {
    let mut strip = arms_in_melee();
    strip.set(channels::TIMING, Rgb::new(5, 0, 0));
    let mut rig = Rig::start(screen_with(&strip, None))?;

    rig.pulse()?;
    let sleeps = rig.clock.sleeps();
    assert_eq!(sleeps.len(), 1, "sleeps={sleeps:?}");
    assert!((sleeps[0].as_secs_f64() - 0.06).abs() < 1e-6);
    assert_eq!(rig.sink.presses(), vec!["7".to_string()]);
    Ok(())
}

#[test]
fn ghost_sync_presses_the_follow_up() -> Result<()> {
    let mut strip = arms_in_melee();
    strip.set(channels::GROUP, Rgb::new(3, 2, InstanceKind::Party.code()));
    let mut rig = Rig::start(screen_with(&strip, None))?;

    rig.pulse()?;
    assert_eq!(rig.sink.presses(), vec!["F3".to_string(), "4".to_string()]);
    assert_eq!(rig.clock.sleeps(), vec![Duration::from_millis(20)]);
    let actions: Vec<String> = rig
        .controller
        .scheduler()
        .history()
        .iter()
        .map(|record| record.action.clone())
        .collect();
    assert_eq!(actions, vec!["Sweeping Strikes", "Whirlwind"]);
    Ok(())
}

#[test]
fn arena_focuses_enemy_healer_until_player_takes_over() -> Result<()> {
    let mut strip = arms_in_melee();
    strip
        .set(channels::GROUP, Rgb::new(1, 1, InstanceKind::Arena.code()))
        .set(channels::ENEMY_FRAMES, Rgb::new(90, spec_index(71), 0))
        .set(channels::ENEMY_FRAMES + 1, Rgb::new(80, spec_index(65), 0));
    let mut rig = Rig::start(screen_with(&strip, None))?;

    rig.pulse()?;
    assert_eq!(rig.sink.presses(), vec!["F11".to_string(), "7".to_string()]);

    // The coach's own focus change is not a manual override.
    strip
        .set(channels::FOCUS_FLAGS, Rgb::new(255, 255, 0))
        .set(channels::FOCUS_STATE, Rgb::new(80, spec_index(65), 0));
    rig.frames.replace(screen_with(&strip, None));
    rig.sink.clear();
    rig.later();
    rig.pulse()?;
    assert_eq!(rig.controller.scheduler().manual_override_until(), None);
    assert_eq!(rig.sink.presses(), vec!["7".to_string()]);

    // Player clears focus: auto-focus pauses instead of re-focusing.
    strip
        .set(channels::FOCUS_FLAGS, Rgb::new(0, 0, 0))
        .set(channels::FOCUS_STATE, Rgb::new(0, 0, 0));
    rig.frames.replace(screen_with(&strip, None));
    rig.sink.clear();
    rig.later();
    rig.pulse()?;
    assert!(rig.controller.scheduler().manual_override_until().is_some());
    assert_eq!(rig.sink.presses(), vec!["7".to_string()]);
    Ok(())
}

#[test]
fn ignored_auto_focus_does_not_swallow_the_next_manual_change() -> Result<()> {
    let mut strip = arms_in_melee();
    strip
        .set(channels::GROUP, Rgb::new(1, 1, InstanceKind::Arena.code()))
        .set(channels::ENEMY_FRAMES, Rgb::new(90, spec_index(71), 0))
        .set(channels::ENEMY_FRAMES + 1, Rgb::new(80, spec_index(65), 0));
    let mut rig = Rig::start(screen_with(&strip, None))?;

    rig.pulse()?;
    assert_eq!(rig.sink.presses(), vec!["F11".to_string(), "7".to_string()]);

    // The game ignored F11 and the healer frame went away.
    strip.set(channels::ENEMY_FRAMES + 1, Rgb::new(0, 0, 0));
    rig.frames.replace(screen_with(&strip, None));
    rig.sink.clear();
    rig.later();
    rig.pulse()?;
    assert_eq!(rig.sink.presses(), vec!["7".to_string()]);

    // The player focuses the warrior themselves.
    strip
        .set(channels::FOCUS_FLAGS, Rgb::new(255, 255, 0))
        .set(channels::FOCUS_STATE, Rgb::new(90, spec_index(71), 0));
    rig.frames.replace(screen_with(&strip, None));
    rig.later();
    rig.pulse()?;
    assert!(rig.controller.scheduler().manual_override_until().is_some());
    Ok(())
}

#[test]
fn unavailable_sink_drops_the_emit_and_keeps_history_clean() -> Result<()> {
    let mut rig = Rig::start(screen_with(&arms_in_melee(), None))?;
    rig.sink.set_unavailable(true);

    let outcome = rig.pulse()?;
    assert_eq!(outcome.label(), "dropped");
    assert!(rig.sink.calls().is_empty());
    assert!(rig.controller.scheduler().history().is_empty());

    // Once the device is back the same action goes out and is recorded.
    rig.sink.set_unavailable(false);
    rig.later();
    let outcome = rig.pulse()?;
    assert_eq!(outcome.label(), "emitted");
    assert_eq!(rig.sink.presses(), vec!["7".to_string()]);
    let actions: Vec<String> = rig
        .controller
        .scheduler()
        .history()
        .iter()
        .map(|record| record.action.clone())
        .collect();
    assert_eq!(actions, vec!["Colossus Smash"]);
    Ok(())
}

#[test]
fn unavailable_sink_does_not_record_the_ghost_synced_pair() -> Result<()> {
    let mut strip = arms_in_melee();
    strip.set(channels::GROUP, Rgb::new(3, 2, InstanceKind::Party.code()));
    let mut rig = Rig::start(screen_with(&strip, None))?;
    rig.sink.set_unavailable(true);

    match rig.pulse()? {
        PulseOutcome::Dropped { decision } => {
            assert_eq!(decision.action, "Sweeping Strikes");
            assert!(decision.follow_up.is_some());
        }
        other => return Err(anyhow!("expected a dropped emit, got {other:?}")),
    }
    assert!(rig.controller.scheduler().history().is_empty());
    Ok(())
}

#[test]
fn run_stops_at_quit_and_counts_outcomes() -> Result<()> {
    let mut rig = Rig::start(ScreenBuffer::blank(WIDTH, HEIGHT))?;
    let summary = rig.controller.run([
        InputEvent::Pulse,
        InputEvent::Pulse,
        InputEvent::ToggleOverride,
        InputEvent::Quit,
        InputEvent::Pulse,
    ]);
    assert_eq!(summary.events, 4);
    assert_eq!(summary.pulses, 2);
    assert_eq!(summary.overrides_toggled, 1);
    // Same clock instant: the second pulse is debounced.
    assert_eq!(summary.outcomes.get("degraded"), Some(&1));
    assert_eq!(summary.outcomes.get("debounced"), Some(&1));
    Ok(())
}

#[test]
fn shutdown_drops_calibration() -> Result<()> {
    let mut rig = Rig::start(screen_with(&arms_in_melee(), None))?;
    assert!(rig.controller.calibration().is_some());
    rig.controller.shutdown();
    assert!(rig.controller.is_degraded());
    assert_eq!(rig.pulse()?, PulseOutcome::Degraded);
    assert!(rig.sink.calls().is_empty());
    Ok(())
}

#[test]
fn missing_data_refuses_to_start() -> Result<()> {
    let empty = tempfile::tempdir()?;
    let config = CoachConfig {
        data_dir: empty.path().to_path_buf(),
        ..CoachConfig::default()
    };
    let frames = Arc::new(MemoryFrameSource::new(
        DisplayGeometry::uniform(WIDTH, HEIGHT, 1),
        ScreenBuffer::blank(WIDTH, HEIGHT),
    ));
    let result = Controller::start(
        &config,
        frames,
        Box::new(RecordingSink::new()),
        Arc::new(ManualClock::default()),
    );
    assert!(result.is_err());
    Ok(())
}

#[test]
fn aim_jitter_averages_out_over_a_hundred_emits() -> Result<()> {
    let mut strip = arms_in_melee();
    strip.set(channels::PLAYER_FLAGS, Rgb::new(255, 0, 0));
    let mut rig = Rig::start(screen_with(&strip, Some((700, 300))))?;

    let mut flicks = Vec::new();
    for _ in 0..100 {
        rig.sink.clear();
        rig.later();
        rig.pulse()?;
        for call in rig.sink.calls() {
            if let SinkCall::Flick { dx, dy } = call {
                flicks.push((dx, dy));
            }
        }
    }
    assert_eq!(flicks.len(), 100);

    // Unjittered flick from the centre to the plate's feet.
    let distance = (260.5f64.powi(2) + 240.5f64.powi(2)).sqrt();
    let base_dx = 699.5 - 960.0;
    let base_dy = 299.5 + rotation_coach::locate::feet_offset(distance) - 540.0;
    let mean_dx = flicks.iter().map(|(dx, _)| *dx as f64 - base_dx).sum::<f64>() / 100.0;
    let mean_dy = flicks.iter().map(|(_, dy)| *dy as f64 - base_dy).sum::<f64>() / 100.0;
    assert!(mean_dx.abs() <= 2.0, "mean dx jitter {mean_dx}");
    assert!(mean_dy.abs() <= 2.0, "mean dy jitter {mean_dy}");
    for (dx, dy) in &flicks {
        assert!((*dx as f64 - base_dx).abs() <= 15.0);
        assert!((*dy as f64 - base_dy).abs() <= 15.0);
    }

    for pause in rig.clock.sleeps() {
        assert!(
            (5..=35).contains(&pause.as_millis()),
            "settle pause {pause:?} outside 20 +/- 15 ms"
        );
    }
    Ok(())
}
