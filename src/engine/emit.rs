use super::{AimCommand, Decision};
use crate::clock::Clock;
use crate::constants::GHOST_SYNC_DELAY_MS;
use crate::humanize::flick_settle_delay;
use crate::sink::InputSink;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmitStep {
    Flick { dx: i32, dy: i32 },
    Warp { x: i32, y: i32 },
    Pause(Duration),
    Press(String),
}

/// Orders the sink calls for one decision: aim, settle pause, key, then the
/// ghost-synced follow-up.
pub fn emission_plan(decision: &Decision, now: Duration) -> Vec<EmitStep> {
    let mut steps = Vec::with_capacity(6);
    let latency = Duration::from_millis(decision.pre_press_ms);

    match decision.aim {
        Some(aim) => {
            steps.push(match aim {
                AimCommand::Flick { dx, dy } => EmitStep::Flick { dx, dy },
                AimCommand::Warp { x, y } => EmitStep::Warp { x, y },
            });
            steps.push(EmitStep::Pause(flick_settle_delay(now) + latency));
        }
        None if !latency.is_zero() => steps.push(EmitStep::Pause(latency)),
        None => {}
    }
    steps.push(EmitStep::Press(decision.key.clone()));

    if let Some(follow_up) = &decision.follow_up {
        steps.push(EmitStep::Pause(Duration::from_millis(GHOST_SYNC_DELAY_MS)));
        steps.push(EmitStep::Press(follow_up.key.clone()));
    }
    steps
}

/// What reached the sink while running a plan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecuteReport {
    pub failed: usize,
    /// One entry per `Press` step, in plan order.
    pub presses: Vec<bool>,
}

impl ExecuteReport {
    pub fn primary_pressed(&self) -> bool {
        self.presses.first().copied().unwrap_or(false)
    }

    pub fn follow_up_pressed(&self) -> bool {
        self.presses.get(1).copied().unwrap_or(false)
    }
}

/// Runs a plan. Sink failures are logged and dropped, never retried.
pub fn execute(steps: &[EmitStep], sink: &mut dyn InputSink, clock: &dyn Clock) -> ExecuteReport {
    let mut report = ExecuteReport::default();
    for step in steps {
        let result = match step {
            EmitStep::Flick { dx, dy } => sink.flick(*dx, *dy),
            EmitStep::Warp { x, y } => sink.warp_to(*x, *y),
            EmitStep::Press(key) => sink.press(key),
            EmitStep::Pause(duration) => {
                clock.sleep(*duration);
                Ok(())
            }
        };
        if let EmitStep::Press(_) = step {
            report.presses.push(result.is_ok());
        }
        if let Err(err) = result {
            report.failed += 1;
            tracing::debug!("input sink dropped {step:?}: {err:#}");
        }
    }
    report
}
