//! Lifecycle: load data, calibrate, run pulses until quit.

use crate::calibrate::{calibrate, Calibration};
use crate::clock::Clock;
use crate::config::{CoachConfig, InputEvent};
use crate::frame::FrameSource;
use crate::humanize::JitterRng;
use crate::locate::TargetLocator;
use crate::registry::Registry;
use crate::scheduler::{PulseOutcome, PulseScheduler};
use crate::sink::InputSink;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub events: usize,
    pub pulses: usize,
    pub outcomes: BTreeMap<String, usize>,
    pub overrides_toggled: usize,
}

pub struct Controller {
    scheduler: PulseScheduler,
    registry: Arc<Registry>,
    degraded: bool,
}

impl Controller {
    /// Fails only when the data directory cannot be loaded. A missing
    /// telemetry strip leaves the controller running in degraded mode.
    pub fn start(
        config: &CoachConfig,
        frames: Arc<dyn FrameSource>,
        sink: Box<dyn InputSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let registry = Arc::new(
            Registry::load(&config.data_dir).with_context(|| {
                format!("failed loading coach data from {}", config.data_dir.display())
            })?,
        );

        let calibration = match calibrate(frames.as_ref()) {
            Ok(calibration) => Some(calibration),
            Err(err) => {
                tracing::warn!(
                    "{err}. Running in degraded mode: no input will be emitted. \
                     Make sure the telemetry strip is visible at the bottom of the screen."
                );
                None
            }
        };

        let rng = match config.jitter_seed {
            Some(seed) => JitterRng::new(seed),
            None => JitterRng::from_clock(clock.now()),
        };
        let locator = TargetLocator::new(frames.clone(), rng);
        let scheduler = PulseScheduler::new(
            registry.clone(),
            frames,
            calibration,
            locator,
            sink,
            clock,
            config.scheduler_settings(),
        );

        tracing::info!(
            "coach started: {} specs, debug={}",
            registry.known_spec_ids().len(),
            config.debug
        );
        Ok(Self {
            scheduler,
            registry,
            degraded: calibration.is_none(),
        })
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn calibration(&self) -> Option<Calibration> {
        self.scheduler.calibration()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scheduler(&self) -> &PulseScheduler {
        &self.scheduler
    }

    /// Handles one event; `None` for non-pulse events.
    pub fn handle(&mut self, event: InputEvent) -> Option<PulseOutcome> {
        match event {
            InputEvent::Pulse => Some(self.scheduler.pulse()),
            InputEvent::ToggleOverride => {
                let active = self.scheduler.toggle_emission_hold();
                tracing::info!("manual override {}", if active { "on" } else { "off" });
                None
            }
            InputEvent::Quit => None,
        }
    }

    /// Blocks on `events` until it ends or yields `Quit`.
    pub fn run<I>(&mut self, events: I) -> RunSummary
    where
        I: IntoIterator<Item = InputEvent>,
    {
        let mut summary = RunSummary::default();
        for event in events {
            summary.events += 1;
            match event {
                InputEvent::Quit => break,
                InputEvent::ToggleOverride => summary.overrides_toggled += 1,
                InputEvent::Pulse => summary.pulses += 1,
            }
            if let Some(outcome) = self.handle(event) {
                *summary
                    .outcomes
                    .entry(outcome.label().to_string())
                    .or_default() += 1;
            }
        }
        summary
    }

    /// Drops the calibration; the controller must be started again to emit.
    pub fn shutdown(&mut self) {
        self.scheduler.clear_calibration();
        self.degraded = true;
        tracing::info!("coach stopped");
    }
}
