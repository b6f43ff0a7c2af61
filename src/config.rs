use crate::constants::{DEBOUNCE_MS, MANUAL_OVERRIDE_SECS};
use crate::scheduler::SchedulerSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEvent {
    Pulse,
    ToggleOverride,
    Quit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoachConfig {
    pub data_dir: PathBuf,
    pub debug: bool,
    pub debounce: Duration,
    pub override_window: Duration,
    /// Keypad input name to event. Names not listed fire a pulse.
    pub keypad: BTreeMap<String, InputEvent>,
    /// Fixed aim-jitter seed; the clock seeds it otherwise.
    pub jitter_seed: Option<u32>,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            debug: false,
            debounce: Duration::from_millis(DEBOUNCE_MS),
            override_window: Duration::from_secs(MANUAL_OVERRIDE_SECS),
            keypad: default_keypad(),
            jitter_seed: None,
        }
    }
}

pub fn default_keypad() -> BTreeMap<String, InputEvent> {
    BTreeMap::from([
        ("o".to_string(), InputEvent::ToggleOverride),
        ("override".to_string(), InputEvent::ToggleOverride),
        ("q".to_string(), InputEvent::Quit),
        ("quit".to_string(), InputEvent::Quit),
    ])
}

impl CoachConfig {
    /// `COACH_DATA_DIR`, `COACH_DEBUG`, `COACH_DEBOUNCE_MS`,
    /// `COACH_OVERRIDE_SECS`, `COACH_JITTER_SEED`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var("COACH_DATA_DIR")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            debug: read_env_bool("COACH_DEBUG"),
            debounce: Duration::from_millis(read_env_u64("COACH_DEBOUNCE_MS", DEBOUNCE_MS)),
            override_window: Duration::from_secs(read_env_u64(
                "COACH_OVERRIDE_SECS",
                MANUAL_OVERRIDE_SECS,
            )),
            keypad: defaults.keypad,
            jitter_seed: read_env_optional_u32("COACH_JITTER_SEED"),
        }
    }

    pub fn event_for(&self, input: &str) -> InputEvent {
        self.keypad
            .get(input.trim())
            .copied()
            .unwrap_or(InputEvent::Pulse)
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            debounce: self.debounce,
            override_window: self.override_window,
            debug: self.debug,
        }
    }
}

pub(crate) fn read_env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn read_env_optional_u32(name: &str) -> Option<u32> {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
}

pub(crate) fn read_env_bool(name: &str) -> bool {
    matches!(
        env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes")
    )
}
