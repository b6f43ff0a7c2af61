//! Offline replay of recorded snapshots against the engine.
//!
//! A scenario file holds one snapshot, an optional preset aim point and the
//! expected outcome. Scenarios are independent, so they run in parallel.

use crate::engine::{DecisionEngine, Stage};
use crate::locate::{FeetPoint, FixedAim};
use crate::registry::{Registry, SlotId};
use crate::scheduler::{mechanic_guard, safety_gate, PulseOutcome};
use crate::snapshot::StateSnapshot;
use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Expectation {
    /// `None` expects silence.
    #[serde(default)]
    pub slot: Option<SlotId>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub outcome: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Scenario {
    pub name: String,
    pub snapshot: StateSnapshot,
    #[serde(default = "default_center")]
    pub screen_center: (f64, f64),
    #[serde(default)]
    pub feet: Option<FeetPoint>,
    /// Landing point for an aimed hazard escape.
    #[serde(default)]
    pub escape: Option<(f64, f64)>,
    #[serde(default)]
    pub expect: Expectation,
}

fn default_center() -> (f64, f64) {
    (960.0, 540.0)
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioResult {
    pub file: PathBuf,
    pub name: String,
    pub outcome: PulseOutcome,
    pub passed: bool,
    pub mismatches: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReplayReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioResult>,
}

#[derive(Clone, Debug)]
pub struct ReplayConfig {
    pub scenarios_dir: PathBuf,
    pub jobs: Option<usize>,
}

/// Gates then engine, without sleeping or touching a sink.
pub fn evaluate(engine: &DecisionEngine, scenario: &Scenario) -> PulseOutcome {
    let snap = &scenario.snapshot;
    if let Some(blocked) = safety_gate(snap) {
        return blocked;
    }
    if let Some(aura_id) = mechanic_guard(snap, engine.registry()) {
        return PulseOutcome::MechanicHold { aura_id };
    }
    let mut aim = FixedAim {
        center: scenario.screen_center,
        feet: scenario.feet,
        escape: scenario.escape,
    };
    match engine.decide(snap, &mut aim) {
        Some(decision) => PulseOutcome::Emitted { decision },
        None => PulseOutcome::Idle,
    }
}

fn check(expect: &Expectation, outcome: &PulseOutcome) -> Vec<String> {
    let mut mismatches = Vec::new();
    if let Some(label) = &expect.outcome {
        if label != outcome.label() {
            mismatches.push(format!("outcome {} != expected {label}", outcome.label()));
        }
    }
    let decision = match outcome {
        PulseOutcome::Emitted { decision } => Some(decision),
        _ => None,
    };
    match (expect.slot, decision) {
        (Some(slot), Some(decision)) if decision.slot != slot => {
            mismatches.push(format!("chose {} expected {slot}", decision.slot));
        }
        (Some(slot), None) => mismatches.push(format!("chose nothing expected {slot}")),
        _ => {}
    }
    if let (Some(key), Some(decision)) = (&expect.key, decision) {
        if &decision.key != key {
            mismatches.push(format!("pressed {} expected {key}", decision.key));
        }
    }
    if let (Some(stage), Some(decision)) = (expect.stage, decision) {
        if decision.stage != stage {
            mismatches.push(format!("stage {:?} expected {stage:?}", decision.stage));
        }
    }
    mismatches
}

fn run_one(engine: &DecisionEngine, path: &Path) -> Result<ScenarioResult> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    let mut scenario: Scenario =
        serde_json::from_str(&raw).with_context(|| format!("invalid scenario {}", path.display()))?;
    scenario.snapshot.refresh_derived();
    let outcome = evaluate(engine, &scenario);
    let mismatches = check(&scenario.expect, &outcome);
    Ok(ScenarioResult {
        file: path.to_path_buf(),
        name: scenario.name,
        outcome,
        passed: mismatches.is_empty(),
        mismatches,
    })
}

pub fn run_replay(registry: Arc<Registry>, config: &ReplayConfig) -> Result<ReplayReport> {
    if let Some(jobs) = config.jobs {
        if jobs == 0 {
            return Err(anyhow!("replay --jobs must be >= 1 when provided"));
        }
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(&config.scenarios_dir)
        .with_context(|| format!("failed reading {}", config.scenarios_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(anyhow!(
            "no scenario files in {}",
            config.scenarios_dir.display()
        ));
    }

    let engine = DecisionEngine::new(registry);
    let run = |path: &PathBuf| run_one(&engine, path);
    let results: Vec<Result<ScenarioResult>> = if let Some(jobs) = config.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| files.par_iter().map(run).collect())
    } else {
        files.par_iter().map(run).collect()
    };

    let mut collected = Vec::with_capacity(results.len());
    for result in results {
        collected.push(result?);
    }
    let passed = collected.iter().filter(|result| result.passed).count();
    for failed in collected.iter().filter(|result| !result.passed) {
        tracing::warn!("{}: {}", failed.name, failed.mismatches.join("; "));
    }
    Ok(ReplayReport {
        total: collected.len(),
        passed,
        failed: collected.len() - passed,
        results: collected,
    })
}

pub fn write_report(path: &Path, report: &ReplayReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("failed writing {}", path.display()))
}
