//! Output surface. The coach never reads back from the sink; every call is
//! best effort and failures are dropped by the scheduler.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub trait InputSink: Send {
    fn press(&mut self, key: &str) -> Result<()>;
    /// Relative pointer move in logical pixels.
    fn flick(&mut self, dx: i32, dy: i32) -> Result<()>;
    /// Absolute pointer move in logical pixels.
    fn warp_to(&mut self, x: i32, y: i32) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SinkCall {
    Press { key: String },
    Flick { dx: i32, dy: i32 },
    WarpTo { x: i32, y: i32 },
}

/// Keeps every call in order. Clones share the log, so a test can hand one
/// clone to the controller and inspect the other.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    unavailable: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn presses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Press { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    /// While unavailable every call fails and nothing is recorded.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: SinkCall) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("input device unavailable"));
        }
        let mut calls = self
            .calls
            .lock()
            .map_err(|_| anyhow::anyhow!("recording sink poisoned"))?;
        calls.push(call);
        Ok(())
    }
}

impl InputSink for RecordingSink {
    fn press(&mut self, key: &str) -> Result<()> {
        self.record(SinkCall::Press {
            key: key.to_string(),
        })
    }

    fn flick(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.record(SinkCall::Flick { dx, dy })
    }

    fn warp_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.record(SinkCall::WarpTo { x, y })
    }
}

/// Prints recommendations instead of synthesizing input.
pub struct AdvisorySink<W: Write + Send> {
    out: W,
}

impl AdvisorySink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> AdvisorySink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: String) -> Result<()> {
        writeln!(self.out, "{text}").context("failed writing recommendation")?;
        self.out.flush().context("failed flushing recommendation")
    }
}

impl<W: Write + Send> InputSink for AdvisorySink<W> {
    fn press(&mut self, key: &str) -> Result<()> {
        self.line(format!("press {key}"))
    }

    fn flick(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.line(format!("aim {dx:+} {dy:+}"))
    }

    fn warp_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.line(format!("aim at {x},{y}"))
    }
}
