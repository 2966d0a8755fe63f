//! # Logger
//!
//! Structured diagnostics for the statement parsers.
//!
//! Parsing components never print. Each stage emits [`DiagnosticEvent`]s
//! (`{stage, level, message, data}`) into a [`DiagnosticSink`] chosen by the
//! caller:
//!
//! - [`NoopSink`] discards everything (library default)
//! - [`TracingSink`] forwards to `tracing` (binaries)
//! - [`MemorySink`] keeps the events so tests can assert against them
//!
//! Binaries install a subscriber once with [`init_tracing`].

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEvent {
    pub stage: &'static str,
    pub level: Level,
    pub message: String,
    pub data: Value,
    pub at: DateTime<Utc>,
}

impl DiagnosticEvent {
    pub fn new(stage: &'static str, level: Level, message: impl Into<String>, data: Value) -> Self {
        Self {
            stage,
            level,
            message: message.into(),
            data,
            at: Utc::now(),
        }
    }
}

/// Receiver of diagnostic events.
pub trait DiagnosticSink {
    fn emit(&self, event: DiagnosticEvent);

    fn debug(&self, stage: &'static str, message: &str, data: Value) {
        self.emit(DiagnosticEvent::new(stage, Level::Debug, message, data));
    }

    fn info(&self, stage: &'static str, message: &str, data: Value) {
        self.emit(DiagnosticEvent::new(stage, Level::Info, message, data));
    }

    fn warn(&self, stage: &'static str, message: &str, data: Value) {
        self.emit(DiagnosticEvent::new(stage, Level::Warn, message, data));
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn emit(&self, _event: DiagnosticEvent) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        match event.level {
            Level::Debug => {
                tracing::debug!(stage = event.stage, data = %event.data, "{}", event.message)
            }
            Level::Info => {
                tracing::info!(stage = event.stage, data = %event.data, "{}", event.message)
            }
            Level::Warn => {
                tracing::warn!(stage = event.stage, data = %event.data, "{}", event.message)
            }
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn events_for(&self, stage: &str) -> Vec<DiagnosticEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.stage == stage)
            .collect()
    }

    /// True if any event of `stage` has a message containing `needle`.
    pub fn contains(&self, stage: &str, needle: &str) -> bool {
        self.events_for(stage)
            .iter()
            .any(|e| e.message.contains(needle))
    }

    pub fn count_at(&self, level: Level) -> usize {
        self.events().iter().filter(|e| e.level == level).count()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Installs a fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .try_init();
}
