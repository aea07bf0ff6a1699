//! Build progress reporting.
//!
//! The library never prints; it hands [`ProgressEvent`]s to an optional
//! callback and the CLI decides how to show them.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stages of an index build, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    Discover,
    Load,
    Chunk,
    Embed,
    Persist,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Discover => "discover",
            BuildPhase::Load => "load",
            BuildPhase::Chunk => "chunk",
            BuildPhase::Embed => "embed",
            BuildPhase::Persist => "persist",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: BuildPhase,
    /// Units done so far: files, pages or vectors depending on the phase
    pub current: u64,
    pub total: Option<u64>,
    pub message: String,
    /// Time since the reporter was created
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl ProgressEvent {
    pub fn new(phase: BuildPhase, current: u64, total: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            phase,
            current,
            total,
            message: message.into(),
            elapsed: Duration::ZERO,
        }
    }

    /// Percent complete when the total is known and non-zero.
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.current as f64 * 100.0 / total as f64),
            _ => None,
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.phase.as_str())?;
        match self.total {
            Some(total) => write!(f, "{}/{}", self.current, total)?,
            None => write!(f, "{}", self.current)?,
        }
        if let Some(pct) = self.percentage() {
            write!(f, " ({:.0}%)", pct)?;
        }
        write!(f, " - {}", self.message)
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Cheap to clone; clones share the callback and the start instant.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            started: Instant::now(),
        }
    }

    pub fn noop() -> Self {
        Self {
            callback: None,
            started: Instant::now(),
        }
    }

    pub fn emit(&self, mut event: ProgressEvent) {
        let Some(callback) = &self.callback else {
            return;
        };
        event.elapsed = self.started.elapsed();

        tracing::debug!(
            phase = event.phase.as_str(),
            current = event.current,
            total = ?event.total,
            "{}",
            event.message
        );
        callback(event);
    }

    pub fn discover(&self, files: usize, dir: &Path) {
        self.emit(ProgressEvent::new(
            BuildPhase::Discover,
            files as u64,
            None,
            format!("found {} PDF files in {}", files, dir.display()),
        ));
    }

    pub fn load(&self, done: usize, total: usize, file: &str, pages: usize) {
        self.emit(ProgressEvent::new(
            BuildPhase::Load,
            done as u64,
            Some(total as u64),
            format!("read {} ({} pages)", file, pages),
        ));
    }

    pub fn chunk(&self, pages: usize, chunks: usize) {
        self.emit(ProgressEvent::new(
            BuildPhase::Chunk,
            pages as u64,
            None,
            format!("{} chunks from {} pages", chunks, pages),
        ));
    }

    pub fn embed(&self, done: u64, total: Option<u64>, model: &str) {
        self.emit(ProgressEvent::new(
            BuildPhase::Embed,
            done,
            total,
            format!("model={}", model),
        ));
    }

    pub fn persist(&self, entries: usize, dir: &Path) {
        self.emit(ProgressEvent::new(
            BuildPhase::Persist,
            entries as u64,
            Some(entries as u64),
            format!("wrote index to {}", dir.display()),
        ));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}
