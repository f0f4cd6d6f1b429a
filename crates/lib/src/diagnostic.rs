//! Structured diagnostics produced while running rules or external tools.
//!
//! A [`DiagnosticSink`] is an ordinary owned collector. Each rule invocation (or
//! tool invocation in a wrapper crate) gets a fresh sink and hands the collected
//! records back to its caller; there is no process-wide diagnostic state.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Error,
  Warning,
  Info,
  Other,
}

impl Severity {
  /// Maps a numeric log level as emitted by native tools (3 = error, 2 = warning, 1 = info).
  pub fn from_level(level: i32) -> Self {
    match level {
      3 => Severity::Error,
      2 => Severity::Warning,
      1 => Severity::Info,
      _ => Severity::Other,
    }
  }

  /// Maps a textual level. Unrecognized labels are informational.
  pub fn from_label(label: &str) -> Self {
    match label.trim().to_ascii_lowercase().as_str() {
      "error" => Severity::Error,
      "warning" => Severity::Warning,
      _ => Severity::Info,
    }
  }
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Severity::Error => "error",
      Severity::Warning => "warning",
      Severity::Info => "info",
      Severity::Other => "other",
    };
    f.write_str(label)
  }
}

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
  pub severity: Severity,
  pub source: Option<PathBuf>,
  pub line: Option<u64>,
  pub message: String,
}

impl Diagnostic {
  pub fn new(severity: Severity, message: impl Into<String>) -> Self {
    Self {
      severity,
      source: None,
      line: None,
      message: message.into(),
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self::new(Severity::Error, message)
  }

  pub fn warning(message: impl Into<String>) -> Self {
    Self::new(Severity::Warning, message)
  }

  pub fn info(message: impl Into<String>) -> Self {
    Self::new(Severity::Info, message)
  }

  pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
    self.source = Some(source.into());
    self
  }

  pub fn with_line(mut self, line: u64) -> Self {
    self.line = Some(line);
    self
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (&self.source, self.line) {
      (Some(source), Some(line)) => write!(f, "{}:{}: {}: {}", source.display(), line, self.severity, self.message),
      (Some(source), None) => write!(f, "{}: {}: {}", source.display(), self.severity, self.message),
      _ => write!(f, "{}: {}", self.severity, self.message),
    }
  }
}

/// Collector for the diagnostics of one invocation.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
  records: Vec<Diagnostic>,
}

impl DiagnosticSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn report(&mut self, diagnostic: Diagnostic) {
    self.records.push(diagnostic);
  }

  pub fn has_errors(&self) -> bool {
    self.records.iter().any(|d| d.severity == Severity::Error)
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.records.iter()
  }

  pub fn into_diagnostics(self) -> Vec<Diagnostic> {
    self.records
  }
}
