//! Terminal rendering for kiln.
//!
//! Fingerprints and events are printed either as JSON for tools or as
//! colored, indented text for people. Status lines for units go to stdout;
//! warnings about unavailable fingerprints and errors go to stderr so the JSON
//! stream stays clean.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use kiln_lib::util::hash::HashCode;

/// How command results are rendered.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  /// Marks a file-property root in event listings.
  pub const ROOT: &str = "→";
}

/// Hex digits shown for a hash in text output.
const SHORT_HASH_LEN: usize = 12;

/// The leading hex digits of `hash`.
pub fn short_hash(hash: &HashCode) -> String {
  let mut hex = hash.to_hex();
  hex.truncate(SHORT_HASH_LEN);
  hex
}

/// A loader hash, or `untracked` when the loader is not tracked.
pub fn loader_hash(hash: Option<&HashCode>) -> String {
  hash.map(short_hash).unwrap_or_else(|| "untracked".to_string())
}

/// Elapsed time for the summary line: milliseconds below one second, then
/// seconds with two decimals, then minutes and seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
  match elapsed.as_secs() {
    0 => format!("{}ms", elapsed.as_millis()),
    secs @ 1..60 => format!("{}.{:02}s", secs, elapsed.subsec_millis() / 10),
    secs => format!("{}m {}s", secs / 60, secs % 60),
  }
}

/// Two spaces per nesting level of an event listing.
pub fn indent(depth: usize) -> String {
  "  ".repeat(depth)
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

/// An unavailable fingerprint or other non-fatal condition.
pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

/// One `label: value` line below a unit's status line.
pub fn print_field(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
