//! Engine configuration.
//!
//! Defaults come from the host, and every field may be overridden through
//! environment variables (see [`crate::consts`]).

use std::time::Duration;

use tracing::warn;

use crate::consts::{ENV_PARALLELISM, ENV_UNIT_TIMEOUT_SECS, ENV_VERBOSE_FALLBACK};

/// Configuration shared by model realization and fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// Maximum number of worker threads for batch realization and fingerprinting.
  pub parallelism: usize,

  /// Build-wide budget for fingerprinting a batch of units. Units that have not
  /// started when it elapses are reported as aborted.
  pub unit_timeout: Option<Duration>,

  /// Log unavailable fingerprints at `info` instead of `debug`.
  pub verbose_fallback: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      unit_timeout: None,
      verbose_fallback: false,
    }
  }
}

impl EngineConfig {
  /// Defaults overridden by any valid `KILN_*` environment variables.
  pub fn from_env() -> Self {
    let mut config = Self::default();

    if let Some(value) = read_env(ENV_PARALLELISM) {
      match value.parse::<usize>() {
        Ok(n) if n > 0 => config.parallelism = n,
        _ => warn!(var = ENV_PARALLELISM, value = %value, "ignoring invalid parallelism"),
      }
    }

    if let Some(value) = read_env(ENV_UNIT_TIMEOUT_SECS) {
      match value.parse::<u64>() {
        Ok(secs) => config.unit_timeout = Some(Duration::from_secs(secs)),
        Err(_) => warn!(var = ENV_UNIT_TIMEOUT_SECS, value = %value, "ignoring invalid timeout"),
      }
    }

    if let Some(value) = read_env(ENV_VERBOSE_FALLBACK) {
      match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => config.verbose_fallback = true,
        "0" | "false" | "no" | "off" => config.verbose_fallback = false,
        _ => warn!(var = ENV_VERBOSE_FALLBACK, value = %value, "ignoring invalid flag"),
      }
    }

    config
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }

  pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
    self.unit_timeout = Some(timeout);
    self
  }
}

fn read_env(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
