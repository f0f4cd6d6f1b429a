//! Fingerprinting many units of work.
//!
//! Units are fingerprinted in parallel on a pool sized by
//! [`EngineConfig::parallelism`]. An [`AbortSignal`] is checked before each unit
//! starts; a unit already being hashed always runs to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::EngineConfig;

use super::compute::{fingerprint, unavailable};
use super::input::UnitOfWork;
use super::types::{Fingerprint, FingerprintError};

/// A build-wide cooperative abort: a manual flag plus an optional deadline.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
  aborted: Arc<AtomicBool>,
  deadline: Option<Instant>,
}

impl AbortSignal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_deadline(deadline: Instant) -> Self {
    Self {
      deadline: Some(deadline),
      ..Self::default()
    }
  }

  /// A signal that trips once `timeout` has elapsed from now.
  pub fn with_timeout(timeout: Duration) -> Self {
    Self {
      deadline: Instant::now().checked_add(timeout),
      ..Self::default()
    }
  }

  /// A signal honoring the configured unit timeout, if any.
  pub fn from_config(config: &EngineConfig) -> Self {
    config.unit_timeout.map(Self::with_timeout).unwrap_or_default()
  }

  pub fn abort(&self) {
    self.aborted.store(true, Ordering::SeqCst);
  }

  pub fn is_aborted(&self) -> bool {
    self.aborted.load(Ordering::SeqCst) || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
  }
}

/// Fingerprints `units`, returning one record per unit in input order.
///
/// Units that had not started when `signal` tripped come back unavailable with
/// [`FingerprintError::Aborted`]; completed units are kept.
pub fn fingerprint_units(units: &[UnitOfWork], config: &EngineConfig, signal: &AbortSignal) -> Vec<Fingerprint> {
  info!(units = units.len(), parallelism = config.parallelism, "fingerprinting units");

  let run = |unit: &UnitOfWork| {
    if signal.is_aborted() {
      unavailable(
        unit,
        FingerprintError::Aborted {
          unit: unit.name.clone(),
        },
      )
    } else {
      fingerprint(unit, config)
    }
  };

  let results: Vec<Fingerprint> = match rayon::ThreadPoolBuilder::new()
    .num_threads(config.parallelism.max(1))
    .build()
  {
    Ok(pool) => pool.install(|| units.par_iter().map(&run).collect()),
    Err(err) => {
      warn!(error = %err, "could not start worker pool, fingerprinting sequentially");
      units.iter().map(&run).collect()
    }
  };

  let aborted = results
    .iter()
    .filter(|fp| matches!(fp.unavailable, Some(FingerprintError::Aborted { .. })))
    .count();
  if aborted > 0 {
    warn!(aborted, total = units.len(), "batch aborted before every unit was fingerprinted");
  }
  results
}
