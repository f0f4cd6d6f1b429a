//! Fingerprint records and errors.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::util::hash::HashCode;

use super::normalize::Normalization;
use super::snapshot::RootSnapshot;
use super::visit::{VisitEvent, property_events};

/// Why a fingerprint could not be computed.
///
/// Any of these makes the whole fingerprint unavailable; callers fall back to
/// executing the unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FingerprintError {
  #[error("file property '{property}': root {path} does not exist")]
  MissingRoot { property: String, path: String },

  #[error("file property '{property}': failed to read {path}: {message}")]
  ReadFile {
    property: String,
    path: String,
    message: String,
  },

  #[error("file property '{property}': failed to walk {path}: {message}")]
  Walk {
    property: String,
    path: String,
    message: String,
  },

  #[error("input '{property}' cannot be hashed: {reason}")]
  InvalidValue { property: String, reason: String },

  #[error("unit '{unit}' was not fingerprinted: the build was aborted")]
  Aborted { unit: String },
}

/// The hash and snapshot of one file property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePropertyFingerprint {
  pub name: String,
  pub hash: HashCode,
  pub normalization: Normalization,
  /// Snapshots in declared root order. Reported through visitation events only.
  #[serde(skip_serializing)]
  pub roots: Vec<RootSnapshot>,
}

impl FilePropertyFingerprint {
  /// The primary strategy identifier used for this property.
  pub fn strategy(&self) -> &'static str {
    self.normalization.strategy()
  }

  pub fn attributes(&self) -> Vec<&'static str> {
    self.normalization.attributes()
  }
}

/// The fingerprint of a unit of work's effective inputs.
///
/// `hash` is `None` exactly when some input could not be hashed, in which case
/// `unavailable` says why and the per-input maps are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
  pub unit: String,
  pub hash: Option<HashCode>,
  pub implementation_name: String,
  /// Loader hash of the implementation, absent when its loader is not tracked.
  pub implementation_hash: Option<HashCode>,
  /// One entry per action, in execution order. Duplicates allowed.
  pub action_hashes: Vec<Option<HashCode>>,
  /// Parallel to `action_hashes`.
  pub action_names: Vec<String>,
  pub input_hashes: BTreeMap<String, HashCode>,
  /// Scalar inputs whose value implementation comes from an untracked loader,
  /// in name order.
  pub inputs_with_untracked_loader: Vec<String>,
  pub file_properties: BTreeMap<String, FilePropertyFingerprint>,
  /// Sorted, without duplicates. Not part of `hash`.
  pub output_names: Vec<String>,
  pub unavailable: Option<FingerprintError>,
}

impl Fingerprint {
  pub fn is_available(&self) -> bool {
    self.hash.is_some()
  }

  /// The visitation events of every file property, properties ordered by name.
  ///
  /// Events are derived from stored snapshots, so repeated calls return the same
  /// sequence. A unit without file properties produces no events.
  pub fn visit_events(&self) -> Vec<VisitEvent> {
    self.file_properties.values().flat_map(property_events).collect()
  }
}
