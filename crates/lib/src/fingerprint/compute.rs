//! Fingerprint computation for a single unit of work.
//!
//! Scalar inputs and file properties are hashed independently, in parallel.
//! If any of them cannot be hashed the whole fingerprint is unavailable: no
//! partial hash is ever produced.

use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::consts::{ABSENT_SENTINEL, FINGERPRINT_VERSION_TAG, PRESENT_MARKER};
use crate::util::hash::{HashBuilder, HashCode};

use super::input::{FileInput, UnitOfWork};
use super::normalize::{DirectorySensitivity, Normalization, PathSensitivity};
use super::snapshot::{EntrySnapshot, RootSnapshot, snapshot_root};
use super::types::{FilePropertyFingerprint, Fingerprint, FingerprintError};

const TAG_ROOT: u8 = b'r';
const TAG_DIRECTORY: u8 = b'd';
const TAG_DIRECTORY_END: u8 = b'e';
const TAG_FILE: u8 = b'f';

/// Computes the fingerprint of `unit`.
///
/// Never fails: when an input cannot be hashed the returned record has no hash
/// and carries the reason in `unavailable`.
pub fn fingerprint(unit: &UnitOfWork, config: &EngineConfig) -> Fingerprint {
  debug!(
    unit = %unit.name,
    actions = unit.actions.len(),
    inputs = unit.inputs.len(),
    files = unit.files.len(),
    "fingerprinting unit"
  );

  match hash_inputs(unit) {
    Ok((input_hashes, file_properties)) => {
      let hash = overall_hash(unit, &input_hashes, &file_properties);
      debug!(unit = %unit.name, hash = %hash, "fingerprint computed");
      Fingerprint {
        hash: Some(hash),
        input_hashes,
        file_properties,
        ..skeleton(unit)
      }
    }
    Err(error) => {
      if config.verbose_fallback {
        info!(unit = %unit.name, reason = %error, "fingerprint unavailable, unit will execute");
      } else {
        debug!(unit = %unit.name, reason = %error, "fingerprint unavailable, unit will execute");
      }
      unavailable(unit, error)
    }
  }
}

/// A record for `unit` that carries no hash, only the reason.
pub(crate) fn unavailable(unit: &UnitOfWork, error: FingerprintError) -> Fingerprint {
  Fingerprint {
    unavailable: Some(error),
    ..skeleton(unit)
  }
}

fn skeleton(unit: &UnitOfWork) -> Fingerprint {
  let mut output_names = unit.outputs.clone();
  output_names.sort();
  output_names.dedup();

  Fingerprint {
    unit: unit.name.clone(),
    hash: None,
    implementation_name: unit.implementation.type_name.clone(),
    implementation_hash: unit.implementation.loader_hash,
    action_hashes: unit.actions.iter().map(|a| a.loader_hash).collect(),
    action_names: unit.actions.iter().map(|a| a.type_name.clone()).collect(),
    input_hashes: BTreeMap::new(),
    inputs_with_untracked_loader: unit
      .implemented_inputs()
      .filter(|(_, implementation)| implementation.loader_hash.is_none())
      .map(|(name, _)| name.clone())
      .collect(),
    file_properties: BTreeMap::new(),
    output_names,
    unavailable: None,
  }
}

type HashedInputs = (BTreeMap<String, HashCode>, BTreeMap<String, FilePropertyFingerprint>);

fn hash_inputs(unit: &UnitOfWork) -> Result<HashedInputs, FingerprintError> {
  // Collected in name order so the reported failure does not depend on scheduling.
  let values: Vec<Result<(String, HashCode), FingerprintError>> = unit
    .inputs
    .par_iter()
    .map(|(name, value)| {
      value
        .hash()
        .map(|hash| (name.clone(), hash))
        .map_err(|reason| FingerprintError::InvalidValue {
          property: name.clone(),
          reason,
        })
    })
    .collect();
  let input_hashes = values.into_iter().collect::<Result<BTreeMap<_, _>, _>>()?;

  let files: Vec<Result<(String, FilePropertyFingerprint), FingerprintError>> = unit
    .files
    .par_iter()
    .map(|(name, input)| fingerprint_file_property(name, input).map(|fp| (name.clone(), fp)))
    .collect();
  let file_properties = files.into_iter().collect::<Result<BTreeMap<_, _>, _>>()?;

  Ok((input_hashes, file_properties))
}

/// Snapshots every root of a file property, in declared order, and hashes them.
pub fn fingerprint_file_property(name: &str, input: &FileInput) -> Result<FilePropertyFingerprint, FingerprintError> {
  let normalize = input.normalization.line_endings.normalizes();
  let roots: Vec<Result<RootSnapshot, FingerprintError>> = input
    .roots
    .par_iter()
    .map(|root| snapshot_root(name, root, normalize))
    .collect();
  let roots = roots.into_iter().collect::<Result<Vec<_>, _>>()?;

  let hash = property_hash(&input.normalization, &roots);
  debug!(property = name, roots = roots.len(), hash = %hash, "file property hashed");
  Ok(FilePropertyFingerprint {
    name: name.to_string(),
    hash,
    normalization: input.normalization,
    roots,
  })
}

fn property_hash(normalization: &Normalization, roots: &[RootSnapshot]) -> HashCode {
  let mut builder = HashBuilder::new();
  normalization.put_into(&mut builder);
  builder.put_u64(roots.len() as u64);

  for root in roots {
    builder.put_tag(TAG_ROOT);
    if normalization.path == PathSensitivity::Ignored {
      // Content only: file hashes in sorted order.
      let mut hashes = Vec::new();
      collect_file_hashes(&root.entry, &mut hashes);
      hashes.sort_unstable();
      builder.put_u64(hashes.len() as u64);
      for hash in &hashes {
        builder.put_hash(hash);
      }
    } else {
      put_entry(normalization, &root.entry, root.path(), &mut builder);
    }
  }
  builder.finish()
}

fn put_entry(normalization: &Normalization, entry: &EntrySnapshot, root: &Path, builder: &mut HashBuilder) {
  let relative = entry.path().strip_prefix(root).unwrap_or(Path::new(""));
  match entry {
    EntrySnapshot::File { path, hash, .. } => {
      builder.put_tag(TAG_FILE);
      put_key(normalization.location_key(path, relative), builder);
      builder.put_hash(hash);
    }
    EntrySnapshot::Directory { path, children, .. } => {
      let tracked = normalization.directories == DirectorySensitivity::Default;
      if tracked {
        builder.put_tag(TAG_DIRECTORY);
        // A directory root contributes only its contents under relative paths.
        let key = if relative.as_os_str().is_empty() && normalization.path == PathSensitivity::Relative {
          Some(String::new())
        } else {
          normalization.location_key(path, relative)
        };
        put_key(key, builder);
      }
      for child in children {
        put_entry(normalization, child, root, builder);
      }
      if tracked {
        builder.put_tag(TAG_DIRECTORY_END);
      }
    }
  }
}

fn put_key(key: Option<String>, builder: &mut HashBuilder) {
  match key {
    Some(key) => {
      builder.put_tag(PRESENT_MARKER).put_str(&key);
    }
    None => {
      builder.put_tag(ABSENT_SENTINEL);
    }
  }
}

fn collect_file_hashes(entry: &EntrySnapshot, hashes: &mut Vec<HashCode>) {
  match entry {
    EntrySnapshot::File { hash, .. } => hashes.push(*hash),
    EntrySnapshot::Directory { children, .. } => {
      for child in children {
        collect_file_hashes(child, hashes);
      }
    }
  }
}

/// Combines every input component. Outputs are not part of the hash.
fn overall_hash(
  unit: &UnitOfWork,
  input_hashes: &BTreeMap<String, HashCode>,
  file_properties: &BTreeMap<String, FilePropertyFingerprint>,
) -> HashCode {
  let mut builder = HashBuilder::new();
  builder.put_str(FINGERPRINT_VERSION_TAG);

  builder
    .put_str(&unit.implementation.type_name)
    .put_optional_hash(unit.implementation.loader_hash.as_ref());

  builder.put_u64(unit.actions.len() as u64);
  for action in &unit.actions {
    builder
      .put_str(&action.type_name)
      .put_optional_hash(action.loader_hash.as_ref());
  }

  builder.put_u64(input_hashes.len() as u64);
  for (name, hash) in input_hashes {
    builder.put_str(name).put_hash(hash);
  }

  let implementations: Vec<_> = unit.implemented_inputs().collect();
  builder.put_u64(implementations.len() as u64);
  for (name, implementation) in implementations {
    builder
      .put_str(name)
      .put_str(&implementation.type_name)
      .put_optional_hash(implementation.loader_hash.as_ref());
  }

  builder.put_u64(file_properties.len() as u64);
  for (name, property) in file_properties {
    builder.put_str(name).put_hash(&property.hash);
  }

  builder.finish()
}
