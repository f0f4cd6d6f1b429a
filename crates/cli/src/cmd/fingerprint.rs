//! Implementation of the `kiln fingerprint` command.
//!
//! Loads every descriptor, fingerprints the units in parallel and prints one
//! record per unit. An unavailable fingerprint is reported but is not an error.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;

use kiln_lib::config::EngineConfig;
use kiln_lib::fingerprint::{AbortSignal, Fingerprint, fingerprint_units};

use super::unit::load_unit;
use crate::output::{
  OutputFormat, format_elapsed, loader_hash, print_field, print_json, print_success, print_warning, short_hash,
};

pub fn cmd_fingerprint(paths: &[PathBuf], config: &EngineConfig, output: OutputFormat) -> Result<()> {
  let units = paths.iter().map(|p| load_unit(p)).collect::<Result<Vec<_>>>()?;

  let signal = AbortSignal::from_config(config);
  let started = Instant::now();
  let fingerprints = fingerprint_units(&units, config, &signal);

  if output.is_json() {
    return print_json(&fingerprints);
  }

  for fp in &fingerprints {
    print_fingerprint(fp);
    println!();
  }
  let available = fingerprints.iter().filter(|fp| fp.is_available()).count();
  print_field(
    "Fingerprinted",
    &format!(
      "{} of {} unit(s) in {}",
      available,
      fingerprints.len(),
      format_elapsed(started.elapsed())
    ),
  );
  Ok(())
}

fn print_fingerprint(fp: &Fingerprint) {
  match (&fp.hash, &fp.unavailable) {
    (Some(hash), _) => print_success(&format!("{} {}", fp.unit, hash)),
    (None, Some(reason)) => print_warning(&format!("{} unavailable: {}", fp.unit, reason)),
    (None, None) => print_warning(&format!("{} unavailable", fp.unit)),
  }

  print_field(
    "Implementation",
    &format!("{} {}", fp.implementation_name, loader_hash(fp.implementation_hash.as_ref())),
  );
  for (name, hash) in fp.action_names.iter().zip(&fp.action_hashes) {
    print_field("Action", &format!("{} {}", name, loader_hash(hash.as_ref())));
  }
  for (name, hash) in &fp.input_hashes {
    print_field(&format!("Input {}", name), &short_hash(hash));
  }
  if !fp.inputs_with_untracked_loader.is_empty() {
    print_field("Untracked loaders", &fp.inputs_with_untracked_loader.join(", "));
  }
  for (name, property) in &fp.file_properties {
    print_field(
      &format!("Files {}", name),
      &format!("{} ({})", short_hash(&property.hash), property.strategy()),
    );
  }
  if !fp.output_names.is_empty() {
    print_field("Outputs", &fp.output_names.join(", "));
  }
}
