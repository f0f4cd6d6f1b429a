//! Implementation of the `kiln events` command.
//!
//! Prints the file visitation events of a unit: properties by name, roots in
//! declared order, and entries depth-first by name.

use std::path::Path;

use anyhow::{Result, bail};

use kiln_lib::config::EngineConfig;
use kiln_lib::fingerprint::{VisitEvent, fingerprint};

use super::unit::load_unit;
use crate::output::{OutputFormat, indent, print_info, print_json, short_hash, symbols};

pub fn cmd_events(path: &Path, config: &EngineConfig, output: OutputFormat) -> Result<()> {
  let unit = load_unit(path)?;
  let fp = fingerprint(&unit, config);
  if let Some(reason) = &fp.unavailable {
    bail!("Cannot visit files of '{}': {}", unit.name, reason);
  }

  let events = fp.visit_events();
  if output.is_json() {
    return print_json(&events);
  }
  if events.is_empty() {
    print_info(&format!("Unit '{}' has no file properties", unit.name));
    return Ok(());
  }

  let mut depth = 0usize;
  for event in &events {
    match event {
      VisitEvent::PreProperty {
        name, hash, strategy, ..
      } => {
        println!("{}{} {} ({})", indent(depth), name, short_hash(hash), strategy);
        depth += 1;
      }
      VisitEvent::PreRoot { path, .. } => {
        println!("{}{} root {}", indent(depth), symbols::ROOT, path);
        depth += 1;
      }
      VisitEvent::PreDirectory { name, .. } => {
        println!("{}{}/", indent(depth), name);
        depth += 1;
      }
      VisitEvent::File { name, hash, .. } => {
        println!("{}{} {}", indent(depth), name, short_hash(hash));
      }
      VisitEvent::PostDirectory | VisitEvent::PostRoot | VisitEvent::PostProperty => {
        depth = depth.saturating_sub(1);
      }
    }
  }
  Ok(())
}
