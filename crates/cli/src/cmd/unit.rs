//! Loading unit-of-work descriptors.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use kiln_lib::fingerprint::UnitOfWork;

/// Reads a JSON descriptor. Relative file roots are taken relative to the
/// descriptor's directory.
pub fn load_unit(path: &Path) -> Result<UnitOfWork> {
  let content =
    fs::read_to_string(path).with_context(|| format!("Failed to read unit descriptor: {}", path.display()))?;
  let mut unit: UnitOfWork =
    serde_json::from_str(&content).with_context(|| format!("Failed to parse unit descriptor: {}", path.display()))?;

  if let Some(base) = path.parent() {
    unit.resolve_roots_against(base);
  }
  debug!(unit = %unit.name, descriptor = %path.display(), "loaded unit");
  Ok(unit)
}
