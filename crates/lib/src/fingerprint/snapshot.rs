//! File-tree snapshots for file properties.
//!
//! A snapshot records every directory and file below a root, depth-first and
//! ordered by name at each level, together with each file's normalized content
//! hash. Visitation events and property hashes are both derived from the
//! snapshot, so they always agree and can be recomputed without touching the
//! filesystem again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::trace;
use walkdir::WalkDir;

use crate::util::hash::{FileHashError, HashCode, hash_file};

use super::normalize::file_name;
use super::types::FingerprintError;

/// One directory or file inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySnapshot {
  Directory {
    path: PathBuf,
    name: String,
    children: Vec<EntrySnapshot>,
  },
  File {
    path: PathBuf,
    name: String,
    hash: HashCode,
  },
}

impl EntrySnapshot {
  pub fn path(&self) -> &Path {
    match self {
      EntrySnapshot::Directory { path, .. } | EntrySnapshot::File { path, .. } => path,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      EntrySnapshot::Directory { name, .. } | EntrySnapshot::File { name, .. } => name,
    }
  }

  /// Number of files in this subtree.
  pub fn file_count(&self) -> usize {
    match self {
      EntrySnapshot::File { .. } => 1,
      EntrySnapshot::Directory { children, .. } => children.iter().map(EntrySnapshot::file_count).sum(),
    }
  }
}

/// A declared root of a file property and the tree found there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootSnapshot {
  pub entry: EntrySnapshot,
}

impl RootSnapshot {
  pub fn path(&self) -> &Path {
    self.entry.path()
  }

  pub fn name(&self) -> &str {
    self.entry.name()
  }
}

/// Snapshots `root`, following symlinks.
///
/// A missing root, an unreadable file, a broken link, or a symlink loop all
/// fail the snapshot. Special files below the root are left out; a root that
/// is itself a special file fails.
pub fn snapshot_root(property: &str, root: &Path, normalize_line_endings: bool) -> Result<RootSnapshot, FingerprintError> {
  let root = std::path::absolute(root).map_err(|e| walk_error(property, root, &e))?;
  match fs::metadata(&root) {
    Ok(_) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      return Err(FingerprintError::MissingRoot {
        property: property.to_string(),
        path: root.display().to_string(),
      });
    }
    Err(e) => return Err(walk_error(property, &root, &e)),
  }

  // Open directories, indexed by walk depth.
  let mut open: Vec<(PathBuf, String, Vec<EntrySnapshot>)> = Vec::new();
  let mut finished: Option<EntrySnapshot> = None;

  for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
    let entry = entry.map_err(|e| FingerprintError::Walk {
      property: property.to_string(),
      path: e
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| root.display().to_string()),
      message: e.to_string(),
    })?;

    close_until(&mut open, entry.depth(), &mut finished);

    let path = entry.path().to_path_buf();
    let name = file_name(&path);
    let file_type = entry.file_type();
    if file_type.is_dir() {
      trace!(property, path = %path.display(), "entering directory");
      open.push((path, name, Vec::new()));
    } else if file_type.is_file() {
      let hash = hash_file(&path, normalize_line_endings).map_err(|e| read_error(property, e))?;
      attach(&mut open, &mut finished, EntrySnapshot::File { path, name, hash });
    } else if entry.depth() == 0 {
      return Err(FingerprintError::ReadFile {
        property: property.to_string(),
        path: path.display().to_string(),
        message: "not a regular file or directory".to_string(),
      });
    } else {
      // Sockets, pipes and devices have no content to hash, and opening a pipe blocks.
      trace!(property, path = %path.display(), "skipping special file");
    }
  }
  close_until(&mut open, 0, &mut finished);

  finished.map(|entry| RootSnapshot { entry }).ok_or_else(|| FingerprintError::MissingRoot {
    property: property.to_string(),
    path: root.display().to_string(),
  })
}

fn close_until(open: &mut Vec<(PathBuf, String, Vec<EntrySnapshot>)>, depth: usize, finished: &mut Option<EntrySnapshot>) {
  while open.len() > depth {
    let Some((path, name, children)) = open.pop() else {
      break;
    };
    attach(open, finished, EntrySnapshot::Directory { path, name, children });
  }
}

fn attach(open: &mut [(PathBuf, String, Vec<EntrySnapshot>)], finished: &mut Option<EntrySnapshot>, entry: EntrySnapshot) {
  match open.last_mut() {
    Some((_, _, children)) => children.push(entry),
    None => *finished = Some(entry),
  }
}

fn walk_error(property: &str, path: &Path, error: &io::Error) -> FingerprintError {
  FingerprintError::Walk {
    property: property.to_string(),
    path: path.display().to_string(),
    message: error.to_string(),
  }
}

fn read_error(property: &str, error: FileHashError) -> FingerprintError {
  match error {
    FileHashError::ReadFile { path, message } => FingerprintError::ReadFile {
      property: property.to_string(),
      path,
      message,
    },
  }
}
