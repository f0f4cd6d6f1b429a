//! Test utilities for kiln-lib.
//!
//! Helpers for laying out small file trees used by fingerprint tests.

use std::fs;
use std::path::{Path, PathBuf};

/// Writes each `(relative_path, content)` pair under `root`, creating parent directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
  for (relative, content) in files {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }
}

/// Creates an empty directory under `root` and returns its path.
pub fn empty_dir(root: &Path, name: &str) -> PathBuf {
  let path = root.join(name);
  fs::create_dir_all(&path).unwrap();
  path
}

/// Cross-platform symlink creation helper.
pub fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  #[cfg(unix)]
  {
    std::os::unix::fs::symlink(target, link)
  }
  #[cfg(windows)]
  {
    if target.is_dir() {
      std::os::windows::fs::symlink_dir(target, link)
    } else {
      std::os::windows::fs::symlink_file(target, link)
    }
  }
}

/// Creates a named pipe at `path`. Returns false where `mkfifo` is unavailable.
#[cfg(unix)]
pub fn create_fifo(path: &Path) -> bool {
  std::process::Command::new("mkfifo")
    .arg(path)
    .status()
    .is_ok_and(|status| status.success())
}
