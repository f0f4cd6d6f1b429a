//! Shared fixtures for the library tests.

use std::fs;
use std::path::Path;

use kiln_lib::fingerprint::{FileInput, ImplementationIdentity, UnitOfWork};
use kiln_lib::model::ModelPath;

pub fn path(s: &str) -> ModelPath {
  ModelPath::parse(s).unwrap()
}

/// Writes `(relative_path, content)` pairs under `root`.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
  for (relative, content) in files {
    let file = root.join(relative);
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(file, content).unwrap();
  }
}

/// A compile-like unit with one scalar input and one file property.
pub fn compile_unit(sources: FileInput) -> UnitOfWork {
  UnitOfWork::new("compile", ImplementationIdentity::untracked("Compile"))
    .with_action(ImplementationIdentity::untracked("CompileAction"))
    .with_input("target", "x86_64")
    .with_files("sources", sources)
    .with_output("objects")
}
