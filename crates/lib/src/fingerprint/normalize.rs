//! Normalization strategies for file properties.
//!
//! A [`Normalization`] decides which aspects of a file tree are significant to
//! its hash. It is reported with every file property as a primary strategy
//! identifier plus a sorted attribute set, and both are hashed into the
//! property's hash so the same bytes under a different normalization never
//! produce the same fingerprint.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::hash::HashBuilder;

/// How a file's location contributes to its property's hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSensitivity {
  #[default]
  Absolute,
  Relative,
  NameOnly,
  Ignored,
}

impl PathSensitivity {
  pub fn identifier(self) -> &'static str {
    match self {
      PathSensitivity::Absolute => "ABSOLUTE_PATH",
      PathSensitivity::Relative => "RELATIVE_PATH",
      PathSensitivity::NameOnly => "NAME_ONLY",
      PathSensitivity::Ignored => "IGNORED_PATH",
    }
  }

  fn attribute(self) -> &'static str {
    match self {
      PathSensitivity::Absolute => "FINGERPRINTING_STRATEGY_ABSOLUTE_PATH",
      PathSensitivity::Relative => "FINGERPRINTING_STRATEGY_RELATIVE_PATH",
      PathSensitivity::NameOnly => "FINGERPRINTING_STRATEGY_NAME_ONLY",
      PathSensitivity::Ignored => "FINGERPRINTING_STRATEGY_IGNORED_PATH",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectorySensitivity {
  /// Directories, including empty ones, are part of the hash.
  #[default]
  Default,
  /// Only files count; empty directories do not change the hash.
  IgnoreDirectories,
}

impl DirectorySensitivity {
  fn attribute(self) -> &'static str {
    match self {
      DirectorySensitivity::Default => "DIRECTORY_SENSITIVITY_DEFAULT",
      DirectorySensitivity::IgnoreDirectories => "DIRECTORY_SENSITIVITY_IGNORE_DIRECTORIES",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEndingSensitivity {
  #[default]
  Default,
  /// `\r\n` hashes the same as `\n`.
  Normalize,
}

impl LineEndingSensitivity {
  fn attribute(self) -> &'static str {
    match self {
      LineEndingSensitivity::Default => "LINE_ENDING_SENSITIVITY_DEFAULT",
      LineEndingSensitivity::Normalize => "LINE_ENDING_SENSITIVITY_NORMALIZE_LINE_ENDINGS",
    }
  }

  pub fn normalizes(self) -> bool {
    self == LineEndingSensitivity::Normalize
  }
}

/// The full normalization choice for one file property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalization {
  pub path: PathSensitivity,
  pub directories: DirectorySensitivity,
  pub line_endings: LineEndingSensitivity,
}

impl Normalization {
  pub fn new(path: PathSensitivity) -> Self {
    Self {
      path,
      ..Self::default()
    }
  }

  pub fn ignoring_directories(mut self) -> Self {
    self.directories = DirectorySensitivity::IgnoreDirectories;
    self
  }

  pub fn normalizing_line_endings(mut self) -> Self {
    self.line_endings = LineEndingSensitivity::Normalize;
    self
  }

  /// The primary strategy identifier, e.g. `RELATIVE_PATH`.
  pub fn strategy(&self) -> &'static str {
    self.path.identifier()
  }

  /// Every attribute describing this normalization, sorted.
  pub fn attributes(&self) -> Vec<&'static str> {
    let mut attributes = vec![
      self.path.attribute(),
      self.directories.attribute(),
      self.line_endings.attribute(),
    ];
    attributes.sort_unstable();
    attributes
  }

  /// The location key hashed for an entry, or `None` when locations are ignored.
  ///
  /// `relative` is the entry's path below its root; it is empty for the root itself.
  pub fn location_key(&self, absolute: &Path, relative: &Path) -> Option<String> {
    match self.path {
      PathSensitivity::Absolute => Some(absolute.to_string_lossy().replace('\\', "/")),
      PathSensitivity::Relative => {
        let key = relative
          .components()
          .map(|c| c.as_os_str().to_string_lossy())
          .collect::<Vec<_>>()
          .join("/");
        // A file root is keyed by its name, like a file directly below a directory root.
        if key.is_empty() {
          Some(file_name(absolute))
        } else {
          Some(key)
        }
      }
      PathSensitivity::NameOnly => Some(file_name(absolute)),
      PathSensitivity::Ignored => None,
    }
  }

  pub(crate) fn put_into(&self, builder: &mut HashBuilder) {
    builder.put_str(self.strategy());
    let attributes = self.attributes();
    builder.put_u64(attributes.len() as u64);
    for attribute in attributes {
      builder.put_str(attribute);
    }
  }
}

pub(crate) fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
