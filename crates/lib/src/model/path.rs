//! Hierarchical addresses of model elements.
//!
//! A [`ModelPath`] is an ordered list of name segments. The root path has no
//! segments; every other path has exactly one parent, obtained by dropping the
//! last segment. Paths order lexicographically by segment.
//!
//! # Example
//!
//! ```
//! use kiln_lib::model::ModelPath;
//!
//! let tasks = ModelPath::parse("tasks").unwrap();
//! let compile = tasks.child("compileJava").unwrap();
//! assert_eq!(compile.to_string(), "tasks.compileJava");
//! assert_eq!(compile.parent().unwrap(), tasks);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::consts::PATH_DELIMITER;

/// Errors raised while constructing or navigating paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
  #[error("invalid path '{path}': {reason}")]
  InvalidPath { path: String, reason: String },

  #[error("invalid path segment '{segment}': {reason}")]
  InvalidSegment { segment: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelPath {
  segments: Vec<String>,
}

impl ModelPath {
  pub fn root() -> Self {
    Self::default()
  }

  /// Builds a path from individual segments, validating each one.
  pub fn new<I, S>(segments: I) -> Result<Self, PathError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let segments = segments
      .into_iter()
      .map(|s| {
        let s = s.into();
        validate_segment(&s)?;
        Ok(s)
      })
      .collect::<Result<Vec<_>, PathError>>()?;
    Ok(Self { segments })
  }

  /// Parses a delimiter-separated path. The empty string is the root.
  pub fn parse(path: &str) -> Result<Self, PathError> {
    if path.is_empty() {
      return Ok(Self::root());
    }
    Self::new(path.split(PATH_DELIMITER)).map_err(|e| match e {
      PathError::InvalidSegment { reason, .. } => PathError::InvalidPath {
        path: path.to_string(),
        reason,
      },
      other => other,
    })
  }

  pub fn segments(&self) -> &[String] {
    &self.segments
  }

  pub fn depth(&self) -> usize {
    self.segments.len()
  }

  pub fn is_root(&self) -> bool {
    self.segments.is_empty()
  }

  /// The last segment, or `None` for the root.
  pub fn name(&self) -> Option<&str> {
    self.segments.last().map(String::as_str)
  }

  pub fn parent(&self) -> Result<ModelPath, PathError> {
    match self.segments.split_last() {
      Some((_, rest)) => Ok(Self { segments: rest.to_vec() }),
      None => Err(PathError::InvalidPath {
        path: self.to_string(),
        reason: "the root path has no parent".to_string(),
      }),
    }
  }

  pub fn child(&self, name: &str) -> Result<ModelPath, PathError> {
    validate_segment(name)?;
    let mut segments = self.segments.clone();
    segments.push(name.to_string());
    Ok(Self { segments })
  }

  /// True if `self` is exactly one segment below `other`.
  pub fn is_direct_child_of(&self, other: &ModelPath) -> bool {
    self.segments.len() == other.segments.len() + 1 && self.segments.starts_with(&other.segments)
  }

  /// True if `self` is strictly below `other`.
  pub fn is_descendant_of(&self, other: &ModelPath) -> bool {
    self.segments.len() > other.segments.len() && self.segments.starts_with(&other.segments)
  }
}

/// Segment names start with an ASCII letter or underscore, followed by ASCII
/// letters, digits, underscores or hyphens.
fn validate_segment(segment: &str) -> Result<(), PathError> {
  let invalid = |reason: String| PathError::InvalidSegment {
    segment: segment.to_string(),
    reason,
  };

  let mut chars = segment.chars();
  let Some(first) = chars.next() else {
    return Err(invalid("segment names cannot be empty".to_string()));
  };
  if !(first.is_ascii_alphabetic() || first == '_') {
    return Err(invalid(format!(
      "illegal first character '{}' (names must start with an ASCII letter or underscore)",
      first
    )));
  }
  if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-')) {
    return Err(invalid(format!("illegal character '{}'", bad)));
  }
  Ok(())
}

impl fmt::Display for ModelPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_root() {
      return f.write_str("<root>");
    }
    let mut first = true;
    for segment in &self.segments {
      if !first {
        write!(f, "{}", PATH_DELIMITER)?;
      }
      f.write_str(segment)?;
      first = false;
    }
    Ok(())
  }
}

impl FromStr for ModelPath {
  type Err = PathError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl Serialize for ModelPath {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.segments.join(&PATH_DELIMITER.to_string()))
  }
}

impl<'de> Deserialize<'de> for ModelPath {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Self::parse(&s).map_err(serde::de::Error::custom)
  }
}
