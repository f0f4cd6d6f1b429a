//! Units of work and their declared inputs.
//!
//! A [`UnitOfWork`] describes everything a fingerprint covers: the identity of
//! the implementation and its actions, scalar input values, file inputs with
//! their normalization, and the names of declared outputs. Units deserialize
//! from JSON so they can be described outside the process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::hash::{HashBuilder, HashCode};

use super::normalize::Normalization;

/// The identity of executable behavior: a type or class name plus the hash of
/// whatever loaded it, when that loader is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImplementationIdentity {
  pub type_name: String,
  #[serde(default)]
  pub loader_hash: Option<HashCode>,
}

impl ImplementationIdentity {
  pub fn tracked(type_name: impl Into<String>, loader_hash: HashCode) -> Self {
    Self {
      type_name: type_name.into(),
      loader_hash: Some(loader_hash),
    }
  }

  /// An identity whose loader is not tracked. It still fingerprints, with the
  /// loader hash combined as absent.
  pub fn untracked(type_name: impl Into<String>) -> Self {
    Self {
      type_name: type_name.into(),
      loader_hash: None,
    }
  }
}

/// A scalar input value.
///
/// Hashing is sensitive to content but not to representation details that do
/// not affect a build: set elements and map keys are hashed in sorted order,
/// and JSON objects are hashed with sorted keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InputValue {
  Null,
  Bool(bool),
  Int(i64),
  Str(String),
  List(Vec<InputValue>),
  Set(Vec<InputValue>),
  Map(BTreeMap<String, InputValue>),
  Json(serde_json::Value),
  /// A value that could not be serialized for hashing.
  Invalid(String),
}

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_STR: u8 = 3;
const TAG_LIST: u8 = 4;
const TAG_SET: u8 = 5;
const TAG_MAP: u8 = 6;
const TAG_NUMBER: u8 = 7;

impl InputValue {
  /// Captures any serializable value as canonical JSON, or as `Invalid` with
  /// the serializer's message when serialization fails.
  pub fn serialized<T: Serialize + ?Sized>(value: &T) -> Self {
    match serde_json::to_value(value) {
      Ok(json) => InputValue::Json(json),
      Err(err) => InputValue::Invalid(err.to_string()),
    }
  }

  /// The value's hash, or the reason it cannot be hashed.
  pub fn hash(&self) -> Result<HashCode, String> {
    let mut builder = HashBuilder::new();
    self.put_into(&mut builder)?;
    Ok(builder.finish())
  }

  fn put_into(&self, builder: &mut HashBuilder) -> Result<(), String> {
    match self {
      InputValue::Null => {
        builder.put_tag(TAG_NULL);
      }
      InputValue::Bool(value) => {
        builder.put_tag(TAG_BOOL).put_tag(u8::from(*value));
      }
      InputValue::Int(value) => {
        builder.put_tag(TAG_INT).put_bytes(&value.to_le_bytes());
      }
      InputValue::Str(value) => {
        builder.put_tag(TAG_STR).put_str(value);
      }
      InputValue::List(items) => {
        builder.put_tag(TAG_LIST).put_u64(items.len() as u64);
        for item in items {
          item.put_into(builder)?;
        }
      }
      InputValue::Set(items) => {
        let mut hashes = items.iter().map(InputValue::hash).collect::<Result<Vec<_>, _>>()?;
        hashes.sort_unstable();
        hashes.dedup();
        builder.put_tag(TAG_SET).put_u64(hashes.len() as u64);
        for hash in &hashes {
          builder.put_hash(hash);
        }
      }
      InputValue::Map(entries) => {
        builder.put_tag(TAG_MAP).put_u64(entries.len() as u64);
        for (key, value) in entries {
          builder.put_str(key);
          value.put_into(builder)?;
        }
      }
      InputValue::Json(value) => put_json(value, builder),
      InputValue::Invalid(reason) => return Err(reason.clone()),
    }
    Ok(())
  }
}

fn put_json(value: &serde_json::Value, builder: &mut HashBuilder) {
  use serde_json::Value;

  match value {
    Value::Null => {
      builder.put_tag(TAG_NULL);
    }
    Value::Bool(b) => {
      builder.put_tag(TAG_BOOL).put_tag(u8::from(*b));
    }
    Value::Number(n) => {
      builder.put_tag(TAG_NUMBER).put_str(&n.to_string());
    }
    Value::String(s) => {
      builder.put_tag(TAG_STR).put_str(s);
    }
    Value::Array(items) => {
      builder.put_tag(TAG_LIST).put_u64(items.len() as u64);
      for item in items {
        put_json(item, builder);
      }
    }
    Value::Object(map) => {
      let mut entries: Vec<_> = map.iter().collect();
      entries.sort_by(|a, b| a.0.cmp(b.0));
      builder.put_tag(TAG_MAP).put_u64(entries.len() as u64);
      for (key, item) in entries {
        builder.put_str(key);
        put_json(item, builder);
      }
    }
  }
}

impl From<bool> for InputValue {
  fn from(value: bool) -> Self {
    InputValue::Bool(value)
  }
}

impl From<i64> for InputValue {
  fn from(value: i64) -> Self {
    InputValue::Int(value)
  }
}

impl From<&str> for InputValue {
  fn from(value: &str) -> Self {
    InputValue::Str(value.to_string())
  }
}

impl From<String> for InputValue {
  fn from(value: String) -> Self {
    InputValue::Str(value)
  }
}

/// A file-valued input: ordered roots and how to normalize them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInput {
  /// Roots in semantic order. Order is significant and never re-sorted.
  pub roots: Vec<PathBuf>,
  #[serde(default)]
  pub normalization: Normalization,
}

impl FileInput {
  pub fn new<I, P>(roots: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    Self {
      roots: roots.into_iter().map(Into::into).collect(),
      normalization: Normalization::default(),
    }
  }

  pub fn with_normalization(mut self, normalization: Normalization) -> Self {
    self.normalization = normalization;
    self
  }
}

/// Everything a fingerprint is computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOfWork {
  pub name: String,
  pub implementation: ImplementationIdentity,
  /// Executable steps in execution order.
  #[serde(default)]
  pub actions: Vec<ImplementationIdentity>,
  #[serde(default)]
  pub inputs: BTreeMap<String, InputValue>,
  /// Implementations behind scalar input values, keyed by input name. Only
  /// inputs whose value type is loaded at runtime need an entry.
  #[serde(default)]
  pub input_implementations: BTreeMap<String, ImplementationIdentity>,
  #[serde(default)]
  pub files: BTreeMap<String, FileInput>,
  #[serde(default)]
  pub outputs: Vec<String>,
}

impl UnitOfWork {
  pub fn new(name: impl Into<String>, implementation: ImplementationIdentity) -> Self {
    Self {
      name: name.into(),
      implementation,
      actions: Vec::new(),
      inputs: BTreeMap::new(),
      input_implementations: BTreeMap::new(),
      files: BTreeMap::new(),
      outputs: Vec::new(),
    }
  }

  pub fn with_action(mut self, action: ImplementationIdentity) -> Self {
    self.actions.push(action);
    self
  }

  pub fn with_input(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
    self.inputs.insert(name.into(), value.into());
    self
  }

  /// Records the implementation behind the value of input `name`.
  pub fn with_input_implementation(mut self, name: impl Into<String>, implementation: ImplementationIdentity) -> Self {
    self.input_implementations.insert(name.into(), implementation);
    self
  }

  /// Declared inputs with a recorded implementation, in name order.
  pub fn implemented_inputs(&self) -> impl Iterator<Item = (&String, &ImplementationIdentity)> {
    self
      .input_implementations
      .iter()
      .filter(|(name, _)| self.inputs.contains_key(*name))
  }

  pub fn with_files(mut self, name: impl Into<String>, files: FileInput) -> Self {
    self.files.insert(name.into(), files);
    self
  }

  pub fn with_output(mut self, name: impl Into<String>) -> Self {
    self.outputs.push(name.into());
    self
  }

  /// Rewrites relative file roots as paths below `base`.
  pub fn resolve_roots_against(&mut self, base: &Path) {
    for input in self.files.values_mut() {
      for root in &mut input.roots {
        if root.is_relative() {
          *root = base.join(&*root);
        }
      }
    }
  }
}
