//! Hashing primitives for fingerprints.
//!
//! This module provides:
//! - `HashCode`: a full 32-byte SHA-256 digest, rendered as 64 hex characters
//! - `HashBuilder`: an unambiguous combiner for building composite hashes
//! - `hash_file()`: single file hashing, optionally normalizing line endings
//! - `hash_bytes()`: arbitrary byte hashing

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::consts::{ABSENT_SENTINEL, PRESENT_MARKER};

/// A SHA-256 digest.
///
/// # Format
///
/// Displayed and serialized as a lowercase hexadecimal string (64 characters).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashCode([u8; 32]);

impl HashCode {
  pub fn from_bytes(bytes: [u8; 32]) -> Self {
    Self(bytes)
  }

  pub fn as_bytes(&self) -> &[u8; 32] {
    &self.0
  }

  pub fn to_hex(&self) -> String {
    hex::encode(self.0)
  }
}

impl fmt::Display for HashCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_hex())
  }
}

impl fmt::Debug for HashCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "HashCode({})", self.to_hex())
  }
}

/// Error parsing a `HashCode` from hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseHashError {
  #[error("invalid hex digest: {0}")]
  InvalidHex(String),

  #[error("digest must be 32 bytes, got {0}")]
  WrongLength(usize),
}

impl FromStr for HashCode {
  type Err = ParseHashError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let bytes = hex::decode(s).map_err(|e| ParseHashError::InvalidHex(e.to_string()))?;
    let len = bytes.len();
    let array: [u8; 32] = bytes.try_into().map_err(|_| ParseHashError::WrongLength(len))?;
    Ok(Self(array))
  }
}

impl Serialize for HashCode {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_hex())
  }
}

impl<'de> Deserialize<'de> for HashCode {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

/// Incremental combiner for composite hashes.
///
/// Every variable-length component is length-prefixed, so the combined stream is
/// unambiguous: `["ab", "c"]` and `["a", "bc"]` never collide. Absent optional
/// components contribute a fixed sentinel byte instead of being skipped.
#[derive(Default, Clone)]
pub struct HashBuilder {
  hasher: Sha256,
}

impl HashBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
    self.hasher.update((bytes.len() as u64).to_le_bytes());
    self.hasher.update(bytes);
    self
  }

  pub fn put_str(&mut self, s: &str) -> &mut Self {
    self.put_bytes(s.as_bytes())
  }

  pub fn put_u64(&mut self, value: u64) -> &mut Self {
    self.hasher.update(value.to_le_bytes());
    self
  }

  /// Single-byte tag separating component kinds.
  pub fn put_tag(&mut self, tag: u8) -> &mut Self {
    self.hasher.update([tag]);
    self
  }

  pub fn put_hash(&mut self, hash: &HashCode) -> &mut Self {
    self.hasher.update(hash.0);
    self
  }

  pub fn put_optional_hash(&mut self, hash: Option<&HashCode>) -> &mut Self {
    match hash {
      Some(hash) => {
        self.hasher.update([PRESENT_MARKER]);
        self.hasher.update(hash.0);
      }
      None => self.hasher.update([ABSENT_SENTINEL]),
    }
    self
  }

  pub fn finish(self) -> HashCode {
    HashCode(self.hasher.finalize().into())
  }
}

/// Error reading a file for hashing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileHashError {
  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },
}

/// Hash a file's contents.
///
/// With `normalize_line_endings`, every `\r\n` pair is hashed as `\n`, so the same
/// text checked out on different platforms hashes identically.
pub fn hash_file(path: &Path, normalize_line_endings: bool) -> Result<HashCode, FileHashError> {
  let read_err = |e: std::io::Error| FileHashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];
  let mut normalized = Vec::with_capacity(buffer.len());
  let mut pending_cr = false;

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    if !normalize_line_endings {
      hasher.update(&buffer[..bytes_read]);
      continue;
    }

    normalized.clear();
    for &b in &buffer[..bytes_read] {
      if pending_cr {
        pending_cr = false;
        if b == b'\n' {
          normalized.push(b'\n');
          continue;
        }
        normalized.push(b'\r');
      }
      if b == b'\r' {
        pending_cr = true;
      } else {
        normalized.push(b);
      }
    }
    hasher.update(&normalized);
  }

  if pending_cr {
    hasher.update(b"\r");
  }

  Ok(HashCode(hasher.finalize().into()))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> HashCode {
  let mut hasher = Sha256::new();
  hasher.update(data);
  HashCode(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn hex_round_trips_through_from_str() {
    let hash = hash_bytes(b"hello");
    let parsed: HashCode = hash.to_hex().parse().unwrap();
    assert_eq!(hash, parsed);
    assert_eq!(hash.to_hex().len(), 64);
  }

  #[test]
  fn from_str_rejects_short_digest() {
    assert_eq!("abcd".parse::<HashCode>(), Err(ParseHashError::WrongLength(2)));
    assert!(matches!("zz".parse::<HashCode>(), Err(ParseHashError::InvalidHex(_))));
  }

  #[test]
  fn serializes_as_hex_string() {
    let hash = hash_bytes(b"x");
    let json = serde_json::to_string(&hash).unwrap();
    assert_eq!(json, format!("\"{}\"", hash.to_hex()));
    let back: HashCode = serde_json::from_str(&json).unwrap();
    assert_eq!(back, hash);
  }

  #[test]
  fn builder_is_length_prefixed() {
    let mut a = HashBuilder::new();
    a.put_str("ab").put_str("c");
    let mut b = HashBuilder::new();
    b.put_str("a").put_str("bc");
    assert_ne!(a.finish(), b.finish());
  }

  #[test]
  fn absent_differs_from_empty() {
    let mut absent = HashBuilder::new();
    absent.put_optional_hash(None);
    let mut empty = HashBuilder::new();
    empty.put_bytes(&[]);
    assert_ne!(absent.finish(), empty.finish());
  }

  #[test]
  fn hash_file_matches_hash_bytes() {
    let temp = tempdir().unwrap();
    let file_path = temp.path().join("test.txt");
    fs::write(&file_path, "hello world").unwrap();

    let hash = hash_file(&file_path, false).unwrap();
    assert_eq!(hash, hash_bytes(b"hello world"));
  }

  #[test]
  fn line_ending_normalization() {
    let temp = tempdir().unwrap();
    let unix = temp.path().join("unix.txt");
    let dos = temp.path().join("dos.txt");
    fs::write(&unix, "a\nb\n").unwrap();
    fs::write(&dos, "a\r\nb\r\n").unwrap();

    assert_ne!(hash_file(&unix, false).unwrap(), hash_file(&dos, false).unwrap());
    assert_eq!(hash_file(&unix, true).unwrap(), hash_file(&dos, true).unwrap());
  }

  #[test]
  fn lone_carriage_return_is_kept() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("cr.txt");
    fs::write(&path, "a\rb\r").unwrap();
    assert_eq!(hash_file(&path, true).unwrap(), hash_bytes(b"a\rb\r"));
  }

  #[test]
  fn missing_file_is_an_error() {
    let temp = tempdir().unwrap();
    let err = hash_file(&temp.path().join("nope"), false).unwrap_err();
    assert!(matches!(err, FileHashError::ReadFile { .. }));
  }
}
