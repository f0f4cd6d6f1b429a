//! Reified type tokens.
//!
//! A [`TypeToken`] describes a type structurally: a base name plus resolved
//! generic arguments. Tokens compare by that description only, so the same
//! token is produced for the same type in every process. The distinguished
//! [`TypeToken::UNTYPED`] token matches any node.
//!
//! Tokens made with [`TypeToken::of`] also remember the concrete Rust type, so
//! a node declared with one only accepts values of that type. Tokens made with
//! [`TypeToken::named`] are pure descriptions: the rules of a node declared
//! with one decide which Rust type realizes it.

use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum TokenKind {
  Untyped,
  Named { base: String, args: Vec<TypeToken> },
}

/// Compares, orders and hashes by description only; the remembered Rust type
/// never takes part.
#[derive(Debug, Clone)]
pub struct TypeToken {
  kind: TokenKind,
  rust: Option<TypeId>,
}

impl TypeToken {
  pub const UNTYPED: TypeToken = TypeToken {
    kind: TokenKind::Untyped,
    rust: None,
  };

  /// The token describing the Rust type `T`.
  pub fn of<T: ?Sized + 'static>() -> Self {
    Self {
      rust: Some(TypeId::of::<T>()),
      ..parse_type_name(std::any::type_name::<T>())
    }
  }

  /// A token built from a description, equal to any token with the same base
  /// and arguments.
  pub fn named(base: impl Into<String>, args: Vec<TypeToken>) -> Self {
    Self {
      kind: TokenKind::Named {
        base: base.into(),
        args,
      },
      rust: None,
    }
  }

  /// Whether a value of type `T` may realize a node declared with this token.
  ///
  /// Untyped and described tokens accept any value; tokens made from a Rust
  /// type accept exactly that type.
  pub fn accepts<T: ?Sized + 'static>(&self) -> bool {
    match self.rust {
      Some(rust) => rust == TypeId::of::<T>(),
      None => true,
    }
  }

  pub fn is_untyped(&self) -> bool {
    matches!(self.kind, TokenKind::Untyped)
  }

  /// Base name, or `None` for the untyped token.
  pub fn base(&self) -> Option<&str> {
    match &self.kind {
      TokenKind::Untyped => None,
      TokenKind::Named { base, .. } => Some(base),
    }
  }

  pub fn args(&self) -> &[TypeToken] {
    match &self.kind {
      TokenKind::Untyped => &[],
      TokenKind::Named { args, .. } => args,
    }
  }

  /// Whether a node declared with `self` satisfies a request for `requested`.
  ///
  /// The untyped token on either side matches anything; otherwise the tokens
  /// must be structurally equal.
  pub fn is_assignable_to(&self, requested: &TypeToken) -> bool {
    requested.is_untyped() || self.is_untyped() || self == requested
  }
}

impl PartialEq for TypeToken {
  fn eq(&self, other: &Self) -> bool {
    self.kind == other.kind
  }
}

impl Eq for TypeToken {}

impl PartialOrd for TypeToken {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for TypeToken {
  fn cmp(&self, other: &Self) -> Ordering {
    self.kind.cmp(&other.kind)
  }
}

impl Hash for TypeToken {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.kind.hash(state);
  }
}

impl Default for TypeToken {
  fn default() -> Self {
    Self::UNTYPED
  }
}

impl fmt::Display for TypeToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      TokenKind::Untyped => f.write_str("<untyped>"),
      TokenKind::Named { base, args } => {
        f.write_str(base)?;
        if !args.is_empty() {
          f.write_str("<")?;
          for (i, arg) in args.iter().enumerate() {
            if i > 0 {
              f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
          }
          f.write_str(">")?;
        }
        Ok(())
      }
    }
  }
}

/// Splits a compiler-provided type name into base and generic arguments.
///
/// Tuples, references, slices and arrays are kept whole as an opaque base.
fn parse_type_name(name: &str) -> TypeToken {
  let name = name.trim();
  let opaque = || TypeToken::named(name, Vec::new());

  if name.starts_with(['(', '[', '&', '*']) {
    return opaque();
  }
  let Some(open) = name.find('<') else {
    return opaque();
  };
  let Some(inner) = name[open + 1..].strip_suffix('>') else {
    return opaque();
  };

  let args = split_top_level(inner).into_iter().map(parse_type_name).collect();
  TypeToken::named(&name[..open], args)
}

/// Splits on commas that are not nested inside `<>`, `()` or `[]`.
fn split_top_level(s: &str) -> Vec<&str> {
  let mut parts = Vec::new();
  let mut depth = 0usize;
  let mut start = 0;
  for (i, c) in s.char_indices() {
    match c {
      '<' | '(' | '[' => depth += 1,
      '>' | ')' | ']' => depth = depth.saturating_sub(1),
      ',' if depth == 0 => {
        parts.push(s[start..i].trim());
        start = i + 1;
      }
      _ => {}
    }
  }
  let last = s[start..].trim();
  if !last.is_empty() {
    parts.push(last);
  }
  parts
}
