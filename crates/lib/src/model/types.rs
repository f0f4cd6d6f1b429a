//! Error and view types for the model graph.

use thiserror::Error;

use crate::diagnostic::Diagnostic;

use super::path::{ModelPath, PathError};
use super::state::LifecycleState;
use super::type_token::TypeToken;

/// Errors raised while registering rules or resolving references.
///
/// Every variant names the path (or query) that failed so authors can find the
/// offending rule. Errors are `Clone` because a failed transition is recorded on
/// its node and handed to every later requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
  #[error(transparent)]
  Path(#[from] PathError),

  #[error("no model element matches {query} (type {type_token})")]
  UnknownModelElement { query: String, type_token: TypeToken },

  #[error("{query} (type {type_token}) is ambiguous: candidates are {}", .candidates.join(", "))]
  AmbiguousReference {
    query: String,
    type_token: TypeToken,
    candidates: Vec<String>,
  },

  #[error("model element {path} has type {actual}, but {expected} was requested")]
  TypeMismatch {
    path: ModelPath,
    expected: TypeToken,
    actual: TypeToken,
  },

  #[error("cycle while realizing {path} to {state}: {}", .stack.join(" -> "))]
  CyclicReference {
    path: ModelPath,
    state: LifecycleState,
    stack: Vec<String>,
  },

  #[error("model element {path} can never reach {requested} (no rule progresses it past {ceiling})")]
  UnrealizableState {
    path: ModelPath,
    requested: LifecycleState,
    ceiling: LifecycleState,
  },

  #[error("a rule for {path} at {state} is already registered")]
  DuplicateRule { path: ModelPath, state: LifecycleState },

  #[error("model element {path} is declared as {declared}, cannot register it as {requested}")]
  ConflictingType {
    path: ModelPath,
    declared: TypeToken,
    requested: TypeToken,
  },

  #[error("cannot register a rule for {path} at {state}: the element is already {current}")]
  RuleTooLate {
    path: ModelPath,
    state: LifecycleState,
    current: LifecycleState,
  },

  #[error("rules cannot target {state} (registering {path})")]
  InvalidRuleState { path: ModelPath, state: LifecycleState },

  #[error("model element {path} reached {state} without a value")]
  MissingValue { path: ModelPath, state: LifecycleState },

  #[error("rule for {path} at {state} failed: {message}")]
  RuleFailed {
    path: ModelPath,
    state: LifecycleState,
    message: String,
  },
}

/// A read-only snapshot of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
  pub path: ModelPath,
  pub type_token: TypeToken,
  pub state: LifecycleState,
  pub has_value: bool,
  /// Diagnostics reported by the rules that have run for this node, in order.
  pub diagnostics: Vec<Diagnostic>,
}
