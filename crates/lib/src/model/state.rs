//! Lifecycle states of model nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How far a node has been realized. States are totally ordered and a node's
/// state never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
  Known,
  Discovered,
  Registered,
  DefaultsApplied,
  Initialized,
  Mutated,
  Finalized,
  SelfClosed,
  GraphClosed,
}

impl LifecycleState {
  pub const ALL: [LifecycleState; 9] = [
    LifecycleState::Known,
    LifecycleState::Discovered,
    LifecycleState::Registered,
    LifecycleState::DefaultsApplied,
    LifecycleState::Initialized,
    LifecycleState::Mutated,
    LifecycleState::Finalized,
    LifecycleState::SelfClosed,
    LifecycleState::GraphClosed,
  ];

  pub fn index(self) -> usize {
    self as usize
  }

  /// The following state, or `None` from `GraphClosed`.
  pub fn next(self) -> Option<LifecycleState> {
    Self::ALL.get(self.index() + 1).copied()
  }

  /// States from which a node's value must be present.
  pub fn requires_value(self) -> bool {
    self >= LifecycleState::Initialized
  }
}

impl fmt::Display for LifecycleState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}
