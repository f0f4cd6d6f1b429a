//! Graph-owned node state and the realization bookkeeping used for cycle
//! detection.
//!
//! Each node carries its own mutex and condition variable, so realization of
//! independent nodes never contends. Ownership of in-progress realizations is
//! mirrored in a graph-wide [`RealizationTable`], which lets a caller check the
//! wait-for chain before it blocks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::diagnostic::Diagnostic;

use super::path::ModelPath;
use super::rule::ModelValue;
use super::state::LifecycleState;
use super::type_token::TypeToken;
use super::types::{ModelError, NodeView};

/// Identifies one thread of work driving realizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RealizerId(u64);

static NEXT_REALIZER: AtomicU64 = AtomicU64::new(1);

thread_local! {
  static CURRENT_REALIZER: RealizerId = RealizerId(NEXT_REALIZER.fetch_add(1, Ordering::Relaxed));
  static REALIZATION_STACK: RefCell<Vec<(ModelPath, LifecycleState)>> = const { RefCell::new(Vec::new()) };
}

impl RealizerId {
  pub(crate) fn current() -> Self {
    CURRENT_REALIZER.with(|id| *id)
  }
}

/// Marks a node as being realized by the current thread until dropped.
pub(crate) struct StackFrame;

impl StackFrame {
  pub(crate) fn enter(path: &ModelPath, target: LifecycleState) -> Self {
    REALIZATION_STACK.with(|stack| stack.borrow_mut().push((path.clone(), target)));
    StackFrame
  }
}

impl Drop for StackFrame {
  fn drop(&mut self) {
    REALIZATION_STACK.with(|stack| {
      stack.borrow_mut().pop();
    });
  }
}

/// The current thread's realization stack followed by the offending request.
pub(crate) fn describe_stack(path: &ModelPath, target: LifecycleState) -> Vec<String> {
  REALIZATION_STACK.with(|stack| {
    stack
      .borrow()
      .iter()
      .map(|(p, s)| format!("{}@{}", p, s))
      .chain(std::iter::once(format!("{}@{}", path, target)))
      .collect()
  })
}

#[derive(Default)]
pub(crate) struct RealizationTable {
  owners: HashMap<ModelPath, RealizerId>,
  /// Each blocked realizer, the node it waits on, and the state it needs.
  waiting: HashMap<RealizerId, (ModelPath, LifecycleState)>,
}

impl RealizationTable {
  pub(crate) fn claim(&mut self, path: &ModelPath, realizer: RealizerId) {
    self.owners.insert(path.clone(), realizer);
  }

  pub(crate) fn release(&mut self, path: &ModelPath) {
    self.owners.remove(path);
  }

  pub(crate) fn start_waiting(&mut self, realizer: RealizerId, path: &ModelPath, target: LifecycleState) {
    self.waiting.insert(realizer, (path.clone(), target));
  }

  /// Drops every wait on `path`. Woken realizers re-register if they still
  /// have to block, so a later owner is never linked to a stale wait.
  pub(crate) fn release_waiters(&mut self, path: &ModelPath) {
    self.waiting.retain(|_, (waited, _)| waited != path);
  }

  /// Drops the waits on `path` that `reached` satisfies.
  pub(crate) fn satisfy_waiters(&mut self, path: &ModelPath, reached: LifecycleState) {
    self.waiting.retain(|_, (waited, target)| waited != path || *target > reached);
  }

  pub(crate) fn stop_waiting(&mut self, realizer: RealizerId) {
    self.waiting.remove(&realizer);
  }

  /// Whether blocking on a node owned by `owner` would, through the chain of
  /// waiting realizers, end up waiting on `me`.
  pub(crate) fn leads_to(&self, owner: RealizerId, me: RealizerId) -> bool {
    let mut current = owner;
    for _ in 0..=self.waiting.len() {
      if current == me {
        return true;
      }
      let Some((path, _)) = self.waiting.get(&current) else {
        return false;
      };
      let Some(next) = self.owners.get(path) else {
        return false;
      };
      current = *next;
    }
    false
  }
}

pub(crate) struct NodeInner {
  pub(crate) state: LifecycleState,
  pub(crate) value: Option<ModelValue>,
  pub(crate) owner: Option<RealizerId>,
  /// The state whose transition failed, with the error replayed to later requesters.
  pub(crate) failure: Option<(LifecycleState, ModelError)>,
  pub(crate) diagnostics: Vec<Diagnostic>,
}

pub(crate) struct ModelNode {
  pub(crate) path: ModelPath,
  pub(crate) declared: TypeToken,
  pub(crate) inner: Mutex<NodeInner>,
  pub(crate) changed: Condvar,
}

impl ModelNode {
  pub(crate) fn new(path: ModelPath, declared: TypeToken) -> Self {
    Self {
      path,
      declared,
      inner: Mutex::new(NodeInner {
        state: LifecycleState::Known,
        value: None,
        owner: None,
        failure: None,
        diagnostics: Vec::new(),
      }),
      changed: Condvar::new(),
    }
  }

  pub(crate) fn state(&self) -> LifecycleState {
    self.inner.lock().state
  }

  pub(crate) fn view(&self) -> NodeView {
    let inner = self.inner.lock();
    NodeView {
      path: self.path.clone(),
      type_token: self.declared.clone(),
      state: inner.state,
      has_value: inner.value.is_some(),
      diagnostics: inner.diagnostics.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn path(s: &str) -> ModelPath {
    ModelPath::parse(s).unwrap()
  }

  #[test]
  fn chain_through_waiting_realizers_is_detected() {
    let (r1, r2, r3) = (RealizerId(101), RealizerId(102), RealizerId(103));
    let mut table = RealizationTable::default();
    table.claim(&path("a"), r1);
    table.claim(&path("b"), r2);
    // r2 waits on a (owned by r1); r3 owns nothing yet
    table.start_waiting(r2, &path("a"), LifecycleState::Initialized);

    assert!(table.leads_to(r2, r1));
    assert!(!table.leads_to(r2, r3));
  }

  #[test]
  fn released_nodes_break_the_chain() {
    let (r1, r2) = (RealizerId(201), RealizerId(202));
    let mut table = RealizationTable::default();
    table.claim(&path("a"), r1);
    table.start_waiting(r2, &path("a"), LifecycleState::Initialized);
    table.release(&path("a"));

    assert!(!table.leads_to(r2, r1));
  }

  #[test]
  fn stale_waits_do_not_link_to_the_next_owner() {
    let (r1, r2, r3) = (RealizerId(301), RealizerId(302), RealizerId(303));
    let mut table = RealizationTable::default();
    table.claim(&path("p"), r1);
    table.start_waiting(r2, &path("p"), LifecycleState::Initialized);
    table.release(&path("p"));
    table.release_waiters(&path("p"));

    // r3 takes p over before r2 has woken up.
    table.claim(&path("p"), r3);
    assert!(!table.leads_to(r2, r3));
  }

  #[test]
  fn satisfied_waits_are_dropped() {
    let (r1, r2, r3) = (RealizerId(401), RealizerId(402), RealizerId(403));
    let mut table = RealizationTable::default();
    table.claim(&path("p"), r1);
    table.start_waiting(r2, &path("p"), LifecycleState::Initialized);
    table.start_waiting(r3, &path("p"), LifecycleState::Finalized);

    table.satisfy_waiters(&path("p"), LifecycleState::Mutated);
    assert!(!table.leads_to(r2, r1));
    assert!(table.leads_to(r3, r1));
  }

  #[test]
  fn stack_frames_unwind() {
    let a = path("a");
    {
      let _outer = StackFrame::enter(&a, LifecycleState::Initialized);
      let described = describe_stack(&path("b"), LifecycleState::Mutated);
      assert_eq!(described, vec!["a@Initialized".to_string(), "b@Mutated".to_string()]);
    }
    assert_eq!(describe_stack(&a, LifecycleState::Known), vec!["a@Known".to_string()]);
  }
}
