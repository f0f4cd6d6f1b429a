//! The model graph: rule registration and lazy realization.
//!
//! Nodes are addressed by [`ModelPath`] and created on first use from their
//! registration. Resolving a [`ModelReference`] locates the node (by path, or by
//! type within an optional scope), checks its type, and drives it forward one
//! state at a time until it reaches the requested state, running each bound
//! rule exactly once.
//!
//! # Concurrency
//!
//! Locking is per node. A thread that finds a node being realized by another
//! thread blocks on that node's condition variable, unless the wait-for chain
//! shows the other thread is (transitively) waiting on it, in which case the
//! request fails with [`ModelError::CyclicReference`]. A rule asking for its own
//! node beyond the node's current state fails the same way.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::diagnostic::Diagnostic;

use super::node::{ModelNode, RealizationTable, RealizerId, StackFrame, describe_stack};
use super::path::ModelPath;
use super::reference::ModelReference;
use super::rule::{ModelValue, RuleContext, RuleFn};
use super::state::LifecycleState;
use super::type_token::TypeToken;
use super::types::{ModelError, NodeView};

struct Registration {
  declared: TypeToken,
  rules: BTreeMap<LifecycleState, Arc<RuleFn>>,
}

impl Registration {
  /// The highest state any bound rule can move the node into.
  fn ceiling(&self) -> LifecycleState {
    self.rules.keys().next_back().copied().unwrap_or(LifecycleState::Known)
  }
}

/// The registry of model nodes for one build configuration.
///
/// A graph is created when configuration starts and dropped when it ends; share
/// it across worker threads by reference.
#[derive(Default)]
pub struct ModelGraph {
  registrations: RwLock<BTreeMap<ModelPath, Registration>>,
  nodes: RwLock<BTreeMap<ModelPath, Arc<ModelNode>>>,
  table: Mutex<RealizationTable>,
}

impl ModelGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Binds `rule` to move the node at `path` into `state`.
  ///
  /// The first registration for a path declares its type; later registrations
  /// must agree with it.
  pub fn register<F>(&self, path: ModelPath, type_token: TypeToken, state: LifecycleState, rule: F) -> Result<(), ModelError>
  where
    F: Fn(&mut RuleContext<'_>) -> Result<(), ModelError> + Send + Sync + 'static,
  {
    if state == LifecycleState::Known {
      return Err(ModelError::InvalidRuleState { path, state });
    }

    let mut registrations = self.registrations.write();
    if let Some(existing) = registrations.get(&path) {
      if existing.declared != type_token {
        return Err(ModelError::ConflictingType {
          path,
          declared: existing.declared.clone(),
          requested: type_token,
        });
      }
      if existing.rules.contains_key(&state) {
        return Err(ModelError::DuplicateRule { path, state });
      }
    }

    if let Some(node) = self.nodes.read().get(&path) {
      let current = node.state();
      if current >= state {
        return Err(ModelError::RuleTooLate { path, state, current });
      }
    }

    debug!(path = %path, state = %state, type_token = %type_token, "registered rule");
    registrations
      .entry(path)
      .or_insert_with(|| Registration {
        declared: type_token,
        rules: BTreeMap::new(),
      })
      .rules
      .insert(state, Arc::new(rule));
    Ok(())
  }

  /// Realizes the referenced node and returns its value.
  pub fn resolve<T: Any + Send + Sync>(&self, reference: &ModelReference) -> Result<Arc<T>, ModelError> {
    let node = self.realize(reference)?;
    let (state, value) = {
      let inner = node.inner.lock();
      (inner.state, inner.value.clone())
    };
    let Some(value) = value else {
      return Err(ModelError::MissingValue {
        path: node.path.clone(),
        state,
      });
    };
    value.downcast::<T>().map_err(|_| ModelError::TypeMismatch {
      path: node.path.clone(),
      expected: TypeToken::of::<T>(),
      actual: node.declared.clone(),
    })
  }

  /// Realizes the referenced node and returns a read-only view of it.
  pub fn resolve_node(&self, reference: &ModelReference) -> Result<NodeView, ModelError> {
    self.realize(reference).map(|node| node.view())
  }

  /// Resolves independent references concurrently on up to `parallelism`
  /// worker threads. Outcomes are returned in input order.
  pub fn realize_all(&self, references: &[ModelReference], parallelism: usize) -> Vec<Result<NodeView, ModelError>> {
    let workers = parallelism.clamp(1, references.len().max(1));
    info!(references = references.len(), workers, "realizing references");

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
      Ok(pool) => pool.install(|| references.par_iter().map(|r| self.resolve_node(r)).collect()),
      Err(err) => {
        warn!(error = %err, "could not start worker pool, realizing sequentially");
        references.iter().map(|r| self.resolve_node(r)).collect()
      }
    }
  }

  /// A view of the node at `path`, if it has been created.
  pub fn node(&self, path: &ModelPath) -> Option<NodeView> {
    self.nodes.read().get(path).map(|node| node.view())
  }

  pub fn state_of(&self, path: &ModelPath) -> Option<LifecycleState> {
    self.nodes.read().get(path).map(|node| node.state())
  }

  /// Every path with at least one registered rule, in path order.
  pub fn paths(&self) -> Vec<ModelPath> {
    self.registrations.read().keys().cloned().collect()
  }

  fn realize(&self, reference: &ModelReference) -> Result<Arc<ModelNode>, ModelError> {
    let node = self.locate(reference)?;
    self.drive(&node, reference.state())?;
    Ok(node)
  }

  fn locate(&self, reference: &ModelReference) -> Result<Arc<ModelNode>, ModelError> {
    let path = match reference.path() {
      Some(path) => path.clone(),
      None => self.find_by_type(reference)?,
    };
    let node = self.node_at(&path).ok_or_else(|| ModelError::UnknownModelElement {
      query: describe_query(reference),
      type_token: reference.type_token().clone(),
    })?;

    if !node.declared.is_assignable_to(reference.type_token()) {
      return Err(ModelError::TypeMismatch {
        path,
        expected: reference.type_token().clone(),
        actual: node.declared.clone(),
      });
    }
    Ok(node)
  }

  fn find_by_type(&self, reference: &ModelReference) -> Result<ModelPath, ModelError> {
    let requested = reference.type_token();
    let registrations = self.registrations.read();
    let candidates: Vec<&ModelPath> = registrations
      .iter()
      .filter(|(path, registration)| {
        (requested.is_untyped() || registration.declared == *requested) && reference.scope_matches(path)
      })
      .map(|(path, _)| path)
      .collect();
    trace!(query = %describe_query(reference), candidates = candidates.len(), "type search");

    match candidates.as_slice() {
      [] => Err(ModelError::UnknownModelElement {
        query: describe_query(reference),
        type_token: requested.clone(),
      }),
      [only] => Ok((*only).clone()),
      many => Err(ModelError::AmbiguousReference {
        query: describe_query(reference),
        type_token: requested.clone(),
        candidates: many.iter().map(ToString::to_string).collect(),
      }),
    }
  }

  /// The node at `path`, created in state `Known` if it is registered but not yet materialized.
  fn node_at(&self, path: &ModelPath) -> Option<Arc<ModelNode>> {
    if let Some(node) = self.nodes.read().get(path) {
      return Some(node.clone());
    }
    let declared = self.registrations.read().get(path)?.declared.clone();
    let mut nodes = self.nodes.write();
    let node = nodes.entry(path.clone()).or_insert_with(|| {
      debug!(path = %path, "created node");
      Arc::new(ModelNode::new(path.clone(), declared))
    });
    Some(node.clone())
  }

  fn ceiling(&self, path: &ModelPath) -> LifecycleState {
    self
      .registrations
      .read()
      .get(path)
      .map(Registration::ceiling)
      .unwrap_or(LifecycleState::Known)
  }

  fn rule_for(&self, path: &ModelPath, state: LifecycleState) -> Option<Arc<RuleFn>> {
    self.registrations.read().get(path)?.rules.get(&state).cloned()
  }

  /// Blocks until `node` is at least `target`, driving it there if no other
  /// thread is already doing so.
  fn drive(&self, node: &ModelNode, target: LifecycleState) -> Result<(), ModelError> {
    if target == LifecycleState::Known {
      return Ok(());
    }
    let ceiling = self.ceiling(&node.path);
    if target > ceiling {
      return Err(ModelError::UnrealizableState {
        path: node.path.clone(),
        requested: target,
        ceiling,
      });
    }

    let me = RealizerId::current();
    let mut inner = node.inner.lock();
    loop {
      if inner.state >= target {
        return Ok(());
      }
      if let Some((failed_at, error)) = &inner.failure
        && *failed_at <= target
      {
        return Err(error.clone());
      }

      match inner.owner {
        None => {
          inner.owner = Some(me);
          self.table.lock().claim(&node.path, me);
          break;
        }
        Some(owner) if owner == me => {
          return Err(cycle(&node.path, target));
        }
        Some(owner) => {
          {
            let mut table = self.table.lock();
            if table.leads_to(owner, me) {
              return Err(cycle(&node.path, target));
            }
            table.start_waiting(me, &node.path, target);
          }
          debug!(path = %node.path, state = %target, "waiting for in-progress realization");
          node.changed.wait(&mut inner);
          self.table.lock().stop_waiting(me);
        }
      }
    }
    drop(inner);

    let result = self.run_transitions(node, target);

    let mut inner = node.inner.lock();
    inner.owner = None;
    {
      let mut table = self.table.lock();
      table.release(&node.path);
      table.release_waiters(&node.path);
    }
    drop(inner);
    node.changed.notify_all();
    result
  }

  fn run_transitions(&self, node: &ModelNode, target: LifecycleState) -> Result<(), ModelError> {
    let _frame = StackFrame::enter(&node.path, target);
    loop {
      let (current, value) = {
        let inner = node.inner.lock();
        (inner.state, inner.value.clone())
      };
      if current >= target {
        return Ok(());
      }
      let Some(next) = current.next() else {
        return Ok(());
      };

      let outcome = self.transition(node, next, value);
      let mut inner = node.inner.lock();
      match outcome {
        Ok((value, diagnostics)) => {
          inner.state = next;
          inner.value = value;
          inner.diagnostics.extend(diagnostics);
          self.table.lock().satisfy_waiters(&node.path, next);
          drop(inner);
          node.changed.notify_all();
          debug!(path = %node.path, from = %current, to = %next, "transition complete");
        }
        Err(error) => {
          warn!(path = %node.path, state = %next, error = %error, "rule failed");
          inner.failure = Some((next, error.clone()));
          return Err(error);
        }
      }
    }
  }

  fn transition(
    &self,
    node: &ModelNode,
    next: LifecycleState,
    value: Option<ModelValue>,
  ) -> Result<(Option<ModelValue>, Vec<Diagnostic>), ModelError> {
    let (value, diagnostics) = match self.rule_for(&node.path, next) {
      Some(rule) => {
        debug!(path = %node.path, state = %next, "running rule");
        let mut ctx = RuleContext::new(self, &node.path, &node.declared, next, value);
        match panic::catch_unwind(AssertUnwindSafe(|| (*rule)(&mut ctx))) {
          Ok(result) => result?,
          Err(payload) => {
            return Err(ModelError::RuleFailed {
              path: node.path.clone(),
              state: next,
              message: format!("rule panicked: {}", panic_message(payload.as_ref())),
            });
          }
        }
        ctx.into_parts()
      }
      None => {
        trace!(path = %node.path, state = %next, "no rule bound, advancing");
        (value, Vec::new())
      }
    };

    for diagnostic in &diagnostics {
      debug!(path = %node.path, state = %next, diagnostic = %diagnostic, "rule diagnostic");
    }

    if next.requires_value() && value.is_none() {
      return Err(ModelError::MissingValue {
        path: node.path.clone(),
        state: next,
      });
    }
    Ok((value, diagnostics))
  }
}

fn cycle(path: &ModelPath, target: LifecycleState) -> ModelError {
  ModelError::CyclicReference {
    path: path.clone(),
    state: target,
    stack: describe_stack(path, target),
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&str>() {
    *message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.as_str()
  } else {
    "non-string panic payload"
  }
}

fn describe_query(reference: &ModelReference) -> String {
  let mut query = match (reference.path(), reference.scope()) {
    (Some(path), _) => format!("path {}", path),
    (None, Some(scope)) => format!("type search in scope {}", scope),
    (None, None) => "type search".to_string(),
  };
  if let Some(description) = reference.description() {
    query.push_str(&format!(" ({})", description));
  }
  query
}
