//! Rules and the context they run in.
//!
//! A rule is bound to one (node, state) pair and runs exactly once, when the
//! node is driven into that state. It receives a [`RuleContext`] through which
//! it can resolve its own inputs, create or mutate the node's value, and report
//! diagnostics.

use std::any::Any;
use std::sync::Arc;

use crate::diagnostic::{Diagnostic, DiagnosticSink};

use super::graph::ModelGraph;
use super::path::ModelPath;
use super::reference::ModelReference;
use super::state::LifecycleState;
use super::type_token::TypeToken;
use super::types::{ModelError, NodeView};

/// Type-erased realized value of a node.
pub type ModelValue = Arc<dyn Any + Send + Sync>;

/// The function bound to a (node, state) pair.
pub type RuleFn = dyn Fn(&mut RuleContext<'_>) -> Result<(), ModelError> + Send + Sync;

pub struct RuleContext<'a> {
  graph: &'a ModelGraph,
  path: &'a ModelPath,
  declared: &'a TypeToken,
  target: LifecycleState,
  value: Option<ModelValue>,
  diagnostics: DiagnosticSink,
}

impl<'a> RuleContext<'a> {
  pub(crate) fn new(
    graph: &'a ModelGraph,
    path: &'a ModelPath,
    declared: &'a TypeToken,
    target: LifecycleState,
    value: Option<ModelValue>,
  ) -> Self {
    Self {
      graph,
      path,
      declared,
      target,
      value,
      diagnostics: DiagnosticSink::new(),
    }
  }

  pub(crate) fn into_parts(self) -> (Option<ModelValue>, Vec<Diagnostic>) {
    (self.value, self.diagnostics.into_diagnostics())
  }

  /// Path of the node being realized.
  pub fn path(&self) -> &ModelPath {
    self.path
  }

  /// The state this rule moves the node into.
  pub fn target_state(&self) -> LifecycleState {
    self.target
  }

  /// Resolves an input, realizing it as far as the reference requires.
  pub fn resolve<T: Any + Send + Sync>(&self, reference: &ModelReference) -> Result<Arc<T>, ModelError> {
    self.graph.resolve(reference)
  }

  /// Resolves an input without reading its value.
  pub fn resolve_node(&self, reference: &ModelReference) -> Result<NodeView, ModelError> {
    self.graph.resolve_node(reference)
  }

  /// Replaces the node's value.
  ///
  /// A node declared with [`TypeToken::of`] only takes values of that type. A
  /// node declared with [`TypeToken::named`] or untyped takes any value.
  pub fn set_value<T: Any + Send + Sync>(&mut self, value: T) -> Result<(), ModelError> {
    if !self.declared.accepts::<T>() {
      return Err(ModelError::TypeMismatch {
        path: self.path.clone(),
        expected: self.declared.clone(),
        actual: TypeToken::of::<T>(),
      });
    }
    let value: ModelValue = Arc::new(value);
    self.value = Some(value);
    Ok(())
  }

  /// The node's current value, if one has been created.
  pub fn value<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>, ModelError> {
    match self.value.clone() {
      None => Ok(None),
      Some(value) => value.downcast::<T>().map(Some).map_err(|_| self.mismatch::<T>()),
    }
  }

  /// Mutates the node's value in place.
  ///
  /// Readers holding the previous value keep seeing it unchanged; the value is
  /// copied only when such readers exist.
  pub fn mutate<T, F>(&mut self, change: F) -> Result<(), ModelError>
  where
    T: Any + Clone + Send + Sync,
    F: FnOnce(&mut T),
  {
    let Some(value) = self.value.take() else {
      return Err(ModelError::MissingValue {
        path: self.path.clone(),
        state: self.target,
      });
    };
    match value.downcast::<T>() {
      Ok(mut typed) => {
        change(Arc::make_mut(&mut typed));
        self.value = Some(typed as ModelValue);
        Ok(())
      }
      Err(original) => {
        self.value = Some(original);
        Err(self.mismatch::<T>())
      }
    }
  }

  pub fn report(&mut self, diagnostic: Diagnostic) {
    self.diagnostics.report(diagnostic);
  }

  /// Builds a failure attributed to this node and state.
  pub fn fail(&self, message: impl Into<String>) -> ModelError {
    ModelError::RuleFailed {
      path: self.path.clone(),
      state: self.target,
      message: message.into(),
    }
  }

  fn mismatch<T: Any>(&self) -> ModelError {
    ModelError::TypeMismatch {
      path: self.path.clone(),
      expected: TypeToken::of::<T>(),
      actual: self.declared.clone(),
    }
  }
}
