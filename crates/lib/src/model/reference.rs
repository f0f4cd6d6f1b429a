//! Speculative references to model elements.
//!
//! Rule inputs are declared as [`ModelReference`]s rather than concrete nodes.
//! A reference may select by path, by type, or by type within a scope, and
//! states the minimum lifecycle state the caller needs.
//!
//! References are immutable and cheap to clone. Derivations that leave a field
//! unchanged hand back the same shared instance (see [`ModelReference::same_instance`]).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use super::path::{ModelPath, PathError};
use super::state::LifecycleState;
use super::type_token::TypeToken;

#[derive(Debug, PartialEq, Eq, Hash)]
struct ReferenceData {
  path: Option<ModelPath>,
  type_token: TypeToken,
  scope: Option<ModelPath>,
  state: LifecycleState,
  description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelReference {
  data: Arc<ReferenceData>,
}

static ANY: LazyLock<ModelReference> = LazyLock::new(|| ModelReference::of_type(TypeToken::UNTYPED));

impl ModelReference {
  fn from_data(data: ReferenceData) -> Self {
    Self { data: Arc::new(data) }
  }

  /// The general constructor. A missing state means "fully realized".
  pub fn new(
    path: Option<ModelPath>,
    type_token: TypeToken,
    scope: Option<ModelPath>,
    state: Option<LifecycleState>,
    description: Option<String>,
  ) -> Self {
    Self::from_data(ReferenceData {
      path,
      type_token,
      scope,
      state: state.unwrap_or(LifecycleState::GraphClosed),
      description,
    })
  }

  /// The shared untyped, pathless reference that matches anything.
  pub fn any() -> Self {
    ANY.clone()
  }

  pub fn of(path: ModelPath, type_token: TypeToken) -> Self {
    Self::new(Some(path), type_token, None, None, None)
  }

  pub fn of_state(path: ModelPath, type_token: TypeToken, state: LifecycleState) -> Self {
    Self::new(Some(path), type_token, None, Some(state), None)
  }

  pub fn of_type(type_token: TypeToken) -> Self {
    Self::new(None, type_token, None, None, None)
  }

  pub fn of_path(path: ModelPath) -> Self {
    Self::of(path, TypeToken::UNTYPED)
  }

  pub fn untyped(path: ModelPath, description: impl Into<String>) -> Self {
    Self::new(Some(path), TypeToken::UNTYPED, None, None, Some(description.into()))
  }

  /// Parses `path` and references the element typed as `T`.
  pub fn to_value<T: ?Sized + 'static>(path: &str) -> Result<Self, PathError> {
    Ok(Self::of(ModelPath::parse(path)?, TypeToken::of::<T>()))
  }

  pub fn path(&self) -> Option<&ModelPath> {
    self.data.path.as_ref()
  }

  pub fn type_token(&self) -> &TypeToken {
    &self.data.type_token
  }

  /// The scope of the node to select, if any. A node is selected when its own
  /// path or its parent's path equals the scope.
  pub fn scope(&self) -> Option<&ModelPath> {
    self.data.scope.as_ref()
  }

  pub fn state(&self) -> LifecycleState {
    self.data.state
  }

  pub fn description(&self) -> Option<&str> {
    self.data.description.as_deref()
  }

  pub fn is_untyped(&self) -> bool {
    self.data.type_token.is_untyped()
  }

  /// Whether both handles share one allocation.
  pub fn same_instance(&self, other: &ModelReference) -> bool {
    Arc::ptr_eq(&self.data, &other.data)
  }

  /// Whether a node at `path` satisfies this reference's scope constraint.
  pub fn scope_matches(&self, path: &ModelPath) -> bool {
    match &self.data.scope {
      None => true,
      Some(scope) => path == scope || path.is_direct_child_of(scope),
    }
  }

  pub fn in_scope(&self, scope: ModelPath) -> Self {
    if self.data.scope.as_ref() == Some(&scope) {
      return self.clone();
    }
    self.derive(|d| d.scope = Some(scope))
  }

  pub fn with_path(&self, path: ModelPath) -> Self {
    if self.data.path.as_ref() == Some(&path) {
      return self.clone();
    }
    self.derive(|d| d.path = Some(path))
  }

  pub fn at_state(&self, state: LifecycleState) -> Self {
    if self.data.state == state {
      return self.clone();
    }
    self.derive(|d| d.state = state)
  }

  pub fn with_description(&self, description: impl Into<String>) -> Self {
    let description = description.into();
    if self.data.description.as_deref() == Some(description.as_str()) {
      return self.clone();
    }
    self.derive(|d| d.description = Some(description))
  }

  fn derive(&self, change: impl FnOnce(&mut ReferenceData)) -> Self {
    let mut data = ReferenceData {
      path: self.data.path.clone(),
      type_token: self.data.type_token.clone(),
      scope: self.data.scope.clone(),
      state: self.data.state,
      description: self.data.description.clone(),
    };
    change(&mut data);
    Self::from_data(data)
  }
}

impl PartialEq for ModelReference {
  fn eq(&self, other: &Self) -> bool {
    self.same_instance(other) || self.data == other.data
  }
}

impl Eq for ModelReference {}

impl Hash for ModelReference {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.data.hash(state);
  }
}

impl fmt::Display for ModelReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let show = |p: &Option<ModelPath>| p.as_ref().map_or_else(|| "null".to_string(), ToString::to_string);
    write!(
      f,
      "ModelReference{{path={}, scope={}, type={}, state={}}}",
      show(&self.data.path),
      show(&self.data.scope),
      self.data.type_token,
      self.data.state
    )
  }
}
