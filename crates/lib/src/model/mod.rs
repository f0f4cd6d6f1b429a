//! The lazily-realized model graph.
//!
//! This module provides the configuration-time model for one build:
//! - `ModelPath`: dotted addresses of model elements
//! - `TypeToken`: structural type identities used for lookup and type checks
//! - `LifecycleState`: the ordered stages a node moves through
//! - `ModelReference`: queries for a node by path, type, scope and minimum state
//! - `ModelGraph`: the registry that drives nodes forward by running bound rules

pub mod graph;
mod node;
pub mod path;
pub mod reference;
pub mod rule;
pub mod state;
pub mod type_token;
mod types;

pub use graph::ModelGraph;
pub use path::{ModelPath, PathError};
pub use reference::ModelReference;
pub use rule::{ModelValue, RuleContext, RuleFn};
pub use state::LifecycleState;
pub use type_token::TypeToken;
pub use types::*;
