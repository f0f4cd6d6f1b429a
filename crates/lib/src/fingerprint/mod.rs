//! Input fingerprinting for build avoidance.
//!
//! A fingerprint is a deterministic hash over a unit of work's effective
//! inputs, used as a cache lookup key. This module provides:
//! - `UnitOfWork`: the descriptor of what is fingerprinted
//! - `Normalization`: which aspects of a file tree are significant
//! - `fingerprint()`: the record for one unit, or an unavailable record
//! - `VisitEvent`: the ordered traversal of file properties
//! - `fingerprint_units()`: parallel fingerprinting with a cooperative abort

pub mod batch;
pub mod compute;
pub mod input;
pub mod normalize;
pub mod snapshot;
mod types;
pub mod visit;

pub use batch::{AbortSignal, fingerprint_units};
pub use compute::{fingerprint, fingerprint_file_property};
pub use input::{FileInput, ImplementationIdentity, InputValue, UnitOfWork};
pub use normalize::{DirectorySensitivity, LineEndingSensitivity, Normalization, PathSensitivity};
pub use snapshot::{EntrySnapshot, RootSnapshot};
pub use types::*;
pub use visit::VisitEvent;
