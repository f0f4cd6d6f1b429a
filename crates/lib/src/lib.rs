//! kiln-lib: the configuration and build-avoidance core of kiln.
//!
//! This crate provides:
//! - `model`: a path-addressed graph of lazily-realized configuration nodes
//! - `fingerprint`: deterministic input fingerprints and file-tree visitation
//! - `diagnostic`: structured diagnostics reported by rules
//! - `config`: engine configuration shared by both

pub mod config;
pub mod consts;
pub mod diagnostic;
pub mod fingerprint;
pub mod model;
pub mod util;
