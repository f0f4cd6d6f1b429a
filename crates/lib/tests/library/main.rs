//! Integration tests for kiln-lib.

mod common;
mod fingerprint_tests;
mod model_tests;
