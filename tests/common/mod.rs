//! Shared test utilities for unilog integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Everything on disk lives under a per-test
//! [`tempfile::TempDir`] owned by [`TestEnv`].

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
