//! Test infrastructure for the catalog core.
//!
//! Fixtures describe records once; the harness loads them into any backend
//! and wraps the result in a [`Repository`](oaiserve_catalog::Repository).

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
