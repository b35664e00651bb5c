//! # nexus-test
//!
//! Integration tests for the NexusDB planner.
//!
//! This crate provides the catalog fixtures and tracing setup shared by the
//! tests under `tests/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test utilities and helpers
pub mod utils;
