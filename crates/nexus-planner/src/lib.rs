//! # nexus-planner
//!
//! Logical query planning and rule-based optimization for NexusDB.
//!
//! This crate implements:
//! - Column and expression types with collation-aware equality
//! - A table catalog with generated columns and indexes
//! - Logical plan construction
//! - Query optimization, including indexed generated column substitution

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Column types, literals and evaluation settings
pub mod types;

/// Table and index metadata
pub mod catalog;

/// Logical plan representation
pub mod logical;

/// Query optimizer
pub mod optimizer;
