//! NexusDB Performance Benchmarks
//!
//! This crate contains benchmarks for the NexusDB planner:
//! - Collecting indexed generated columns from a plan
//! - Substituting generated columns into filters, sorts and projections
//! - Full optimizer runs
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p nexus-bench
//! ```

pub mod utils;
