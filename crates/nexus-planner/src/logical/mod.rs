//! Logical query plan representation.
//!
//! This module defines the logical plan tree the optimizer rewrites:
//! typed expressions, schemas of plan-unique columns, operators that own
//! their children, and a builder that assembles plans over catalog tables.

mod builder;
mod expr;
mod operator;
mod plan;
mod schema;

pub use builder::*;
pub use expr::*;
pub use operator::*;
pub use plan::*;
pub use schema::*;
