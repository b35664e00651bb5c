//! Fixture tables and helpers.

use std::sync::{Arc, Once};

use nexus_planner::catalog::{Catalog, ColumnInfo, IndexInfo, TableInfo};
use nexus_planner::logical::{ColumnIdAllocator, Expr, LogicalOperator, LogicalPlan, PlanBuilder};
use nexus_planner::optimizer::{
    GeneratedColumnSubstitutionRule, OptimizeTrace, OptimizerContext, OptimizerRule,
};
use nexus_planner::types::{Collation, FieldType, Literal};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test subscriber once per process. Honours `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nexus_planner=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A case-insensitive string constant.
pub fn ci_str(value: &str) -> Expr {
    Expr::constant(
        Literal::String(value.to_string()),
        FieldType::varchar(20).with_collation(Collation::Utf8GeneralCi),
    )
}

/// Builds the `t` fixture table:
///
/// | offset | column | type        | definition              | index      |
/// |--------|--------|-------------|-------------------------|------------|
/// | 0      | a      | INT         |                         |            |
/// | 1      | b      | VARCHAR(20) |                         |            |
/// | 2      | c      | VARCHAR(20) |                         |            |
/// | 3      | g      | BIGINT      | a + 1, virtual          | idx_g      |
/// | 4      | h      | VARCHAR(20) | concat(b, c), virtual   | idx_h      |
/// | 5      | s      | BIGINT      | a * 2, stored           | idx_s      |
/// | 6      | n      | BIGINT      | a - 1, virtual          |            |
/// | 7      | v      | VARCHAR(10) | lower(b), virtual       | idx_v      |
/// | 8      | k      | VARCHAR(20) | concat(b, 'X' ci)       | idx_k      |
pub fn fixture_table() -> TableInfo {
    let a = ColumnInfo::new(1, "a", FieldType::int());
    let b = ColumnInfo::new(2, "b", FieldType::varchar(20));
    let c = ColumnInfo::new(3, "c", FieldType::varchar(20));
    let g = ColumnInfo::new(4, "g", FieldType::bigint())
        .virtual_generated(a.to_expr().plus(Expr::lit_i64(1)));
    let h = ColumnInfo::new(5, "h", FieldType::varchar(20)).virtual_generated(Expr::func(
        "concat",
        vec![b.to_expr(), c.to_expr()],
        FieldType::varchar(20),
    ));
    let s = ColumnInfo::new(6, "s", FieldType::bigint())
        .stored_generated(a.to_expr().multiply(Expr::lit_i64(2)));
    let n = ColumnInfo::new(7, "n", FieldType::bigint())
        .virtual_generated(a.to_expr().minus(Expr::lit_i64(1)));
    let v = ColumnInfo::new(8, "v", FieldType::varchar(10)).virtual_generated(Expr::func(
        "lower",
        vec![b.to_expr()],
        FieldType::varchar(20),
    ));
    let k = ColumnInfo::new(9, "k", FieldType::varchar(20)).virtual_generated(Expr::func(
        "concat",
        vec![b.to_expr(), ci_str("X")],
        FieldType::varchar(20),
    ));

    TableInfo::new("t")
        .with_column(a)
        .with_column(b)
        .with_column(c)
        .with_column(g)
        .with_column(h)
        .with_column(s)
        .with_column(n)
        .with_column(v)
        .with_column(k)
        .with_index(IndexInfo::new("idx_g", vec![3], false))
        .with_index(IndexInfo::new("idx_h", vec![4], false))
        .with_index(IndexInfo::new("idx_s", vec![5], false))
        .with_index(IndexInfo::new("idx_v", vec![7], false))
        .with_index(IndexInfo::new("idx_k", vec![8], false))
}

/// A table with an index but no generated columns.
pub fn plain_table() -> TableInfo {
    let x = ColumnInfo::new(1, "x", FieldType::int());
    let y = ColumnInfo::new(2, "y", FieldType::int());
    TableInfo::new("p")
        .with_column(x)
        .with_column(y)
        .with_index(IndexInfo::new("idx_x", vec![0], true))
}

/// Returns a catalog holding the fixture tables.
pub fn fixture_catalog() -> Catalog {
    let catalog = Catalog::new();
    for table in [fixture_table(), plain_table()] {
        if let Err(e) = catalog.create_table(table) {
            panic!("fixture table rejected: {}", e);
        }
    }
    catalog
}

/// Starts a plan over a fixture table.
pub fn scan(catalog: &Catalog, table: &str) -> PlanBuilder {
    match PlanBuilder::scan_table(&ColumnIdAllocator::new(), catalog, table) {
        Ok(builder) => builder,
        Err(e) => panic!("scan failed: {}", e),
    }
}

/// Starts a plan over a table that is not registered in a catalog.
pub fn scan_table(table: TableInfo) -> PlanBuilder {
    PlanBuilder::scan(&ColumnIdAllocator::new(), Arc::new(table))
}

/// Runs only the substitution rule with the default context.
pub fn substitute(plan: LogicalPlan) -> (LogicalPlan, OptimizeTrace) {
    substitute_with(&OptimizerContext::default(), plan)
}

/// Runs only the substitution rule under `ctx`.
pub fn substitute_with(ctx: &OptimizerContext, plan: LogicalPlan) -> (LogicalPlan, OptimizeTrace) {
    init_tracing();
    let mut trace = OptimizeTrace::new(true);
    match GeneratedColumnSubstitutionRule.optimize(ctx, plan, &mut trace) {
        Ok(plan) => (plan, trace),
        Err(e) => panic!("substitution failed: {}", e),
    }
}

/// Returns the operator `depth` levels below the root, following the first
/// child.
pub fn operator_at(plan: &LogicalPlan, depth: usize) -> &LogicalOperator {
    let mut op = &plan.root;
    for _ in 0..depth {
        match op.children().first() {
            Some(child) => op = *child,
            None => panic!("plan is shallower than {}", depth),
        }
    }
    op
}
