//! Benchmark utilities and helpers.

use std::sync::Arc;

use nexus_planner::catalog::{ColumnInfo, IndexInfo, TableInfo};
use nexus_planner::logical::{ColumnIdAllocator, Expr, LogicalPlan, PlanBuilder, SortExpr};
use nexus_planner::types::FieldType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Builds a table `w` with `base` INT columns `c0..` and `generated`
/// indexed virtual columns `g0..`, where `gi = c(i % base) + i`.
pub fn wide_table(base: usize, generated: usize) -> Arc<TableInfo> {
    let base = base.max(1);
    let columns: Vec<ColumnInfo> = (0..base)
        .map(|i| ColumnInfo::new(i as u64 + 1, format!("c{}", i), FieldType::int()))
        .collect();

    let mut table = TableInfo::new("w");
    for column in &columns {
        table = table.with_column(column.clone());
    }
    for i in 0..generated {
        let source = &columns[i % base];
        let definition = source.to_expr().plus(Expr::lit_i64(i as i64));
        let id = (base + i) as u64 + 1;
        table = table
            .with_column(ColumnInfo::new(id, format!("g{}", i), FieldType::bigint()).virtual_generated(definition))
            .with_index(IndexInfo::new(format!("idx_g{}", i), vec![base + i], false));
    }
    Arc::new(table)
}

/// Builds a filter over `table` with `predicates` comparisons of the form
/// `c(j) + k = v`. Roughly half of them match a generated column.
pub fn filter_plan(table: &Arc<TableInfo>, base: usize, predicates: usize) -> LogicalPlan {
    let mut rng = StdRng::seed_from_u64(42);
    let builder = PlanBuilder::scan(&ColumnIdAllocator::new(), Arc::clone(table));
    let generated = table.generated_columns().count().max(1);

    let conjuncts: Vec<Expr> = (0..predicates)
        .map(|_| {
            let i = rng.gen_range(0..generated * 2);
            let column = builder
                .col(&format!("c{}", i % base.max(1)))
                .unwrap_or_else(|_| Expr::lit_null());
            let value = rng.gen_range(0..1_000i64);
            column.plus(Expr::lit_i64(i as i64)).eq(Expr::lit_i64(value))
        })
        .collect();

    match conjuncts.into_iter().reduce(|a, b| a.and(b)) {
        Some(predicate) => match builder.clone().filter(predicate) {
            Ok(filtered) => filtered.build(),
            Err(_) => builder.build(),
        },
        None => builder.build(),
    }
}

/// Builds `sort -> projection` over `table` keyed on the first `keys`
/// generated column definitions.
pub fn sort_project_plan(table: &Arc<TableInfo>, base: usize, keys: usize) -> LogicalPlan {
    let builder = PlanBuilder::scan(&ColumnIdAllocator::new(), Arc::clone(table));
    let exprs: Vec<Expr> = (0..keys)
        .filter_map(|i| {
            builder
                .col(&format!("c{}", i % base.max(1)))
                .ok()
                .map(|c| c.plus(Expr::lit_i64(i as i64)))
        })
        .collect();
    if exprs.is_empty() {
        return builder.build();
    }

    let sort_keys = exprs.iter().cloned().map(SortExpr::asc).collect();
    let sorted = match builder.clone().sort(sort_keys) {
        Ok(sorted) => sorted,
        Err(_) => return builder.build(),
    };
    match sorted.clone().project(exprs) {
        Ok(projected) => projected.build(),
        Err(_) => sorted.build(),
    }
}
