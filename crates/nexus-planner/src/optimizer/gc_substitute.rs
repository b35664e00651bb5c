//! Indexed generated column substitution.
//!
//! Rewrites expressions that are equal to the definition of an indexed
//! virtual generated column into references to that column, so the index
//! on the column becomes usable for the query. For a table with
//! `g BIGINT AS (a + 1)` and an index on `g`, the query
//! `SELECT a + 1 FROM t WHERE a + 1 = 5 ORDER BY a + 1` becomes
//! `SELECT g FROM t WHERE g = 5 ORDER BY g`.
//!
//! Only the positions where the swap cannot change the result are
//! rewritten: whole projected expressions, sort keys, aggregate arguments,
//! group-by keys, and inside filters the operands of comparisons, the left
//! side of an IN list, the subject of LIKE, and anything reachable through
//! AND, OR and NOT. Stored generated columns are never used.

use tracing::{debug, trace};

use super::trace::OptimizeTrace;
use super::{OptimizerContext, OptimizerResult, OptimizerRule};
use crate::logical::{
    visit_plan, Column, DataSource, Expr, LogicalOperator, LogicalPlan, PlanVisitor, ScalarFunc,
    Schema, SlotKind,
};
use crate::types::{EvalContext, EvalType};

/// Name of the generated column substitution rule.
pub const GC_SUBSTITUTE_RULE_NAME: &str = "generate_column_substitute";

/// Definitions of indexed virtual generated columns, mapped to the column
/// they define.
///
/// Structurally identical definitions collapse into the first entry.
/// Iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct ExprColumnMap {
    entries: Vec<(Expr, Column)>,
}

impl ExprColumnMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a definition. Returns false if an identical definition is
    /// already present.
    pub fn insert(&mut self, expr: Expr, column: Column) -> bool {
        if self.entries.iter().any(|(e, _)| *e == expr) {
            return false;
        }
        self.entries.push((expr, column));
        true
    }

    /// Returns the column defined by an expression identical to `expr`.
    pub fn get(&self, expr: &Expr) -> Option<&Column> {
        self.entries.iter().find(|(e, _)| e == expr).map(|(_, c)| c)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(definition, column)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Expr, &Column)> {
        self.entries.iter().map(|(e, c)| (e, c))
    }
}

/// Collects the indexed virtual generated columns reachable from `root`.
///
/// Children are visited before their parents. For every index access path
/// of every scan, each key column that is a virtual generated column whose
/// type exactly equals the type of its definition is recorded.
pub fn collect_generated_columns(root: &LogicalOperator) -> ExprColumnMap {
    struct Collector {
        map: ExprColumnMap,
    }

    impl PlanVisitor for Collector {
        fn pre_visit(&mut self, _op: &LogicalOperator) -> bool {
            true
        }

        fn post_visit(&mut self, op: &LogicalOperator) {
            if let LogicalOperator::DataSource(ds) = op {
                collect_from_data_source(ds, &mut self.map);
            }
        }
    }

    let mut collector = Collector {
        map: ExprColumnMap::new(),
    };
    visit_plan(root, &mut collector);
    collector.map
}

fn collect_from_data_source(ds: &DataSource, map: &mut ExprColumnMap) {
    for path in &ds.access_paths {
        let Some(index) = path.index() else {
            continue;
        };
        for &offset in &index.columns {
            let Some(info) = ds.table.column_by_offset(offset) else {
                continue;
            };
            if !info.is_generated() || info.generated_stored {
                continue;
            }
            let Some(column) = ds.schema.find_by_id(info.id) else {
                continue;
            };
            let Some(definition) = column.virtual_expr.as_deref() else {
                continue;
            };
            if column.field_type != *definition.field_type() {
                trace!(
                    column = %column,
                    column_type = %column.field_type,
                    expr_type = %definition.field_type(),
                    "skipping generated column with mismatched type"
                );
                continue;
            }
            if map.insert(definition.clone(), column.clone()) {
                trace!(column = %column, expr = %definition, index = %index.name, "collected generated column");
            }
        }
    }
}

/// Replaces `slot` with `column` if the slot equals `candidate`, the
/// candidate evaluates in the `expected` category and the column is visible
/// in `scope`. Returns true if the slot was replaced.
pub fn try_substitute_expr(
    ctx: &EvalContext,
    slot: &mut Expr,
    candidate: &Expr,
    column: &Column,
    expected: EvalType,
    scope: &Schema,
) -> bool {
    if slot.equal(ctx, candidate) && candidate.eval_type() == expected && scope.contains(column) {
        *slot = Expr::Column(column.clone());
        return true;
    }
    false
}

/// Rewrites expressions into indexed virtual generated columns.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneratedColumnSubstitutionRule;

impl OptimizerRule for GeneratedColumnSubstitutionRule {
    fn name(&self) -> &str {
        GC_SUBSTITUTE_RULE_NAME
    }

    fn optimize(
        &self,
        ctx: &OptimizerContext,
        mut plan: LogicalPlan,
        trace: &mut OptimizeTrace,
    ) -> OptimizerResult<LogicalPlan> {
        let map = collect_generated_columns(&plan.root);
        if map.is_empty() {
            debug!(rule = GC_SUBSTITUTE_RULE_NAME, "no indexed virtual generated columns");
            return Ok(plan);
        }

        debug!(
            rule = GC_SUBSTITUTE_RULE_NAME,
            candidates = map.len(),
            "substituting generated column definitions"
        );
        let mut substituter = Substituter {
            ctx: &ctx.eval,
            map: &map,
            trace,
        };
        substituter.substitute_operator(&mut plan.root);
        Ok(plan)
    }
}

struct Substituter<'a> {
    ctx: &'a EvalContext,
    map: &'a ExprColumnMap,
    trace: &'a mut OptimizeTrace,
}

impl Substituter<'_> {
    fn substitute_operator(&mut self, op: &mut LogicalOperator) {
        let name = op.name();
        if let Some(slots) = op.substitution_slots() {
            let scope = slots.scope;
            match slots.kind {
                SlotKind::Predicate => {
                    for expr in slots.exprs {
                        self.substitute_expression(expr, scope);
                    }
                }
                SlotKind::Direct => {
                    for expr in slots.exprs {
                        let expected = expr.eval_type();
                        self.try_all(expr, expected, scope, name);
                    }
                }
            }
        }

        for child in op.children_mut() {
            self.substitute_operator(child);
        }
    }

    fn substitute_expression(&mut self, expr: &mut Expr, scope: &Schema) {
        let Expr::ScalarFunction(func) = expr else {
            return;
        };

        match &func.func {
            f if f.is_ordering_comparison() => {
                if let [left, right] = func.args.as_mut_slice() {
                    let expected = left.eval_type();
                    self.try_all(right, expected, scope, "comparison");
                    let expected = right.eval_type();
                    self.try_all(left, expected, scope, "comparison");
                }
            }
            ScalarFunc::In => {
                if let [subject, first, rest @ ..] = func.args.as_mut_slice() {
                    let expected = first.eval_type();
                    if rest.iter().all(|item| item.eval_type() == expected) {
                        self.try_all(subject, expected, scope, "in");
                    }
                }
            }
            ScalarFunc::Like => {
                if let [subject, pattern, ..] = func.args.as_mut_slice() {
                    let expected = pattern.eval_type();
                    self.try_all(subject, expected, scope, "like");
                }
            }
            ScalarFunc::And | ScalarFunc::Or | ScalarFunc::Not => {
                for arg in func.args.iter_mut() {
                    self.substitute_expression(arg, scope);
                }
            }
            _ => {}
        }

        func.rehash();
    }

    fn try_all(&mut self, slot: &mut Expr, expected: EvalType, scope: &Schema, site: &str) {
        let map = self.map;
        for (candidate, column) in map.iter() {
            if try_substitute_expr(self.ctx, slot, candidate, column, expected, scope) {
                trace!(site, expr = %candidate, column = %column, "substituted generated column");
                self.trace.record(
                    GC_SUBSTITUTE_RULE_NAME,
                    || format!("{} -> {}", candidate, column),
                    || format!("{} matches the definition of indexed column {}", site, column),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{ColumnInfo, IndexInfo, TableInfo};
    use crate::logical::{AccessPath, ColumnIdAllocator, PlanBuilder, SortExpr};
    use crate::types::FieldType;

    /// `t(a INT, b VARCHAR(20), g BIGINT AS (a + 1) VIRTUAL)`, index on g.
    fn table() -> Arc<TableInfo> {
        let a = ColumnInfo::new(1, "a", FieldType::int());
        let b = ColumnInfo::new(2, "b", FieldType::varchar(20));
        let g = ColumnInfo::new(3, "g", FieldType::bigint())
            .virtual_generated(a.to_expr().plus(Expr::lit_i64(1)));
        Arc::new(
            TableInfo::new("t")
                .with_column(a)
                .with_column(b)
                .with_column(g)
                .with_index(IndexInfo::new("idx_g", vec![2], false)),
        )
    }

    fn run(plan: LogicalPlan) -> (LogicalPlan, OptimizeTrace) {
        let mut trace = OptimizeTrace::new(true);
        let plan = GeneratedColumnSubstitutionRule
            .optimize(&OptimizerContext::default(), plan, &mut trace)
            .unwrap();
        (plan, trace)
    }

    #[test]
    fn test_rule_name() {
        assert_eq!(
            GeneratedColumnSubstitutionRule.name(),
            "generate_column_substitute"
        );
    }

    #[test]
    fn test_collect_indexed_virtual_column() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let g = builder.column("g").unwrap();
        let map = collect_generated_columns(&builder.build().root);

        assert_eq!(map.len(), 1);
        let a = g.virtual_expr.as_deref().unwrap();
        assert_eq!(map.get(a), Some(&g));
    }

    #[test]
    fn test_collect_skips_full_scan_only() {
        let ids = ColumnIdAllocator::new();
        let plan = PlanBuilder::scan_with_paths(&ids, table(), vec![AccessPath::FullScan]).build();
        assert!(collect_generated_columns(&plan.root).is_empty());
    }

    #[test]
    fn test_map_collapses_identical_definitions() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let g = builder.column("g").unwrap();
        let def = g.virtual_expr.as_deref().unwrap().clone();

        let mut map = ExprColumnMap::new();
        assert!(map.insert(def.clone(), g.clone()));
        assert!(!map.insert(def, builder.column("a").unwrap()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_comparison_substituted() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let a = builder.col("a").unwrap();
        let g = builder.column("g").unwrap();
        let plan = builder
            .filter(Expr::lit_i64(5).lt(a.plus(Expr::lit_i64(1))))
            .unwrap()
            .build();

        let (plan, trace) = run(plan);
        let LogicalOperator::Filter(filter) = &plan.root else {
            panic!("Expected filter");
        };
        let func = filter.conditions[0].as_scalar_function().unwrap();
        assert_eq!(func.args[1].as_column(), Some(&g));
        assert_eq!(
            func.hash_code(),
            Expr::lit_i64(5).lt(Expr::col(&g)).hash_code()
        );
        assert_eq!(trace.step_count(), 1);
    }

    #[test]
    fn test_not_eq_left_alone() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let a = builder.col("a").unwrap();
        let plan = builder
            .filter(a.plus(Expr::lit_i64(1)).not_eq(Expr::lit_i64(5)))
            .unwrap()
            .build();

        let (_, trace) = run(plan);
        assert_eq!(trace.step_count(), 0);
    }

    #[test]
    fn test_like_subject_substituted() {
        let a = ColumnInfo::new(1, "a", FieldType::varchar(20));
        let g = ColumnInfo::new(2, "g", FieldType::varchar(20)).virtual_generated(Expr::func(
            "lower",
            vec![a.to_expr()],
            FieldType::varchar(20),
        ));
        let table = Arc::new(
            TableInfo::new("s")
                .with_column(a)
                .with_column(g)
                .with_index(IndexInfo::new("idx_g", vec![1], false)),
        );

        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table);
        let a = builder.col("a").unwrap();
        let g = builder.column("g").unwrap();
        let lower = Expr::func("LOWER", vec![a], FieldType::varchar(20));
        let plan = builder.filter(lower.like(Expr::lit_str("ab%"))).unwrap().build();

        let (plan, _) = run(plan);
        let LogicalOperator::Filter(filter) = &plan.root else {
            panic!("Expected filter");
        };
        let func = filter.conditions[0].as_scalar_function().unwrap();
        assert_eq!(func.args[0].as_column(), Some(&g));
    }

    #[test]
    fn test_sort_key_substituted() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let a = builder.col("a").unwrap();
        let g = builder.column("g").unwrap();
        let plan = builder
            .sort(vec![SortExpr::desc(a.plus(Expr::lit_i64(1)))])
            .unwrap()
            .build();

        let (plan, _) = run(plan);
        let LogicalOperator::Sort(sort) = &plan.root else {
            panic!("Expected sort");
        };
        assert_eq!(sort.order_by[0].expr.as_column(), Some(&g));
        assert!(!sort.order_by[0].asc);
    }

    #[test]
    fn test_matcher_checks() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let g = builder.column("g").unwrap();
        let candidate = g.virtual_expr.as_deref().unwrap().clone();
        let scope = builder.schema().clone();
        let ctx = EvalContext::default();

        let mut slot = candidate.clone();
        assert!(!try_substitute_expr(&ctx, &mut slot, &candidate, &g, EvalType::String, &scope));
        assert!(!try_substitute_expr(&ctx, &mut slot, &candidate, &g, EvalType::Int, &Schema::empty()));
        assert_eq!(slot, candidate);

        assert!(try_substitute_expr(&ctx, &mut slot, &candidate, &g, EvalType::Int, &scope));
        assert_eq!(slot.as_column(), Some(&g));
    }

    #[test]
    fn test_scope_excludes_projected_away_column() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let a = builder.col("a").unwrap();
        let builder = builder.project(vec![a.clone()]).unwrap();
        let plan = builder
            .filter(a.plus(Expr::lit_i64(1)).eq(Expr::lit_i64(5)))
            .unwrap()
            .build();

        let (_, trace) = run(plan);
        assert_eq!(trace.step_count(), 0);
    }

    #[test]
    fn test_type_gate() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let a = builder.col("a").unwrap();
        // Same shape as the definition, but the other side is a string.
        let plan = builder
            .filter(a.plus(Expr::lit_i64(1)).eq(Expr::lit_str("5")))
            .unwrap()
            .build();

        let (_, trace) = run(plan);
        assert_eq!(trace.step_count(), 0);
    }

    #[test]
    fn test_large_integer_constants_stay_distinct() {
        let a = ColumnInfo::new(1, "a", FieldType::bigint());
        let g = ColumnInfo::new(2, "g", FieldType::bigint())
            .virtual_generated(a.to_expr().plus(Expr::lit_i64(9_007_199_254_740_993)));
        let table = Arc::new(
            TableInfo::new("t")
                .with_column(a)
                .with_column(g)
                .with_index(IndexInfo::new("idx_g", vec![1], false)),
        );

        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table);
        let a = builder.col("a").unwrap();
        let plan = builder
            .filter(a.plus(Expr::lit_i64(9_007_199_254_740_992)).eq(Expr::lit_i64(5)))
            .unwrap()
            .build();

        let (plan, trace) = run(plan);
        assert_eq!(trace.step_count(), 0);
        let LogicalOperator::Filter(filter) = &plan.root else {
            panic!("Expected filter");
        };
        assert_eq!(filter.conditions[0].to_string(), "(t.a + 9007199254740992) = 5");
    }

    #[test]
    fn test_in_list_gate() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let a = builder.col("a").unwrap();
        let g = builder.column("g").unwrap();
        let plan = builder
            .filter(
                a.clone()
                    .plus(Expr::lit_i64(1))
                    .in_list(vec![Expr::lit_i64(1), Expr::lit_f64(2.5)])
                    .or(a.plus(Expr::lit_i64(1)).in_list(vec![Expr::lit_i64(3)])),
            )
            .unwrap()
            .build();

        let (plan, trace) = run(plan);
        assert_eq!(trace.step_count(), 1);
        let LogicalOperator::Filter(filter) = &plan.root else {
            panic!("Expected filter");
        };
        let or = filter.conditions[0].as_scalar_function().unwrap();
        let mixed = or.args[0].as_scalar_function().unwrap();
        let uniform = or.args[1].as_scalar_function().unwrap();
        assert!(mixed.args[0].as_column().is_none());
        assert_eq!(uniform.args[0].as_column(), Some(&g));
    }

    #[test]
    fn test_unrelated_functions_are_opaque() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let a = builder.col("a").unwrap();
        let wrapped = Expr::func("abs", vec![a.plus(Expr::lit_i64(1))], FieldType::bigint());
        let plan = builder.filter(wrapped.is_null()).unwrap().build();

        let (_, trace) = run(plan);
        assert_eq!(trace.step_count(), 0);
    }

    #[test]
    fn test_stored_column_excluded() {
        let a = ColumnInfo::new(1, "a", FieldType::int());
        let s = ColumnInfo::new(2, "s", FieldType::bigint())
            .stored_generated(a.to_expr().plus(Expr::lit_i64(1)));
        let table = Arc::new(
            TableInfo::new("t")
                .with_column(a)
                .with_column(s)
                .with_index(IndexInfo::new("idx_s", vec![1], false)),
        );

        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table);
        assert!(collect_generated_columns(&builder.build().root).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table());
        let a = builder.col("a").unwrap();
        let plan = builder
            .filter(a.clone().plus(Expr::lit_i64(1)).gt(Expr::lit_i64(2)))
            .unwrap()
            .sort(vec![SortExpr::asc(a.plus(Expr::lit_i64(1)))])
            .unwrap()
            .build();

        let (once, first) = run(plan);
        let rendered = once.display();
        let (twice, second) = run(once);
        assert_eq!(first.step_count(), 2);
        assert_eq!(second.step_count(), 0);
        assert_eq!(twice.display(), rendered);
    }

    #[test]
    fn test_empty_map_returns_plan_unchanged() {
        let table = Arc::new(
            TableInfo::new("plain")
                .with_column(ColumnInfo::new(1, "a", FieldType::int()))
                .with_index(IndexInfo::new("idx_a", vec![0], false)),
        );
        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, table);
        let a = builder.col("a").unwrap();
        let plan = builder
            .filter(a.plus(Expr::lit_i64(1)).eq(Expr::lit_i64(5)))
            .unwrap()
            .build();
        let before = plan.display();

        let (plan, trace) = run(plan);
        assert_eq!(plan.display(), before);
        assert_eq!(trace.step_count(), 0);
    }
}
