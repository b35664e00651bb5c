//! Logical plan wrapper and utilities.

use std::fmt;

use super::operator::LogicalOperator;
use super::schema::Schema;

/// A logical query plan.
#[derive(Debug, Clone)]
pub struct LogicalPlan {
    /// Root operator.
    pub root: LogicalOperator,
}

impl LogicalPlan {
    /// Creates a new logical plan.
    pub fn new(root: LogicalOperator) -> Self {
        Self { root }
    }

    /// Returns the output schema.
    pub fn schema(&self) -> &Schema {
        self.root.schema()
    }

    /// Returns the number of operators in the plan.
    pub fn operator_count(&self) -> usize {
        struct Counter(usize);
        impl PlanVisitor for Counter {
            fn pre_visit(&mut self, _op: &LogicalOperator) -> bool {
                self.0 += 1;
                true
            }
            fn post_visit(&mut self, _op: &LogicalOperator) {}
        }

        let mut counter = Counter(0);
        visit_plan(&self.root, &mut counter);
        counter.0
    }

    /// Returns a formatted string representation of the plan.
    pub fn display(&self) -> String {
        let mut output = String::new();
        self.format_node(&self.root, 0, &mut output);
        output
    }

    /// Returns a detailed formatted string for EXPLAIN.
    pub fn explain(&self) -> String {
        let mut output = String::new();
        self.explain_node(&self.root, 0, &mut output);
        output
    }

    fn format_node(&self, op: &LogicalOperator, indent: usize, output: &mut String) {
        let prefix = "  ".repeat(indent);

        match op {
            LogicalOperator::DataSource(ds) => {
                let paths: Vec<_> = ds.access_paths.iter().map(|p| p.to_string()).collect();
                output.push_str(&format!(
                    "{}DataSource: {} (paths: {})\n",
                    prefix,
                    ds.table_name(),
                    paths.join(", ")
                ));
            }
            LogicalOperator::Filter(filter) => {
                let conds: Vec<_> = filter.conditions.iter().map(|e| e.to_string()).collect();
                output.push_str(&format!("{}Filter: {}\n", prefix, conds.join(" AND ")));
            }
            LogicalOperator::Projection(proj) => {
                let exprs: Vec<_> = proj.exprs.iter().map(|e| e.to_string()).collect();
                output.push_str(&format!("{}Projection: {}\n", prefix, exprs.join(", ")));
            }
            LogicalOperator::Sort(sort) => {
                let exprs: Vec<_> = sort.order_by.iter().map(|e| e.to_string()).collect();
                output.push_str(&format!("{}Sort: {}\n", prefix, exprs.join(", ")));
            }
            LogicalOperator::Aggregate(agg) => {
                let groups: Vec<_> = agg.group_by.iter().map(|e| e.to_string()).collect();
                let aggs: Vec<_> = agg.aggregates.iter().map(|e| e.to_string()).collect();
                output.push_str(&format!(
                    "{}Aggregate: groups=[{}] aggs=[{}]\n",
                    prefix,
                    groups.join(", "),
                    aggs.join(", ")
                ));
            }
            LogicalOperator::Limit(limit) => {
                output.push_str(&format!(
                    "{}Limit: offset={} fetch={:?}\n",
                    prefix, limit.offset, limit.fetch
                ));
            }
            LogicalOperator::Join(join) => {
                output.push_str(&format!("{}Join: {} JOIN", prefix, join.join_type));
                if !join.conditions.is_empty() {
                    let conds: Vec<_> = join.conditions.iter().map(|e| e.to_string()).collect();
                    output.push_str(&format!(" ON {}", conds.join(" AND ")));
                }
                output.push('\n');
            }
            LogicalOperator::Union(union) => {
                output.push_str(&format!(
                    "{}Union{}\n",
                    prefix,
                    if union.all { " ALL" } else { "" }
                ));
            }
            LogicalOperator::EmptyRelation(empty) => {
                output.push_str(&format!(
                    "{}EmptyRelation: produce_one={}\n",
                    prefix, empty.produce_one_row
                ));
            }
        }

        for child in op.children() {
            self.format_node(child, indent + 1, output);
        }
    }

    fn explain_node(&self, op: &LogicalOperator, indent: usize, output: &mut String) {
        let prefix = "  ".repeat(indent);

        match op {
            LogicalOperator::DataSource(ds) => {
                output.push_str(&format!("{}DataSource: {}\n", prefix, ds.table_name()));
                output.push_str(&format!("{}  Schema: {}\n", prefix, ds.schema));
                for column in ds.schema.columns() {
                    if let Some(expr) = &column.virtual_expr {
                        output.push_str(&format!(
                            "{}  Generated: {} AS ({})\n",
                            prefix, column, expr
                        ));
                    }
                }
                output.push_str(&format!("{}  Access paths:\n", prefix));
                for path in &ds.access_paths {
                    output.push_str(&format!("{}    - {}\n", prefix, path));
                }
            }
            LogicalOperator::Filter(filter) => {
                output.push_str(&format!("{}Filter:\n", prefix));
                for cond in &filter.conditions {
                    output.push_str(&format!("{}  - {}\n", prefix, cond));
                }
            }
            LogicalOperator::Projection(proj) => {
                output.push_str(&format!("{}Projection:\n", prefix));
                output.push_str(&format!("{}  Schema: {}\n", prefix, proj.schema));
                output.push_str(&format!("{}  Expressions:\n", prefix));
                for expr in &proj.exprs {
                    output.push_str(&format!("{}    - {}\n", prefix, expr));
                }
            }
            LogicalOperator::Aggregate(agg) => {
                output.push_str(&format!("{}Aggregate:\n", prefix));
                output.push_str(&format!("{}  Schema: {}\n", prefix, agg.schema));
                if !agg.group_by.is_empty() {
                    output.push_str(&format!("{}  Group By:\n", prefix));
                    for expr in &agg.group_by {
                        output.push_str(&format!("{}    - {}\n", prefix, expr));
                    }
                }
                output.push_str(&format!("{}  Aggregates:\n", prefix));
                for expr in &agg.aggregates {
                    output.push_str(&format!("{}    - {}\n", prefix, expr));
                }
            }
            LogicalOperator::Sort(sort) => {
                output.push_str(&format!("{}Sort:\n", prefix));
                for expr in &sort.order_by {
                    output.push_str(&format!("{}  - {}\n", prefix, expr));
                }
            }
            LogicalOperator::Join(join) => {
                output.push_str(&format!("{}Join: {} JOIN\n", prefix, join.join_type));
                output.push_str(&format!("{}  Schema: {}\n", prefix, join.schema));
                for cond in &join.conditions {
                    output.push_str(&format!("{}  - {}\n", prefix, cond));
                }
            }
            _ => {
                output.push_str(&format!("{}{}\n", prefix, op.name()));
            }
        }

        for child in op.children() {
            self.explain_node(child, indent + 1, output);
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Visitor trait for traversing logical plans.
pub trait PlanVisitor {
    /// Called before visiting children. Returning false skips them.
    fn pre_visit(&mut self, op: &LogicalOperator) -> bool;
    /// Called after visiting children.
    fn post_visit(&mut self, op: &LogicalOperator);
}

/// Visit a logical plan tree.
pub fn visit_plan<V: PlanVisitor>(op: &LogicalOperator, visitor: &mut V) {
    if visitor.pre_visit(op) {
        for child in op.children() {
            visit_plan(child, visitor);
        }
    }
    visitor.post_visit(op);
}
