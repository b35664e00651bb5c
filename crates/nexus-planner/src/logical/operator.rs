//! Logical operators for query plans.
//!
//! These represent the abstract operations in a query plan tree. Children
//! are owned boxes so optimizer rules can rewrite a plan in place.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::expr::{AggregateExpr, Expr, ScalarFunc, SortExpr};
use super::schema::{Column, ColumnIdAllocator, Schema};
use crate::catalog::{IndexInfo, TableInfo};

/// Join type for join operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Inner join.
    Inner,
    /// Left outer join.
    Left,
    /// Right outer join.
    Right,
    /// Full outer join.
    Full,
    /// Cartesian product.
    Cross,
    /// Semi join - returns rows from left that have a match in right.
    Semi,
    /// Anti join - returns rows from left that have no match in right.
    Anti,
}

impl JoinType {
    /// Returns true if the output only carries the left side's columns.
    pub fn is_left_only(&self) -> bool {
        matches!(self, JoinType::Semi | JoinType::Anti)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
            JoinType::Right => write!(f, "RIGHT"),
            JoinType::Full => write!(f, "FULL"),
            JoinType::Cross => write!(f, "CROSS"),
            JoinType::Semi => write!(f, "SEMI"),
            JoinType::Anti => write!(f, "ANTI"),
        }
    }
}

/// A logical operator in a query plan.
#[derive(Debug, Clone)]
pub enum LogicalOperator {
    /// Table scan with its candidate access paths.
    DataSource(DataSource),

    /// Filter (WHERE clause), conditions implicitly ANDed.
    Filter(FilterOperator),

    /// Projection (SELECT clause).
    Projection(ProjectionOperator),

    /// Sort (ORDER BY).
    Sort(SortOperator),

    /// Aggregate (GROUP BY).
    Aggregate(AggregateOperator),

    /// Limit (LIMIT/OFFSET).
    Limit(LimitOperator),

    /// Join.
    Join(JoinOperator),

    /// UNION / UNION ALL.
    Union(UnionOperator),

    /// Empty relation (for queries that return no rows).
    EmptyRelation(EmptyRelationOperator),
}

/// How the expressions handed out by [`LogicalOperator::substitution_slots`]
/// are to be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Boolean conditions; rewriting descends into comparisons and
    /// boolean connectives.
    Predicate,
    /// Value expressions; only the whole expression may be replaced.
    Direct,
}

/// Mutable expression slots of one operator together with the schema a
/// replacement column must be visible in.
#[derive(Debug)]
pub struct SubstitutionSlots<'a> {
    /// Rewrite mode.
    pub kind: SlotKind,
    /// Expression slots, in operator order.
    pub exprs: Vec<&'a mut Expr>,
    /// Scope a replacement column has to be part of.
    pub scope: &'a Schema,
}

impl LogicalOperator {
    /// Returns the output schema of this operator.
    pub fn schema(&self) -> &Schema {
        match self {
            LogicalOperator::DataSource(op) => &op.schema,
            LogicalOperator::Filter(op) => op.input.schema(),
            LogicalOperator::Projection(op) => &op.schema,
            LogicalOperator::Sort(op) => op.input.schema(),
            LogicalOperator::Aggregate(op) => &op.schema,
            LogicalOperator::Limit(op) => op.input.schema(),
            LogicalOperator::Join(op) => &op.schema,
            LogicalOperator::Union(op) => &op.schema,
            LogicalOperator::EmptyRelation(op) => &op.schema,
        }
    }

    /// Returns the child operators.
    pub fn children(&self) -> Vec<&LogicalOperator> {
        match self {
            LogicalOperator::DataSource(_) | LogicalOperator::EmptyRelation(_) => vec![],
            LogicalOperator::Filter(op) => vec![&*op.input],
            LogicalOperator::Projection(op) => vec![&*op.input],
            LogicalOperator::Sort(op) => vec![&*op.input],
            LogicalOperator::Aggregate(op) => vec![&*op.input],
            LogicalOperator::Limit(op) => vec![&*op.input],
            LogicalOperator::Join(op) => vec![&*op.left, &*op.right],
            LogicalOperator::Union(op) => op.inputs.iter().collect(),
        }
    }

    /// Returns the child operators for in-place rewriting.
    pub fn children_mut(&mut self) -> Vec<&mut LogicalOperator> {
        match self {
            LogicalOperator::DataSource(_) | LogicalOperator::EmptyRelation(_) => vec![],
            LogicalOperator::Filter(op) => vec![&mut *op.input],
            LogicalOperator::Projection(op) => vec![&mut *op.input],
            LogicalOperator::Sort(op) => vec![&mut *op.input],
            LogicalOperator::Aggregate(op) => vec![&mut *op.input],
            LogicalOperator::Limit(op) => vec![&mut *op.input],
            LogicalOperator::Join(op) => vec![&mut *op.left, &mut *op.right],
            LogicalOperator::Union(op) => op.inputs.iter_mut().collect(),
        }
    }

    /// Returns the expression slots expression rewriting may replace, or
    /// `None` for operators whose expressions are not rewritten.
    ///
    /// - Filter: the conditions, scoped by the filter's output.
    /// - Projection: the projected expressions, scoped by the input.
    /// - Sort: the sort keys, scoped by the sort's output.
    /// - Aggregate: the aggregate arguments followed by the group-by keys,
    ///   scoped by the aggregate's output.
    pub fn substitution_slots(&mut self) -> Option<SubstitutionSlots<'_>> {
        match self {
            LogicalOperator::Filter(FilterOperator { input, conditions }) => {
                let input: &LogicalOperator = input;
                Some(SubstitutionSlots {
                    kind: SlotKind::Predicate,
                    exprs: conditions.iter_mut().collect(),
                    scope: input.schema(),
                })
            }
            LogicalOperator::Projection(ProjectionOperator { input, exprs, .. }) => {
                let input: &LogicalOperator = input;
                Some(SubstitutionSlots {
                    kind: SlotKind::Direct,
                    exprs: exprs.iter_mut().collect(),
                    scope: input.schema(),
                })
            }
            LogicalOperator::Sort(SortOperator { input, order_by }) => {
                let input: &LogicalOperator = input;
                Some(SubstitutionSlots {
                    kind: SlotKind::Direct,
                    exprs: order_by.iter_mut().map(|s| &mut s.expr).collect(),
                    scope: input.schema(),
                })
            }
            LogicalOperator::Aggregate(AggregateOperator {
                group_by,
                aggregates,
                schema,
                ..
            }) => {
                let mut exprs: Vec<&mut Expr> = aggregates
                    .iter_mut()
                    .flat_map(|agg| agg.args.iter_mut())
                    .collect();
                exprs.extend(group_by.iter_mut());
                Some(SubstitutionSlots {
                    kind: SlotKind::Direct,
                    exprs,
                    scope: schema,
                })
            }
            _ => None,
        }
    }

    /// Returns true if this is a leaf operator.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            LogicalOperator::DataSource(_) | LogicalOperator::EmptyRelation(_)
        )
    }

    /// Returns the operator name.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalOperator::DataSource(_) => "DataSource",
            LogicalOperator::Filter(_) => "Filter",
            LogicalOperator::Projection(_) => "Projection",
            LogicalOperator::Sort(_) => "Sort",
            LogicalOperator::Aggregate(_) => "Aggregate",
            LogicalOperator::Limit(_) => "Limit",
            LogicalOperator::Join(_) => "Join",
            LogicalOperator::Union(_) => "Union",
            LogicalOperator::EmptyRelation(_) => "EmptyRelation",
        }
    }
}

/// A way of reading a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPath {
    /// Full table scan.
    FullScan,
    /// Scan through an index.
    Index(IndexInfo),
}

impl AccessPath {
    /// Returns true for the full-table path.
    pub fn is_table_path(&self) -> bool {
        matches!(self, AccessPath::FullScan)
    }

    /// Returns the index, for index paths.
    pub fn index(&self) -> Option<&IndexInfo> {
        match self {
            AccessPath::FullScan => None,
            AccessPath::Index(index) => Some(index),
        }
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPath::FullScan => write!(f, "table"),
            AccessPath::Index(index) => write!(f, "index({})", index.name),
        }
    }
}

/// Table scan operator.
#[derive(Debug, Clone)]
pub struct DataSource {
    /// Table metadata snapshot.
    pub table: Arc<TableInfo>,
    /// Output schema, one column per table column in offset order.
    pub schema: Schema,
    /// Candidate access paths.
    pub access_paths: Vec<AccessPath>,
}

impl DataSource {
    /// Creates a scan over every column of a table.
    ///
    /// Generated column definitions are bound to this scan's columns and
    /// attached as their virtual expressions. The access paths are the full
    /// scan followed by one path per index.
    pub fn new(table: Arc<TableInfo>, ids: &ColumnIdAllocator) -> Self {
        let plain: Vec<Column> = table
            .columns
            .iter()
            .map(|info| {
                Column::new(ids.allocate(), &info.name, info.field_type.clone())
                    .with_qualifier(&table.name)
                    .with_id(info.id)
            })
            .collect();

        let resolve = |c: &Column| {
            c.id.and_then(|id| plain.iter().find(|p| p.id == Some(id)).cloned())
        };
        let mut columns = plain.clone();
        for (column, info) in columns.iter_mut().zip(&table.columns) {
            let Some(definition) = &info.generated_expr else {
                continue;
            };
            let mut bound = definition.clone();
            if bound.bind_columns(&resolve) {
                column.virtual_expr = Some(Box::new(bound));
            } else {
                debug!(
                    table = %table.name,
                    column = %info.name,
                    "generated column definition references unknown columns"
                );
            }
        }

        let access_paths = std::iter::once(AccessPath::FullScan)
            .chain(table.indexes.iter().cloned().map(AccessPath::Index))
            .collect();

        Self {
            table,
            schema: Schema::new(columns),
            access_paths,
        }
    }

    /// Replaces the candidate access paths.
    pub fn with_access_paths(mut self, access_paths: Vec<AccessPath>) -> Self {
        self.access_paths = access_paths;
        self
    }

    /// Returns the table name.
    pub fn table_name(&self) -> &str {
        &self.table.name
    }
}

/// Filter operator.
#[derive(Debug, Clone)]
pub struct FilterOperator {
    /// Input operator.
    pub input: Box<LogicalOperator>,
    /// Conjunctive conditions.
    pub conditions: Vec<Expr>,
}

/// Splits a predicate into its top-level AND conjuncts.
pub fn split_conjunction(expr: Expr) -> Vec<Expr> {
    match expr {
        Expr::ScalarFunction(f) if f.func == ScalarFunc::And && f.args.len() == 2 => {
            f.args.into_iter().flat_map(split_conjunction).collect()
        }
        other => vec![other],
    }
}

/// Combines expressions with AND.
pub fn conjoin(exprs: Vec<Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(|a, b| a.and(b))
}

/// Projection operator.
#[derive(Debug, Clone)]
pub struct ProjectionOperator {
    /// Input operator.
    pub input: Box<LogicalOperator>,
    /// Projection expressions.
    pub exprs: Vec<Expr>,
    /// Output schema.
    pub schema: Schema,
}

/// Sort operator.
#[derive(Debug, Clone)]
pub struct SortOperator {
    /// Input operator.
    pub input: Box<LogicalOperator>,
    /// Sort keys.
    pub order_by: Vec<SortExpr>,
}

/// Aggregate operator.
///
/// The output schema holds one column per aggregate followed by the input
/// columns, which pass through with first-row semantics.
#[derive(Debug, Clone)]
pub struct AggregateOperator {
    /// Input operator.
    pub input: Box<LogicalOperator>,
    /// Group-by keys.
    pub group_by: Vec<Expr>,
    /// Aggregate calls.
    pub aggregates: Vec<AggregateExpr>,
    /// Output schema.
    pub schema: Schema,
}

/// Limit operator.
#[derive(Debug, Clone)]
pub struct LimitOperator {
    /// Input operator.
    pub input: Box<LogicalOperator>,
    /// Rows to skip.
    pub offset: usize,
    /// Maximum rows to return.
    pub fetch: Option<usize>,
}

/// Join operator.
#[derive(Debug, Clone)]
pub struct JoinOperator {
    /// Left input.
    pub left: Box<LogicalOperator>,
    /// Right input.
    pub right: Box<LogicalOperator>,
    /// Join type.
    pub join_type: JoinType,
    /// Join conditions, implicitly ANDed.
    pub conditions: Vec<Expr>,
    /// Output schema.
    pub schema: Schema,
}

/// Union operator.
#[derive(Debug, Clone)]
pub struct UnionOperator {
    /// Inputs, all with the same arity.
    pub inputs: Vec<LogicalOperator>,
    /// Whether duplicates are kept.
    pub all: bool,
    /// Output schema.
    pub schema: Schema,
}

/// Empty relation operator.
#[derive(Debug, Clone)]
pub struct EmptyRelationOperator {
    /// Whether to produce one row with no columns.
    pub produce_one_row: bool,
    /// Output schema.
    pub schema: Schema,
}
