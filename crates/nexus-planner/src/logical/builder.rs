//! Logical plan builder.
//!
//! A fluent builder that assembles logical plans on top of catalog tables.
//! Every builder step checks that the expressions it receives only refer to
//! columns visible in its input.

use std::sync::Arc;

use thiserror::Error;

use super::expr::{AggregateExpr, Expr, SortExpr};
use super::operator::*;
use super::plan::LogicalPlan;
use super::schema::{Column, ColumnIdAllocator, Schema};
use crate::catalog::{Catalog, TableInfo};

/// Errors that can occur during plan building.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Referenced table does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Referenced column is not in scope.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Inputs have incompatible schemas.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The plan is malformed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type for plan building.
pub type PlanResult<T> = Result<T, PlanError>;

/// Fluent logical plan builder.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    ids: ColumnIdAllocator,
    root: LogicalOperator,
}

impl PlanBuilder {
    /// Starts a plan with a scan over a table.
    pub fn scan(ids: &ColumnIdAllocator, table: Arc<TableInfo>) -> Self {
        Self::from_data_source(ids, DataSource::new(table, ids))
    }

    /// Starts a plan with a scan restricted to the given access paths.
    pub fn scan_with_paths(
        ids: &ColumnIdAllocator,
        table: Arc<TableInfo>,
        access_paths: Vec<AccessPath>,
    ) -> Self {
        Self::from_data_source(ids, DataSource::new(table, ids).with_access_paths(access_paths))
    }

    /// Starts a plan with a scan over a catalog table.
    pub fn scan_table(ids: &ColumnIdAllocator, catalog: &Catalog, name: &str) -> PlanResult<Self> {
        let table = catalog
            .get_table(name)
            .ok_or_else(|| PlanError::TableNotFound(name.to_string()))?;
        Ok(Self::scan(ids, table))
    }

    fn from_data_source(ids: &ColumnIdAllocator, ds: DataSource) -> Self {
        Self {
            ids: ids.clone(),
            root: LogicalOperator::DataSource(ds),
        }
    }

    /// Starts a plan with an empty relation.
    pub fn empty(ids: &ColumnIdAllocator, produce_one_row: bool) -> Self {
        Self {
            ids: ids.clone(),
            root: LogicalOperator::EmptyRelation(EmptyRelationOperator {
                produce_one_row,
                schema: Schema::empty(),
            }),
        }
    }

    /// Returns the current output schema.
    pub fn schema(&self) -> &Schema {
        self.root.schema()
    }

    /// Resolves a column of the current output by name (`name` or
    /// `qualifier.name`).
    pub fn column(&self, name: &str) -> PlanResult<Column> {
        let (qualifier, column) = match name.split_once('.') {
            Some((q, c)) => (Some(q), c),
            None => (None, name),
        };
        self.schema()
            .find_by_name(qualifier, column)
            .cloned()
            .ok_or_else(|| PlanError::ColumnNotFound(name.to_string()))
    }

    /// Resolves a column of the current output as an expression.
    pub fn col(&self, name: &str) -> PlanResult<Expr> {
        self.column(name).map(Expr::Column)
    }

    /// Adds a filter. Top-level ANDs are split into separate conditions.
    pub fn filter(self, predicate: Expr) -> PlanResult<Self> {
        check_columns(self.schema(), std::slice::from_ref(&predicate))?;
        let conditions = split_conjunction(predicate);
        Ok(self.wrap(|input| {
            LogicalOperator::Filter(FilterOperator {
                input,
                conditions,
            })
        }))
    }

    /// Adds a projection.
    ///
    /// Bare column references keep their identity in the output; every
    /// other expression gets a fresh output column.
    pub fn project(self, exprs: Vec<Expr>) -> PlanResult<Self> {
        if exprs.is_empty() {
            return Err(PlanError::InvalidQuery("empty projection".to_string()));
        }
        check_columns(self.schema(), &exprs)?;
        let columns = exprs
            .iter()
            .map(|expr| match expr {
                Expr::Column(c) => c.clone(),
                other => Column::new(
                    self.ids.allocate(),
                    other.to_string(),
                    other.field_type().clone(),
                ),
            })
            .collect();
        let schema = Schema::new(columns);
        Ok(self.wrap(|input| {
            LogicalOperator::Projection(ProjectionOperator {
                input,
                exprs,
                schema,
            })
        }))
    }

    /// Adds a sort.
    pub fn sort(self, order_by: Vec<SortExpr>) -> PlanResult<Self> {
        let keys: Vec<Expr> = order_by.iter().map(|s| s.expr.clone()).collect();
        check_columns(self.schema(), &keys)?;
        Ok(self.wrap(|input| LogicalOperator::Sort(SortOperator { input, order_by })))
    }

    /// Adds an aggregation.
    ///
    /// The output holds one fresh column per aggregate followed by the input
    /// columns.
    pub fn aggregate(self, group_by: Vec<Expr>, aggregates: Vec<AggregateExpr>) -> PlanResult<Self> {
        check_columns(self.schema(), &group_by)?;
        for agg in &aggregates {
            check_columns(self.schema(), &agg.args)?;
        }

        let mut columns: Vec<Column> = aggregates
            .iter()
            .map(|agg| Column::new(self.ids.allocate(), agg.to_string(), agg.ret_type.clone()))
            .collect();
        columns.extend(self.schema().columns().iter().cloned());
        let schema = Schema::new(columns);

        Ok(self.wrap(|input| {
            LogicalOperator::Aggregate(AggregateOperator {
                input,
                group_by,
                aggregates,
                schema,
            })
        }))
    }

    /// Adds a limit.
    pub fn limit(self, offset: usize, fetch: Option<usize>) -> Self {
        self.wrap(|input| {
            LogicalOperator::Limit(LimitOperator {
                input,
                offset,
                fetch,
            })
        })
    }

    /// Joins with another plan.
    pub fn join(self, right: PlanBuilder, join_type: JoinType, on: Option<Expr>) -> PlanResult<Self> {
        let merged = self.schema().merge(right.schema());
        let conditions = match on {
            Some(on) => {
                check_columns(&merged, std::slice::from_ref(&on))?;
                split_conjunction(on)
            }
            None => Vec::new(),
        };
        let schema = if join_type.is_left_only() {
            self.schema().clone()
        } else {
            merged
        };

        Ok(Self {
            ids: self.ids,
            root: LogicalOperator::Join(JoinOperator {
                left: Box::new(self.root),
                right: Box::new(right.root),
                join_type,
                conditions,
                schema,
            }),
        })
    }

    /// Unions with another plan of the same arity.
    pub fn union(self, other: PlanBuilder, all: bool) -> PlanResult<Self> {
        if self.schema().len() != other.schema().len() {
            return Err(PlanError::SchemaMismatch(format!(
                "UNION inputs have {} and {} columns",
                self.schema().len(),
                other.schema().len()
            )));
        }
        let schema = Schema::new(
            self.schema()
                .columns()
                .iter()
                .map(|c| Column::new(self.ids.allocate(), &c.name, c.field_type.clone()))
                .collect(),
        );

        Ok(Self {
            ids: self.ids,
            root: LogicalOperator::Union(UnionOperator {
                inputs: vec![self.root, other.root],
                all,
                schema,
            }),
        })
    }

    /// Finishes the plan.
    pub fn build(self) -> LogicalPlan {
        LogicalPlan::new(self.root)
    }

    fn wrap<F>(self, f: F) -> Self
    where
        F: FnOnce(Box<LogicalOperator>) -> LogicalOperator,
    {
        Self {
            ids: self.ids,
            root: f(Box::new(self.root)),
        }
    }
}

fn check_columns(schema: &Schema, exprs: &[Expr]) -> PlanResult<()> {
    for expr in exprs {
        if let Some(missing) = expr.columns().into_iter().find(|c| !schema.contains(c)) {
            return Err(PlanError::ColumnNotFound(missing.qualified_name()));
        }
    }
    Ok(())
}
