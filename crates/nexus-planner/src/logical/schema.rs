//! Schema representation for logical plans.
//!
//! Schemas describe the output columns of each operator in a logical plan.
//! A [`Column`] is identified by a plan-unique id, so two columns with the
//! same name coming from different scans never compare equal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::expr::Expr;
use crate::catalog::ColumnId;
use crate::types::FieldType;

/// A typed column reference inside a logical plan.
#[derive(Debug, Clone)]
pub struct Column {
    /// Plan-unique identifier.
    pub unique_id: u64,
    /// Catalog column id, if the column comes from a table.
    pub id: Option<ColumnId>,
    /// Optional table/relation qualifier.
    pub qualifier: Option<String>,
    /// Column name.
    pub name: String,
    /// Exact column type.
    pub field_type: FieldType,
    /// Defining expression of a generated column, bound to the columns of
    /// the same scan.
    pub virtual_expr: Option<Box<Expr>>,
}

impl Column {
    /// Creates a new unqualified column.
    pub fn new(unique_id: u64, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            unique_id,
            id: None,
            qualifier: None,
            name: name.into(),
            field_type,
            virtual_expr: None,
        }
    }

    /// Sets the qualifier.
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Sets the catalog column id.
    pub fn with_id(mut self, id: ColumnId) -> Self {
        self.id = Some(id);
        self
    }

    /// Attaches a generated-column definition.
    pub fn with_virtual_expr(mut self, expr: Expr) -> Self {
        self.virtual_expr = Some(Box::new(expr));
        self
    }

    /// Returns true if the column is a generated column with a known
    /// definition.
    pub fn is_generated(&self) -> bool {
        self.virtual_expr.is_some()
    }

    /// Returns true if the column has not been bound to a plan yet.
    pub fn is_unbound(&self) -> bool {
        self.unique_id == 0
    }

    /// Returns the fully qualified name.
    pub fn qualified_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}.{}", q, self.name),
            None => self.name.clone(),
        }
    }

    /// Returns true if this column matches the given name.
    pub fn matches(&self, qualifier: Option<&str>, name: &str) -> bool {
        if !self.name.eq_ignore_ascii_case(name) {
            return false;
        }
        match (qualifier, &self.qualifier) {
            (Some(q), Some(sq)) => q.eq_ignore_ascii_case(sq),
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

// Identity is the plan-unique id; names and types ride along.
impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for Column {}

impl Hash for Column {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_id.hash(state);
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// Hands out plan-unique column ids.
///
/// Clones share the same counter, so builders for both sides of a join
/// never hand out the same id. Ids start at 1; 0 marks an unbound column.
#[derive(Debug, Clone)]
pub struct ColumnIdAllocator {
    next: Arc<AtomicU64>,
}

impl ColumnIdAllocator {
    /// Creates a new allocator.
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocates the next id.
    pub fn allocate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ColumnIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Schema describes the columns output by a plan node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a schema from columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Returns the columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema is empty.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the column at the given position.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the position of a column, matched by plan-unique id.
    pub fn column_index(&self, column: &Column) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.unique_id == column.unique_id)
    }

    /// Returns true if the schema contains the column.
    pub fn contains(&self, column: &Column) -> bool {
        self.column_index(column).is_some()
    }

    /// Finds the column carrying the given catalog column id.
    pub fn find_by_id(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == Some(id))
    }

    /// Finds a column by (optionally qualified) name.
    ///
    /// Returns the first match.
    pub fn find_by_name(&self, qualifier: Option<&str>, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.matches(qualifier, name))
    }

    /// Merges two schemas (for joins).
    pub fn merge(&self, other: &Schema) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Schema::new(columns)
    }

    /// Returns a schema keeping only the given positions.
    pub fn project(&self, indices: &[usize]) -> Schema {
        Schema::new(
            indices
                .iter()
                .filter_map(|&i| self.columns.get(i).cloned())
                .collect(),
        )
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<_> = self
            .columns
            .iter()
            .map(|c| format!("{}: {}", c, c.field_type))
            .collect();
        write!(f, "[{}]", cols.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema(ids: &ColumnIdAllocator) -> Schema {
        Schema::new(vec![
            Column::new(ids.allocate(), "id", FieldType::int())
                .with_qualifier("users")
                .with_id(1),
            Column::new(ids.allocate(), "name", FieldType::varchar(255))
                .with_qualifier("users")
                .with_id(2),
        ])
    }

    #[test]
    fn test_column_identity() {
        let a = Column::new(7, "a", FieldType::int());
        let renamed = Column::new(7, "b", FieldType::bigint());
        let other = Column::new(8, "a", FieldType::int());
        assert_eq!(a, renamed);
        assert_ne!(a, other);
    }

    #[test]
    fn test_allocator_shared_between_clones() {
        let ids = ColumnIdAllocator::new();
        let cloned = ids.clone();
        assert_eq!(ids.allocate(), 1);
        assert_eq!(cloned.allocate(), 2);
        assert_eq!(ids.allocate(), 3);
    }

    #[test]
    fn test_schema_lookup() {
        let ids = ColumnIdAllocator::new();
        let schema = test_schema(&ids);

        let name = schema.find_by_name(None, "NAME").unwrap();
        assert_eq!(schema.column_index(name), Some(1));
        assert_eq!(schema.find_by_id(1).unwrap().name, "id");
        assert!(schema.find_by_id(9).is_none());
        assert!(schema.find_by_name(Some("orders"), "id").is_none());

        let stranger = Column::new(ids.allocate(), "id", FieldType::int());
        assert!(!schema.contains(&stranger));
    }

    #[test]
    fn test_schema_merge_and_project() {
        let ids = ColumnIdAllocator::new();
        let left = test_schema(&ids);
        let right = test_schema(&ids);

        let merged = left.merge(&right);
        assert_eq!(merged.len(), 4);

        let projected = merged.project(&[1, 3]);
        assert_eq!(projected.len(), 2);
        assert!(projected.contains(&right.columns()[1]));
        assert!(!projected.contains(&left.columns()[0]));
    }

    #[test]
    fn test_schema_display() {
        let ids = ColumnIdAllocator::new();
        let schema = test_schema(&ids);
        assert_eq!(
            schema.to_string(),
            "[users.id: INT, users.name: VARCHAR(255)]"
        );
    }
}
