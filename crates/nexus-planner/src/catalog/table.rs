//! Table, column and index metadata.

use std::collections::HashSet;

use super::error::{CatalogError, CatalogResult};
use crate::logical::{Column, Expr};
use crate::types::FieldType;

/// Catalog-level column identifier, stable for the lifetime of a table.
pub type ColumnId = u64;

/// Information about a table column.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column id.
    pub id: ColumnId,
    /// Column name.
    pub name: String,
    /// Position in the table's column list.
    pub offset: usize,
    /// Declared type.
    pub field_type: FieldType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Defining expression for generated columns. Column references inside
    /// it are unbound and carry the catalog ids of the referenced columns.
    pub generated_expr: Option<Expr>,
    /// Whether the generated value is materialized.
    pub generated_stored: bool,
}

impl ColumnInfo {
    /// Creates a plain nullable column. The offset is assigned when the
    /// column is added to a table.
    pub fn new(id: ColumnId, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id,
            name: name.into(),
            offset: 0,
            field_type,
            nullable: true,
            generated_expr: None,
            generated_stored: false,
        }
    }

    /// Marks the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Makes this a virtual generated column.
    pub fn virtual_generated(mut self, expr: Expr) -> Self {
        self.generated_expr = Some(expr);
        self.generated_stored = false;
        self
    }

    /// Makes this a stored generated column.
    pub fn stored_generated(mut self, expr: Expr) -> Self {
        self.generated_expr = Some(expr);
        self.generated_stored = true;
        self
    }

    /// Returns true if this is a generated column.
    pub fn is_generated(&self) -> bool {
        self.generated_expr.is_some()
    }

    /// Returns an unbound reference to this column, for use inside
    /// generated column definitions.
    pub fn to_expr(&self) -> Expr {
        Expr::Column(Column::new(0, &self.name, self.field_type.clone()).with_id(self.id))
    }
}

/// Index information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// Offsets of the key columns in the table's column list.
    pub columns: Vec<usize>,
    /// Whether the index is unique.
    pub unique: bool,
}

impl IndexInfo {
    /// Creates a new index.
    pub fn new(name: impl Into<String>, columns: Vec<usize>, unique: bool) -> Self {
        Self {
            name: name.into(),
            columns,
            unique,
        }
    }
}

/// Information about a table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Columns in offset order.
    pub columns: Vec<ColumnInfo>,
    /// Index definitions.
    pub indexes: Vec<IndexInfo>,
    /// Table ID (assigned by the catalog).
    pub table_id: u64,
}

impl TableInfo {
    /// Creates an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            table_id: 0,
        }
    }

    /// Appends a column, assigning its offset.
    pub fn with_column(mut self, mut column: ColumnInfo) -> Self {
        column.offset = self.columns.len();
        self.columns.push(column);
        self
    }

    /// Adds an index.
    pub fn with_index(mut self, index: IndexInfo) -> Self {
        self.indexes.push(index);
        self
    }

    /// Sets the table ID.
    pub fn with_table_id(mut self, id: u64) -> Self {
        self.table_id = id;
        self
    }

    /// Returns the column at the given offset.
    pub fn column_by_offset(&self, offset: usize) -> Option<&ColumnInfo> {
        self.columns.get(offset)
    }

    /// Returns the column with the given id.
    pub fn column_by_id(&self, id: ColumnId) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Returns the column with the given name.
    pub fn column_by_name(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the generated columns.
    pub fn generated_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.is_generated())
    }

    /// Builds an index over the named columns.
    pub fn index_on(
        &self,
        name: impl Into<String>,
        columns: &[&str],
        unique: bool,
    ) -> CatalogResult<IndexInfo> {
        let offsets = columns
            .iter()
            .map(|c| {
                self.column_by_name(c)
                    .map(|info| info.offset)
                    .ok_or_else(|| CatalogError::ColumnNotFound(format!("{}.{}", self.name, c)))
            })
            .collect::<CatalogResult<Vec<_>>>()?;
        Ok(IndexInfo::new(name, offsets, unique))
    }

    /// Checks the table definition for internal consistency.
    pub fn validate(&self) -> CatalogResult<()> {
        let mut ids = HashSet::new();
        for (offset, column) in self.columns.iter().enumerate() {
            if column.offset != offset || !ids.insert(column.id) {
                return Err(CatalogError::InvalidColumn {
                    column: column.name.clone(),
                    message: format!("duplicate id {} or misplaced offset", column.id),
                });
            }
        }

        for column in self.generated_columns() {
            if let Some(expr) = &column.generated_expr {
                self.validate_generated(column, expr)?;
            }
        }

        let mut names = HashSet::new();
        for index in &self.indexes {
            self.validate_index(index)?;
            if !names.insert(index.name.to_ascii_lowercase()) {
                return Err(CatalogError::IndexExists(index.name.clone()));
            }
        }
        Ok(())
    }

    pub(crate) fn validate_index(&self, index: &IndexInfo) -> CatalogResult<()> {
        if index.columns.is_empty() {
            return Err(CatalogError::InvalidIndex {
                index: index.name.clone(),
                message: "no key columns".to_string(),
            });
        }
        if let Some(offset) = index.columns.iter().find(|&&o| o >= self.columns.len()) {
            return Err(CatalogError::InvalidIndex {
                index: index.name.clone(),
                message: format!(
                    "column offset {} out of range for {} columns",
                    offset,
                    self.columns.len()
                ),
            });
        }
        Ok(())
    }

    fn validate_generated(&self, column: &ColumnInfo, expr: &Expr) -> CatalogResult<()> {
        for referenced in expr.columns() {
            let Some(id) = referenced.id else {
                return Err(CatalogError::InvalidGeneratedColumn {
                    column: column.name.clone(),
                    message: format!("reference to '{}' has no column id", referenced.name),
                });
            };
            if id == column.id {
                return Err(CatalogError::InvalidGeneratedColumn {
                    column: column.name.clone(),
                    message: "refers to itself".to_string(),
                });
            }
            if self.column_by_id(id).is_none() {
                return Err(CatalogError::InvalidGeneratedColumn {
                    column: column.name.clone(),
                    message: format!("refers to unknown column id {}", id),
                });
            }
        }
        Ok(())
    }
}
