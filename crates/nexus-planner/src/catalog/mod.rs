//! Table catalog for metadata management.
//!
//! The catalog stores information about tables, their columns (including
//! generated column definitions) and their indexes. Plans reference tables
//! through shared [`Arc<TableInfo>`] snapshots, so altering a table never
//! mutates a plan that is already built.

mod error;
mod table;

pub use error::{CatalogError, CatalogResult};
pub use table::{ColumnId, ColumnInfo, IndexInfo, TableInfo};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// Table catalog for managing table metadata.
#[derive(Debug)]
pub struct Catalog {
    /// Tables by lowercase name.
    tables: RwLock<HashMap<String, Arc<TableInfo>>>,
    /// Next table ID.
    next_table_id: RwLock<u64>,
}

impl Catalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_table_id: RwLock::new(1),
        }
    }

    /// Creates a table and returns the registered snapshot.
    pub fn create_table(&self, mut info: TableInfo) -> CatalogResult<Arc<TableInfo>> {
        info.validate()?;

        let key = info.name.to_ascii_lowercase();
        let mut tables = self.tables.write();
        if tables.contains_key(&key) {
            return Err(CatalogError::TableExists(info.name));
        }

        let mut next_id = self.next_table_id.write();
        info.table_id = *next_id;
        *next_id += 1;

        debug!(
            table = %info.name,
            table_id = info.table_id,
            columns = info.columns.len(),
            indexes = info.indexes.len(),
            "created table"
        );
        let info = Arc::new(info);
        tables.insert(key, Arc::clone(&info));
        Ok(info)
    }

    /// Drops a table.
    pub fn drop_table(&self, name: &str) -> CatalogResult<Arc<TableInfo>> {
        self.tables
            .write()
            .remove(&name.to_ascii_lowercase())
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    /// Gets table information.
    pub fn get_table(&self, name: &str) -> Option<Arc<TableInfo>> {
        self.tables.read().get(&name.to_ascii_lowercase()).cloned()
    }

    /// Checks if a table exists.
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.read().contains_key(&name.to_ascii_lowercase())
    }

    /// Lists all table names.
    pub fn list_tables(&self) -> Vec<String> {
        self.tables.read().values().map(|t| t.name.clone()).collect()
    }

    /// Returns the number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.read().len()
    }

    /// Adds an index to an existing table and returns the new snapshot.
    pub fn create_index(&self, table: &str, index: IndexInfo) -> CatalogResult<Arc<TableInfo>> {
        let mut tables = self.tables.write();
        let current = tables
            .get_mut(&table.to_ascii_lowercase())
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))?;

        if current
            .indexes
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(&index.name))
        {
            return Err(CatalogError::IndexExists(index.name));
        }
        current.validate_index(&index)?;

        debug!(table = %current.name, index = %index.name, "created index");
        let mut updated = TableInfo::clone(current);
        updated.indexes.push(index);
        *current = Arc::new(updated);
        Ok(Arc::clone(current))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
