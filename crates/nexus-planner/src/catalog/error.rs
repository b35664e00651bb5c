//! Catalog error types.

use thiserror::Error;

/// Catalog error type.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Table not found.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Table already exists.
    #[error("Table already exists: {0}")]
    TableExists(String),

    /// Column not found.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Column definition is invalid.
    #[error("Invalid column '{column}': {message}")]
    InvalidColumn {
        /// Column name.
        column: String,
        /// What is wrong with it.
        message: String,
    },

    /// Index already exists on the table.
    #[error("Index already exists: {0}")]
    IndexExists(String),

    /// Index definition is invalid.
    #[error("Invalid index '{index}': {message}")]
    InvalidIndex {
        /// Index name.
        index: String,
        /// What is wrong with it.
        message: String,
    },

    /// Generated column definition is invalid.
    #[error("Invalid generated column '{column}': {message}")]
    InvalidGeneratedColumn {
        /// Column name.
        column: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Catalog result type.
pub type CatalogResult<T> = Result<T, CatalogError>;
