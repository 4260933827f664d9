// table_error.rs
// Errors raised while shaping, aggregating or formatting tables.

/// Errors that can occur when a table does not have the expected layout.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Missing column `{column}` ({context})")]
    MissingColumn { column: String, context: String },

    #[error("Unexpected column `{column}` ({context})")]
    UnexpectedColumn { column: String, context: String },

    #[error("Duplicate column `{0}`")]
    DuplicateColumn(String),

    #[error("Row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid year value `{0}`")]
    InvalidYear(String),

    #[error("Non-numeric value `{value}` in measure column `{column}`")]
    NonNumericMeasure { column: String, value: String },

    #[error("Row {row} has no value in key column `{column}`")]
    NullKey { column: String, row: usize },

    #[error("Duplicate key {key} ({context})")]
    DuplicateKey { key: String, context: String },
}

impl TableError {
    pub fn missing(column: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            context: context.into(),
        }
    }

    pub fn unexpected(column: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnexpectedColumn {
            column: column.into(),
            context: context.into(),
        }
    }
}
