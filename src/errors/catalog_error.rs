// catalog_error.rs
// Country/zone catalog errors.

/// Errors that can occur while loading the countries-and-zones reference table.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid catalog at row {row}: {reason}")]
    InvalidCatalog { row: usize, reason: String },
}

impl CatalogError {
    pub fn invalid(row: usize, reason: impl Into<String>) -> Self {
        Self::InvalidCatalog {
            row,
            reason: reason.into(),
        }
    }
}
