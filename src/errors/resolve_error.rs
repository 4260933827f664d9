// resolve_error.rs
// Country name resolution errors.

/// Errors that can occur while translating raw country values.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Raised in strict mode; lists every unresolved value of the batch.
    #[error("{} unresolved country value(s): {}", values.len(), values.join(", "))]
    UnresolvedCountry { values: Vec<String> },

    #[error("Invalid translation table: {0}")]
    InvalidTranslationTable(String),
}
