// errors/mod.rs
// Error handling for the data preparation pipeline.
// One error enum per subsystem, `thiserror` only.

pub mod catalog_error;
pub mod pipeline_error;
pub mod resolve_error;
pub mod table_error;

pub use catalog_error::CatalogError;
pub use pipeline_error::PipelineError;
pub use resolve_error::ResolveError;
pub use table_error::TableError;
