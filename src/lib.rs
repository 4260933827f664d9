//! Country/zone aggregation and formatting of reference energy, demographic
//! and emissions statistics.
//!
//! Raw per-country extracts are resolved against a canonical country list,
//! rolled up into zones and groups, and normalized into a stable tabular
//! layout:
//!
//! raw table → [`resolver`] → [`aggregator`] (against the [`catalog`]) →
//! [`formatter`] → output table.
//!
//! The [`pipeline`] module wires these together with the CSV boundary
//! ([`cleaning`], [`reshape`], [`writer`]) for the binary.

pub mod aggregator;
pub mod catalog;
pub mod cleaning;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod formatter;
pub mod per_capita;
pub mod pipeline;
pub mod reshape;
pub mod resolver;
pub mod table;
pub mod writer;

pub use aggregator::{Aggregation, AggregationOutput, MeasureSpec, StatisticsAggregator};
pub use catalog::{CountryZoneCatalog, GroupType, ZoneMembership};
pub use diagnostics::{CoverageWarning, DatasetOverview};
pub use errors::{CatalogError, PipelineError, ResolveError, TableError};
pub use formatter::StatisticsFormatter;
pub use resolver::{CountryNameResolver, Resolution, TranslationTable};
pub use table::{Table, TableSchema, Value};
