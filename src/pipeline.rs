// pipeline.rs
// Sequences one statistics source through load → reshape → resolve →
// aggregate → per-capita → format → write.

use tracing::{info, info_span};

use crate::aggregator::StatisticsAggregator;
use crate::catalog::CountryZoneCatalog;
use crate::cleaning::{LoadOptions, LoadReport, drop_labels, load_table};
use crate::config::PipelineConfig;
use crate::diagnostics::{CoverageWarning, DatasetOverview};
use crate::errors::PipelineError;
use crate::formatter::StatisticsFormatter;
use crate::per_capita::{POPULATION, join_per_capita};
use crate::reshape::{add_constants, melt, scale_columns};
use crate::resolver::{CountryNameResolver, ResolutionReport, TranslationTable};
use crate::table::{Table, YEAR};
use crate::writer::write_table;

/// Finalized output of a pipeline run, with everything that was dropped or
/// flagged along the way.
#[derive(Debug, Clone)]
pub struct PreparedStatistics {
    pub table: Table,
    pub load: LoadReport,
    /// Blank or non-numeric cells discarded while melting.
    pub cells_dropped: usize,
    pub labels_dropped: usize,
    pub resolution: ResolutionReport,
    pub warnings: Vec<CoverageWarning>,
    pub overview: DatasetOverview,
}

/// Builds the resolver from the configured translation tables.
pub fn build_resolver(config: &PipelineConfig) -> Result<CountryNameResolver, PipelineError> {
    let names = match &config.translations {
        Some(path) => TranslationTable::from_csv_path(path)?,
        None => TranslationTable::default(),
    };
    let resolver = CountryNameResolver::new(names);
    Ok(match &config.iso_codes {
        Some(path) => resolver.with_iso_codes(TranslationTable::from_csv_path(path)?),
        None => resolver,
    })
}

/// Runs every in-memory step of the pipeline. Nothing is written.
pub fn prepare(
    config: &PipelineConfig,
    catalog: &CountryZoneCatalog,
    resolver: &CountryNameResolver,
) -> Result<PreparedStatistics, PipelineError> {
    let schema = config.schema.table_schema();
    let options = LoadOptions {
        skip_lines: config.skip_lines,
        // Melted measures only exist after reshaping.
        numeric_columns: match config.melt {
            Some(_) => Vec::new(),
            None => schema.measures.clone(),
        },
        clean_column_names: config.clean_column_names,
        renames: config.rename.clone(),
    };
    let (mut table, load) = load_table(&config.statistics, &options)?;

    let mut cells_dropped = 0;
    if let Some(layout) = &config.melt {
        (table, cells_dropped) = melt(&table, layout)?;
    }
    scale_columns(&mut table, &config.scale)?;
    add_constants(&mut table, &config.constants)?;

    let labels_dropped = drop_labels(&mut table, &config.country_column, &config.drop_labels)?;
    let resolution = resolver.resolve_column(&mut table, &config.country_column, config.raise_on_unresolved)?;
    schema.validate(&table)?;

    let aggregator = StatisticsAggregator::new(catalog, schema.group_key_columns(), config.schema.measure_specs());
    let aggregated = aggregator.aggregate(&table)?;
    let mut table = aggregated.table;

    if let Some(per_capita) = &config.per_capita {
        let population_options = LoadOptions {
            numeric_columns: vec![POPULATION.to_string()],
            ..LoadOptions::default()
        };
        let (mut population, _) = load_table(&per_capita.population, &population_options)?;
        // Formatted population files carry years as text; align with ours.
        if let Some(idx) = population.column_index(YEAR) {
            for row in population.rows_mut() {
                row[idx] = crate::formatter::normalize_year(&row[idx])?;
            }
        }
        if let Some(idx) = table.column_index(YEAR) {
            for row in table.rows_mut() {
                row[idx] = crate::formatter::normalize_year(&row[idx])?;
            }
        }
        table = join_per_capita(
            &table,
            &population,
            &per_capita.measure,
            &per_capita.output_column,
            per_capita.unit.as_deref(),
        )?;
    }

    let measure = config
        .format_measure()
        .ok_or_else(|| PipelineError::Config(format!("pipeline `{}` has no measure to format", config.name)))?;
    let table = StatisticsFormatter::new(measure, config.round_to).format(&table)?;

    Ok(PreparedStatistics {
        overview: DatasetOverview::of(&table),
        table,
        load,
        cells_dropped,
        labels_dropped,
        resolution,
        warnings: aggregated.warnings,
    })
}

/// Loads reference data, prepares the statistics and writes the output file.
/// The output is only written once the whole table is finalized.
pub fn run(config: &PipelineConfig) -> Result<PreparedStatistics, PipelineError> {
    let span = info_span!("pipeline", name = %config.name);
    let _enter = span.enter();

    let catalog = CountryZoneCatalog::from_csv_path(&config.countries_and_zones)?;
    let resolver = build_resolver(config)?;
    let prepared = prepare(config, &catalog, &resolver)?;
    write_table(&config.output, &prepared.table)?;

    info!(
        rows = prepared.table.len(),
        countries = prepared.overview.countries,
        dropped_countries = prepared.resolution.dropped_rows,
        warnings = prepared.warnings.len(),
        "pipeline finished"
    );
    Ok(prepared)
}
