// cleaning.rs
// This module handles loading and cleaning of raw statistics extracts before
// country resolution: metadata lines, column names, numeric cells and
// regional total rows.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::num::ParseFloatError;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::{debug, info};

use crate::errors::PipelineError;
use crate::table::{Table, Value, YEAR};

/// Options describing how a raw statistics CSV is read.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Metadata lines before the header row.
    pub skip_lines: usize,
    /// Columns parsed as numbers; rows where they cannot be parsed are skipped.
    pub numeric_columns: Vec<String>,
    /// Apply [`clean_column_name`] to every header.
    pub clean_column_names: bool,
    /// Header renames, applied after cleaning.
    pub renames: BTreeMap<String, String>,
}

/// Counts of rows kept and skipped while loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub valid_rows: usize,
    pub skipped_rows: usize,
}

/// Lowercases a header and turns runs of other characters into `_`.
///
/// `"Net Generation\n(Megawatthours)"` becomes `"net_generation_megawatthours"`.
pub fn clean_column_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Parses a numeric cell, tolerating thousands separators and blanks.
///
/// # Returns
/// * `Ok(None)` for blank or `NA`-like cells, an error for anything else
///   that is not a number.
pub fn parse_number(raw: &str) -> Result<Option<f64>, ParseFloatError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && *c != ' ').collect();
    match cleaned.as_str() {
        "" | "-" | "NA" | "N/A" | "n/a" | "nan" | "NaN" | ".." => Ok(None),
        s => s.parse::<f64>().map(Some),
    }
}

pub(crate) fn parse_year(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }
    match raw.parse::<i64>() {
        Ok(y) => Value::Int(y),
        Err(_) => match raw.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => Value::Int(f as i64),
            _ => Value::text(raw),
        },
    }
}

/// Reads a statistics CSV into a [`Table`].
///
/// # Arguments
/// * `path` - The path to the input CSV file
/// * `options` - Metadata lines to skip, numeric columns, header cleaning
///
/// # Returns
/// * The table (numeric columns as floats, `year` as integers, everything
///   else as text, blanks as null) and a [`LoadReport`]
pub fn load_table(
    path: impl AsRef<Path>,
    options: &LoadOptions,
) -> Result<(Table, LoadReport), PipelineError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut lines = BufReader::new(file).lines();

    // Skip metadata header lines (non-CSV rows)
    for _ in 0..options.skip_lines {
        if let Some(line) = lines.next() {
            line.map_err(|e| PipelineError::io(path, e))?;
        }
    }

    let csv_data: Vec<u8> = lines
        .collect::<Result<Vec<String>, _>>()
        .map_err(|e| PipelineError::io(path, e))?
        .join("\n")
        .into_bytes();

    let (table, report) = read_table(csv_data.as_slice(), options)
        .map_err(|e| match e {
            ReadError::Csv(e) => PipelineError::csv(path, e),
            ReadError::Table(e) => PipelineError::Table(e),
        })?;
    info!(
        path = %path.display(),
        valid_rows = report.valid_rows,
        skipped_rows = report.skipped_rows,
        "loaded statistics"
    );
    Ok((table, report))
}

enum ReadError {
    Csv(csv::Error),
    Table(crate::errors::TableError),
}

fn read_table(data: &[u8], options: &LoadOptions) -> Result<(Table, LoadReport), ReadError> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(data);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(ReadError::Csv)?
        .iter()
        .map(|h| {
            let name = if options.clean_column_names {
                clean_column_name(h)
            } else {
                h.trim().to_string()
            };
            options.renames.get(&name).cloned().unwrap_or(name)
        })
        .collect();
    debug!(?headers, "statistics headers");

    let mut table = Table::new(headers.iter().cloned()).map_err(ReadError::Table)?;
    for column in &options.numeric_columns {
        table
            .require_column(column, "numeric column")
            .map_err(ReadError::Table)?;
    }

    let mut report = LoadReport::default();
    'records: for result in rdr.records() {
        let record = match result {
            Ok(r) if r.len() == headers.len() => r,
            _ => {
                report.skipped_rows += 1;
                continue;
            }
        };

        let mut row = Vec::with_capacity(headers.len());
        for (name, field) in headers.iter().zip(record.iter()) {
            let value = if options.numeric_columns.contains(name) {
                match parse_number(field) {
                    Ok(v) => v.into(),
                    Err(_) => {
                        report.skipped_rows += 1;
                        continue 'records;
                    }
                }
            } else if name == YEAR {
                parse_year(field)
            } else if field.trim().is_empty() {
                Value::Null
            } else {
                Value::text(field.trim())
            };
            row.push(value);
        }
        table.push_row(row).map_err(ReadError::Table)?;
        report.valid_rows += 1;
    }

    Ok((table, report))
}

/// Drops rows whose `column` value (trimmed) is one of `labels`, such as
/// regional totals mixed into per-country extracts.
///
/// # Returns
/// * The number of rows removed
pub fn drop_labels(table: &mut Table, column: &str, labels: &[String]) -> Result<usize, PipelineError> {
    if labels.is_empty() {
        return Ok(0);
    }
    let idx = table.require_column(column, "labels to drop")?;
    let before = table.len();
    table.retain_rows(|_, row| match &row[idx] {
        Value::Text(s) => !labels.iter().any(|l| l.trim() == s.trim()),
        _ => true,
    });
    let dropped = before - table.len();
    debug!(column, dropped, "dropped labelled rows");
    Ok(dropped)
}
