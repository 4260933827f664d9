// per_capita.rs
// Joins aggregated statistics with population to derive per-capita measures.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::debug;

use crate::errors::TableError;
use crate::table::{GROUP_NAME, GROUP_TYPE, Table, Value, YEAR};

pub const POPULATION: &str = "population";

const JOIN_KEY: [&str; 3] = [GROUP_TYPE, GROUP_NAME, YEAR];

/// Inner join of `statistics` and `population` on (group_type, group_name, year).
/// The population table must have at most one row per key.
///
/// Adds `population` and `output_column = measure / population`; the ratio is
/// null when either side is null or the population is zero. When `unit` is
/// given an `<output_column>_unit` column is appended too.
pub fn join_per_capita(
    statistics: &Table,
    population: &Table,
    measure: &str,
    output_column: &str,
    unit: Option<&str>,
) -> Result<Table, TableError> {
    let stat_keys = JOIN_KEY
        .iter()
        .map(|c| statistics.require_column(c, "per-capita join key"))
        .collect::<Result<Vec<_>, _>>()?;
    let pop_keys = JOIN_KEY
        .iter()
        .map(|c| population.require_column(c, "population join key"))
        .collect::<Result<Vec<_>, _>>()?;
    let measure_idx = statistics.require_column(measure, "per-capita measure")?;
    let pop_idx = population.require_column(POPULATION, "population table")?;
    if statistics.has_column(POPULATION) {
        return Err(TableError::unexpected(POPULATION, "statistics already carry population"));
    }

    let mut by_key: BTreeMap<Vec<Value>, Option<f64>> = BTreeMap::new();
    for row in population.rows() {
        let key: Vec<Value> = pop_keys.iter().map(|&i| row[i].clone()).collect();
        let value = row[pop_idx]
            .as_f64()
            .map_err(|value| TableError::NonNumericMeasure {
                column: POPULATION.to_string(),
                value,
            })?;
        match by_key.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(slot) => {
                let key: Vec<String> = slot.key().iter().map(Value::to_field).collect();
                return Err(TableError::DuplicateKey {
                    key: key.join("/"),
                    context: "population table".to_string(),
                });
            }
        }
    }

    let mut columns: Vec<String> = statistics.columns().to_vec();
    columns.push(POPULATION.to_string());
    columns.push(output_column.to_string());
    let unit_column = unit.map(|u| (format!("{output_column}_unit"), u));
    if let Some((name, _)) = &unit_column {
        columns.push(name.clone());
    }
    let mut out = Table::new(columns)?;

    for row in statistics.rows() {
        let key: Vec<Value> = stat_keys.iter().map(|&i| row[i].clone()).collect();
        let Some(pop) = by_key.get(&key) else {
            continue;
        };
        let stat = row[measure_idx]
            .as_f64()
            .map_err(|value| TableError::NonNumericMeasure {
                column: measure.to_string(),
                value,
            })?;
        let ratio = match (stat, *pop) {
            (Some(s), Some(p)) if p != 0.0 => Some(s / p),
            _ => None,
        };
        let mut joined = row.clone();
        joined.push((*pop).into());
        joined.push(ratio.into());
        if let Some((_, u)) = &unit_column {
            joined.push(Value::text(*u));
        }
        out.push_row(joined)?;
    }
    debug!(
        statistics = statistics.len(),
        joined = out.len(),
        "joined statistics with population"
    );
    Ok(out)
}
