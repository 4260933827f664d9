// aggregator.rs
// Rolls per-country statistics up into zones and groups, keeping the
// per-country rows alongside the aggregates in a single table.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::{CountryZoneCatalog, GroupType};
use crate::diagnostics::CoverageWarning;
use crate::errors::TableError;
use crate::table::{COUNTRY, GROUP_NAME, GROUP_TYPE, Table, Value};

/// Aggregation applied to a measure column over the members of a zone/group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Nulls skipped; an all-null input sums to 0.
    Sum,
    /// Nulls skipped; an all-null input gives null.
    Mean,
    /// First non-null value in input order.
    First,
    Min,
    Max,
}

impl Aggregation {
    pub fn apply(&self, values: &[Option<f64>]) -> Option<f64> {
        let mut present = values.iter().flatten().copied();
        match self {
            Aggregation::Sum => Some(present.sum()),
            Aggregation::Mean => {
                let (total, count) = present.fold((0.0, 0usize), |(t, c), v| (t + v, c + 1));
                (count > 0).then(|| total / count as f64)
            }
            Aggregation::First => present.next(),
            Aggregation::Min => present.reduce(f64::min),
            Aggregation::Max => present.reduce(f64::max),
        }
    }
}

/// A measure column and how it is aggregated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureSpec {
    pub column: String,
    pub aggregation: Aggregation,
}

impl MeasureSpec {
    pub fn new(column: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            column: column.into(),
            aggregation,
        }
    }
}

/// Combined per-country and per-zone table, with the coverage warnings
/// collected while building it.
#[derive(Debug, Clone, Default)]
pub struct AggregationOutput {
    pub table: Table,
    pub warnings: Vec<CoverageWarning>,
}

/// One country's contribution at a given dimension key. Duplicate input rows
/// for the same key are summed into a single contribution.
struct Contribution {
    country: String,
    dimensions: Vec<Value>,
    measures: Vec<Option<f64>>,
    rows: usize,
}

/// Aggregates statistics per country into zones and groups.
pub struct StatisticsAggregator<'a> {
    catalog: &'a CountryZoneCatalog,
    group_key_columns: Vec<String>,
    measures: Vec<MeasureSpec>,
}

impl<'a> StatisticsAggregator<'a> {
    /// `group_key_columns` must contain `group_name` and `group_type`; any
    /// other key column is a dimension taken from the statistics rows.
    pub fn new(
        catalog: &'a CountryZoneCatalog,
        group_key_columns: impl IntoIterator<Item = impl Into<String>>,
        measures: impl IntoIterator<Item = MeasureSpec>,
    ) -> Self {
        Self {
            catalog,
            group_key_columns: group_key_columns.into_iter().map(Into::into).collect(),
            measures: measures.into_iter().collect(),
        }
    }

    pub fn aggregate(&self, rows: &Table) -> Result<AggregationOutput, TableError> {
        let country_idx = rows.require_column(COUNTRY, "statistics rows")?;
        for reserved in [GROUP_NAME, GROUP_TYPE] {
            if rows.has_column(reserved) {
                return Err(TableError::unexpected(reserved, "statistics rows must be per country"));
            }
            if !self.group_key_columns.iter().any(|c| c == reserved) {
                return Err(TableError::missing(reserved, "group key columns"));
            }
        }
        let dimension_columns: Vec<&str> = self
            .group_key_columns
            .iter()
            .map(String::as_str)
            .filter(|c| *c != GROUP_NAME && *c != GROUP_TYPE)
            .collect();
        let dimension_idx = dimension_columns
            .iter()
            .map(|c| rows.require_column(c, "group key column"))
            .collect::<Result<Vec<_>, _>>()?;
        let measure_idx = self
            .measures
            .iter()
            .map(|m| rows.require_column(&m.column, "measure column"))
            .collect::<Result<Vec<_>, _>>()?;

        let contributions = self.collect_contributions(rows, country_idx, &dimension_idx, &measure_idx)?;
        let mut warnings = self.coverage_warnings(rows, country_idx);
        let duplicated: BTreeSet<String> = contributions
            .iter()
            .filter(|c| c.rows > 1)
            .map(|c| c.country.clone())
            .collect();
        if !duplicated.is_empty() {
            warnings.push(CoverageWarning::DuplicateContributions {
                countries: duplicated.into_iter().collect(),
            });
        }

        // Zone/group aggregates keyed by the group key, in key column order.
        let mut grouped: BTreeMap<Vec<Value>, Vec<Vec<Option<f64>>>> = BTreeMap::new();
        for contribution in &contributions {
            for (group_name, group_type) in self.catalog.memberships_iter(&contribution.country) {
                let mut dims = contribution.dimensions.iter();
                let key: Vec<Value> = self
                    .group_key_columns
                    .iter()
                    .map(|c| match c.as_str() {
                        GROUP_TYPE => Value::text(group_type.as_str()),
                        GROUP_NAME => Value::text(group_name.as_str()),
                        _ => dims.next().cloned().unwrap_or(Value::Null),
                    })
                    .collect();
                let slots = grouped
                    .entry(key)
                    .or_insert_with(|| vec![Vec::new(); self.measures.len()]);
                for (slot, value) in slots.iter_mut().zip(&contribution.measures) {
                    slot.push(*value);
                }
            }
        }

        let mut columns = vec![GROUP_TYPE.to_string(), GROUP_NAME.to_string()];
        columns.extend(rows.columns().iter().filter(|c| *c != COUNTRY).cloned());
        let mut table = Table::new(columns.iter().cloned())?;

        let key_positions: Vec<Option<usize>> = columns
            .iter()
            .map(|c| self.group_key_columns.iter().position(|k| k == c))
            .collect();
        let measure_positions: Vec<Option<usize>> = columns
            .iter()
            .map(|c| self.measures.iter().position(|m| &m.column == c))
            .collect();

        for (key, values) in &grouped {
            let row = key_positions
                .iter()
                .zip(&measure_positions)
                .map(|(k, m)| match (k, m) {
                    (Some(k), _) => key[*k].clone(),
                    (None, Some(m)) => self.measures[*m].aggregation.apply(&values[*m]).into(),
                    (None, None) => Value::Null,
                })
                .collect();
            table.push_row(row)?;
        }
        let zone_rows = table.len();

        for source in rows.rows() {
            let mut row = Vec::with_capacity(columns.len());
            row.push(Value::text(GroupType::Country.as_str()));
            row.push(source[country_idx].clone());
            row.extend(
                source
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != country_idx)
                    .map(|(_, v)| v.clone()),
            );
            table.push_row(row)?;
        }

        debug!(
            zone_rows,
            country_rows = table.len() - zone_rows,
            "aggregated statistics per country and zone"
        );
        for warning in &warnings {
            warn!("{warning}");
        }
        Ok(AggregationOutput { table, warnings })
    }

    fn collect_contributions(
        &self,
        rows: &Table,
        country_idx: usize,
        dimension_idx: &[usize],
        measure_idx: &[usize],
    ) -> Result<Vec<Contribution>, TableError> {
        let mut contributions: Vec<Contribution> = Vec::new();
        let mut seen: BTreeMap<(String, Vec<Value>), usize> = BTreeMap::new();

        for (i, row) in rows.rows().iter().enumerate() {
            let country = match &row[country_idx] {
                Value::Null => return Err(TableError::NullKey { column: COUNTRY.to_string(), row: i }),
                Value::Text(s) if s.trim().is_empty() => {
                    return Err(TableError::NullKey { column: COUNTRY.to_string(), row: i });
                }
                other => other.to_field(),
            };
            let dimensions: Vec<Value> = dimension_idx.iter().map(|&i| row[i].clone()).collect();
            let measures = measure_idx
                .iter()
                .zip(&self.measures)
                .map(|(&i, spec)| {
                    row[i].as_f64().map_err(|value| TableError::NonNumericMeasure {
                        column: spec.column.clone(),
                        value,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            match seen.get(&(country.clone(), dimensions.clone())) {
                Some(&pos) => {
                    let existing = &mut contributions[pos];
                    existing.rows += 1;
                    for (acc, value) in existing.measures.iter_mut().zip(measures) {
                        *acc = match (*acc, value) {
                            (Some(a), Some(b)) => Some(a + b),
                            (a, b) => a.or(b),
                        };
                    }
                }
                None => {
                    seen.insert((country.clone(), dimensions.clone()), contributions.len());
                    contributions.push(Contribution {
                        country,
                        dimensions,
                        measures,
                        rows: 1,
                    });
                }
            }
        }
        Ok(contributions)
    }

    fn coverage_warnings(&self, rows: &Table, country_idx: usize) -> Vec<CoverageWarning> {
        let present: BTreeSet<String> = rows.rows().iter().map(|r| r[country_idx].to_field()).collect();

        let mut warnings = Vec::new();
        for (group_name, group_type, members) in self.catalog.groups() {
            let missing: Vec<String> = members
                .iter()
                .filter(|c| !present.contains(*c))
                .cloned()
                .collect();
            if !missing.is_empty() {
                warnings.push(CoverageWarning::MissingFromStatistics {
                    group_type,
                    group_name: group_name.to_string(),
                    countries: missing,
                });
            }
        }

        let unmatched: Vec<String> = present
            .iter()
            .filter(|c| !self.catalog.contains_country(c))
            .cloned()
            .collect();
        if !unmatched.is_empty() {
            warnings.push(CoverageWarning::UnmatchedCountries { countries: unmatched });
        }
        warnings
    }
}
