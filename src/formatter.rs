// formatter.rs
// Stable column order, deterministic row order, rounding and year normalization.

use crate::errors::TableError;
use crate::table::{COUNTRY, GROUP_NAME, GROUP_TYPE, Table, Value, YEAR};

const LEADING_COLUMNS: [&str; 4] = [GROUP_TYPE, GROUP_NAME, COUNTRY, YEAR];

/// Formats a statistics table for publication.
#[derive(Debug, Clone)]
pub struct StatisticsFormatter {
    measure_column: String,
    round_to: Option<u32>,
}

impl StatisticsFormatter {
    pub fn new(measure_column: impl Into<String>, round_to: Option<u32>) -> Self {
        Self {
            measure_column: measure_column.into(),
            round_to,
        }
    }

    /// `group_type`, `group_name`, `country`, `year` (those present), then the
    /// other columns alphabetically, then the measure.
    pub fn sorted_columns(&self, table: &Table) -> Vec<String> {
        let mut columns: Vec<String> = LEADING_COLUMNS
            .iter()
            .filter(|c| table.has_column(c))
            .map(|c| c.to_string())
            .collect();
        let mut others: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| !LEADING_COLUMNS.contains(&c.as_str()) && **c != self.measure_column)
            .cloned()
            .collect();
        others.sort();
        columns.extend(others);
        columns.push(self.measure_column.clone());
        columns
    }

    pub fn format(&self, table: &Table) -> Result<Table, TableError> {
        let measure_idx = table.require_column(&self.measure_column, "measure column to format")?;
        let mut out = table.clone();

        if let Some(year_idx) = out.column_index(YEAR) {
            for row in out.rows_mut() {
                row[year_idx] = normalize_year(&row[year_idx])?;
            }
        }

        if let Some(digits) = self.round_to {
            for row in out.rows_mut() {
                if let Value::Float(v) = row[measure_idx] {
                    row[measure_idx] = Value::Float(round_half_even(v, digits));
                }
            }
        }

        let columns = self.sorted_columns(&out);
        out.sort_by_columns(&columns)?;
        out.select(&columns)
    }
}

/// Missing years become `"0"`; every year is rendered as an integer string.
pub fn normalize_year(value: &Value) -> Result<Value, TableError> {
    let year = match value {
        Value::Null => 0,
        Value::Int(i) => *i,
        Value::Float(f) if f.is_nan() => 0,
        Value::Float(f) => f.trunc() as i64,
        Value::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                0
            } else if let Ok(i) = s.parse::<i64>() {
                i
            } else {
                match s.parse::<f64>() {
                    Ok(f) if f.is_finite() => f.trunc() as i64,
                    _ => return Err(TableError::InvalidYear(s.to_string())),
                }
            }
        }
    };
    Ok(Value::Text(year.to_string()))
}

/// Rounds to `digits` decimals, ties to even.
pub fn round_half_even(value: f64, digits: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let Ok(exponent) = i32::try_from(digits) else {
        return value;
    };
    let scale = 10f64.powi(exponent);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round_ties_even() / scale
}
