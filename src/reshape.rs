// reshape.rs
// Source-specific reshaping between loading and country resolution: wide year
// columns to rows, constant columns and unit scaling.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::cleaning::{parse_number, parse_year};
use crate::errors::TableError;
use crate::table::{Table, Value, YEAR};

/// Wide-to-long layout: every column outside `id_columns` becomes one row per
/// record, its header going to `variable` and its cell to `value`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeltSpec {
    pub id_columns: Vec<String>,
    #[serde(default = "default_variable")]
    pub variable: String,
    pub value: String,
}

fn default_variable() -> String {
    YEAR.to_string()
}

/// Melts `table` according to `layout`.
///
/// Cells that are blank or not numbers are dropped, as are headers that do
/// not parse as a year when `variable` is `year`.
///
/// # Returns
/// * The long table and the number of cells dropped
pub fn melt(table: &Table, layout: &MeltSpec) -> Result<(Table, usize), TableError> {
    let id_idx = layout
        .id_columns
        .iter()
        .map(|c| table.require_column(c, "melt id column"))
        .collect::<Result<Vec<_>, _>>()?;
    for name in [&layout.variable, &layout.value] {
        if layout.id_columns.contains(name) {
            return Err(TableError::DuplicateColumn(name.clone()));
        }
    }

    // `None` marks a header that is not a year when melting years.
    let melted: Vec<(usize, Option<Value>)> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| !id_idx.contains(i))
        .map(|(i, header)| {
            let variable = if layout.variable == YEAR {
                Some(parse_year(header)).filter(|v| matches!(v, Value::Int(_)))
            } else {
                Some(Value::text(header.trim()))
            };
            (i, variable)
        })
        .collect();

    let mut columns = layout.id_columns.clone();
    columns.push(layout.variable.clone());
    columns.push(layout.value.clone());
    let mut out = Table::new(columns)?;

    let mut dropped = 0;
    for row in table.rows() {
        for (i, variable) in &melted {
            let (Some(variable), Ok(Some(value))) = (variable, parse_number(&row[*i].to_field())) else {
                dropped += 1;
                continue;
            };
            let mut long: Vec<Value> = id_idx.iter().map(|&j| row[j].clone()).collect();
            long.push(variable.clone());
            long.push(Value::Float(value));
            out.push_row(long)?;
        }
    }
    debug!(rows = out.len(), dropped, "melted wide columns");
    Ok((out, dropped))
}

/// Appends one column per entry, filled with the given text.
pub fn add_constants(table: &mut Table, constants: &BTreeMap<String, String>) -> Result<(), TableError> {
    for (column, value) in constants {
        table.add_column(column, Value::text(value.as_str()))?;
    }
    Ok(())
}

/// Multiplies each listed numeric column by its factor, e.g. `0.001` to turn
/// million barrels into billion barrels. Nulls stay null.
pub fn scale_columns(table: &mut Table, factors: &BTreeMap<String, f64>) -> Result<(), TableError> {
    for (column, factor) in factors {
        let idx = table.require_column(column, "column to scale")?;
        for row in table.rows_mut() {
            row[idx] = match row[idx].as_f64() {
                Ok(v) => v.map(|v| v * factor).into(),
                Err(value) => {
                    return Err(TableError::NonNumericMeasure {
                        column: column.clone(),
                        value,
                    });
                }
            };
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide() -> Table {
        let mut t = Table::new(["country", "2019", "2020", "Notes"]).unwrap();
        t.push_row(vec!["Algeria".into(), "4,504".into(), "4,504".into(), Value::Null]).unwrap();
        t.push_row(vec!["Qatar".into(), Value::Null, "23,831".into(), "est.".into()]).unwrap();
        t
    }

    fn year_melt() -> MeltSpec {
        MeltSpec {
            id_columns: vec!["country".into()],
            variable: "year".into(),
            value: "proven_reserves".into(),
        }
    }

    #[test]
    fn test_melt_year_columns() {
        let (long, dropped) = melt(&wide(), &year_melt()).unwrap();
        assert_eq!(long.columns(), &["country", "year", "proven_reserves"].map(String::from));
        assert_eq!(long.len(), 3);
        assert_eq!(long.rows()[0], vec![Value::text("Algeria"), Value::Int(2019), Value::Float(4504.0)]);
        assert_eq!(long.rows()[2], vec![Value::text("Qatar"), Value::Int(2020), Value::Float(23831.0)]);
        // Qatar 2019 blank, plus both `Notes` cells
        assert_eq!(dropped, 3);
    }

    #[test]
    fn test_melt_text_variable() {
        let mut t = Table::new(["country", "Energy", "Transport"]).unwrap();
        t.push_row(vec!["France".into(), "10".into(), "20.5".into()]).unwrap();
        let layout = MeltSpec {
            id_columns: vec!["country".into()],
            variable: "sector".into(),
            value: "ghg".into(),
        };
        let (long, dropped) = melt(&t, &layout).unwrap();
        assert_eq!(dropped, 0);
        assert_eq!(long.value(1, "sector"), Some(&Value::text("Transport")));
        assert_eq!(long.value(1, "ghg"), Some(&Value::Float(20.5)));
    }

    #[test]
    fn test_melt_missing_id_column() {
        let layout = MeltSpec {
            id_columns: vec!["area".into()],
            ..year_melt()
        };
        assert!(matches!(
            melt(&wide(), &layout),
            Err(TableError::MissingColumn { column, .. }) if column == "area"
        ));
    }

    #[test]
    fn test_constants_and_scale() {
        let (mut long, _) = melt(&wide(), &year_melt()).unwrap();
        scale_columns(&mut long, &BTreeMap::from([("proven_reserves".to_string(), 0.001)])).unwrap();
        add_constants(
            &mut long,
            &BTreeMap::from([
                ("energy_source".to_string(), "Gas".to_string()),
                ("proven_reserves_unit".to_string(), "Tcm".to_string()),
            ]),
        )
        .unwrap();
        assert_eq!(long.value(0, "proven_reserves"), Some(&Value::Float(4504.0 * 0.001)));
        assert_eq!(long.value(2, "energy_source"), Some(&Value::text("Gas")));
        assert_eq!(long.value(2, "proven_reserves_unit"), Some(&Value::text("Tcm")));

        // a constant may not overwrite an existing column
        assert!(matches!(
            add_constants(&mut long, &BTreeMap::from([("country".to_string(), "X".to_string())])),
            Err(TableError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_scale_rejects_text() {
        let mut t = Table::new(["country", "value"]).unwrap();
        t.push_row(vec!["France".into(), "n.a.".into()]).unwrap();
        assert!(matches!(
            scale_columns(&mut t, &BTreeMap::from([("value".to_string(), 2.0)])),
            Err(TableError::NonNumericMeasure { .. })
        ));
    }
}
