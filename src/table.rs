// table.rs
// In-memory tabular data shared by every stage of the pipeline.

use std::cmp::Ordering;
use std::fmt;

use crate::errors::TableError;

pub const COUNTRY: &str = "country";
pub const GROUP_NAME: &str = "group_name";
pub const GROUP_TYPE: &str = "group_type";
pub const YEAR: &str = "year";

/// A single cell.
///
/// Cells are ordered with a total order so tables can be sorted and grouped:
/// numbers (integers and floats compared numerically) come before text, and
/// nulls sort last.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Numeric view of the cell. Text is parsed, nulls and blanks give `Ok(None)`.
    pub fn as_f64(&self) -> Result<Option<f64>, String> {
        match self {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i as f64)),
            Value::Float(f) if f.is_nan() => Ok(None),
            Value::Float(f) => Ok(Some(*f)),
            Value::Text(s) if s.trim().is_empty() => Ok(None),
            Value::Text(s) => s.trim().parse::<f64>().map(Some).map_err(|_| s.clone()),
        }
    }

    /// CSV representation. Floats always carry a decimal point so integral
    /// measures stay recognisable as floats downstream.
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.is_nan() => String::new(),
            Value::Float(f) => {
                let s = f.to_string();
                if f.is_finite() && !s.contains('.') && !s.contains('e') {
                    format!("{s}.0")
                } else {
                    s
                }
            }
            Value::Text(s) => s.clone(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) | Value::Float(_) => 0,
            Value::Text(_) => 1,
            Value::Null => 2,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            other => f.write_str(&other.to_field()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Column-named rows of cells. Every row has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self, TableError> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str, context: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::missing(name, context))
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a Value> + use<'a>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), TableError> {
        let idx = self.require_column(from, "rename")?;
        if from != to && self.has_column(to) {
            return Err(TableError::DuplicateColumn(to.to_string()));
        }
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// Appends a column filled with `fill`.
    pub fn add_column(&mut self, name: &str, fill: Value) -> Result<(), TableError> {
        if self.has_column(name) {
            return Err(TableError::DuplicateColumn(name.to_string()));
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
        Ok(())
    }

    /// Keeps the rows for which `keep` returns true, preserving order.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(usize, &[Value]) -> bool) {
        let mut i = 0;
        self.rows.retain(|row| {
            let kept = keep(i, row);
            i += 1;
            kept
        });
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Vec<Value>> {
        self.rows.iter_mut()
    }

    /// Projects the table onto `columns`, in that order.
    pub fn select(&self, columns: &[String]) -> Result<Table, TableError> {
        let indices = columns
            .iter()
            .map(|c| self.require_column(c, "select"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Table::new(columns.iter().cloned())?;
        out.rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(out)
    }

    /// Stable ascending sort on the given columns.
    pub fn sort_by_columns(&mut self, columns: &[String]) -> Result<(), TableError> {
        let indices = columns
            .iter()
            .map(|c| self.require_column(c, "sort"))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| a[i].cmp(&b[i]))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        Ok(())
    }
}

/// Declared layout of a per-country statistics table.
///
/// Validated at the boundary so that a missing or extra column fails fast
/// instead of silently reshaping the output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSchema {
    pub dimensions: Vec<String>,
    pub units: Vec<String>,
    pub measures: Vec<String>,
}

impl TableSchema {
    /// All declared columns: `country`, dimensions, units, measures.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(COUNTRY.to_string())
            .chain(self.dimensions.iter().cloned())
            .chain(self.units.iter().cloned())
            .chain(self.measures.iter().cloned())
            .collect()
    }

    /// Grouping key used for zone aggregation: group identity plus every
    /// non-measure column.
    pub fn group_key_columns(&self) -> Vec<String> {
        [GROUP_TYPE, GROUP_NAME]
            .into_iter()
            .map(str::to_string)
            .chain(self.dimensions.iter().cloned())
            .chain(self.units.iter().cloned())
            .collect()
    }

    pub fn validate(&self, table: &Table) -> Result<(), TableError> {
        let declared = self.columns();
        for column in &declared {
            table.require_column(column, "declared by schema")?;
        }
        if let Some(extra) = table.columns().iter().find(|c| !declared.contains(c)) {
            return Err(TableError::unexpected(extra.as_str(), "not declared by schema"));
        }
        Ok(())
    }
}
