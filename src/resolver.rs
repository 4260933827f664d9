// resolver.rs
// Translation of raw country names and ISO codes onto the canonical country list.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{PipelineError, ResolveError, TableError};
use crate::table::{COUNTRY, Table, Value};

/// Canonical value meaning "drop this row".
pub const DELETE_SENTINEL: &str = "Delete";

const FOOTNOTE_MARKERS: &[char] = &[
    '*', '†', '‡', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹', '⁰',
];

/// Row of a translation CSV (`raw,canonical`).
#[derive(Debug, Deserialize)]
pub struct TranslationRecord {
    pub raw: String,
    pub canonical: String,
}

/// Lookup key for a raw value: trimmed, whitespace collapsed, case-folded,
/// trailing footnote markers removed.
pub fn normalize_key(raw: &str) -> String {
    let mut s = raw.trim();
    loop {
        let before = s.len();
        s = s.trim_end_matches(FOOTNOTE_MARKERS).trim_end();
        if s.ends_with(']') {
            if let Some(open) = s.rfind('[') {
                if is_footnote_ref(&s[open + 1..s.len() - 1]) {
                    s = s[..open].trim_end();
                }
            }
        }
        if s.len() == before {
            break;
        }
    }
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `[12]` or `[a]`; `[DRC]` is part of the name.
fn is_footnote_ref(inner: &str) -> bool {
    let mut chars = inner.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_ascii_alphanumeric(),
        (Some(_), Some(_)) => inner.chars().all(|c| c.is_ascii_digit()),
        (None, _) => false,
    }
}

/// Immutable raw → canonical mapping, keyed by [`normalize_key`].
#[derive(Debug, Clone, Default)]
pub struct TranslationTable {
    entries: BTreeMap<String, String>,
}

impl TranslationTable {
    pub fn from_pairs<R, C>(pairs: impl IntoIterator<Item = (R, C)>) -> Result<Self, ResolveError>
    where
        R: AsRef<str>,
        C: Into<String>,
    {
        let mut entries = BTreeMap::new();
        for (raw, canonical) in pairs {
            let key = normalize_key(raw.as_ref());
            let canonical: String = canonical.into();
            let canonical = canonical.trim().to_string();
            if key.is_empty() || canonical.is_empty() {
                return Err(ResolveError::InvalidTranslationTable(format!(
                    "empty entry `{}` -> `{}`",
                    raw.as_ref(),
                    canonical
                )));
            }
            match entries.get(&key) {
                Some(existing) if existing != &canonical => {
                    return Err(ResolveError::InvalidTranslationTable(format!(
                        "`{}` maps to both `{}` and `{}`",
                        raw.as_ref(),
                        existing,
                        canonical
                    )));
                }
                _ => {
                    entries.insert(key, canonical);
                }
            }
        }
        Ok(Self { entries })
    }

    /// Loads a `raw,canonical` CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| PipelineError::csv(path, e))?;
        let mut pairs = Vec::new();
        for result in rdr.deserialize::<TranslationRecord>() {
            let record = result.map_err(|e| PipelineError::csv(path, e))?;
            pairs.push((record.raw, record.canonical));
        }
        debug!(path = %path.display(), entries = pairs.len(), "loaded translation table");
        Ok(Self::from_pairs(pairs)?)
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.entries.get(&normalize_key(raw)).map(String::as_str)
    }
}

/// Outcome of resolving one raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Country(String),
    Excluded,
    Unresolved,
}

/// Result of a batch resolution: one entry per input, `None` for dropped rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResolution {
    pub outcomes: Vec<Option<String>>,
    pub report: ResolutionReport,
}

impl BatchResolution {
    /// Canonical names of retained rows, in input order.
    pub fn retained(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| o.as_deref())
    }
}

/// Values dropped during a batch, reported once per batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub excluded: BTreeSet<String>,
    pub unresolved: BTreeSet<String>,
    pub dropped_rows: usize,
}

impl ResolutionReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_rows == 0
    }
}

/// Maps raw country names or ISO codes to canonical country names.
#[derive(Debug, Clone, Default)]
pub struct CountryNameResolver {
    names: TranslationTable,
    iso_codes: Option<TranslationTable>,
}

impl CountryNameResolver {
    pub fn new(names: TranslationTable) -> Self {
        Self {
            names,
            iso_codes: None,
        }
    }

    pub fn with_iso_codes(mut self, iso_codes: TranslationTable) -> Self {
        self.iso_codes = Some(iso_codes);
        self
    }

    pub fn resolve(&self, raw: &str) -> Resolution {
        let found = self.names.get(raw).or_else(|| {
            let via_iso = self.iso_codes.as_ref()?.get(raw)?;
            Some(self.names.get(via_iso).unwrap_or(via_iso))
        });
        match found {
            Some(canonical) if canonical == DELETE_SENTINEL => Resolution::Excluded,
            Some(canonical) => Resolution::Country(canonical.to_string()),
            None => Resolution::Unresolved,
        }
    }

    /// Resolves a batch of raw values with one uniform unresolved policy.
    ///
    /// In strict mode any unresolved value fails the whole batch and the
    /// error names every offending value. Otherwise unresolved and excluded
    /// rows are dropped and reported once for the batch.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        values: &[S],
        raise_on_unresolved: bool,
    ) -> Result<BatchResolution, ResolveError> {
        let mut batch = BatchResolution::default();
        for raw in values {
            let raw = raw.as_ref();
            let outcome = match self.resolve(raw) {
                Resolution::Country(name) => Some(name),
                Resolution::Excluded => {
                    batch.report.excluded.insert(raw.trim().to_string());
                    None
                }
                Resolution::Unresolved => {
                    batch.report.unresolved.insert(raw.trim().to_string());
                    None
                }
            };
            if outcome.is_none() {
                batch.report.dropped_rows += 1;
            }
            batch.outcomes.push(outcome);
        }

        if raise_on_unresolved && !batch.report.unresolved.is_empty() {
            return Err(ResolveError::UnresolvedCountry {
                values: batch.report.unresolved.iter().cloned().collect(),
            });
        }

        if !batch.report.is_clean() {
            warn!(
                dropped_rows = batch.report.dropped_rows,
                excluded = ?batch.report.excluded,
                unresolved = ?batch.report.unresolved,
                "dropped rows with excluded or unresolved country values"
            );
        }
        Ok(batch)
    }

    /// Translates `column` of `table` in place, renames it to `country` and
    /// drops rows that did not resolve.
    pub fn resolve_column(
        &self,
        table: &mut Table,
        column: &str,
        raise_on_unresolved: bool,
    ) -> Result<ResolutionReport, PipelineError> {
        let idx = table.require_column(column, "country values to resolve")?;
        if column != COUNTRY && table.has_column(COUNTRY) {
            return Err(TableError::unexpected(COUNTRY, "would be overwritten by resolved column").into());
        }
        let raw: Vec<String> = table
            .rows()
            .iter()
            .map(|row| match &row[idx] {
                Value::Null => String::new(),
                other => other.to_field(),
            })
            .collect();
        let batch = self.resolve_all(&raw, raise_on_unresolved)?;

        table.retain_rows(|i, _| batch.outcomes[i].is_some());
        for (row, name) in table.rows_mut().zip(batch.retained()) {
            row[idx] = Value::text(name);
        }
        if column != COUNTRY {
            table.rename_column(column, COUNTRY)?;
        }
        Ok(batch.report)
    }
}
