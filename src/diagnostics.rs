// diagnostics.rs
// Non-fatal coverage diagnostics, returned next to successful results and
// logged by the aggregator at `warn` level.

use std::collections::BTreeSet;
use std::fmt;

use crate::catalog::GroupType;
use crate::table::{GROUP_NAME, GROUP_TYPE, Table, Value, YEAR};

const SOURCE: &str = "source";

/// A coverage issue found while rolling countries up into zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageWarning {
    /// Members of `group_name` absent from the statistics input.
    MissingFromStatistics {
        group_type: GroupType,
        group_name: String,
        countries: Vec<String>,
    },
    /// Countries of the statistics input absent from the catalog; they keep
    /// their country rows but roll into no zone.
    UnmatchedCountries { countries: Vec<String> },
    /// Countries with several rows for the same dimension key; their
    /// measures were summed into one contribution.
    DuplicateContributions { countries: Vec<String> },
}

impl CoverageWarning {
    pub fn countries(&self) -> &[String] {
        match self {
            CoverageWarning::MissingFromStatistics { countries, .. }
            | CoverageWarning::UnmatchedCountries { countries }
            | CoverageWarning::DuplicateContributions { countries } => countries,
        }
    }
}

impl fmt::Display for CoverageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageWarning::MissingFromStatistics {
                group_type,
                group_name,
                countries,
            } => write!(
                f,
                "{} countries are missing in the statistics dataset for {} {}: {:?}",
                countries.len(),
                group_type,
                group_name,
                countries
            ),
            CoverageWarning::UnmatchedCountries { countries } => write!(
                f,
                "{} countries are in the statistics dataset but not in the countries reference frame: {:?}",
                countries.len(),
                countries
            ),
            CoverageWarning::DuplicateContributions { countries } => write!(
                f,
                "{} countries have duplicate rows for the same key and were summed: {:?}",
                countries.len(),
                countries
            ),
        }
    }
}

/// What a finished table covers: its sources, year span and country count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetOverview {
    /// Distinct values of the `source` column, if there is one.
    pub sources: Vec<String>,
    pub first_year: Option<i64>,
    pub last_year: Option<i64>,
    /// Distinct `group_name`s of country rows.
    pub countries: usize,
}

impl DatasetOverview {
    /// Summarizes a formatted table. Placeholder years (`0`) are ignored.
    pub fn of(table: &Table) -> Self {
        let sources: BTreeSet<String> = table
            .column_values(SOURCE)
            .into_iter()
            .flatten()
            .filter(|v| !matches!(v, Value::Null))
            .map(Value::to_field)
            .collect();

        let years: Vec<i64> = table
            .column_values(YEAR)
            .into_iter()
            .flatten()
            .filter_map(|v| match v {
                Value::Int(y) => Some(*y),
                Value::Text(s) => s.trim().parse().ok(),
                _ => None,
            })
            .filter(|y| *y != 0)
            .collect();

        let countries: BTreeSet<&Value> = match (table.column_index(GROUP_TYPE), table.column_index(GROUP_NAME)) {
            (Some(t), Some(n)) => table
                .rows()
                .iter()
                .filter(|row| row[t] == Value::text(GroupType::Country.as_str()))
                .map(|row| &row[n])
                .collect(),
            _ => BTreeSet::new(),
        };

        Self {
            sources: sources.into_iter().collect(),
            first_year: years.iter().min().copied(),
            last_year: years.iter().max().copied(),
            countries: countries.len(),
        }
    }

    /// `first-last`, or `-` without years.
    pub fn year_span(&self) -> String {
        match (self.first_year, self.last_year) {
            (Some(first), Some(last)) => format!("{first}-{last}"),
            _ => "-".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overview_of_formatted_table() {
        let mut t = Table::new(["group_type", "group_name", "year", "source", "value"]).unwrap();
        for (gt, gn, year) in [
            ("country", "Alpha", "2019"),
            ("country", "Alpha", "2021"),
            ("country", "Beta", "0"),
            ("zone", "Z1", "1990"),
        ] {
            t.push_row(vec![gt.into(), gn.into(), year.into(), "PIK".into(), Value::Float(1.0)])
                .unwrap();
        }
        let overview = DatasetOverview::of(&t);
        assert_eq!(overview.sources, vec!["PIK".to_string()]);
        assert_eq!(overview.first_year, Some(1990));
        assert_eq!(overview.last_year, Some(2021));
        assert_eq!(overview.countries, 2);
        assert_eq!(overview.year_span(), "1990-2021");

        let empty = DatasetOverview::of(&Table::new(["value"]).unwrap());
        assert_eq!(empty, DatasetOverview::default());
        assert_eq!(empty.year_span(), "-");
    }

    #[test]
    fn test_display_names_zone_and_count() {
        let w = CoverageWarning::MissingFromStatistics {
            group_type: GroupType::Zone,
            group_name: "Africa".into(),
            countries: vec!["Chad".into(), "Niger".into()],
        };
        let text = w.to_string();
        assert!(text.starts_with("2 countries"));
        assert!(text.contains("for zone Africa"));
        assert_eq!(w.countries().len(), 2);
    }

    #[test]
    fn test_display_names_group_type() {
        let w = CoverageWarning::MissingFromStatistics {
            group_type: GroupType::Group,
            group_name: "OPEC".into(),
            countries: vec!["Gabon".into()],
        };
        assert!(w.to_string().contains("for group OPEC"));
    }
}
