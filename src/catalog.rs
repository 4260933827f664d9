// catalog.rs
// Static reference mapping of canonical countries to the zones and groups they belong to.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{CatalogError, PipelineError};

/// Discriminator carried by every output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupType {
    Country,
    Zone,
    Group,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Country => "country",
            GroupType::Zone => "zone",
            GroupType::Group => "group",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "country" => Ok(GroupType::Country),
            "zone" => Ok(GroupType::Zone),
            "group" => Ok(GroupType::Group),
            other => Err(format!("unknown group_type `{other}`")),
        }
    }
}

/// One row of the countries-and-zones reference CSV.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipRecord {
    pub country: String,
    pub group_name: String,
    pub group_type: Option<String>,
}

/// A (country, zone/group) membership.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ZoneMembership {
    pub country: String,
    pub group_name: String,
    pub group_type: GroupType,
}

/// Read-only catalog of zone and group memberships.
#[derive(Debug, Clone, Default)]
pub struct CountryZoneCatalog {
    by_country: BTreeMap<String, BTreeSet<(String, GroupType)>>,
    by_group: BTreeMap<String, (GroupType, BTreeSet<String>)>,
}

impl CountryZoneCatalog {
    /// Builds the catalog, rejecting rows without a usable `group_type`,
    /// blank names, duplicated (country, group_name) pairs and groups
    /// declared with two different types.
    pub fn from_records(
        records: impl IntoIterator<Item = MembershipRecord>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for (row, record) in records.into_iter().enumerate() {
            let country = record.country.trim();
            let group_name = record.group_name.trim();
            if country.is_empty() || group_name.is_empty() {
                return Err(CatalogError::invalid(row, "blank country or group_name"));
            }
            let group_type = match record.group_type.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(CatalogError::invalid(
                        row,
                        format!("missing group_type for `{country}` in `{group_name}`"),
                    ));
                }
                Some(raw) => raw
                    .parse::<GroupType>()
                    .map_err(|e| CatalogError::invalid(row, e))?,
            };
            if group_type == GroupType::Country {
                return Err(CatalogError::invalid(
                    row,
                    format!("`{group_name}` must be a zone or a group"),
                ));
            }

            let (declared, members) = catalog
                .by_group
                .entry(group_name.to_string())
                .or_insert_with(|| (group_type, BTreeSet::new()));
            if *declared != group_type {
                return Err(CatalogError::invalid(
                    row,
                    format!("`{group_name}` declared as both {declared} and {group_type}"),
                ));
            }
            if !members.insert(country.to_string()) {
                return Err(CatalogError::invalid(
                    row,
                    format!("duplicate membership `{country}` in `{group_name}`"),
                ));
            }
            catalog
                .by_country
                .entry(country.to_string())
                .or_default()
                .insert((group_name.to_string(), group_type));
        }
        Ok(catalog)
    }

    pub fn from_memberships(
        memberships: impl IntoIterator<Item = ZoneMembership>,
    ) -> Result<Self, CatalogError> {
        Self::from_records(memberships.into_iter().map(|m| MembershipRecord {
            country: m.country,
            group_name: m.group_name,
            group_type: Some(m.group_type.as_str().to_string()),
        }))
    }

    /// Loads a `country,group_name,group_type` CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| PipelineError::csv(path, e))?;
        let records = rdr
            .deserialize::<MembershipRecord>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::csv(path, e))?;
        let catalog = Self::from_records(records)?;
        debug!(
            path = %path.display(),
            countries = catalog.by_country.len(),
            groups = catalog.by_group.len(),
            "loaded countries and zones"
        );
        Ok(catalog)
    }

    /// Zones and groups `country` belongs to; empty for unknown countries.
    pub fn memberships_of(&self, country: &str) -> BTreeSet<(String, GroupType)> {
        self.by_country.get(country).cloned().unwrap_or_default()
    }

    pub(crate) fn memberships_iter<'a>(
        &'a self,
        country: &str,
    ) -> impl Iterator<Item = &'a (String, GroupType)> + use<'a> {
        self.by_country.get(country).into_iter().flatten()
    }

    pub fn all_groups(&self) -> BTreeSet<&str> {
        self.by_group.keys().map(String::as_str).collect()
    }

    pub fn contains_country(&self, country: &str) -> bool {
        self.by_country.contains_key(country)
    }

    /// Iterates (group_name, group_type, members) in group name order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, GroupType, &BTreeSet<String>)> {
        self.by_group
            .iter()
            .map(|(name, (group_type, members))| (name.as_str(), *group_type, members))
    }
}
