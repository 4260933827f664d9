// config.rs
// Pipeline configuration: a TOML file with one `[[pipeline]]` table per
// statistics source.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::aggregator::{Aggregation, MeasureSpec};
use crate::errors::PipelineError;
use crate::reshape::MeltSpec;
use crate::table::{COUNTRY, TableSchema};

/// Decimal digits an f64 can meaningfully be rounded to.
pub const MAX_ROUND_DIGITS: u32 = 15;

fn default_country_column() -> String {
    COUNTRY.to_string()
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrepConfig {
    #[serde(default, rename = "pipeline")]
    pub pipelines: Vec<PipelineConfig>,
}

impl PrepConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, PipelineError> {
        let config: PrepConfig = toml::from_str(s)?;
        for pipeline in &config.pipelines {
            pipeline.validate()?;
        }
        Ok(config)
    }

    /// Loads a config file. Relative paths inside it are resolved against
    /// the directory holding the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            for pipeline in &mut config.pipelines {
                pipeline.rebase(base);
            }
        }
        Ok(config)
    }
}

/// Declared schema of the per-country statistics table of one pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub units: Vec<String>,
    /// Measure column → aggregation.
    pub measures: BTreeMap<String, Aggregation>,
    /// Measure the formatter puts last; defaults to the first measure.
    pub format_measure: Option<String>,
}

impl SchemaConfig {
    pub fn table_schema(&self) -> TableSchema {
        TableSchema {
            dimensions: self.dimensions.clone(),
            units: self.units.clone(),
            measures: self.measures.keys().cloned().collect(),
        }
    }

    pub fn measure_specs(&self) -> Vec<MeasureSpec> {
        self.measures
            .iter()
            .map(|(column, aggregation)| MeasureSpec::new(column.clone(), *aggregation))
            .collect()
    }
}

/// Optional per-capita derivation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerCapitaConfig {
    /// Formatted population table (group_type, group_name, year, population).
    pub population: PathBuf,
    pub measure: String,
    pub output_column: String,
    pub unit: Option<String>,
}

/// One statistics source: where to read it, how to shape it, where to write it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub name: String,
    pub statistics: PathBuf,
    pub countries_and_zones: PathBuf,
    pub translations: Option<PathBuf>,
    pub iso_codes: Option<PathBuf>,
    pub output: PathBuf,
    #[serde(default = "default_country_column")]
    pub country_column: String,
    #[serde(default)]
    pub skip_lines: usize,
    #[serde(default)]
    pub clean_column_names: bool,
    /// Header renames applied after column-name cleaning.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    /// Wide year columns to rows, applied right after loading.
    pub melt: Option<MeltSpec>,
    /// Column → factor, applied after melting.
    #[serde(default)]
    pub scale: BTreeMap<String, f64>,
    /// Constant text columns added before resolution (source, energy, unit).
    #[serde(default)]
    pub constants: BTreeMap<String, String>,
    #[serde(default)]
    pub drop_labels: Vec<String>,
    #[serde(default)]
    pub raise_on_unresolved: bool,
    pub round_to: Option<u32>,
    pub schema: SchemaConfig,
    pub per_capita: Option<PerCapitaConfig>,
}

impl PipelineConfig {
    pub fn format_measure(&self) -> Option<&str> {
        match &self.per_capita {
            Some(per_capita) if self.schema.format_measure.is_none() => {
                Some(per_capita.output_column.as_str())
            }
            _ => self
                .schema
                .format_measure
                .as_deref()
                .or_else(|| self.schema.measures.keys().next().map(String::as_str)),
        }
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.schema.measures.is_empty() {
            return Err(PipelineError::Config(format!(
                "pipeline `{}` declares no measures",
                self.name
            )));
        }
        if let Some(measure) = &self.schema.format_measure {
            let known = self.schema.measures.contains_key(measure)
                || self.per_capita.as_ref().is_some_and(|p| &p.output_column == measure);
            if !known {
                return Err(PipelineError::Config(format!(
                    "pipeline `{}`: format_measure `{measure}` is not a declared measure",
                    self.name
                )));
            }
        }
        if let Some(melt) = &self.melt {
            if !self.schema.measures.contains_key(&melt.value) {
                return Err(PipelineError::Config(format!(
                    "pipeline `{}`: melted value column `{}` is not a declared measure",
                    self.name, melt.value
                )));
            }
        }
        if let Some(digits) = self.round_to.filter(|d| *d > MAX_ROUND_DIGITS) {
            return Err(PipelineError::Config(format!(
                "pipeline `{}`: round_to = {digits} exceeds {MAX_ROUND_DIGITS}",
                self.name
            )));
        }
        if let Some(per_capita) = &self.per_capita {
            if !self.schema.measures.contains_key(&per_capita.measure) {
                return Err(PipelineError::Config(format!(
                    "pipeline `{}`: per-capita measure `{}` is not a declared measure",
                    self.name, per_capita.measure
                )));
            }
        }
        Ok(())
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.statistics);
        join(&mut self.countries_and_zones);
        join(&mut self.output);
        if let Some(p) = self.translations.as_mut() {
            join(p);
        }
        if let Some(p) = self.iso_codes.as_mut() {
            join(p);
        }
        if let Some(per_capita) = self.per_capita.as_mut() {
            join(&mut per_capita.population);
        }
    }
}
