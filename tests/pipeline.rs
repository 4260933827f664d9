use std::fs;
use std::path::Path;

use sdp_data_prep::config::PrepConfig;
use sdp_data_prep::pipeline;
use sdp_data_prep::{CoverageWarning, GroupType, PipelineError, ResolveError, TableError, Value};

const CATALOG: &str = "country,group_name,group_type
Alpha,Z1,zone
Beta,Z1,zone
Alpha,OPEC,group
Gamma,OPEC,group
";

const TRANSLATIONS: &str = "raw,canonical
Alpha,Alpha
Republic of Alpha,Alpha
Beta,Beta
Gamma,Gamma
World,Delete
";

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn config(dir: &Path, extra: &str, schema: &str) -> PrepConfig {
    let text = format!(
        r#"
[[pipeline]]
name = "test"
statistics = "stats.csv"
countries_and_zones = "catalog.csv"
translations = "translations.csv"
output = "out/final.csv"
{extra}

[pipeline.schema]
{schema}
"#
    );
    write(dir, "sdp.toml", &text);
    PrepConfig::load(dir.join("sdp.toml")).unwrap()
}

fn setup(stats: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "catalog.csv", CATALOG);
    write(dir.path(), "translations.csv", TRANSLATIONS);
    write(dir.path(), "stats.csv", stats);
    dir
}

#[test]
fn test_end_to_end_population() {
    let dir = setup(
        "country,year,population
Republic of Alpha,2020,10
Beta,2020,5
World,2020,100
Atlantis,2020,1
Gamma,,3
",
    );
    let config = config(dir.path(), "", r#"dimensions = ["year"]
measures = { population = "sum" }"#);
    let prepared = pipeline::run(&config.pipelines[0]).unwrap();

    let written = fs::read_to_string(dir.path().join("out/final.csv")).unwrap();
    assert_eq!(
        written,
        "group_type,group_name,year,population
country,Alpha,2020,10.0
country,Beta,2020,5.0
country,Gamma,0,3.0
group,OPEC,0,3.0
group,OPEC,2020,10.0
zone,Z1,2020,15.0
"
    );

    assert!(prepared.resolution.excluded.contains("World"));
    assert!(prepared.resolution.unresolved.contains("Atlantis"));
    assert_eq!(prepared.resolution.dropped_rows, 2);
    // every catalog country is present and every input country is known
    assert!(prepared.warnings.is_empty());
}

#[test]
fn test_strict_mode_aborts_without_output() {
    let dir = setup(
        "country,year,population
Alpha,2020,10
Atlantis,2020,1
",
    );
    let config = config(
        dir.path(),
        "raise_on_unresolved = true",
        r#"dimensions = ["year"]
measures = { population = "sum" }"#,
    );
    let err = pipeline::run(&config.pipelines[0]).unwrap_err();
    match err {
        PipelineError::Resolve(ResolveError::UnresolvedCountry { values }) => {
            assert_eq!(values, vec!["Atlantis".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("out/final.csv").exists());
}

#[test]
fn test_undeclared_column_fails_fast() {
    let dir = setup(
        "country,year,source,population
Alpha,2020,WB,10
",
    );
    let config = config(dir.path(), "", r#"dimensions = ["year"]
measures = { population = "sum" }"#);
    let err = pipeline::run(&config.pipelines[0]).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Table(TableError::UnexpectedColumn { ref column, .. }) if column == "source"
    ));
    assert!(!dir.path().join("out/final.csv").exists());
}

#[test]
fn test_coverage_warnings_and_units() {
    let dir = setup(
        "Source: test bulletin
country,year,energy_source,proven_reserves_unit,proven_reserves
Alpha,2020,Gas,Bcm,\"1,000.1234\"
Total World,2020,Gas,Bcm,\"9,999\"
",
    );
    let config = config(
        dir.path(),
        r#"skip_lines = 1
drop_labels = ["Total World"]
round_to = 2"#,
        r#"dimensions = ["year", "energy_source"]
units = ["proven_reserves_unit"]
measures = { proven_reserves = "sum" }"#,
    );
    let prepared = pipeline::run(&config.pipelines[0]).unwrap();

    assert_eq!(prepared.labels_dropped, 1);
    assert_eq!(
        prepared.table.columns(),
        &[
            "group_type",
            "group_name",
            "year",
            "energy_source",
            "proven_reserves_unit",
            "proven_reserves"
        ]
        .map(String::from)
    );
    assert_eq!(prepared.table.len(), 3);
    assert_eq!(prepared.table.value(2, "group_name"), Some(&Value::text("Z1")));
    assert_eq!(prepared.table.value(2, "proven_reserves_unit"), Some(&Value::text("Bcm")));
    assert_eq!(prepared.table.value(2, "proven_reserves"), Some(&Value::Float(1000.12)));

    assert!(prepared.warnings.contains(&CoverageWarning::MissingFromStatistics {
        group_type: GroupType::Zone,
        group_name: "Z1".into(),
        countries: vec!["Beta".into()],
    }));
    assert!(prepared.warnings.contains(&CoverageWarning::MissingFromStatistics {
        group_type: GroupType::Group,
        group_name: "OPEC".into(),
        countries: vec!["Gamma".into()],
    }));
}

#[test]
fn test_per_capita_join() {
    let dir = setup(
        "country,year,co2
Alpha,2020,20
Beta,2020,5
",
    );
    write(
        dir.path(),
        "population.csv",
        "group_type,group_name,year,population
country,Alpha,2020,10.0
country,Beta,2020,5.0
zone,Z1,2020,15.0
",
    );
    let config = config(
        dir.path(),
        r#"[pipeline.per_capita]
population = "population.csv"
measure = "co2"
output_column = "co2_per_capita"
unit = "tCO2 per capita""#,
        r#"dimensions = ["year"]
measures = { co2 = "sum" }"#,
    );
    let prepared = pipeline::run(&config.pipelines[0]).unwrap();

    assert_eq!(
        prepared.table.columns(),
        &[
            "group_type",
            "group_name",
            "year",
            "co2",
            "co2_per_capita_unit",
            "population",
            "co2_per_capita"
        ]
        .map(String::from)
    );
    // OPEC has no population row and is dropped by the inner join
    assert_eq!(prepared.table.len(), 3);
    let z1 = prepared.table.rows().last().unwrap();
    assert_eq!(z1[1], Value::text("Z1"));
    assert_eq!(z1[6], Value::Float(25.0 / 15.0));
}

#[test]
fn test_wide_source_is_melted_scaled_and_tagged() {
    let dir = setup(
        "Crude oil proven reserves
Unit: million barrels
Country,2019,2020
Alpha,\"12,000\",\"13,000\"
Beta,\"3,000\",n/a
Total World,\"90,000\",\"91,000\"
",
    );
    let config = config(
        dir.path(),
        r#"skip_lines = 2
clean_column_names = true
drop_labels = ["Total World"]
scale = { proven_reserves = 0.001 }

[pipeline.melt]
id_columns = ["country"]
value = "proven_reserves"

[pipeline.constants]
energy_source = "Oil"
proven_reserves_unit = "Gb""#,
        r#"dimensions = ["year", "energy_source"]
units = ["proven_reserves_unit"]
measures = { proven_reserves = "sum" }"#,
    );
    let prepared = pipeline::run(&config.pipelines[0]).unwrap();

    // Beta 2020 is blank
    assert_eq!(prepared.cells_dropped, 1);
    assert_eq!(prepared.labels_dropped, 2);
    let written = fs::read_to_string(dir.path().join("out/final.csv")).unwrap();
    assert_eq!(
        written,
        "group_type,group_name,year,energy_source,proven_reserves_unit,proven_reserves
country,Alpha,2019,Oil,Gb,12.0
country,Alpha,2020,Oil,Gb,13.0
country,Beta,2019,Oil,Gb,3.0
group,OPEC,2019,Oil,Gb,12.0
group,OPEC,2020,Oil,Gb,13.0
zone,Z1,2019,Oil,Gb,15.0
zone,Z1,2020,Oil,Gb,13.0
"
    );
    assert_eq!(prepared.overview.first_year, Some(2019));
    assert_eq!(prepared.overview.last_year, Some(2020));
    assert_eq!(prepared.overview.countries, 2);
}
