use proptest::prelude::*;

use sdp_data_prep::resolver::DELETE_SENTINEL;
use sdp_data_prep::{
    Aggregation, CountryNameResolver, CountryZoneCatalog, GroupType, MeasureSpec, StatisticsAggregator,
    StatisticsFormatter, Table, TranslationTable, Value, ZoneMembership,
};

const COUNTRIES: [&str; 4] = ["Alpha", "Beta", "Gamma", "Delta"];

fn catalog() -> CountryZoneCatalog {
    let memberships = [
        ("Alpha", "Z1", GroupType::Zone),
        ("Beta", "Z1", GroupType::Zone),
        ("Beta", "G1", GroupType::Group),
        ("Gamma", "G1", GroupType::Group),
    ];
    CountryZoneCatalog::from_memberships(memberships.into_iter().map(|(c, g, t)| ZoneMembership {
        country: c.into(),
        group_name: g.into(),
        group_type: t,
    }))
    .unwrap()
}

fn stats_table(rows: &[(usize, Option<i64>, f64)]) -> Table {
    let mut t = Table::new(["country", "year", "value"]).unwrap();
    for (country, year, value) in rows {
        t.push_row(vec![Value::text(COUNTRIES[*country]), (*year).into(), Value::Float(*value)])
            .unwrap();
    }
    t
}

fn row_strategy() -> impl Strategy<Value = Vec<(usize, Option<i64>, f64)>> {
    prop::collection::vec(
        (0..COUNTRIES.len(), prop::option::of(2015i64..2022), 0.0f64..1_000_000.0),
        0..40,
    )
}

fn sum_of(table: &Table, group_type: &str, group_name: &str, year: &Value) -> Option<f64> {
    (0..table.len())
        .find(|&i| {
            table.value(i, "group_type") == Some(&Value::text(group_type))
                && table.value(i, "group_name") == Some(&Value::text(group_name))
                && table.value(i, "year") == Some(year)
        })
        .and_then(|i| table.value(i, "value")?.as_f64().ok().flatten())
}

proptest! {
    #[test]
    fn format_is_idempotent(rows in row_strategy(), digits in prop::option::of(0u32..6)) {
        let catalog = catalog();
        let aggregated = StatisticsAggregator::new(
            &catalog,
            ["group_type", "group_name", "year"],
            [MeasureSpec::new("value", Aggregation::Sum)],
        )
        .aggregate(&stats_table(&rows))
        .unwrap();
        let formatter = StatisticsFormatter::new("value", digits);
        let once = formatter.format(&aggregated.table).unwrap();
        let twice = formatter.format(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn zone_sum_matches_members(rows in row_strategy()) {
        let catalog = catalog();
        let out = StatisticsAggregator::new(
            &catalog,
            ["group_type", "group_name", "year"],
            [MeasureSpec::new("value", Aggregation::Sum)],
        )
        .aggregate(&stats_table(&rows))
        .unwrap();

        let years: std::collections::BTreeSet<Value> = rows.iter().map(|(_, y, _)| Value::from(*y)).collect();
        for year in &years {
            let member_total = |members: &[&str]| -> f64 {
                rows.iter()
                    .filter(|(c, y, _)| members.contains(&COUNTRIES[*c]) && &Value::from(*y) == year)
                    .map(|(_, _, v)| *v)
                    .sum()
            };
            let present = |members: &[&str]| {
                rows.iter().any(|(c, y, _)| members.contains(&COUNTRIES[*c]) && &Value::from(*y) == year)
            };
            for (group_type, group_name, members) in [("zone", "Z1", ["Alpha", "Beta"]), ("group", "G1", ["Beta", "Gamma"])] {
                let expected = member_total(&members[..]);
                match sum_of(&out.table, group_type, group_name, year) {
                    Some(actual) => prop_assert!((actual - expected).abs() <= 1e-6 * expected.max(1.0)),
                    None => prop_assert!(!present(&members[..])),
                }
            }
        }

        // one country row per input row
        let country_rows = (0..out.table.len())
            .filter(|&i| out.table.value(i, "group_type") == Some(&Value::text("country")))
            .count();
        prop_assert_eq!(country_rows, rows.len());
    }

    #[test]
    fn resolve_all_is_deterministic(values in prop::collection::vec(
        prop::sample::select(vec!["Alpha", " alpha ", "Beta*", "World", "Atlantis", "Lemuria", ""]),
        0..30,
    )) {
        let resolver = CountryNameResolver::new(
            TranslationTable::from_pairs([("Alpha", "Alpha"), ("Beta", "Beta"), ("World", DELETE_SENTINEL)]).unwrap(),
        );
        let first = resolver.resolve_all(&values, false).unwrap();
        let second = resolver.resolve_all(&values, false).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.outcomes.len(), values.len());
        prop_assert_eq!(
            first.outcomes.iter().filter(|o| o.is_none()).count(),
            first.report.dropped_rows
        );
    }
}
