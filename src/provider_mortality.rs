use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashSet};
use chrono::{NaiveDate, Utc};

use crate::mapping::{FieldMap, SupportedYears};
use crate::model::{
    MortalityRecord, NormalizationError, NormalizedRecord, Provider, RowIssue, parse_count,
    value_text,
};

pub const PROVIDER_NAME: &str = "mortality";

const YEAR: &str = "year";
const MONTH: &str = "month";
const POPULATION: &str = "population";

/// What to do with a row whose population is missing or unparseable.
#[derive(Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum PopulationPolicy {
    /// Drop the row.
    #[default]
    Strict,
    /// Assume a population of 1, which keeps the row but inflates its rate.
    Lenient,
}

/// One wide provider row: the reporting period plus one column per cause.
#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Debug)]
pub struct MortalityRow {
    pub year: Option<String>,
    pub month: Option<String>,
    pub population: Option<String>,
    pub cells: BTreeMap<String, String>,
}

impl MortalityRow {
    pub fn from_json(data: &BTreeMap<String, serde_json::Value>) -> Self {
        let mut row = MortalityRow::default();
        for (key, value) in data {
            let Some(text) = value_text(value) else {
                continue;
            };
            row.assign(key, text);
        }
        row
    }

    pub fn from_strings(data: BTreeMap<String, String>) -> Self {
        let mut row = MortalityRow::default();
        for (key, value) in data {
            let value = value.trim();
            if !value.is_empty() {
                row.assign(&key, value.to_string());
            }
        }
        row
    }

    fn assign(&mut self, key: &str, text: String) {
        match key {
            YEAR => self.year = Some(text),
            MONTH => self.month = Some(text),
            POPULATION => self.population = Some(text),
            _ => {
                self.cells.insert(key.to_string(), text);
            },
        }
    }

    fn population_count(&self, policy: PopulationPolicy) -> Option<u64> {
        match (self.population.as_deref().and_then(parse_count), policy) {
            (Some(population), _) => Some(population),
            (None, PopulationPolicy::Lenient) => Some(1),
            (None, PopulationPolicy::Strict) => None,
        }
    }
}

/// First day of the reported month, `{year}-{MM}-01`. Yearly rows land on
/// January.
fn month_start(year: &str, month: Option<&str>) -> Option<NaiveDate> {
    let month = match month {
        Some(m) if m.len() == 1 => format!("0{m}"),
        Some(m) => m.to_string(),
        None => "01".to_string(),
    };
    NaiveDate::parse_from_str(&format!("{year}-{month}-01"), "%Y-%m-%d").ok()
}

/// Pivot wide rows into one record per (row, mapped cause).
///
/// Never fails: cells without a usable death count, rows without a usable
/// population (under `Strict`), zero counts and unsupported years are skipped.
pub fn normalize(
    rows: &[MortalityRow],
    mapping: &FieldMap,
    years: &SupportedYears,
    policy: PopulationPolicy,
) -> Vec<MortalityRecord> {
    let mut output = Vec::new();
    for row in rows {
        let Some(year) = row.year.as_deref() else {
            continue;
        };
        if !years.contains(year) {
            tracing::debug!(year, "skipping row outside supported years");
            continue;
        }
        let Some(population) = row.population_count(policy) else {
            tracing::debug!(year, population = ?row.population, "skipping row without population");
            continue;
        };
        if population == 0 {
            continue;
        }
        let month = month_start(year, row.month.as_deref());

        for (provider_key, display_name) in mapping.pairs() {
            let Some(deaths) = row.cells.get(provider_key) else {
                continue;
            };
            let Some(death_count) = parse_count(deaths) else {
                tracing::debug!(year, cause = display_name, deaths = %deaths, "unparseable death count");
                continue;
            };
            if death_count == 0 {
                continue;
            }
            output.push(MortalityRecord::new(
                year.to_string(),
                month,
                display_name.to_string(),
                death_count,
                population,
            ));
        }
    }

    output
}

pub struct ProviderHandler<'a> {
    pub data: Vec<MortalityRow>,
    pub error_index: HashSet<usize>,
    mapping: &'a FieldMap,
    years: SupportedYears,
    policy: PopulationPolicy,
    format: &'static str,
}

impl<'a> ProviderHandler<'a> {
    pub fn new(mapping: &'a FieldMap, policy: PopulationPolicy) -> Self {
        Self {
            data: Vec::new(),
            error_index: HashSet::new(),
            mapping,
            years: SupportedYears::mortality(),
            policy,
            format: "json",
        }
    }

    pub fn records(&self) -> Vec<MortalityRecord> {
        let rows: Vec<MortalityRow> = self.data
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.error_index.contains(index))
            .map(|(_, row)| row.clone())
            .collect();
        normalize(&rows, self.mapping, &self.years, self.policy)
    }

    fn parse_json(&mut self, data: &str) -> Result<(), NormalizationError> {
        let rows = serde_json::from_str::<Vec<BTreeMap<String, serde_json::Value>>>(data)
            .map_err(|err| NormalizationError::shape(PROVIDER_NAME, err.to_string()))?;
        self.data = rows.iter().map(MortalityRow::from_json).collect();
        self.error_index.clear();
        self.format = "json";
        Ok(())
    }

    fn parse_csv(&mut self, data: &str) -> Result<(), NormalizationError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|_| NormalizationError::shape(PROVIDER_NAME, "missing header row"))?
            .iter()
            .map(String::from)
            .collect();
        if !headers.iter().any(|h| h == YEAR) {
            return Err(NormalizationError::shape(PROVIDER_NAME, "header row has no year column"));
        }

        let mut rows = Vec::new();
        for result in rdr.records() {
            let values = result
                .map_err(|err| NormalizationError::shape(PROVIDER_NAME, err.to_string()))?;
            if values.len() != headers.len() {
                return Err(NormalizationError::shape(
                    PROVIDER_NAME,
                    "field count is not equal to header count",
                ));
            }
            let row: BTreeMap<String, String> = headers
                .iter()
                .cloned()
                .zip(values.iter().map(String::from))
                .collect();
            rows.push(MortalityRow::from_strings(row));
        }

        self.data = rows;
        self.error_index.clear();
        self.format = "csv";
        Ok(())
    }
}

impl Provider for ProviderHandler<'_> {
    fn get_metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("sourceProvider".to_string(), PROVIDER_NAME.to_string()),
            ("sourceFormat".to_string(), self.format.to_string()),
            ("ingestedAt".to_string(), Utc::now().to_rfc3339()),
            ("version".to_string(), "1.0".to_string()),
        ])
    }

    fn parse(&mut self, data: &str) -> Result<(), NormalizationError> {
        let trimmed = data.trim_start();
        match trimmed.chars().next() {
            Some('[') => self.parse_json(trimmed),
            Some('{') => Err(NormalizationError::shape(PROVIDER_NAME, "expected an array of rows, found an object")),
            Some(_) => self.parse_csv(trimmed),
            None => Err(NormalizationError::shape(PROVIDER_NAME, "empty payload")),
        }
    }

    fn validate(&mut self) -> Vec<RowIssue> {
        let mut output = Vec::new();
        for (index, row) in self.data.iter().enumerate() {
            let issue = match row.year.as_deref() {
                None => Some("missing year".to_string()),
                Some(year) if !self.years.contains(year) => Some(format!("unsupported year {year}")),
                _ if row.population_count(self.policy).is_none() => Some("missing or invalid population".to_string()),
                _ if !self.mapping.pairs().any(|(key, _)| row.cells.contains_key(key)) => Some("no recognized cause columns".to_string()),
                _ => None,
            };
            if let Some(reason) = issue {
                output.push(RowIssue::new(index, reason));
                self.error_index.insert(index);
            }
        }

        output
    }

    fn convert(&self) -> Vec<NormalizedRecord> {
        self.records().into_iter().map(NormalizedRecord::Mortality).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn heart_only() -> FieldMap {
        FieldMap::new([("diseases_of_heart", "Heart Diseases")])
    }

    fn row(year: &str, population: Option<&str>, cells: &[(&str, &str)]) -> MortalityRow {
        MortalityRow {
            year: Some(year.into()),
            month: None,
            population: population.map(String::from),
            cells: cells.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn wide_row_becomes_heart_record() {
        let rows = vec![row("2018", Some("200000"), &[("diseases_of_heart", "100")])];
        let records = normalize(&rows, &heart_only(), &SupportedYears::mortality(), PopulationPolicy::Strict);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].year, "2018");
        assert_eq!(records[0].category, "Heart Diseases");
        assert_eq!(records[0].death_count, 100);
        assert_eq!(records[0].population, 200000);
        assert_eq!(records[0].crude_rate, "50.00");
        assert_eq!(records[0].month, NaiveDate::from_ymd_opt(2018, 1, 1));
    }

    #[test]
    fn one_row_expands_to_every_mapped_cause() {
        let rows = vec![row("2016", Some("1000000"), &[
            ("all_cause", "9000"),
            ("diseases_of_heart", "2000"),
            ("drug_overdose", "150"),
            ("unmapped_column", "7"),
        ])];
        let records = normalize(&rows, FieldMap::cdc_causes(), &SupportedYears::mortality(), PopulationPolicy::Strict);
        let causes: Vec<&str> = records.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(causes, vec!["All Causes", "Heart Diseases", "Drug Overdose"]);
    }

    #[test]
    fn zero_counts_and_bad_years_are_dropped() {
        let rows = vec![
            row("2018", Some("0"), &[("diseases_of_heart", "100")]),
            row("2018", Some("5000"), &[("diseases_of_heart", "0")]),
            row("2010", Some("5000"), &[("diseases_of_heart", "10")]),
            row("2019", Some("5000"), &[("diseases_of_heart", "abc")]),
        ];
        let records = normalize(&rows, &heart_only(), &SupportedYears::mortality(), PopulationPolicy::Strict);
        assert!(records.is_empty());
    }

    #[test]
    fn population_policy_controls_missing_population() {
        let rows = vec![row("2018", None, &[("diseases_of_heart", "3")])];
        let strict = normalize(&rows, &heart_only(), &SupportedYears::mortality(), PopulationPolicy::Strict);
        assert!(strict.is_empty());

        let lenient = normalize(&rows, &heart_only(), &SupportedYears::mortality(), PopulationPolicy::Lenient);
        assert_eq!(lenient.len(), 1);
        assert_eq!(lenient[0].population, 1);
        assert_eq!(lenient[0].crude_rate, "300000.00");
    }

    #[test]
    fn month_is_zero_padded() {
        assert_eq!(month_start("2014", Some("3")), NaiveDate::from_ymd_opt(2014, 3, 1));
        assert_eq!(month_start("2014", Some("11")), NaiveDate::from_ymd_opt(2014, 11, 1));
        assert_eq!(month_start("2014", None), NaiveDate::from_ymd_opt(2014, 1, 1));
        assert_eq!(month_start("2014", Some("13")), None);
    }

    #[test]
    fn mortality_json_test() {
        let json_str = r#"[
            {"year": "2018", "month": "4", "population": "200000", "diseases_of_heart": "100", "septicemia": 20},
            {"month": "1", "population": "200000", "diseases_of_heart": "100"},
            {"year": "2018", "population": "200000", "jurisdiction": "US"}
        ]"#;

        let mapping = FieldMap::cdc_causes();
        let mut handler = ProviderHandler::new(mapping, PopulationPolicy::Strict);
        let provider: &mut dyn Provider = &mut handler as &mut dyn Provider;
        assert_eq!(provider.parse(json_str).is_ok(), true);
        let issues = provider.validate();
        assert_eq!(issues.iter().map(|i| i.index).collect::<Vec<_>>(), vec![1, 2]);
        let converted = provider.convert();
        assert_eq!(converted.len(), 2);
        match &converted[0] {
            NormalizedRecord::Mortality(record) => {
                assert_eq!(record.category, "Septicemia");
                assert_eq!(record.crude_rate, "10.00");
                assert_eq!(record.month, NaiveDate::from_ymd_opt(2018, 4, 1));
            },
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn mortality_csv_test() {
        let csv_str = "year,month,population,diseases_of_heart,drug_overdose
            2019,02,300000,600,30
            2020,,300000,0,45";

        let mut handler = ProviderHandler::new(FieldMap::cdc_causes(), PopulationPolicy::Strict);
        assert!(handler.parse(csv_str).is_ok());
        assert!(handler.validate().is_empty());
        let records = handler.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].crude_rate, "200.00");
        assert_eq!(records[2].category, "Drug Overdose");
        assert_eq!(records[2].month, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(handler.get_metadata()["sourceFormat"], "csv");
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let mut handler = ProviderHandler::new(FieldMap::cdc_causes(), PopulationPolicy::Strict);
        assert!(matches!(handler.parse(r#"{"error": "rate limited"}"#), Err(NormalizationError::Shape { .. })));
        assert!(matches!(handler.parse("[1, 2, 3]"), Err(NormalizationError::Shape { .. })));
        assert!(matches!(handler.parse("   "), Err(NormalizationError::Shape { .. })));
        assert!(handler.parse("[]").is_ok());
        assert!(handler.convert().is_empty());
    }

    fn count_text() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("0".to_string())),
            Just(Some("n/a".to_string())),
            Just(Some("-4".to_string())),
            (0u64..5_000_000).prop_map(|n| Some(n.to_string())),
            (0.0f64..1000.0).prop_map(|n| Some(format!("{n:.1}"))),
        ]
    }

    fn mortality_row() -> impl Strategy<Value = MortalityRow> {
        let keys = ["all_cause", "septicemia", "diseases_of_heart", "drug_overdose", "unmapped"];
        (
            2010u16..2026,
            prop::option::of(1u32..13),
            count_text(),
            prop::collection::vec((0usize..keys.len(), count_text()), 0..6),
        )
            .prop_map(move |(year, month, population, cells)| MortalityRow {
                year: Some(year.to_string()),
                month: month.map(|m| m.to_string()),
                population,
                cells: cells
                    .into_iter()
                    .filter_map(|(key, value)| Some((keys[key].to_string(), value?)))
                    .collect(),
            })
    }

    proptest! {
        #[test]
        fn emitted_records_have_deaths_and_population(
            rows in prop::collection::vec(mortality_row(), 0..20),
            lenient in any::<bool>(),
        ) {
            let policy = if lenient { PopulationPolicy::Lenient } else { PopulationPolicy::Strict };
            let years = SupportedYears::mortality();
            for record in normalize(&rows, FieldMap::cdc_causes(), &years, policy) {
                prop_assert!(record.death_count > 0);
                prop_assert!(record.population > 0);
                prop_assert!(years.contains(&record.year));
            }
        }
    }
}
