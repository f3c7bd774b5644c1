use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashSet};
use chrono::Utc;

use crate::mapping::SupportedYears;
use crate::model::{NormalizationError, NormalizedRecord, Provider, RowIssue, Sex, TrendRecord, lenient_text};

pub const PROVIDER_NAME: &str = "trend";

#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Debug)]
pub struct TrendRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub race: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sex: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub age_adjusted_death_rate: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub average_life_expectancy: Option<String>,
}

/// Decimal text, or `None` when the provider left the measure out or sent
/// something that is not a number.
fn decimal(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| v.parse::<f64>().is_ok_and(f64::is_finite))
        .map(String::from)
}

fn check_row(row: &TrendRow, years: &SupportedYears) -> Result<TrendRecord, String> {
    let year = row.year.as_deref().ok_or("missing year")?;
    if !years.contains(year) {
        return Err(format!("unsupported year {year}"));
    }
    let race = row.race.as_deref().ok_or("missing race")?;
    let sex = row.sex.as_deref().and_then(Sex::parse).ok_or("sex is not female or male")?;

    Ok(TrendRecord {
        year: year.to_string(),
        race: race.to_string(),
        sex,
        death_rate: decimal(row.age_adjusted_death_rate.as_deref()),
        life_expectancy: decimal(row.average_life_expectancy.as_deref()),
    })
}

pub fn normalize(rows: &[TrendRow], years: &SupportedYears) -> Vec<TrendRecord> {
    rows.iter().filter_map(|row| check_row(row, years).ok()).collect()
}

pub struct ProviderHandler {
    pub data: Vec<TrendRow>,
    pub error_index: HashSet<usize>,
    years: SupportedYears,
}

impl ProviderHandler {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            error_index: HashSet::new(),
            years: SupportedYears::trend(),
        }
    }
}

impl Default for ProviderHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ProviderHandler {
    fn get_metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("sourceProvider".to_string(), PROVIDER_NAME.to_string()),
            ("sourceFormat".to_string(), "flat_key_value".to_string()),
            ("ingestedAt".to_string(), Utc::now().to_rfc3339()),
            ("version".to_string(), "1.0".to_string()),
        ])
    }

    fn parse(&mut self, data: &str) -> Result<(), NormalizationError> {
        match serde_json::from_str::<Vec<TrendRow>>(data) {
            Ok(result) => {
                self.data = result;
                self.error_index.clear();
                Ok(())
            },
            Err(err) => Err(NormalizationError::shape(PROVIDER_NAME, err.to_string())),
        }
    }

    fn validate(&mut self) -> Vec<RowIssue> {
        let mut output = Vec::new();
        for (index, row) in self.data.iter().enumerate() {
            if let Err(reason) = check_row(row, &self.years) {
                output.push(RowIssue::new(index, reason));
                self.error_index.insert(index);
            }
        }
        output
    }

    fn convert(&self) -> Vec<NormalizedRecord> {
        self.data
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.error_index.contains(index))
            .filter_map(|(_, row)| check_row(row, &self.years).ok())
            .map(NormalizedRecord::Trend)
            .collect()
    }
}
