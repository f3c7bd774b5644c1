use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashSet};
use chrono::Utc;

use crate::mapping::SupportedYears;
use crate::model::{
    DemographicRecord, NormalizationError, NormalizedRecord, Provider, RowIssue, Sex, lenient_text,
    parse_count,
};

pub const PROVIDER_NAME: &str = "demographic";

#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Debug)]
pub struct DemographicRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sex: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub age_group: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub total_deaths: Option<String>,
}

fn check_row(row: &DemographicRow, years: &SupportedYears) -> Result<DemographicRecord, String> {
    let year = row.year.as_deref().ok_or("missing year")?;
    if !years.contains(year) {
        return Err(format!("unsupported year {year}"));
    }
    let sex = row.sex.as_deref().and_then(Sex::parse).ok_or("sex is not F or M")?;
    let age_group = row.age_group.as_deref().ok_or("missing age group")?;
    let death_count = row.total_deaths
        .as_deref()
        .and_then(parse_count)
        .filter(|deaths| *deaths > 0)
        .ok_or("total deaths is not a positive count")?;

    Ok(DemographicRecord {
        year: year.to_string(),
        age_group: age_group.to_string(),
        sex,
        death_count,
    })
}

/// Keep rows with a supported year, F/M sex, an age group and a positive
/// death count.
pub fn normalize(rows: &[DemographicRow], years: &SupportedYears) -> Vec<DemographicRecord> {
    rows.iter().filter_map(|row| check_row(row, years).ok()).collect()
}

pub struct ProviderHandler {
    pub data: Vec<DemographicRow>,
    pub error_index: HashSet<usize>,
    years: SupportedYears,
}

impl ProviderHandler {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            error_index: HashSet::new(),
            years: SupportedYears::demographic(),
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
        match serde_json::from_str::<Vec<DemographicRow>>(data) {
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
            .map(NormalizedRecord::Demographic)
            .collect()
    }
}
