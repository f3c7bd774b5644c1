use serde::{Serialize, Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Sex {
    F,
    M,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::F, Sex::M];

    /// Accepts the single-letter codes and the spelled-out forms some
    /// providers publish. Anything else ("Both Sexes", "U") is rejected.
    pub fn parse(value: &str) -> Option<Sex> {
        match value.trim() {
            "F" | "Female" | "female" => Some(Sex::F),
            "M" | "Male" | "male" => Some(Sex::M),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Sex::F => "F",
            Sex::M => "M",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sex::F => "Female",
            Sex::M => "Male",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One cause of death for one reporting period.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MortalityRecord {
    pub year: String,
    pub month: Option<NaiveDate>,
    pub category: String,
    pub death_count: u64,
    pub population: u64,
    /// Deaths per 100,000, always recomputed, two decimals. Published under
    /// the `cruteRate` key downstream charts already read.
    #[serde(rename = "cruteRate", alias = "crudeRate")]
    pub crude_rate: String,
}

impl MortalityRecord {
    pub fn new(
        year: String,
        month: Option<NaiveDate>,
        category: String,
        death_count: u64,
        population: u64) -> Self {
        Self {
            year,
            month,
            category,
            death_count,
            population,
            crude_rate: crude_rate(death_count, population),
        }
    }

    pub fn rate(&self) -> f64 {
        self.crude_rate.parse::<f64>().unwrap_or(0.0)
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DemographicRecord {
    pub year: String,
    pub age_group: String,
    pub sex: Sex,
    pub death_count: u64,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TrendRecord {
    pub year: String,
    pub race: String,
    pub sex: Sex,
    pub death_rate: Option<String>,
    pub life_expectancy: Option<String>,
}

impl TrendRecord {
    /// Series label used by the life expectancy charts, e.g. "White - Male".
    pub fn group_label(&self) -> String {
        format!("{} - {}", self.race, self.sex.label())
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LifeTableRecord {
    pub country_code: String,
    pub country: String,
    pub age: String,
    pub age_rank: u32,
    pub year: String,
    pub value: f64,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(tag = "dataset", rename_all = "snake_case")]
pub enum NormalizedRecord {
    Mortality(MortalityRecord),
    Demographic(DemographicRecord),
    Trend(TrendRecord),
    LifeTable(LifeTableRecord),
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct SeriesPoint {
    pub label: String,
    pub value: Option<f64>,
}

/// Chart-ready series over an ordered domain (years or months).
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct AggregatedSeries {
    pub key: String,
    pub points: Vec<SeriesPoint>,
}

impl AggregatedSeries {
    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct RankedBucket {
    pub label: String,
    pub total: f64,
}

/// A raw row that was excluded before conversion.
#[derive(Clone, Serialize, Deserialize, Eq, PartialEq, Debug)]
pub struct RowIssue {
    pub index: usize,
    pub reason: String,
}

impl RowIssue {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self { index, reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum NormalizationError {
    /// The payload could not be obtained at all.
    #[error("failed to read payload: {0}")]
    Transport(String),

    /// The payload is not the array or mapping the provider expects.
    #[error("unexpected {provider} payload shape: {message}")]
    Shape { provider: String, message: String },

    #[error("provider not found with name: {0}")]
    UnknownProvider(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A normalized output file could not be written.
    #[error("failed to write output: {0}")]
    Output(String),
}

impl NormalizationError {
    pub fn shape(provider: &str, message: impl Into<String>) -> Self {
        NormalizationError::Shape {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

pub trait Provider {
    fn get_metadata(&self) -> BTreeMap<String, String>;
    fn parse(&mut self, data: &str) -> Result<(), NormalizationError>;
    fn validate(&mut self) -> Vec<RowIssue>;
    fn convert(&self) -> Vec<NormalizedRecord>;
}

/// `round(deaths / population * 100000, 2)` as a fixed two-decimal string.
pub fn crude_rate(death_count: u64, population: u64) -> String {
    if population == 0 {
        return "0.00".into();
    }
    format!("{:.2}", death_count as f64 / population as f64 * 100000.0)
}

/// Text form of a raw JSON cell. Empty strings and non-scalar values are
/// treated as absent.
pub(crate) fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
        },
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deserializes a string-or-number cell into its text form.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_text(&value))
}

/// Lenient non-negative integer parse. "12", "12.0" and "12.7" all give 12;
/// negatives and garbage give `None`.
pub(crate) fn parse_count(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Ok(value) = text.parse::<u64>() {
        return Some(value);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value.trunc() as u64),
        _ => None,
    }
}
