//! Eurostat life table (`demo_mlifetable`) in JSON-stat form.
//!
//! Values arrive as a sparse map from an encoded cell index to a number. The
//! index is either a composite `geo:age:time` triple or a single row-major
//! offset over the dimensions listed in `id`/`size`. Both are resolved back to
//! category codes and labels before any record is emitted.

use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashSet};
use chrono::Utc;

use crate::mapping::{SupportedYears, country_name};
use crate::model::{LifeTableRecord, NormalizationError, NormalizedRecord, Provider, RowIssue};

pub const PROVIDER_NAME: &str = "lifetable";

const GEO: &str = "geo";
const AGE: &str = "age";
const TIME: &str = "time";

#[derive(Clone, Serialize, Deserialize, Default, Debug)]
pub struct Category {
    #[serde(default)]
    pub index: BTreeMap<String, usize>,
    #[serde(default)]
    pub label: BTreeMap<String, String>,
}

#[derive(Clone, Serialize, Deserialize, Default, Debug)]
pub struct Dimension {
    pub category: Category,
}

#[derive(Clone, Serialize, Deserialize, Default, Debug)]
pub struct JsonStatDocument {
    pub value: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub id: Vec<String>,
    #[serde(default)]
    pub size: Vec<usize>,
    pub dimension: BTreeMap<String, Dimension>,
}

/// Position-to-code lookup for one dimension.
#[derive(Clone, Default, Debug)]
struct Axis {
    codes: BTreeMap<usize, String>,
    labels: BTreeMap<String, String>,
}

impl Axis {
    fn new(dimension: &Dimension) -> Self {
        Self {
            codes: dimension.category.index.iter().map(|(code, index)| (*index, code.clone())).collect(),
            labels: dimension.category.label.clone(),
        }
    }

    fn code(&self, position: usize) -> Option<&str> {
        self.codes.get(&position).map(String::as_str)
    }

    fn label<'a>(&'a self, code: &'a str) -> &'a str {
        self.labels.get(code).map(String::as_str).unwrap_or(code)
    }
}

/// A single decoded cell, before country/year/value checks.
#[derive(Clone, PartialEq, Debug)]
pub struct LifeTableCell {
    pub key: String,
    pub geo: usize,
    pub age: usize,
    pub time: usize,
    /// First dimension outside geo/age/time where the cell is not at the
    /// first category, e.g. the male half of a `sex` dimension.
    pub other_slice: Option<String>,
    pub value: Option<f64>,
}

#[derive(Clone, PartialEq, Debug)]
struct CellPosition {
    geo: usize,
    age: usize,
    time: usize,
    other_slice: Option<String>,
}

/// Split a value key into its geo/age/time positions. Linear offsets also
/// report any other dimension the cell does not sit at position 0 of.
fn decode_key(key: &str, ids: &[String], sizes: &[usize]) -> Option<CellPosition> {
    if key.contains(':') {
        let parts = key.split(':').map(|p| p.trim().parse().ok()).collect::<Option<Vec<usize>>>()?;
        return match parts.as_slice() {
            [geo, age, time] => Some(CellPosition { geo: *geo, age: *age, time: *time, other_slice: None }),
            _ => None,
        };
    }

    let offset: usize = key.trim().parse().ok()?;
    if ids.len() != sizes.len() || ids.is_empty() {
        return None;
    }
    let mut positions = BTreeMap::new();
    let mut other_slice = None;
    let mut remaining = offset;
    for (id, size) in ids.iter().zip(sizes).rev() {
        if *size == 0 {
            return None;
        }
        let position = remaining % size;
        remaining /= size;
        match id.as_str() {
            GEO | AGE | TIME => {
                positions.insert(id.as_str(), position);
            },
            _ if position != 0 => other_slice = Some(format!("{id}={position}")),
            _ => {},
        }
    }
    if remaining != 0 {
        return None;
    }
    Some(CellPosition {
        geo: *positions.get(GEO)?,
        age: *positions.get(AGE)?,
        time: *positions.get(TIME)?,
        other_slice,
    })
}

/// Ordinal for an age category: `Y_LT1` is 0, `Y5` is 5, `Y_GE85` is 85.
/// Falls back to the leading number of the label; unknown ages sort last.
pub fn age_rank(code: &str, label: &str) -> u32 {
    let from_code = match code {
        "Y_LT1" => Some(0),
        _ => code
            .strip_prefix("Y_GE")
            .or_else(|| code.strip_prefix('Y'))
            .and_then(|n| n.parse::<u32>().ok()),
    };
    from_code
        .or_else(|| label.split_whitespace().next().and_then(|n| n.parse::<u32>().ok()))
        .unwrap_or(u32::MAX)
}

/// Resolve a whole document to records, youngest age first. Cells outside
/// `years`, aggregates and non-numeric values are skipped.
pub fn normalize(document: &JsonStatDocument, years: &SupportedYears) -> Result<Vec<LifeTableRecord>, NormalizationError> {
    let mut handler = ProviderHandler {
        years: years.clone(),
        ..ProviderHandler::new()
    };
    handler.load(document)?;
    Ok(handler.records())
}

pub struct ProviderHandler {
    pub data: Vec<LifeTableCell>,
    pub error_index: HashSet<usize>,
    years: SupportedYears,
    geo: Axis,
    age: Axis,
    time: Axis,
}

impl ProviderHandler {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            error_index: HashSet::new(),
            years: SupportedYears::life_table(),
            geo: Axis::default(),
            age: Axis::default(),
            time: Axis::default(),
        }
    }

    fn resolve(&self, cell: &LifeTableCell) -> Result<LifeTableRecord, String> {
        if let Some(slice) = &cell.other_slice {
            return Err(format!("{slice} is outside the first category of its dimension"));
        }
        let country_code = self.geo.code(cell.geo).ok_or("unknown geo index")?;
        let country = country_name(country_code)
            .ok_or_else(|| format!("{country_code} is not a reporting country"))?;
        let age_code = self.age.code(cell.age).ok_or("unknown age index")?;
        let year = self.time.code(cell.time).ok_or("unknown time index")?;
        if !self.years.contains(year) {
            return Err(format!("unsupported year {year}"));
        }
        let value = cell.value.filter(|v| v.is_finite()).ok_or("value is not a number")?;
        let age = self.age.label(age_code);

        Ok(LifeTableRecord {
            country_code: country_code.to_string(),
            country: country.to_string(),
            age: age.to_string(),
            age_rank: age_rank(age_code, age),
            year: year.to_string(),
            value,
        })
    }

    /// Decode every cell of `document`. Fails only when a geo, age or time
    /// dimension is missing.
    pub fn load(&mut self, document: &JsonStatDocument) -> Result<(), NormalizationError> {
        let axis = |name: &str| {
            document.dimension
                .get(name)
                .map(Axis::new)
                .ok_or_else(|| NormalizationError::shape(PROVIDER_NAME, format!("missing {name} dimension")))
        };
        let geo_axis = axis(GEO)?;
        let age_axis = axis(AGE)?;
        let time_axis = axis(TIME)?;

        let mut cells = Vec::with_capacity(document.value.len());
        for (key, value) in &document.value {
            let Some(position) = decode_key(key, &document.id, &document.size) else {
                tracing::debug!(key = %key, "undecodable life table index");
                continue;
            };
            cells.push(LifeTableCell {
                key: key.clone(),
                geo: position.geo,
                age: position.age,
                time: position.time,
                other_slice: position.other_slice,
                value: *value,
            });
        }
        cells.sort_by_key(|cell| (cell.geo, cell.age, cell.time));

        self.data = cells;
        self.error_index.clear();
        self.geo = geo_axis;
        self.age = age_axis;
        self.time = time_axis;
        Ok(())
    }

    /// Records from cells that passed validation, youngest age first.
    pub fn records(&self) -> Vec<LifeTableRecord> {
        let mut output: Vec<LifeTableRecord> = self.data
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.error_index.contains(index))
            .filter_map(|(_, cell)| self.resolve(cell).ok())
            .collect();
        output.sort_by_key(|record| record.age_rank);
        output
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
            ("sourceFormat".to_string(), "json_stat".to_string()),
            ("ingestedAt".to_string(), Utc::now().to_rfc3339()),
            ("version".to_string(), "1.0".to_string()),
        ])
    }

    fn parse(&mut self, data: &str) -> Result<(), NormalizationError> {
        let document = serde_json::from_str::<JsonStatDocument>(data)
            .map_err(|err| NormalizationError::shape(PROVIDER_NAME, err.to_string()))?;
        self.load(&document)
    }

    fn validate(&mut self) -> Vec<RowIssue> {
        let mut output = Vec::new();
        for (index, cell) in self.data.iter().enumerate() {
            if let Err(reason) = self.resolve(cell) {
                output.push(RowIssue::new(index, reason));
                self.error_index.insert(index);
            }
        }
        output
    }

    fn convert(&self) -> Vec<NormalizedRecord> {
        self.records().into_iter().map(NormalizedRecord::LifeTable).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "value": {"0:1:0": 79.1, "0:0:0": 80.3, "1:0:0": 81.0, "2:0:0": 82.2, "2:1:0": null},
        "dimension": {
            "geo": {"category": {"index": {"DE": 0, "EU27_2020": 1, "FR": 2}, "label": {"DE": "Germany"}}},
            "age": {"category": {"index": {"Y_LT1": 0, "Y1": 1}, "label": {"Y_LT1": "Less than 1 year", "Y1": "1 year"}}},
            "time": {"category": {"index": {"2021": 0}}}
        }
    }"#;

    #[test]
    fn life_table_test() {
        let mut handler = ProviderHandler::new();
        let provider: &mut dyn Provider = &mut handler as &mut dyn Provider;
        assert!(provider.parse(DOCUMENT).is_ok());
        let issues = provider.validate();
        assert_eq!(issues.len(), 2);
        let converted = provider.convert();
        assert_eq!(converted.len(), 3);

        let records = handler.records();
        let summary: Vec<(&str, &str, f64)> = records
            .iter()
            .map(|r| (r.country_code.as_str(), r.age.as_str(), r.value))
            .collect();
        assert_eq!(summary, vec![
            ("DE", "Less than 1 year", 80.3),
            ("FR", "Less than 1 year", 82.2),
            ("DE", "1 year", 79.1),
        ]);
        assert_eq!(records[0].country, "Germany");
        assert_eq!(records[1].country, "France");
    }

    #[test]
    fn normalize_honors_year_range() {
        let document: JsonStatDocument = serde_json::from_str(DOCUMENT).unwrap();
        let records = normalize(&document, &SupportedYears::life_table()).unwrap();
        assert_eq!(records.len(), 3);
        assert!(normalize(&document, &SupportedYears::range(2019, 2020)).unwrap().is_empty());
    }

    fn positions(key: &str, ids: &[String], sizes: &[usize]) -> Option<(usize, usize, usize)> {
        decode_key(key, ids, sizes).map(|p| (p.geo, p.age, p.time))
    }

    #[test]
    fn linear_offsets_use_id_and_size() {
        let ids: Vec<String> = ["freq", "geo", "age", "time"].iter().map(|s| s.to_string()).collect();
        let sizes = vec![1, 3, 2, 1];
        assert_eq!(positions("0", &ids, &sizes), Some((0, 0, 0)));
        assert_eq!(positions("3", &ids, &sizes), Some((1, 1, 0)));
        assert_eq!(positions("5", &ids, &sizes), Some((2, 1, 0)));
        assert_eq!(positions("6", &ids, &sizes), None);
        assert_eq!(positions("1:2", &ids, &sizes), None);
        assert_eq!(decode_key("5", &ids, &sizes).unwrap().other_slice, None);
    }

    #[test]
    fn extra_dimensions_keep_only_the_first_category() {
        let document = r#"{
            "value": {"0": 80.0, "1": 75.0},
            "id": ["sex", "geo", "age", "time"],
            "size": [2, 1, 1, 1],
            "dimension": {
                "sex": {"category": {"index": {"F": 0, "M": 1}}},
                "geo": {"category": {"index": {"DE": 0}}},
                "age": {"category": {"index": {"Y_LT1": 0}}},
                "time": {"category": {"index": {"2021": 0}}}
            }
        }"#;

        let mut handler = ProviderHandler::new();
        let provider: &mut dyn Provider = &mut handler as &mut dyn Provider;
        assert!(provider.parse(document).is_ok());
        let issues = provider.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].reason.starts_with("sex=1"));

        let records = handler.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, 80.0);

        let stats = crate::summary::country_stats(&records);
        assert_eq!((stats[0].average, stats[0].max, stats[0].min), (80.0, 80.0, 80.0));
    }

    #[test]
    fn age_rank_reads_codes_then_labels() {
        assert_eq!(age_rank("Y_LT1", "Less than 1 year"), 0);
        assert_eq!(age_rank("Y42", "42 years"), 42);
        assert_eq!(age_rank("Y_GE85", "85 years or over"), 85);
        assert_eq!(age_rank("TOTAL", "17 and up"), 17);
        assert_eq!(age_rank("UNK", "Unknown"), u32::MAX);
    }

    #[test]
    fn missing_dimension_is_a_shape_error() {
        let mut handler = ProviderHandler::new();
        let result = handler.parse(r#"{"value": {}, "dimension": {"geo": {"category": {}}}}"#);
        assert!(matches!(result, Err(NormalizationError::Shape { .. })));
        assert!(matches!(handler.parse("[]"), Err(NormalizationError::Shape { .. })));
    }
}
