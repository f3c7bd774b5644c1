use serde::{Serialize, Deserialize};

use crate::aggregate::{Reduce, aggregate};
use crate::filter::{FilterCriteria, filter};
use crate::model::{LifeTableRecord, MortalityRecord};

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MortalitySummary {
    pub average_rate: f64,
    pub total_deaths: u64,
    pub total_population: u64,
}

/// Sum that stops at `u64::MAX` instead of overflowing.
fn saturating_total(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

/// Headline numbers for a slice of records, or `None` when the slice is empty.
///
/// `average_rate` is the plain mean of each record's own crude rate, not the
/// rate of the summed deaths over the summed population.
pub fn summarize(records: &[MortalityRecord]) -> Option<MortalitySummary> {
    if records.is_empty() {
        return None;
    }

    let rate_sum: f64 = records.iter().map(MortalityRecord::rate).sum();
    Some(MortalitySummary {
        average_rate: rate_sum / records.len() as f64,
        total_deaths: saturating_total(records.iter().map(|r| r.death_count)),
        total_population: saturating_total(records.iter().map(|r| r.population)),
    })
}

/// Summary over the chart years and the selected causes (all causes when
/// none are selected).
pub fn summarize_selection(
    records: &[MortalityRecord],
    years: &[String],
    selected_causes: &[String],
) -> Option<MortalitySummary> {
    let criteria = FilterCriteria::new()
        .with_years(years.iter().cloned())
        .with_categories(selected_causes.iter().cloned());
    summarize(&filter(records, &criteria))
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct CountryStats {
    pub country: String,
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

/// Per-country average, max and min of life table values, highest average
/// first. Countries with equal averages stay in name order.
pub fn country_stats(records: &[LifeTableRecord]) -> Vec<CountryStats> {
    let by_country = |r: &LifeTableRecord| Some(r.country.clone());
    let value = |r: &LifeTableRecord| r.value;

    let averages = aggregate(records, by_country, value, Reduce::Average);
    let maxima = aggregate(records, by_country, value, Reduce::Max);
    let minima = aggregate(records, by_country, value, Reduce::Min);

    let mut output: Vec<CountryStats> = averages
        .into_iter()
        .map(|(country, average)| CountryStats {
            max: maxima.get(&country).copied().unwrap_or(average),
            min: minima.get(&country).copied().unwrap_or(average),
            country,
            average,
        })
        .collect();
    output.sort_by(|a, b| b.average.total_cmp(&a.average));
    output
}
