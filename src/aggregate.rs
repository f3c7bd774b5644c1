//! Grouping, reduction and chart series construction.
//!
//! `aggregate` reduces records to one scalar per group key. The series
//! builders cross join a set of series keys with an ordered domain (years or
//! months) and fill cells the data does not cover with the chart's missing
//! value: zero for counts and rates, null for life expectancy.

use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, BTreeSet};
use chrono::Datelike;

use crate::filter::{Dimensions, FilterCriteria, filter};
use crate::mapping::ALL_CAUSES;
use crate::model::{
    AggregatedSeries, DemographicRecord, MortalityRecord, SeriesPoint, Sex, TrendRecord,
};

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun",
    "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Reduce {
    Sum,
    Average,
    Count,
    Min,
    Max,
}

impl Reduce {
    /// Reduces a group. An empty group is 0 for every operation so charts
    /// never receive NaN or infinities.
    pub fn apply(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Reduce::Sum => values.iter().sum(),
            Reduce::Average => values.iter().sum::<f64>() / values.len() as f64,
            Reduce::Count => values.len() as f64,
            Reduce::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reduce::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// What an uncovered (series, domain) cell holds.
#[derive(Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum MissingValue {
    Zero,
    Null,
}

impl MissingValue {
    fn fill(&self) -> Option<f64> {
        match self {
            MissingValue::Zero => Some(0.0),
            MissingValue::Null => None,
        }
    }
}

/// Group `records` by `key_fn` and reduce each group's `value_fn` values.
/// Records for which `key_fn` returns `None` are left out.
pub fn aggregate<R, K, FK, FV>(records: &[R], key_fn: FK, value_fn: FV, op: Reduce) -> BTreeMap<K, f64>
where
    K: Ord,
    FK: Fn(&R) -> Option<K>,
    FV: Fn(&R) -> f64,
{
    let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(key) = key_fn(record) {
            groups.entry(key).or_default().push(value_fn(record));
        }
    }

    groups.into_iter().map(|(key, values)| (key, op.apply(&values))).collect()
}

/// Group key functions used by the dashboard charts.
pub mod keys {
    use super::*;

    pub fn by_category(record: &MortalityRecord) -> Option<String> {
        Some(record.category.clone())
    }

    pub fn by_year<R: Dimensions>(record: &R) -> Option<String> {
        Some(record.year().to_string())
    }

    /// Calendar month (1-12) of the record's date, whatever its year.
    pub fn by_month_of_year(record: &MortalityRecord) -> Option<u32> {
        record.month.map(|date| date.month())
    }

    pub fn by_category_year(record: &MortalityRecord) -> Option<(String, String)> {
        Some((record.category.clone(), record.year.clone()))
    }

    pub fn by_category_month(record: &MortalityRecord) -> Option<(String, u32)> {
        Some((record.category.clone(), by_month_of_year(record)?))
    }

    pub fn by_race_sex(record: &TrendRecord) -> Option<String> {
        Some(record.group_label())
    }

    pub fn by_age_group_year(record: &DemographicRecord) -> Option<(String, String)> {
        Some((record.age_group.clone(), record.year.clone()))
    }

    pub fn by_sex_year(record: &DemographicRecord) -> Option<(Sex, String)> {
        Some((record.sex, record.year.clone()))
    }
}

/// One series per key over `domain`, each point looked up by `lookup` and
/// filled with `missing` when absent.
pub fn cross_join<D, F>(
    keys: &[String],
    domain: &[(String, D)],
    missing: MissingValue,
    lookup: F,
) -> Vec<AggregatedSeries>
where
    F: Fn(&str, &D) -> Option<f64>,
{
    keys.iter()
        .map(|key| AggregatedSeries {
            key: key.clone(),
            points: domain
                .iter()
                .map(|(label, point)| SeriesPoint {
                    label: label.clone(),
                    value: lookup(key, point).or_else(|| missing.fill()),
                })
                .collect(),
        })
        .collect()
}

fn year_domain(years: &[String]) -> Vec<(String, String)> {
    years.iter().map(|y| (y.clone(), y.clone())).collect()
}

fn month_domain() -> Vec<(String, u32)> {
    MONTH_LABELS.iter().zip(1u32..).map(|(label, month)| (label.to_string(), month)).collect()
}

/// Average crude rate per selected cause and year. With nothing selected the
/// chart shows the first cause present in the data.
pub fn rate_trend_series(
    records: &[MortalityRecord],
    selected_causes: &[String],
    years: &[String],
) -> Vec<AggregatedSeries> {
    let criteria = FilterCriteria::new()
        .with_years(years.iter().cloned())
        .with_categories(selected_causes.iter().cloned());
    let filtered = filter(records, &criteria);

    let causes: Vec<String> = if selected_causes.is_empty() {
        filtered.first().map(|r| r.category.clone()).into_iter().collect()
    } else {
        selected_causes.to_vec()
    };

    let rates = aggregate(&filtered, keys::by_category_year, MortalityRecord::rate, Reduce::Average);
    cross_join(&causes, &year_domain(years), MissingValue::Zero, |cause, year| {
        rates.get(&(cause.to_string(), year.clone())).copied()
    })
}

/// Seasonal profile: crude rate per calendar month averaged across all years.
pub fn monthly_average_series(records: &[MortalityRecord], selected_causes: &[String]) -> Vec<AggregatedSeries> {
    let causes: Vec<String> = if selected_causes.is_empty() {
        vec![ALL_CAUSES.to_string()]
    } else {
        selected_causes.to_vec()
    };

    let rates = aggregate(records, keys::by_category_month, MortalityRecord::rate, Reduce::Average);
    cross_join(&causes, &month_domain(), MissingValue::Zero, |cause, month| {
        rates.get(&(cause.to_string(), *month)).copied()
    })
}

/// Deaths per age group, one series per year.
pub fn age_group_series(records: &[DemographicRecord], years: &[String]) -> Vec<AggregatedSeries> {
    let age_groups: BTreeSet<&str> = records.iter().map(|r| r.age_group.as_str()).collect();
    let domain: Vec<(String, String)> = age_groups.iter().map(|a| (a.to_string(), a.to_string())).collect();

    let totals = aggregate(records, keys::by_age_group_year, |r| r.death_count as f64, Reduce::Sum);
    cross_join(years, &domain, MissingValue::Zero, |year, age_group| {
        totals.get(&(age_group.clone(), year.to_string())).copied()
    })
}

/// Deaths per year, one series per sex.
pub fn sex_trend_series(records: &[DemographicRecord], years: &[String]) -> Vec<AggregatedSeries> {
    let totals = aggregate(records, keys::by_sex_year, |r| r.death_count as f64, Reduce::Sum);
    let labels: Vec<String> = Sex::ALL.iter().map(|s| s.label().to_string()).collect();

    cross_join(&labels, &year_domain(years), MissingValue::Zero, |label, year| {
        let sex = Sex::parse(label)?;
        totals.get(&(sex, year.clone())).copied()
    })
}

fn trend_series<F>(records: &[TrendRecord], groups: &[String], measure: F) -> Vec<AggregatedSeries>
where
    F: Fn(&TrendRecord) -> Option<f64>,
{
    let years: Vec<String> = records
        .iter()
        .map(|r| r.year.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let values = aggregate(
        records,
        |r| measure(r).and(keys::by_race_sex(r)).map(|group| (group, r.year.clone())),
        |r| measure(r).unwrap_or_default(),
        Reduce::Average,
    );
    cross_join(groups, &year_domain(&years), MissingValue::Null, |group, year| {
        values.get(&(group.to_string(), year.clone())).copied()
    })
}

/// Life expectancy per race×sex group over every year in the data. Years a
/// group does not report are null, not zero.
pub fn life_expectancy_series(records: &[TrendRecord], groups: &[String]) -> Vec<AggregatedSeries> {
    trend_series(records, groups, |r| r.life_expectancy.as_deref()?.parse().ok())
}

pub fn death_rate_series(records: &[TrendRecord], groups: &[String]) -> Vec<AggregatedSeries> {
    trend_series(records, groups, |r| r.death_rate.as_deref()?.parse().ok())
}
