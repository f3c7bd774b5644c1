//! Multi-criteria selection over normalized records.
//!
//! Every non-empty criterion is ANDed. An empty criterion matches everything,
//! so "no causes selected" means "all causes". A criterion on a dimension a
//! record family does not carry (e.g. `sexes` on mortality records) is ignored
//! for that family.

use serde::{Serialize, Deserialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;

use crate::model::{DemographicRecord, LifeTableRecord, MortalityRecord, Sex, TrendRecord};

/// Discrete dimensions a record can be selected on.
pub trait Dimensions {
    fn year(&self) -> &str;

    fn category(&self) -> Option<&str> {
        None
    }

    fn sex(&self) -> Option<Sex> {
        None
    }

    fn age_group(&self) -> Option<&str> {
        None
    }

    fn race(&self) -> Option<&str> {
        None
    }

    fn country(&self) -> Option<&str> {
        None
    }
}

impl Dimensions for MortalityRecord {
    fn year(&self) -> &str {
        &self.year
    }

    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }
}

impl Dimensions for DemographicRecord {
    fn year(&self) -> &str {
        &self.year
    }

    fn sex(&self) -> Option<Sex> {
        Some(self.sex)
    }

    fn age_group(&self) -> Option<&str> {
        Some(&self.age_group)
    }
}

impl Dimensions for TrendRecord {
    fn year(&self) -> &str {
        &self.year
    }

    fn sex(&self) -> Option<Sex> {
        Some(self.sex)
    }

    fn race(&self) -> Option<&str> {
        Some(&self.race)
    }
}

impl Dimensions for LifeTableRecord {
    fn year(&self) -> &str {
        &self.year
    }

    fn age_group(&self) -> Option<&str> {
        Some(&self.age)
    }

    fn country(&self) -> Option<&str> {
        Some(&self.country_code)
    }
}

#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Debug)]
#[serde(default)]
pub struct FilterCriteria {
    pub years: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub sexes: BTreeSet<Sex>,
    pub age_groups: BTreeSet<String>,
    pub races: BTreeSet<String>,
    pub countries: BTreeSet<String>,
}

fn selects<K, Q>(selected: &BTreeSet<K>, value: Option<&Q>) -> bool
where
    K: Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    selected.is_empty() || value.is_none_or(|v| selected.contains(v))
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_years<I, S>(mut self, years: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.years = years.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sexes(mut self, sexes: impl IntoIterator<Item = Sex>) -> Self {
        self.sexes = sexes.into_iter().collect();
        self
    }

    pub fn with_races<I, S>(mut self, races: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.races = races.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = countries.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches<R: Dimensions>(&self, record: &R) -> bool {
        selects(&self.years, Some(record.year()))
            && selects(&self.categories, record.category())
            && selects(&self.sexes, record.sex().as_ref())
            && selects(&self.age_groups, record.age_group())
            && selects(&self.races, record.race())
            && selects(&self.countries, record.country())
    }
}

/// Records matching every non-empty criterion, in input order.
pub fn filter<R: Dimensions + Clone>(records: &[R], criteria: &FilterCriteria) -> Vec<R> {
    records.iter().filter(|r| criteria.matches(*r)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(year: &str, category: &str) -> MortalityRecord {
        MortalityRecord::new(year.into(), None, category.into(), 10, 1000)
    }

    fn sample() -> Vec<MortalityRecord> {
        vec![
            record("2015", "Heart Diseases"),
            record("2016", "Septicemia"),
            record("2015", "Drug Overdose"),
            record("2017", "Heart Diseases"),
        ]
    }

    #[test]
    fn empty_categories_match_all() {
        let records = sample();
        let criteria = FilterCriteria::new().with_categories(Vec::<String>::new());
        assert_eq!(filter(&records, &criteria), records);
    }

    #[test]
    fn criteria_are_anded() {
        let criteria = FilterCriteria::new()
            .with_years(["2015", "2016"])
            .with_categories(["Heart Diseases", "Septicemia"]);
        let result = filter(&sample(), &criteria);
        let keys: Vec<(&str, &str)> = result.iter().map(|r| (r.year.as_str(), r.category.as_str())).collect();
        assert_eq!(keys, vec![("2015", "Heart Diseases"), ("2016", "Septicemia")]);
    }

    #[test]
    fn foreign_dimensions_are_ignored() {
        let criteria = FilterCriteria::new().with_sexes([Sex::F]);
        assert_eq!(filter(&sample(), &criteria).len(), 4);

        let demographic = vec![
            DemographicRecord { year: "2016".into(), age_group: "1-4 years".into(), sex: Sex::F, death_count: 4 },
            DemographicRecord { year: "2016".into(), age_group: "1-4 years".into(), sex: Sex::M, death_count: 5 },
        ];
        let result = filter(&demographic, &criteria);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].death_count, 4);
    }

    proptest! {
        #[test]
        fn default_criteria_keep_everything(rows in prop::collection::vec((2014u16..2024, 0usize..4), 0..40)) {
            let causes = ["Heart Diseases", "Septicemia", "Nephritis", "Drug Overdose"];
            let records: Vec<MortalityRecord> = rows
                .iter()
                .map(|(year, cause)| record(&year.to_string(), causes[*cause]))
                .collect();
            prop_assert_eq!(filter(&records, &FilterCriteria::default()), records);
        }
    }
}
