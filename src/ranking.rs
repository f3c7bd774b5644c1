use std::collections::HashMap;

use crate::filter::{FilterCriteria, filter};
use crate::model::{MortalityRecord, RankedBucket};

pub const OTHER: &str = "Other";

/// Stable descending sort by total; equal totals keep their input order.
pub fn rank(buckets: &[RankedBucket]) -> Vec<RankedBucket> {
    let mut sorted = buckets.to_vec();
    sorted.sort_by(|a, b| b.total.total_cmp(&a.total));
    sorted
}

/// The `n` largest buckets followed by exactly one "Other" bucket holding the
/// sum of everything else (0 when nothing is left over).
pub fn top_n_with_other(buckets: &[RankedBucket], n: usize) -> Vec<RankedBucket> {
    let sorted = rank(buckets);
    let split = n.min(sorted.len());
    let (top, rest) = sorted.split_at(split);

    let mut output = top.to_vec();
    output.push(RankedBucket {
        label: OTHER.to_string(),
        total: rest.iter().map(|b| b.total).sum(),
    });
    output
}

/// Deaths per cause over `years`, leaving out aggregate causes such as
/// "All Causes", ranked largest first. Causes with equal totals stay in the
/// order they first appear in `records`.
pub fn cause_totals(records: &[MortalityRecord], years: &[String], excluded: &[String]) -> Vec<RankedBucket> {
    let in_years = filter(records, &FilterCriteria::new().with_years(years.iter().cloned()));

    let mut buckets: Vec<RankedBucket> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for record in &in_years {
        if excluded.contains(&record.category) {
            continue;
        }
        let position = *positions.entry(record.category.as_str()).or_insert_with(|| {
            buckets.push(RankedBucket { label: record.category.clone(), total: 0.0 });
            buckets.len() - 1
        });
        buckets[position].total += record.death_count as f64;
    }
    rank(&buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn buckets(pairs: &[(&str, f64)]) -> Vec<RankedBucket> {
        pairs.iter().map(|(label, total)| RankedBucket { label: label.to_string(), total: *total }).collect()
    }

    #[test]
    fn top_two_plus_other() {
        let input = buckets(&[("A", 50.0), ("B", 30.0), ("C", 10.0), ("D", 5.0), ("E", 5.0)]);
        let result = top_n_with_other(&input, 2);
        assert_eq!(result, buckets(&[("A", 50.0), ("B", 30.0), ("Other", 20.0)]));
    }

    #[test]
    fn unsorted_input_is_ranked_stably() {
        let input = buckets(&[("C", 10.0), ("A", 50.0), ("D", 10.0), ("B", 30.0)]);
        let result = top_n_with_other(&input, 3);
        assert_eq!(result, buckets(&[("A", 50.0), ("B", 30.0), ("C", 10.0), ("Other", 10.0)]));
    }

    #[test]
    fn other_is_zero_when_nothing_is_left() {
        let input = buckets(&[("A", 5.0)]);
        assert_eq!(top_n_with_other(&input, 8), buckets(&[("A", 5.0), ("Other", 0.0)]));
        assert_eq!(top_n_with_other(&[], 3), buckets(&[("Other", 0.0)]));
    }

    #[test]
    fn cause_totals_skip_aggregates_and_other_years() {
        let records = vec![
            MortalityRecord::new("2015".into(), None, "All Causes".into(), 900, 1000),
            MortalityRecord::new("2015".into(), None, "Septicemia".into(), 10, 1000),
            MortalityRecord::new("2016".into(), None, "Heart Diseases".into(), 40, 1000),
            MortalityRecord::new("2016".into(), None, "Septicemia".into(), 15, 1000),
            MortalityRecord::new("2022".into(), None, "Drug Overdose".into(), 500, 1000),
        ];
        let years = vec!["2015".to_string(), "2016".to_string()];
        let totals = cause_totals(&records, &years, &["All Causes".to_string()]);
        assert_eq!(totals, buckets(&[("Heart Diseases", 40.0), ("Septicemia", 25.0)]));
    }

    #[test]
    fn tied_causes_keep_first_appearance() {
        let records = vec![
            MortalityRecord::new("2015".into(), None, "Septicemia".into(), 20, 1000),
            MortalityRecord::new("2015".into(), None, "Nephritis".into(), 20, 1000),
            MortalityRecord::new("2015".into(), None, "Diabetes Mellitus".into(), 20, 1000),
            MortalityRecord::new("2015".into(), None, "Heart Diseases".into(), 90, 1000),
        ];
        let totals = cause_totals(&records, &["2015".to_string()], &[]);
        let labels: Vec<&str> = totals.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Heart Diseases", "Septicemia", "Nephritis", "Diabetes Mellitus"]);

        let top = top_n_with_other(&totals, 2);
        assert_eq!(top, buckets(&[("Heart Diseases", 90.0), ("Septicemia", 20.0), ("Other", 40.0)]));
    }

    proptest! {
        #[test]
        fn other_conserves_mass(totals in prop::collection::vec(0u32..1_000_000, 0..30), n in 0usize..40) {
            let input: Vec<RankedBucket> = totals
                .iter()
                .enumerate()
                .map(|(i, t)| RankedBucket { label: format!("cause {i}"), total: *t as f64 })
                .collect();
            let output = top_n_with_other(&input, n);

            let before: f64 = input.iter().map(|b| b.total).sum();
            let after: f64 = output.iter().map(|b| b.total).sum();
            prop_assert_eq!(before, after);
            prop_assert_eq!(output.len(), n.min(input.len()) + 1);
            prop_assert_eq!(output.last().map(|b| b.label.as_str()), Some(OTHER));
        }
    }
}
