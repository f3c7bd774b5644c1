//! Chart-ready views handed to the presentation layer.
//!
//! Every view is rebuilt from scratch from the normalized records and the
//! current selection; nothing here holds state between calls.

use serde::{Serialize, Deserialize};

use crate::aggregate::{
    age_group_series, death_rate_series, life_expectancy_series, monthly_average_series,
    rate_trend_series, sex_trend_series,
};
use crate::config::Settings;
use crate::mapping::SupportedYears;
use crate::model::{
    AggregatedSeries, DemographicRecord, LifeTableRecord, MortalityRecord, NormalizationError,
    NormalizedRecord, RankedBucket, TrendRecord,
};
use crate::ranking::{cause_totals, top_n_with_other};
use crate::summary::{CountryStats, MortalitySummary, country_stats, summarize_selection};
use crate::{provider_demographic, provider_life_table, provider_mortality, provider_trend};

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MortalityView {
    pub years: Vec<String>,
    pub selected_causes: Vec<String>,
    /// `None` renders as the "no data" state.
    pub summary: Option<MortalitySummary>,
    pub rate_trends: Vec<AggregatedSeries>,
    pub monthly_trends: Vec<AggregatedSeries>,
    pub cause_breakdown: Vec<RankedBucket>,
}

impl MortalityView {
    pub fn compute(records: &[MortalityRecord], settings: &Settings) -> Self {
        let years = &settings.chart_years;
        let selected = &settings.selected_causes;
        let totals = cause_totals(records, years, &settings.excluded_from_breakdown);

        Self {
            years: years.clone(),
            selected_causes: selected.clone(),
            summary: summarize_selection(records, years, selected),
            rate_trends: rate_trend_series(records, selected, years),
            monthly_trends: monthly_average_series(records, selected),
            cause_breakdown: top_n_with_other(&totals, settings.top_n),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DemographicView {
    pub age_groups: Vec<AggregatedSeries>,
    pub sex_trends: Vec<AggregatedSeries>,
}

impl DemographicView {
    pub fn compute(records: &[DemographicRecord]) -> Self {
        let years = SupportedYears::demographic();
        Self {
            age_groups: age_group_series(records, years.as_slice()),
            sex_trends: sex_trend_series(records, years.as_slice()),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TrendView {
    pub life_expectancy: Vec<AggregatedSeries>,
    pub death_rates: Vec<AggregatedSeries>,
}

impl TrendView {
    pub fn compute(records: &[TrendRecord], settings: &Settings) -> Self {
        Self {
            life_expectancy: life_expectancy_series(records, &settings.selected_groups),
            death_rates: death_rate_series(records, &settings.selected_groups),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LifeTableView {
    pub country_stats: Vec<CountryStats>,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(tag = "dataset", rename_all = "snake_case")]
pub enum DashboardView {
    Mortality(MortalityView),
    Demographic(DemographicView),
    Trend(TrendView),
    LifeTable(LifeTableView),
}

fn collect<T: Clone>(records: &[NormalizedRecord], pick: impl Fn(&NormalizedRecord) -> Option<&T>) -> Vec<T> {
    records.iter().filter_map(pick).cloned().collect()
}

impl DashboardView {
    /// View for one provider's normalized output. Records from other dataset
    /// families are ignored.
    pub fn for_provider(
        provider_name: &str,
        records: &[NormalizedRecord],
        settings: &Settings,
    ) -> Result<Self, NormalizationError> {
        let view = match provider_name {
            provider_mortality::PROVIDER_NAME => {
                let records: Vec<MortalityRecord> = collect(records, |r| match r {
                    NormalizedRecord::Mortality(m) => Some(m),
                    _ => None,
                });
                DashboardView::Mortality(MortalityView::compute(&records, settings))
            },
            provider_demographic::PROVIDER_NAME => {
                let records: Vec<DemographicRecord> = collect(records, |r| match r {
                    NormalizedRecord::Demographic(d) => Some(d),
                    _ => None,
                });
                DashboardView::Demographic(DemographicView::compute(&records))
            },
            provider_trend::PROVIDER_NAME => {
                let records: Vec<TrendRecord> = collect(records, |r| match r {
                    NormalizedRecord::Trend(t) => Some(t),
                    _ => None,
                });
                DashboardView::Trend(TrendView::compute(&records, settings))
            },
            provider_life_table::PROVIDER_NAME => {
                let records: Vec<LifeTableRecord> = collect(records, |r| match r {
                    NormalizedRecord::LifeTable(l) => Some(l),
                    _ => None,
                });
                DashboardView::LifeTable(LifeTableView { country_stats: country_stats(&records) })
            },
            _ => return Err(NormalizationError::UnknownProvider(provider_name.to_string())),
        };

        Ok(view)
    }
}
