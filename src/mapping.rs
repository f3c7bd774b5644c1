//! Fixed lookup tables shared by every provider: cause-of-death field keys,
//! supported years per dataset, and the Eurostat country list.

use std::sync::LazyLock;

const CDC_CAUSES: [(&str, &str); 18] = [
    ("all_cause", "All Causes"),
    ("natural_cause", "Natural Causes"),
    ("septicemia", "Septicemia"),
    ("malignant_neoplasms", "Malignant Neoplasms"),
    ("diabetes_mellitus", "Diabetes Mellitus"),
    ("alzheimer", "Alzheimer's Disease"),
    ("influenza_and_pneumonia", "Influenza and Pneumonia"),
    ("chronic_lower_respiratory", "Chronic Lower Respiratory"),
    ("other_diseases_of_respiratory", "Other Respiratory Diseases"),
    ("nephritis_nephrotic_syndrom", "Nephritis"),
    ("symptoms_signs_and_abnormal", "Abnormal Symptoms and Signs"),
    ("diseases_of_heart", "Heart Diseases"),
    ("cerebrovascular_diseases", "Cerebrovascular Diseases"),
    ("accidents_unintentional", "Accidents (Unintentional)"),
    ("motor_vehicle_accidents", "Motor Vehicle Accidents"),
    ("intentional_self_harm_suicide", "Intentional Self-harm (Suicide)"),
    ("assault_homicide", "Assault (Homicide)"),
    ("drug_overdose", "Drug Overdose"),
];

pub const ALL_CAUSES: &str = "All Causes";
pub const NATURAL_CAUSES: &str = "Natural Causes";

pub const DEMOGRAPHIC_GROUPS: [&str; 6] = [
    "White - Male",
    "White - Female",
    "Black - Male",
    "Black - Female",
    "All Races - Male",
    "All Races - Female",
];

pub const COUNTRY_CODES: [(&str, &str); 31] = [
    ("BE", "Belgium"),
    ("BG", "Bulgaria"),
    ("CZ", "Czechia"),
    ("DK", "Denmark"),
    ("DE", "Germany"),
    ("EE", "Estonia"),
    ("IE", "Ireland"),
    ("EL", "Greece"),
    ("ES", "Spain"),
    ("FR", "France"),
    ("HR", "Croatia"),
    ("IT", "Italy"),
    ("CY", "Cyprus"),
    ("LV", "Latvia"),
    ("LT", "Lithuania"),
    ("LU", "Luxembourg"),
    ("HU", "Hungary"),
    ("MT", "Malta"),
    ("NL", "Netherlands"),
    ("AT", "Austria"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("SI", "Slovenia"),
    ("SK", "Slovakia"),
    ("FI", "Finland"),
    ("SE", "Sweden"),
    ("IS", "Iceland"),
    ("NO", "Norway"),
    ("CH", "Switzerland"),
    ("UK", "United Kingdom"),
];

/// Reporting country name, or `None` for unknown codes and for the EU/EA/EEA
/// aggregates Eurostat mixes into the geo dimension.
pub fn country_name(code: &str) -> Option<&'static str> {
    if code.starts_with("EU") || code.starts_with("EA") || code.starts_with("EEA") {
        return None;
    }
    COUNTRY_CODES.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

/// Ordered provider key to display name table.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldMap {
    pairs: Vec<(String, String)>,
}

static CDC_CAUSE_MAP: LazyLock<FieldMap> =
    LazyLock::new(|| FieldMap::new(CDC_CAUSES.iter().copied()));

impl FieldMap {
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// The CDC cause-of-death table, built once per process.
    pub fn cdc_causes() -> &'static FieldMap {
        &CDC_CAUSE_MAP
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn display_name(&self, provider_key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == provider_key).map(|(_, v)| v.as_str())
    }

    pub fn provider_key(&self, display_name: &str) -> Option<&str> {
        self.pairs.iter().find(|(_, v)| v == display_name).map(|(k, _)| k.as_str())
    }

    pub fn display_names(&self) -> Vec<&str> {
        self.pairs.iter().map(|(_, v)| v.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Ordered list of 4-digit years a dataset is allowed to report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupportedYears {
    years: Vec<String>,
}

impl SupportedYears {
    pub fn range(first: u16, last: u16) -> Self {
        Self {
            years: (first..=last).map(|y| y.to_string()).collect(),
        }
    }

    pub fn mortality() -> Self {
        Self::range(2014, 2023)
    }

    pub fn demographic() -> Self {
        Self::range(2015, 2020)
    }

    pub fn trend() -> Self {
        Self::range(1900, 2023)
    }

    pub fn life_table() -> Self {
        Self::range(2021, 2021)
    }

    pub fn contains(&self, year: &str) -> bool {
        self.years.iter().any(|y| y == year)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.years
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_map_is_bidirectional() {
        let map = FieldMap::cdc_causes();
        assert_eq!(map.len(), 18);
        assert_eq!(map.display_name("diseases_of_heart"), Some("Heart Diseases"));
        assert_eq!(map.provider_key("Drug Overdose"), Some("drug_overdose"));
        assert_eq!(map.display_name("year"), None);
        assert_eq!(map.display_names()[0], ALL_CAUSES);
    }

    #[test]
    fn mortality_years_span_a_decade() {
        let years = SupportedYears::mortality();
        assert_eq!(years.as_slice().len(), 10);
        assert!(years.contains("2014"));
        assert!(years.contains("2023"));
        assert!(!years.contains("2013"));
    }

    #[test]
    fn aggregates_are_not_countries() {
        assert_eq!(country_name("DE"), Some("Germany"));
        assert_eq!(country_name("EU27_2020"), None);
        assert_eq!(country_name("EA19"), None);
        assert_eq!(country_name("XX"), None);
    }
}
