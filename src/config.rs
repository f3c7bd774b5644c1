//! Runtime settings for the batch runner and the dashboard selection.

use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mapping::{ALL_CAUSES, DEMOGRAPHIC_GROUPS, NATURAL_CAUSES};
use crate::model::NormalizationError;
use crate::provider_mortality::PopulationPolicy;

pub const CONFIG_ENV: &str = "MORTALITY_NORMALIZE_CONFIG";

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(default)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub poll_interval_secs: u64,
    pub top_n: usize,
    pub population_policy: PopulationPolicy,
    pub chart_years: Vec<String>,
    pub excluded_from_breakdown: Vec<String>,
    pub selected_causes: Vec<String>,
    pub selected_groups: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./input"),
            output_dir: PathBuf::from("./normalized"),
            poll_interval_secs: 3,
            top_n: 8,
            population_policy: PopulationPolicy::Strict,
            chart_years: (2014..=2019).map(|y: u16| y.to_string()).collect(),
            excluded_from_breakdown: vec![ALL_CAUSES.to_string(), NATURAL_CAUSES.to_string()],
            selected_causes: Vec::new(),
            selected_groups: DEMOGRAPHIC_GROUPS.iter().map(|g| g.to_string()).collect(),
        }
    }
}

impl Settings {
    pub fn from_json(data: &str) -> Result<Self, NormalizationError> {
        let settings: Settings = serde_json::from_str(data)
            .map_err(|err| NormalizationError::Config(err.to_string()))?;
        if settings.poll_interval_secs == 0 {
            return Err(NormalizationError::Config("poll_interval_secs must be at least 1".into()));
        }
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, NormalizationError> {
        let data = std::fs::read_to_string(path)
            .map_err(|err| NormalizationError::Config(format!("{}: {err}", path.display())))?;
        Self::from_json(&data)
    }

    /// Settings from the file named by `MORTALITY_NORMALIZE_CONFIG`, or the
    /// defaults when the variable is unset.
    pub fn load() -> Result<Self, NormalizationError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
