//! File-drop batch processing: one input file in, normalized records and a
//! dashboard view out.

use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::dashboard::DashboardView;
use crate::mapping::FieldMap;
use crate::model::{NormalizationError, NormalizedRecord, Provider, RowIssue};
use crate::{provider_demographic, provider_life_table, provider_mortality, provider_trend};

/// Everything a provider produced for one payload.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct ProcessedPayload {
    pub metadata: BTreeMap<String, String>,
    pub records: Vec<NormalizedRecord>,
    pub issues: Vec<RowIssue>,
}

#[derive(Debug)]
pub struct ProcessedFile {
    pub provider: String,
    pub records: usize,
    pub issues: usize,
    pub outputs: Vec<PathBuf>,
}

pub fn run_provider(data: &str, provider: &mut dyn Provider) -> Result<ProcessedPayload, NormalizationError> {
    provider.parse(data)?;
    let issues = provider.validate();
    Ok(ProcessedPayload {
        metadata: provider.get_metadata(),
        records: provider.convert(),
        issues,
    })
}

fn provider_for(provider_name: &str, settings: &Settings) -> Result<Box<dyn Provider>, NormalizationError> {
    match provider_name {
        provider_mortality::PROVIDER_NAME => Ok(Box::new(provider_mortality::ProviderHandler::new(
            FieldMap::cdc_causes(),
            settings.population_policy,
        ))),
        provider_demographic::PROVIDER_NAME => Ok(Box::new(provider_demographic::ProviderHandler::new())),
        provider_trend::PROVIDER_NAME => Ok(Box::new(provider_trend::ProviderHandler::new())),
        provider_life_table::PROVIDER_NAME => Ok(Box::new(provider_life_table::ProviderHandler::new())),
        _ => Err(NormalizationError::UnknownProvider(provider_name.to_string())),
    }
}

fn read_file_contents(file_path: &Path) -> Result<String, NormalizationError> {
    std::fs::read_to_string(file_path)
        .map_err(|err| NormalizationError::Transport(format!("{}: {err}", file_path.display())))
}

/// Normalize the file at `file_path` with the provider called `provider_name`.
/// The file is only read once the provider is known.
pub fn handle_data(
    provider_name: &str,
    file_path: &Path,
    settings: &Settings,
) -> Result<ProcessedPayload, NormalizationError> {
    let mut provider = provider_for(provider_name, settings)?;
    let data = read_file_contents(file_path)?;
    run_provider(&data, provider.as_mut())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), NormalizationError> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|err| NormalizationError::Output(format!("{}: {err}", path.display())))?;
    std::fs::write(path, body)
        .map_err(|err| NormalizationError::Output(format!("{}: {err}", path.display())))
}

/// Process one input file: normalize it, write `normalize_<file>.json` and
/// `dashboard_<file>.json` to the output directory, then remove the input.
/// On error nothing is removed.
pub fn process_file(file_path: &Path, settings: &Settings) -> Result<ProcessedFile, NormalizationError> {
    let provider_name = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let file_name = file_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("name_missing");

    let payload = handle_data(provider_name, file_path, settings)?;
    if !payload.issues.is_empty() {
        tracing::warn!(
            file = file_name,
            excluded = payload.issues.len(),
            first = ?payload.issues.first(),
            "rows excluded during validation"
        );
    }

    let view = DashboardView::for_provider(provider_name, &payload.records, settings)?;
    let normalized_path = settings.output_dir.join(format!("normalize_{file_name}.json"));
    let dashboard_path = settings.output_dir.join(format!("dashboard_{file_name}.json"));
    write_json(&normalized_path, &payload)?;
    write_json(&dashboard_path, &view)?;

    if let Err(err) = std::fs::remove_file(file_path) {
        tracing::warn!(file = file_name, error = %err, "could not remove processed input");
    }
    tracing::info!(file = file_name, provider = provider_name, records = payload.records.len(), "normalized");

    Ok(ProcessedFile {
        provider: provider_name.to_string(),
        records: payload.records.len(),
        issues: payload.issues.len(),
        outputs: vec![normalized_path, dashboard_path],
    })
}

pub fn prepare_dirs(settings: &Settings) -> Result<(), NormalizationError> {
    for dir in [&settings.input_dir, &settings.output_dir] {
        std::fs::create_dir_all(dir)
            .map_err(|err| NormalizationError::Output(format!("{}: {err}", dir.display())))?;
    }
    Ok(())
}

/// One pass over the input directory. Returns the files that were processed;
/// failures are logged and their files stay in place for the next pass.
pub fn poll_once(settings: &Settings) -> Result<Vec<ProcessedFile>, NormalizationError> {
    let entries = std::fs::read_dir(&settings.input_dir).map_err(|err| {
        NormalizationError::Transport(format!("{}: {err}", settings.input_dir.display()))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut output = Vec::new();
    for path in paths {
        tracing::debug!(file = %path.display(), "file found");
        match process_file(&path, settings) {
            Ok(processed) => output.push(processed),
            Err(err @ NormalizationError::Shape { .. }) => {
                tracing::error!(file = %path.display(), error = %err, "payload rejected");
            },
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "file not processed");
            },
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_in(dir: &TempDir) -> Settings {
        let settings = Settings {
            input_dir: dir.path().join("input"),
            output_dir: dir.path().join("normalized"),
            ..Settings::default()
        };
        prepare_dirs(&settings).unwrap();
        settings
    }

    #[test]
    fn run_provider_reports_issues_and_records() {
        let json_str = r#"[
            {"year": "2015", "sex": "F", "age_group": "85+ years", "total_deaths": "10"},
            {"year": "2015", "sex": "X", "age_group": "85+ years", "total_deaths": "10"}
        ]"#;
        let mut handler = provider_demographic::ProviderHandler::new();
        let payload = run_provider(json_str, &mut handler).unwrap();
        assert_eq!(payload.records.len(), 1);
        assert_eq!(payload.issues.len(), 1);
        assert_eq!(payload.issues[0].index, 1);
        assert_eq!(payload.metadata["sourceProvider"], "demographic");
    }

    #[test]
    fn mortality_file_is_normalized_and_removed() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir);
        let input = settings.input_dir.join("cdc.mortality");
        std::fs::write(&input, "year,month,population,all_cause,diseases_of_heart\n2016,7,1000000,8000,1900\n").unwrap();

        let processed = poll_once(&settings).unwrap();
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].provider, "mortality");
        assert_eq!(processed[0].records, 2);
        assert!(!input.exists());

        let normalized = std::fs::read_to_string(settings.output_dir.join("normalize_cdc.mortality.json")).unwrap();
        let payload: ProcessedPayload = serde_json::from_str(&normalized).unwrap();
        assert_eq!(payload.records.len(), 2);
        assert_eq!(payload.metadata["sourceFormat"], "csv");

        let dashboard = std::fs::read_to_string(settings.output_dir.join("dashboard_cdc.mortality.json")).unwrap();
        let view: DashboardView = serde_json::from_str(&dashboard).unwrap();
        assert!(matches!(view, DashboardView::Mortality(_)));
    }

    #[test]
    fn failed_files_stay_in_place() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir);
        let unknown = settings.input_dir.join("notes.txt");
        let bad_shape = settings.input_dir.join("rates.trend");
        std::fs::write(&unknown, "hello").unwrap();
        std::fs::write(&bad_shape, r#"{"error": "rate limited"}"#).unwrap();

        let processed = poll_once(&settings).unwrap();
        assert!(processed.is_empty());
        assert!(unknown.exists());
        assert!(bad_shape.exists());
        assert_eq!(std::fs::read_dir(&settings.output_dir).unwrap().count(), 0);
    }

    #[test]
    fn unknown_provider_is_not_read() {
        let settings = Settings::default();
        let result = handle_data("weather", Path::new("/does/not/exist.weather"), &settings);
        assert!(matches!(result, Err(NormalizationError::UnknownProvider(_))));

        let result = handle_data("trend", Path::new("/does/not/exist.trend"), &settings);
        assert!(matches!(result, Err(NormalizationError::Transport(_))));
    }
}
