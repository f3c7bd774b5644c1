use anyhow::{Context, Result};

use mortality_normalize::config::Settings;
use mortality_normalize::logging::{LogConfig, init_logging};
use mortality_normalize::runner;

fn main() -> Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_logging(&LogConfig::from_env()).context("installing log subscriber")?;
    runner::prepare_dirs(&settings).context("creating working directories")?;

    tracing::info!(
        input = %settings.input_dir.display(),
        output = %settings.output_dir.display(),
        "handling mortality, demographic, trend and lifetable files; press Ctrl-C to quit"
    );

    loop {
        std::thread::sleep(settings.poll_interval());
        match runner::poll_once(&settings) {
            Ok(processed) if !processed.is_empty() => {
                let issues: usize = processed.iter().map(|f| f.issues).sum();
                tracing::info!(files = processed.len(), issues, "poll complete");
            },
            Ok(_) => {},
            Err(err) => tracing::warn!(error = %err, "reading input directory failed"),
        }
    }
}
