use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use webmatrix::reporter::describe_failure;
use webmatrix::{
    ConfigPaths, ConsentHandler, ExitPolicy, Locator, MatrixConfig, MatrixRunner, OutputFormat,
    RunReport, RunSettings, ScrollPadding, WebDriverProvider,
};

pub struct RunOptions {
    pub groups: Vec<String>,
    pub browsers: Vec<String>,
    pub log_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    pub workers: usize,
    pub timeout: u64,
    pub padding_top: u32,
    pub padding_bottom: u32,
    pub settle_ms: u64,
    /// Dialog and accept-button ids, `None` to skip consent handling
    pub consent: Option<(String, String)>,
    pub policy: ExitPolicy,
    pub webdriver_url: Option<String>,
    pub headless: bool,
    pub format: OutputFormat,
    pub report: Option<PathBuf>,
}

pub async fn handle_run(paths: ConfigPaths, options: RunOptions) -> Result<i32> {
    let config = MatrixConfig::load(&paths)?;

    let settings = RunSettings {
        log_dir: options.log_dir,
        screenshot_dir: options.screenshot_dir,
        max_workers: options.workers.max(1),
        combination_timeout: Duration::from_secs(options.timeout),
        padding: ScrollPadding {
            top: options.padding_top,
            bottom: options.padding_bottom,
        },
        settle: Duration::from_millis(options.settle_ms),
        consent: options
            .consent
            .map(|(dialog, accept)| ConsentHandler::new(Locator::id(dialog), Locator::id(accept))),
        groups: options.groups,
        browsers: options.browsers,
        ..RunSettings::default()
    };

    let provider = WebDriverProvider::new(options.headless, options.webdriver_url);
    let runner = Arc::new(MatrixRunner::new(Arc::new(config), provider, settings)?);

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining combinations");
            cancel.cancel();
        }
    });

    let report = runner.run().await;

    if let Some(path) = &options.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    print_summary(&report, options.format)?;
    Ok(report.exit_code(options.policy))
}

fn print_summary(report: &RunReport, format: OutputFormat) -> Result<()> {
    let summary = report.summary();
    match format {
        OutputFormat::Json => {
            let failures: Vec<_> = report
                .combinations
                .iter()
                .filter_map(|c| c.failure())
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "summary": summary,
                    "combination_errors": failures,
                }))?
            );
        }
        OutputFormat::Simple => {
            println!("Combinations: {}", summary.combinations);
            println!("Combination errors: {}", summary.combination_errors);
            println!(
                "Assertions: {} passed, {} failed, {} errored",
                summary.passed, summary.failed, summary.errored
            );
            for failure in report.combinations.iter().filter_map(|c| c.failure()) {
                println!("  {} {}", failure.combination.browser, describe_failure(failure));
            }
        }
    }
    Ok(())
}
