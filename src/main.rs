#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webmatrix::errors::{CheckError, EXIT_CONFIG_ERROR, EXIT_SUCCESS};
use webmatrix::webdriver_manager::GLOBAL_WEBDRIVER_MANAGER;
use webmatrix::{ExitPolicy, OutputFormat};

mod commands;

#[derive(Parser)]
#[command(name = "webmatrix")]
#[command(about = "Cross-browser, cross-viewport regression checks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the configuration documents live
#[derive(clap::Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Directory holding browsers.json, screensize.json, testdata.json and base.json
    #[arg(long, default_value = ".")]
    pub config_dir: PathBuf,

    /// Browser list (defaults to <config-dir>/browsers.json)
    #[arg(long)]
    pub browsers_file: Option<PathBuf>,

    /// Viewport groups (defaults to <config-dir>/screensize.json)
    #[arg(long)]
    pub screen_sizes_file: Option<PathBuf>,

    /// Target URL and test cases (defaults to <config-dir>/testdata.json)
    #[arg(long)]
    pub test_data_file: Option<PathBuf>,

    /// Baseline style records (defaults to <config-dir>/base.json, optional)
    #[arg(long)]
    pub baseline_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the browser × viewport matrix
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Viewport group to run (repeatable; defaults to the groups in the test data)
        #[arg(short, long = "group")]
        groups: Vec<String>,

        /// Only run these browsers (repeatable)
        #[arg(short, long = "browser")]
        browsers: Vec<String>,

        /// Directory for per-combination log files
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,

        /// Directory for screenshots
        #[arg(long, default_value = "screenshots")]
        screenshot_dir: PathBuf,

        /// Combinations run concurrently
        #[arg(short, long, default_value = "1")]
        workers: usize,

        /// Per-combination timeout in seconds
        #[arg(long, default_value = "600")]
        timeout: u64,

        /// Space kept above an element when scrolling it into view (px)
        #[arg(long, default_value = "0")]
        padding_top: u32,

        /// Space kept below an element when scrolling it into view (px)
        #[arg(long, default_value = "0")]
        padding_bottom: u32,

        /// Pause after scrolling a test case element into view (ms)
        #[arg(long, default_value = "1000")]
        settle_ms: u64,

        /// Skip cookie consent handling
        #[arg(long)]
        no_consent: bool,

        /// Element id of the consent dialog
        #[arg(long, default_value = webmatrix::consent::DEFAULT_DIALOG_ID)]
        consent_dialog: String,

        /// Element id of the consent accept button
        #[arg(long, default_value = webmatrix::consent::DEFAULT_ACCEPT_ID)]
        consent_accept: String,

        /// Exit non-zero on assertion failures too
        #[arg(long)]
        fail_on_assertion: bool,

        /// Use an existing WebDriver endpoint instead of launching drivers
        #[arg(long)]
        webdriver_url: Option<String>,

        /// Run browsers in visible mode (disables headless)
        #[arg(long = "no-headless")]
        no_headless: bool,

        /// Summary format
        #[arg(short, long, default_value = "simple")]
        format: OutputFormat,

        /// Write the full report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Load and check the configuration without opening a browser
    Validate {
        #[command(flatten)]
        config: ConfigArgs,

        /// Viewport group to check (repeatable; defaults to the groups in the test data)
        #[arg(short, long = "group")]
        groups: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "simple")]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let result = run().await;

    // Always clean up WebDriver processes before exiting
    GLOBAL_WEBDRIVER_MANAGER.stop_all();

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let exit_code = err
                .downcast_ref::<CheckError>()
                .map(CheckError::exit_code)
                .unwrap_or(EXIT_CONFIG_ERROR);

            // JSON error on stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": exit_code
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code);
        }
    }
}

async fn run() -> Result<i32> {
    // Tracing goes to stderr so stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webmatrix=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            groups,
            browsers,
            log_dir,
            screenshot_dir,
            workers,
            timeout,
            padding_top,
            padding_bottom,
            settle_ms,
            no_consent,
            consent_dialog,
            consent_accept,
            fail_on_assertion,
            webdriver_url,
            no_headless,
            format,
            report,
        } => {
            let options = commands::run::RunOptions {
                groups,
                browsers,
                log_dir,
                screenshot_dir,
                workers,
                timeout,
                padding_top,
                padding_bottom,
                settle_ms,
                consent: (!no_consent).then_some((consent_dialog, consent_accept)),
                policy: if fail_on_assertion {
                    ExitPolicy::AnyFailure
                } else {
                    ExitPolicy::CombinationErrors
                },
                webdriver_url,
                headless: !no_headless,
                format,
                report,
            };
            commands::run::handle_run(config.paths(), options).await
        }

        Commands::Validate {
            config,
            groups,
            format,
        } => {
            commands::validate::handle_validate(config.paths(), groups, format)?;
            Ok(EXIT_SUCCESS)
        }

        Commands::Version => {
            commands::version::handle_version();
            Ok(EXIT_SUCCESS)
        }
    }
}

impl ConfigArgs {
    fn paths(&self) -> webmatrix::ConfigPaths {
        let mut paths = webmatrix::ConfigPaths::in_dir(&self.config_dir);
        if let Some(p) = &self.browsers_file {
            paths.browsers = p.clone();
        }
        if let Some(p) = &self.screen_sizes_file {
            paths.screen_sizes = p.clone();
        }
        if let Some(p) = &self.test_data_file {
            paths.test_data = p.clone();
        }
        if let Some(p) = &self.baseline_file {
            paths.baseline = p.clone();
        }
        paths
    }
}
