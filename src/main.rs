use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hypo_link::commands::{self, SelectOptions};
use hypo_link::config::{LoggingSettings, Settings, DEFAULT_PROFILE};
use hypo_link::services::HypoDd;
use hypo_link::{LinkError, Result};

/// Differential-time linkage and partitioned hypoDD relocation
#[derive(Debug, Parser)]
#[command(name = "hypo-link", version, about)]
struct Cli {
    /// Settings file; defaults to config/default.toml + config/local.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Restrict the full catalog to the study box and time window
    MkPha,
    /// Select differential-time pairs for relocation
    SelectDt {
        /// Threshold profile from [linkage.<profile>]
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
        /// Input dt.cc file (overrides paths.dt_input)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output dt.cc file (overrides paths.dt_output)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Relocate the working catalog in parallel partitions
    Relocate,
    /// mk-pha, select-dt and relocate in order
    Run,
}

/// `LOG_LEVEL` / `LOG_FORMAT` override the `[logging]` section
fn init_logging(logging: &LoggingSettings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

async fn execute(command: Command, settings: Settings) -> Result<()> {
    info!("Configuration loaded for catalog '{}'", settings.paths.ctlg_code);

    match command {
        Command::MkPha => {
            commands::mk_pha(&settings)?;
        }
        Command::SelectDt { profile, input, output } => {
            commands::select_dt(&settings, &SelectOptions { profile, input, output })?;
        }
        Command::Relocate => {
            let solver = Arc::new(HypoDd::new(&settings.paths.hypo_root));
            commands::relocate(&settings, solver).await?;
        }
        Command::Run => {
            commands::run_all(&settings).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_ref()) {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(&LoggingSettings::default());
            error!("Failed to load configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    init_logging(&settings.logging);
    info!("Starting hypo-link...");

    match execute(cli.command, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ (LinkError::Configuration(_) | LinkError::NoOutput)) => {
            error!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("Stage aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
