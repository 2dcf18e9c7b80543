use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use fuelmon_service::analysis::pipeline::Pipeline;
use fuelmon_service::config::{self, Config, DEFAULT_CONFIG_PATH};
use fuelmon_service::ingest::feed::FeedClient;
use fuelmon_service::logging::{self, Channel};
use fuelmon_service::refresh::{self, CycleOutcome, RefreshController};
use fuelmon_service::render::DashboardContext;
use fuelmon_service::render::present::{GeoJsonPresenter, TerminalPresenter};
use fuelmon_service::verify;

#[derive(Debug, Parser)]
#[command(name = "fuelmon")]
#[command(about = "Fuel-site monitoring dashboard")]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "FUELMON_CONFIG")]
    config: PathBuf,

    /// Only show sites in this region.
    #[arg(long)]
    region: Option<String>,

    /// Classify against this date instead of the system date.
    #[arg(long, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,

    /// Load once and exit.
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the refresh loop (default).
    Run,
    /// Fetch the feed once and report what would be shown.
    Verify {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

type BoxError = Box<dyn Error + Send + Sync>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fuelmon: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, BoxError> {
    let config = load(&cli)?;
    logging::init_logger(&config.logging)?;

    let client = FeedClient::new(&config.source)?;
    let pipeline = Pipeline::from_config(&config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Verify { json } => {
            let report = verify::run_verification(&client, &pipeline, Utc::now())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                verify::print_summary(&report);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run => serve(&config, client, pipeline),
    }
}

/// Config file and environment first, then command-line flags on top.
fn load(cli: &Cli) -> Result<Config, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(region) = &cli.region {
        config.filter.region = Some(region.clone());
    }
    if let Some(today) = cli.today {
        config.clock.today = Some(today);
    }
    if cli.once {
        config.refresh.interval_minutes = 0;
    }
    Ok(config)
}

fn serve(config: &Config, client: FeedClient, pipeline: Pipeline) -> Result<ExitCode, BoxError> {
    let mut ctx = DashboardContext::from_config(config);
    if config.output.terminal {
        ctx = ctx.with_presenter(Box::new(TerminalPresenter::stdout()));
    }
    if let Some(path) = &config.output.geojson_path {
        ctx = ctx.with_presenter(Box::new(GeoJsonPresenter::new(path)));
    }

    let interval = Duration::from_secs(config.refresh.interval_minutes * 60);
    let triggers = (!interval.is_zero()).then(refresh::spawn_stdin_triggers);
    tracing::info!(
        channel = %Channel::System,
        interval_minutes = config.refresh.interval_minutes,
        region = config.filter.region.as_deref().unwrap_or("all"),
        "starting fuel-site dashboard"
    );

    let mut controller = RefreshController::new(client, pipeline, interval);
    match controller.run(&mut ctx, triggers) {
        CycleOutcome::Failed(_) if interval.is_zero() => Ok(ExitCode::FAILURE),
        _ => Ok(ExitCode::SUCCESS),
    }
}
