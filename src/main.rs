//! Volatility forecasting CLI.
//!
//! Reads a `date,value` CSV, trains the next-day log-change regressor and
//! writes a business-day forecast as CSV.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;
use volforecast::application::ml::search::SearchSpace;
use volforecast::application::ml::service::ForecastService;
use volforecast::application::ml::summary::ForecastSummary;
use volforecast::config::{ForecastEnvConfig, load_search_space};
use volforecast::domain::series::PredictionSeries;
use volforecast::infrastructure::csv_loader;
use volforecast::infrastructure::model_store;
use volforecast::infrastructure::observability::TracingDiagnostics;

#[derive(Parser)]
#[command(author, version, about = "Implied volatility forecaster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for values otherwise taken from `FORECAST_*` variables.
#[derive(Args)]
struct Overrides {
    /// Lagged values per input row
    #[arg(short, long)]
    window: Option<usize>,

    /// Business days to forecast
    #[arg(long)]
    horizon: Option<usize>,

    /// Seed for the hyperparameter search
    #[arg(long)]
    seed: Option<u64>,

    /// TOML file with the hyperparameter grid
    #[arg(long)]
    search_space: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and save it as JSON
    Train {
        /// Input CSV with `date,value` columns
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the trained model
        #[arg(short, long, default_value = "volforecast_model.json")]
        model: PathBuf,

        /// Optional JSON file for the training report
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Forecast with a saved model (historical mean if the model is missing)
    Forecast {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "volforecast_model.json")]
        model: PathBuf,

        /// Output CSV; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Train and forecast in one pass
    Run {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the forecast summary as JSON
        #[arg(long)]
        summary: bool,

        #[command(flatten)]
        overrides: Overrides,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays clean CSV.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    let cli = Cli::parse();
    info!("volforecast {} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Train {
            input,
            model,
            report,
            overrides,
        } => {
            let service = build_service(&overrides)?;
            let series = csv_loader::load_series(&input)?;
            let (trained, training_report) = service
                .train(&series)
                .context("Training failed")?;
            model_store::save_model(&trained, &model)?;

            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&training_report)
                    .context("Failed to serialize training report")?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write report {}", path.display()))?;
                info!("Training report written to {:?}", path);
            }
        }
        Commands::Forecast {
            input,
            model,
            output,
            overrides,
        } => {
            let service = build_service(&overrides)?;
            let series = csv_loader::load_series(&input)?;
            let trained = model_store::load_model_if_exists(&model)?;
            let predictions = service
                .forecast(trained.as_ref(), &series)
                .context("Forecast failed")?;
            emit(&predictions, output.as_deref())?;
        }
        Commands::Run {
            input,
            output,
            summary,
            overrides,
        } => {
            let service = build_service(&overrides)?;
            let series = csv_loader::load_series(&input)?;
            let outcome = service.run(&series).context("Forecast failed")?;
            emit(&outcome.predictions, output.as_deref())?;

            if summary {
                print_summary(outcome.summary.as_ref())?;
            }
        }
    }

    Ok(())
}

fn build_service(overrides: &Overrides) -> Result<ForecastService> {
    let mut config = ForecastEnvConfig::from_env();
    if let Some(window) = overrides.window {
        config.window_size = window;
    }
    if let Some(horizon) = overrides.horizon {
        config.horizon = horizon;
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    config.validate()?;

    let search_space = match &overrides.search_space {
        Some(path) => {
            info!("Loading search space from: {:?}", path);
            load_search_space(path)?
        }
        None => SearchSpace::default(),
    };
    info!(
        "Window {} | Horizon {} | Grid size {} | Iterations {}",
        config.window_size,
        config.horizon,
        search_space.size(),
        config.search_iterations
    );

    ForecastService::new(
        config.window_size,
        config.horizon,
        config.to_trainer_config(search_space),
        Arc::new(TracingDiagnostics::default()),
    )
    .context("Invalid forecast configuration")
}

fn emit(predictions: &PredictionSeries, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            csv_loader::save_predictions(path, predictions)?;
            info!("Wrote {} predictions to {:?}", predictions.len(), path);
        }
        None => csv_loader::write_predictions(std::io::stdout().lock(), predictions)?,
    }
    Ok(())
}

fn print_summary(summary: Option<&ForecastSummary>) -> Result<()> {
    match summary {
        Some(summary) => {
            let json =
                serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
            eprintln!("{}", json);
        }
        None => eprintln!("No summary available"),
    }
    Ok(())
}
