use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dengue_weather_features::calendar::DateParts;
use dengue_weather_features::config::EngineConfig;
use dengue_weather_features::db::{self, PgWeatherStore};
use dengue_weather_features::models::AggregationResult;
use dengue_weather_features::report;
use dengue_weather_features::{EngineError, SnapshotQuery, SnapshotService, WeekFilter};

#[derive(Parser)]
#[command(name = "dengue-features")]
#[command(about = "Weekly weather and dengue feature snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WeekArgs {
    /// Single dengue reporting week (1-53)
    #[arg(long, conflicts_with_all = ["week_from", "week_to"])]
    week: Option<u32>,
    /// First dengue week of an inclusive range
    #[arg(long, requires = "week_to")]
    week_from: Option<u32>,
    /// Last dengue week of an inclusive range
    #[arg(long, requires = "week_from")]
    week_to: Option<u32>,
}

impl WeekArgs {
    fn filter(&self) -> anyhow::Result<WeekFilter> {
        let range = match (self.week_from, self.week_to) {
            (Some(from), Some(to)) => Some((from, to)),
            (None, None) => None,
            _ => bail!("--week-from and --week-to must be given together"),
        };
        Ok(WeekFilter::from_parts(self.week, range)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the weather and case tables for local development
    InitDb,
    /// Weekly snapshots for one area
    Snapshots {
        #[arg(long)]
        area: String,
        #[arg(long = "year", required = true)]
        years: Vec<i32>,
        #[command(flatten)]
        weeks: WeekArgs,
        /// Write training CSV here instead of JSON to stdout
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Snapshot for a single dengue week, aggregated from its lag window
    #[command(group(
        ArgGroup::new("target")
            .args(["date", "year"])
            .required(true)
            .multiple(false)
    ))]
    Week {
        #[arg(long)]
        area: String,
        /// Calendar date inside the dengue week
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, requires = "week")]
        year: Option<i32>,
        #[arg(long)]
        week: Option<u32>,
    },
    /// Snapshots for many areas, aggregated concurrently
    Bulk {
        #[arg(long = "year", required = true)]
        years: Vec<i32>,
        /// Areas to include; defaults to every barangay
        #[arg(long = "area")]
        areas: Vec<String>,
        #[command(flatten)]
        weeks: WeekArgs,
        /// Concurrent workers
        #[arg(long, env = "DENGUE_BULK_WORKERS")]
        workers: Option<usize>,
        #[arg(long, default_value = report::DEFAULT_FILE_NAME)]
        csv: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit(result: &AggregationResult, csv: Option<&PathBuf>) -> anyhow::Result<()> {
    match csv {
        Some(path) => {
            report::write_csv(path, result)?;
            info!(
                path = %path.display(),
                snapshots = result.snapshots.len(),
                missing = result.missing_lag_weeks.len(),
                "training CSV written"
            );
            Ok(())
        }
        None => print_json(result),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env()?;
    if let Commands::Bulk {
        workers: Some(workers),
        ..
    } = &cli.command
    {
        config = config.with_bulk_workers(*workers)?;
    }

    let pool = db::connect(&config)
        .await
        .context("failed to connect to Postgres")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let service = SnapshotService::new(PgWeatherStore::new(pool.clone()));

    let outcome = execute(cli.command, &config, &service, &pool, &cancel).await;
    if let Err(err) = &outcome {
        if err
            .downcast_ref::<EngineError>()
            .is_some_and(EngineError::is_retryable)
        {
            warn!(error = %err, "transient store failure, the command can be retried");
        }
    }
    outcome
}

async fn execute(
    command: Commands,
    config: &EngineConfig,
    service: &SnapshotService<PgWeatherStore>,
    pool: &PgPool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        Commands::Snapshots {
            area,
            years,
            weeks,
            csv,
        } => {
            let query = SnapshotQuery::new(area, &years, weeks.filter()?)?;
            let result = service.weekly_snapshots(&query, cancel).await?;
            emit(&result, csv.as_ref())?;
        }
        Commands::Week {
            area,
            date,
            year,
            week,
        } => {
            let (year, week) = match (date, year, week) {
                (Some(date), _, _) => {
                    let parts = DateParts::extract(date);
                    info!(
                        %date,
                        dengue_week = %parts.current.marker(),
                        lag_week = %parts.lagged.marker(),
                        "resolved calendar date"
                    );
                    (parts.current.iso_year, parts.current.iso_week)
                }
                (None, Some(year), Some(week)) => (year, week),
                _ => bail!("provide either --date or both --year and --week"),
            };
            let snapshot = service
                .single_week_snapshot(&area, year, week, cancel)
                .await?;
            print_json(&snapshot)?;
        }
        Commands::Bulk {
            years,
            areas,
            weeks,
            workers: _,
            csv,
        } => {
            let filter = weeks.filter()?;
            let areas = if areas.is_empty() {
                service.barangay_codes(cancel).await?
            } else {
                areas
            };
            let result = service
                .bulk(config.bulk_workers)
                .run(&areas, &years, filter, cancel)
                .await?;
            emit(&result, Some(&csv))?;
        }
    }

    Ok(())
}
