use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::assembler::{self, REQUIRED_DAYS};
use crate::bulk::BulkCoordinator;
use crate::calendar;
use crate::error::{EngineError, Result};
use crate::models::{AggregationResult, WeeklyCaseRecord, WeeklySnapshot};
use crate::query::{self, SnapshotQuery, WeekFilter};
use crate::store::{WeatherSession, WeatherStore, BARANGAY_LEVEL};

/// Runs `work` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        result = work => result,
    }
}

/// Fetches and aggregates one area. Store failures propagate unchanged.
pub(crate) async fn aggregate_area<S>(session: &mut S, query: &SnapshotQuery) -> Result<AggregationResult>
where
    S: WeatherSession + ?Sized,
{
    let area_code = query.area_code.as_str();

    let cases = session
        .fetch_weekly_cases(area_code, &query.years, query.weeks)
        .await
        .inspect_err(|err| error!(area_code, error = %err, "failed to fetch weekly cases"))?;

    let Some((lag_years, lag_weeks)) = assembler::lag_weather_filter(&cases)? else {
        return assembler::assemble(area_code, &cases, &[]);
    };

    let weather = session
        .fetch_daily_weather(area_code, &lag_years, lag_weeks)
        .await
        .inspect_err(|err| error!(area_code, error = %err, "failed to fetch daily weather"))?;

    debug!(
        area_code,
        cases = cases.len(),
        weather_rows = weather.len(),
        "aggregating area"
    );
    assembler::assemble(area_code, &cases, &weather)
}

/// Entry points consumed by export, prediction and training callers.
pub struct SnapshotService<S: WeatherStore> {
    store: Arc<S>,
}

impl<S: WeatherStore + 'static> SnapshotService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Snapshots for one area over the requested years and dengue weeks.
    pub async fn weekly_snapshots(
        &self,
        query: &SnapshotQuery,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult> {
        query.validate()?;
        cancellable(cancel, async {
            let mut session = self.store.open_session().await?;
            aggregate_area(&mut session, query).await
        })
        .await
    }

    /// Snapshot for one dengue week, aggregated from its lag window, for the
    /// live prediction path. Fails with [`EngineError::NotFound`] instead of
    /// degrading to a missing marker. The recorded case count is attached when
    /// one exists and is zero otherwise.
    pub async fn single_week_snapshot(
        &self,
        area_code: &str,
        year: i32,
        week: u32,
        cancel: &CancellationToken,
    ) -> Result<WeeklySnapshot> {
        query::validate_single_week(area_code, year, week)?;
        let lag = calendar::lag_window_for_week(year, week).ok_or_else(|| {
            EngineError::validation(format!("week {year}-W{week:02} is outside the supported calendar"))
        })?;

        cancellable(cancel, async {
            let mut session = self.store.open_session().await?;
            let cases = session
                .fetch_weekly_cases(area_code, &[year], WeekFilter::Single(week))
                .await?;
            let weather = session
                .fetch_daily_weather(area_code, &[lag.iso_year], WeekFilter::Single(lag.iso_week))
                .await?;

            let rows = assembler::window_rows(&weather, lag);
            if rows.len() < REQUIRED_DAYS {
                return Err(EngineError::NotFound(format!(
                    "area {area_code} has {} of {REQUIRED_DAYS} days of weather for lag week {}",
                    rows.len(),
                    lag.marker()
                )));
            }

            let dengue = WeeklyCaseRecord {
                area_code: area_code.to_string(),
                iso_year: year,
                iso_week: week,
                case_count: cases.first().map_or(0, |record| record.case_count),
            };
            assembler::summarize_window(area_code, &dengue, lag, &rows)
        })
        .await
    }

    /// Barangay-level area codes, the default population of a bulk run.
    pub async fn barangay_codes(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        cancellable(cancel, async {
            let mut session = self.store.open_session().await?;
            Ok(session.fetch_area_codes(BARANGAY_LEVEL).await?)
        })
        .await
    }

    pub fn bulk(&self, workers: usize) -> BulkCoordinator<S> {
        BulkCoordinator::new(Arc::clone(&self.store), workers)
    }
}
