use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::StoreError;
use crate::models::{DailyWeatherObservation, WeeklyCaseRecord};
use crate::query::WeekFilter;
use crate::store::{WeatherSession, WeatherStore};

const WEEKLY_CASES_SQL: &str = "SELECT psgc_code, year, week_number, case_count \
     FROM public.weekly_dengue_cases \
     WHERE psgc_code = $1 \
     AND year = ANY($2) \
     AND week_number BETWEEN $3 AND $4 \
     ORDER BY year, week_number";

const DAILY_WEATHER_SQL: &str = "SELECT a.date::date AS date, a.psgc_code, a.weather_code_id, \
     we.main_description, \
     a.temperature::float8 AS temperature, \
     a.precipitation::float8 AS precipitation, \
     a.humidity::float8 AS humidity \
     FROM public.daily_weather AS a \
     LEFT JOIN public.weather_codes AS we ON we.id = a.weather_code_id \
     WHERE a.psgc_code = $1 \
     AND CAST(DATE_PART('isoyear', a.date) AS INT) = ANY($2) \
     AND CAST(DATE_PART('week', a.date) AS INT) BETWEEN $3 AND $4 \
     ORDER BY a.date";

const AREA_CODES_SQL: &str = "SELECT psgc_code FROM public.administrative_areas \
     WHERE LOWER(geographic_level) = LOWER($1) \
     ORDER BY psgc_code";

pub async fn connect(config: &EngineConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn week_bounds(weeks: WeekFilter) -> (i32, i32) {
    let (from, to) = weeks.bounds();
    (
        i32::try_from(from).unwrap_or(i32::MAX),
        i32::try_from(to).unwrap_or(i32::MAX),
    )
}

fn iso_week(value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::InvalidRow(format!("negative week number {value}")))
}

/// Postgres-backed store. Each session checks out its own pooled connection.
#[derive(Debug, Clone)]
pub struct PgWeatherStore {
    pool: PgPool,
}

impl PgWeatherStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl WeatherStore for PgWeatherStore {
    type Session = PgSession;

    async fn open_session(&self) -> Result<Self::Session, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(PgSession { conn })
    }
}

#[async_trait]
impl WeatherSession for PgSession {
    async fn fetch_weekly_cases(
        &mut self,
        area_code: &str,
        years: &[i32],
        weeks: WeekFilter,
    ) -> Result<Vec<WeeklyCaseRecord>, StoreError> {
        let (from, to) = week_bounds(weeks);
        let rows = sqlx::query(WEEKLY_CASES_SQL)
            .bind(area_code)
            .bind(years)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *self.conn)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(WeeklyCaseRecord {
                area_code: row.try_get("psgc_code")?,
                iso_year: row.try_get("year")?,
                iso_week: iso_week(row.try_get("week_number")?)?,
                case_count: row.try_get("case_count")?,
            });
        }

        debug!(area_code, count = records.len(), "fetched weekly case rows");
        Ok(records)
    }

    async fn fetch_daily_weather(
        &mut self,
        area_code: &str,
        years: &[i32],
        weeks: WeekFilter,
    ) -> Result<Vec<DailyWeatherObservation>, StoreError> {
        let (from, to) = week_bounds(weeks);
        let rows = sqlx::query(DAILY_WEATHER_SQL)
            .bind(area_code)
            .bind(years)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *self.conn)
            .await?;

        let mut observations = Vec::with_capacity(rows.len());
        for row in rows {
            let date: NaiveDate = row.try_get("date")?;
            observations.push(DailyWeatherObservation {
                date,
                area_code: row.try_get("psgc_code")?,
                temperature: row.try_get("temperature")?,
                humidity: row.try_get("humidity")?,
                precipitation: row.try_get("precipitation")?,
                weather_code_id: row.try_get("weather_code_id")?,
                weather_description: row.try_get("main_description")?,
            });
        }

        debug!(area_code, count = observations.len(), "fetched daily weather rows");
        Ok(observations)
    }

    async fn fetch_area_codes(
        &mut self,
        geographic_level: &str,
    ) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(AREA_CODES_SQL)
            .bind(geographic_level)
            .fetch_all(&mut *self.conn)
            .await?;

        rows.into_iter()
            .map(|row| row.try_get("psgc_code").map_err(StoreError::from))
            .collect()
    }
}
