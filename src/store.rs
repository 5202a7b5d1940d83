//! Read-only storage seam. The engine never writes through it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::calendar;
use crate::error::StoreError;
use crate::models::{DailyWeatherObservation, WeeklyCaseRecord};
use crate::query::WeekFilter;

/// Geographic level whose areas make up a bulk run.
pub const BARANGAY_LEVEL: &str = "bgy";

/// A handle owned by exactly one caller at a time, so fetches on different
/// sessions never contend with each other.
#[async_trait]
pub trait WeatherSession: Send {
    async fn fetch_weekly_cases(
        &mut self,
        area_code: &str,
        years: &[i32],
        weeks: WeekFilter,
    ) -> Result<Vec<WeeklyCaseRecord>, StoreError>;

    /// Daily rows whose ISO year is in `years` and ISO week is within `weeks`,
    /// ordered by date, with the weather code description joined in.
    async fn fetch_daily_weather(
        &mut self,
        area_code: &str,
        years: &[i32],
        weeks: WeekFilter,
    ) -> Result<Vec<DailyWeatherObservation>, StoreError>;

    async fn fetch_area_codes(&mut self, geographic_level: &str)
        -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait WeatherStore: Send + Sync {
    type Session: WeatherSession + 'static;

    async fn open_session(&self) -> Result<Self::Session, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryData {
    cases: HashMap<String, Vec<WeeklyCaseRecord>>,
    weather: HashMap<String, Vec<DailyWeatherObservation>>,
    areas: Vec<(String, String)>,
    failing_areas: HashSet<String>,
    latency: Option<Duration>,
}

/// In-process store for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<MemoryData>,
    sessions_opened: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStoreBuilder {
    data: MemoryData,
}

impl MemoryStoreBuilder {
    pub fn area(mut self, area_code: &str, geographic_level: &str) -> Self {
        self.data
            .areas
            .push((area_code.to_string(), geographic_level.to_string()));
        self
    }

    pub fn cases(mut self, records: impl IntoIterator<Item = WeeklyCaseRecord>) -> Self {
        for record in records {
            self.data
                .cases
                .entry(record.area_code.clone())
                .or_default()
                .push(record);
        }
        self
    }

    pub fn weather(mut self, rows: impl IntoIterator<Item = DailyWeatherObservation>) -> Self {
        for row in rows {
            self.data
                .weather
                .entry(row.area_code.clone())
                .or_default()
                .push(row);
        }
        self
    }

    /// Every fetch for `area_code` fails with [`StoreError::Unavailable`].
    #[doc(hidden)]
    pub fn failing_area(mut self, area_code: &str) -> Self {
        self.data.failing_areas.insert(area_code.to_string());
        self
    }

    /// Delay applied to every fetch.
    #[doc(hidden)]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.data.latency = Some(latency);
        self
    }

    pub fn build(mut self) -> MemoryStore {
        for rows in self.data.weather.values_mut() {
            rows.sort_by_key(|row| row.date);
        }
        MemoryStore {
            data: Arc::new(self.data),
            sessions_opened: Arc::new(AtomicUsize::new(0)),
        }
    }
}

pub struct MemorySession {
    data: Arc<MemoryData>,
}

impl MemorySession {
    async fn simulate(&self, area_code: &str) -> Result<(), StoreError> {
        if let Some(latency) = self.data.latency {
            tokio::time::sleep(latency).await;
        }
        if self.data.failing_areas.contains(area_code) {
            return Err(StoreError::Unavailable(format!(
                "simulated failure for area {area_code}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WeatherSession for MemorySession {
    async fn fetch_weekly_cases(
        &mut self,
        area_code: &str,
        years: &[i32],
        weeks: WeekFilter,
    ) -> Result<Vec<WeeklyCaseRecord>, StoreError> {
        self.simulate(area_code).await?;
        Ok(self
            .data
            .cases
            .get(area_code)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| years.contains(&r.iso_year) && weeks.contains(r.iso_week))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_daily_weather(
        &mut self,
        area_code: &str,
        years: &[i32],
        weeks: WeekFilter,
    ) -> Result<Vec<DailyWeatherObservation>, StoreError> {
        self.simulate(area_code).await?;
        Ok(self
            .data
            .weather
            .get(area_code)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        let window = calendar::iso_week_of(row.date);
                        years.contains(&window.iso_year) && weeks.contains(window.iso_week)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_area_codes(
        &mut self,
        geographic_level: &str,
    ) -> Result<Vec<String>, StoreError> {
        if let Some(latency) = self.data.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self
            .data
            .areas
            .iter()
            .filter(|(_, level)| level.eq_ignore_ascii_case(geographic_level))
            .map(|(code, _)| code.clone())
            .collect())
    }
}

#[async_trait]
impl WeatherStore for MemoryStore {
    type Session = MemorySession;

    async fn open_session(&self) -> Result<Self::Session, StoreError> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            data: Arc::clone(&self.data),
        })
    }
}
