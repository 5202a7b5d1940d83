use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyWeatherObservation {
    pub date: NaiveDate,
    pub area_code: String,
    pub temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub weather_code_id: i32,
    pub weather_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyCaseRecord {
    pub area_code: String,
    pub iso_year: i32,
    pub iso_week: u32,
    pub case_count: i32,
}

/// An ISO week/year pair. Used both for the weather exposure window and as a
/// plain calendar coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LagWindow {
    pub iso_year: i32,
    pub iso_week: u32,
}

impl LagWindow {
    /// Marker text recorded when a window has too few observations, e.g. `2020-W51`.
    pub fn marker(&self) -> String {
        format!("{:04}-W{:02}", self.iso_year, self.iso_week)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeeklyStatistic {
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySnapshot {
    pub area_code: String,
    pub dengue_year: i32,
    pub dengue_week: u32,
    pub dengue_case_count: i32,
    pub lag_year: i32,
    pub lag_week: u32,
    pub lag_week_start_date: NaiveDate,
    pub temperature_stats: WeeklyStatistic,
    pub humidity_stats: WeeklyStatistic,
    pub precipitation_stats: WeeklyStatistic,
    pub most_common_weather_code_id: i32,
    pub most_common_weather_description: Option<String>,
    pub occurrence_count: usize,
    pub dominant_weather_category: String,
    pub is_wet_week: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationResult {
    pub snapshots: Vec<WeeklySnapshot>,
    pub missing_lag_weeks: Vec<String>,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.missing_lag_weeks.is_empty()
    }
}
