//! Builds weekly snapshots by pairing each dengue reporting week with the
//! weather observed in its lag window.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::calendar;
use crate::category;
use crate::error::{EngineError, Result};
use crate::models::{
    AggregationResult, DailyWeatherObservation, LagWindow, WeeklyCaseRecord, WeeklySnapshot,
};
use crate::query::WeekFilter;
use crate::stats;
use crate::weather_code;
use crate::wet;

/// Distinct days required before a lag window can be aggregated.
pub const REQUIRED_DAYS: usize = 7;

fn lag_window_of(record: &WeeklyCaseRecord) -> Result<LagWindow> {
    calendar::lag_window_for_week(record.iso_year, record.iso_week).ok_or_else(|| {
        EngineError::validation(format!(
            "dengue week {}-W{:02} is outside the supported calendar",
            record.iso_year, record.iso_week
        ))
    })
}

/// Rows falling in `window`, ordered by date with one row per day.
pub fn window_rows<'a>(
    weather: &'a [DailyWeatherObservation],
    window: LagWindow,
) -> Vec<&'a DailyWeatherObservation> {
    let mut rows: Vec<&DailyWeatherObservation> = weather
        .iter()
        .filter(|row| calendar::iso_week_of(row.date) == window)
        .collect();
    rows.sort_by_key(|row| row.date);
    rows.dedup_by_key(|row| row.date);
    rows
}

/// Years and week filter covering every lag window of `cases`, or `None` when
/// there is nothing to fetch.
pub fn lag_weather_filter(cases: &[WeeklyCaseRecord]) -> Result<Option<(Vec<i32>, WeekFilter)>> {
    let windows = cases
        .iter()
        .map(lag_window_of)
        .collect::<Result<BTreeSet<LagWindow>>>()?;

    let Some(first) = windows.first() else {
        return Ok(None);
    };

    let years: Vec<i32> = windows
        .iter()
        .map(|w| w.iso_year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let filter = if windows.len() == 1 {
        WeekFilter::Single(first.iso_week)
    } else {
        let from = windows.iter().map(|w| w.iso_week).min().unwrap_or(first.iso_week);
        let to = windows.iter().map(|w| w.iso_week).max().unwrap_or(first.iso_week);
        WeekFilter::Range { from, to }
    };

    Ok(Some((years, filter)))
}

/// Aggregates one lag window that already has a full week of rows.
pub fn summarize_window(
    area_code: &str,
    dengue: &WeeklyCaseRecord,
    lag: LagWindow,
    rows: &[&DailyWeatherObservation],
) -> Result<WeeklySnapshot> {
    let lag_week_start_date = calendar::week_start(lag.iso_year, lag.iso_week).ok_or_else(|| {
        EngineError::validation(format!("lag week {} is outside the supported calendar", lag.marker()))
    })?;

    let temperatures: Vec<f64> = rows.iter().map(|r| r.temperature).collect();
    let humidity: Vec<f64> = rows.iter().map(|r| r.humidity).collect();
    let precipitation: Vec<f64> = rows.iter().map(|r| r.precipitation).collect();
    let codes: Vec<i32> = rows.iter().map(|r| r.weather_code_id).collect();
    let descriptions: Vec<&str> = rows
        .iter()
        .map(|r| r.weather_description.as_deref().unwrap_or(""))
        .collect();

    let temperature_stats = stats::calculate(&temperatures, "temperature")?;
    let humidity_stats = stats::calculate(&humidity, "humidity")?;
    let precipitation_stats = stats::calculate(&precipitation, "precipitation")?;
    let (most_common_weather_code_id, occurrence_count) = weather_code::resolve_mode(&codes);
    let dominant = category::classify(&descriptions);
    let is_wet_week = wet::is_wet_week(&precipitation, &descriptions);

    Ok(WeeklySnapshot {
        area_code: area_code.to_string(),
        dengue_year: dengue.iso_year,
        dengue_week: dengue.iso_week,
        dengue_case_count: dengue.case_count,
        lag_year: lag.iso_year,
        lag_week: lag.iso_week,
        lag_week_start_date,
        temperature_stats,
        humidity_stats,
        precipitation_stats,
        most_common_weather_code_id,
        most_common_weather_description: dominant.description,
        occurrence_count,
        dominant_weather_category: dominant.category,
        is_wet_week,
    })
}

/// Snapshots for every dengue week of one area, in ascending (year, week)
/// order. Weeks whose lag window has fewer than [`REQUIRED_DAYS`] observations
/// are reported as missing markers instead.
pub fn assemble(
    area_code: &str,
    cases: &[WeeklyCaseRecord],
    weather: &[DailyWeatherObservation],
) -> Result<AggregationResult> {
    if cases.is_empty() {
        debug!(area_code, "no dengue case data to align against");
        return Ok(AggregationResult {
            snapshots: Vec::new(),
            missing_lag_weeks: vec![area_code.to_string()],
        });
    }

    let mut by_window: HashMap<LagWindow, Vec<&DailyWeatherObservation>> = HashMap::new();
    for row in weather {
        by_window
            .entry(calendar::iso_week_of(row.date))
            .or_default()
            .push(row);
    }
    for rows in by_window.values_mut() {
        rows.sort_by_key(|row| row.date);
        rows.dedup_by_key(|row| row.date);
    }

    let mut ordered: Vec<&WeeklyCaseRecord> = cases.iter().collect();
    ordered.sort_by_key(|record| (record.iso_year, record.iso_week));

    let mut result = AggregationResult::default();
    for dengue in ordered {
        let lag = lag_window_of(dengue)?;
        match by_window.get(&lag) {
            Some(rows) if rows.len() >= REQUIRED_DAYS => {
                result
                    .snapshots
                    .push(summarize_window(area_code, dengue, lag, rows)?);
            }
            found => {
                debug!(
                    area_code,
                    lag_week = %lag.marker(),
                    days = found.map_or(0, Vec::len),
                    "lag window incomplete"
                );
                result.missing_lag_weeks.push(lag.marker());
            }
        }
    }

    Ok(result)
}
