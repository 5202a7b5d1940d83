use std::path::Path;

use anyhow::{anyhow, Context};

use crate::models::{AggregationResult, WeeklySnapshot};

pub const DEFAULT_FILE_NAME: &str = "weekly-training-data.csv";

const HEADER: [&str; 18] = [
    "PsgcCode",
    "DengueYear",
    "DengueWeekNumber",
    "DengueCaseCount",
    "LagYear",
    "LagWeekNumber",
    "LagWeekStartDate",
    "TemperatureMean",
    "TemperatureMax",
    "HumidityMean",
    "HumidityMax",
    "PrecipitationMean",
    "PrecipitationMax",
    "MostCommonWeatherCodeId",
    "MostCommonWeatherDescription",
    "OccurrenceCount",
    "DominantWeatherCategory",
    "IsWetWeek",
];

fn snapshot_record(snapshot: &WeeklySnapshot) -> [String; 18] {
    [
        snapshot.area_code.clone(),
        snapshot.dengue_year.to_string(),
        snapshot.dengue_week.to_string(),
        snapshot.dengue_case_count.to_string(),
        snapshot.lag_year.to_string(),
        snapshot.lag_week.to_string(),
        snapshot.lag_week_start_date.format("%Y-%m-%d").to_string(),
        format!("{:.2}", snapshot.temperature_stats.mean),
        format!("{:.2}", snapshot.temperature_stats.max),
        format!("{:.2}", snapshot.humidity_stats.mean),
        format!("{:.2}", snapshot.humidity_stats.max),
        format!("{:.2}", snapshot.precipitation_stats.mean),
        format!("{:.2}", snapshot.precipitation_stats.max),
        snapshot.most_common_weather_code_id.to_string(),
        snapshot
            .most_common_weather_description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        snapshot.occurrence_count.to_string(),
        snapshot.dominant_weather_category.clone(),
        if snapshot.is_wet_week { "TRUE" } else { "FALSE" }.to_string(),
    ]
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> anyhow::Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|err| anyhow!("failed to flush CSV output: {}", err.error()))
}

/// Training-data CSV: one row per snapshot, then a `Missing Lagged Weeks`
/// section when any lag window could not be aggregated.
pub fn render_csv(result: &AggregationResult) -> anyhow::Result<Vec<u8>> {
    let mut table = csv::Writer::from_writer(Vec::new());
    table.write_record(HEADER)?;
    for snapshot in &result.snapshots {
        table.write_record(snapshot_record(snapshot))?;
    }
    let mut output = into_bytes(table)?;

    if !result.missing_lag_weeks.is_empty() {
        output.extend_from_slice(b"\nMissing Lagged Weeks\n");
        let mut missing = csv::Writer::from_writer(Vec::new());
        missing.write_record(["LagWeek"])?;
        for marker in &result.missing_lag_weeks {
            missing.write_record([marker])?;
        }
        output.extend(into_bytes(missing)?);
    }

    Ok(output)
}

pub fn write_csv(path: &Path, result: &AggregationResult) -> anyhow::Result<()> {
    let bytes = render_csv(result)?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
