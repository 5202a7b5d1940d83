use std::time::Duration;

use chrono::{Duration as Days, NaiveDate};
use tokio_util::sync::CancellationToken;

use dengue_weather_features::calendar;
use dengue_weather_features::store::{MemoryStore, BARANGAY_LEVEL};
use dengue_weather_features::{
    DailyWeatherObservation, EngineError, SnapshotQuery, SnapshotService, WeekFilter,
    WeeklyCaseRecord,
};

fn case(area: &str, year: i32, week: u32, count: i32) -> WeeklyCaseRecord {
    WeeklyCaseRecord {
        area_code: area.to_string(),
        iso_year: year,
        iso_week: week,
        case_count: count,
    }
}

fn lag_week(
    area: &str,
    dengue_year: i32,
    dengue_week: u32,
    temperatures: [f64; 7],
    precipitation: [f64; 7],
    description: &str,
) -> Vec<DailyWeatherObservation> {
    let lag = calendar::lag_window_for_week(dengue_year, dengue_week).unwrap();
    let monday = calendar::week_start(lag.iso_year, lag.iso_week).unwrap();
    (0..7)
        .map(|day| DailyWeatherObservation {
            date: monday + Days::days(day as i64),
            area_code: area.to_string(),
            temperature: temperatures[day],
            humidity: 78.0,
            precipitation: precipitation[day],
            weather_code_id: 2,
            weather_description: Some(description.to_string()),
        })
        .collect()
}

#[tokio::test]
async fn end_to_end_snapshot_for_lagged_week() {
    let area = "097332001";
    let store = MemoryStore::builder()
        .cases([case(area, 2023, 10, 12)])
        .weather(lag_week(
            area,
            2023,
            10,
            [27.0, 28.0, 27.0, 29.0, 26.0, 27.0, 28.0],
            [0.0, 0.0, 5.0, 40.0, 10.0, 0.0, 0.0],
            "clear",
        ))
        .build();
    let service = SnapshotService::new(store);
    let query = SnapshotQuery::new(area, &[2023], WeekFilter::Single(10)).unwrap();

    let result = service
        .weekly_snapshots(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.missing_lag_weeks.is_empty());
    assert_eq!(result.snapshots.len(), 1);
    let snapshot = &result.snapshots[0];
    assert_eq!(snapshot.area_code, area);
    assert_eq!((snapshot.dengue_year, snapshot.dengue_week), (2023, 10));
    assert_eq!(snapshot.dengue_case_count, 12);
    assert_eq!((snapshot.lag_year, snapshot.lag_week), (2023, 8));
    assert_eq!(
        snapshot.lag_week_start_date,
        NaiveDate::from_ymd_opt(2023, 2, 20).unwrap()
    );
    assert!((snapshot.temperature_stats.mean - 27.43).abs() < 0.01);
    assert!(snapshot.is_wet_week);
    assert_eq!(snapshot.dominant_weather_category, "Clear");
}

#[tokio::test]
async fn case_weeks_without_weather_become_markers() {
    let area = "097332001";
    let store = MemoryStore::builder()
        .cases((1..=5).map(|week| case(area, 2021, week, 1)))
        .weather(lag_week(area, 2021, 3, [26.0; 7], [0.0; 7], "Overcast"))
        .build();
    let service = SnapshotService::new(store);
    let query = SnapshotQuery::new(area, &[2021], WeekFilter::All).unwrap();

    let result = service
        .weekly_snapshots(&query, &CancellationToken::new())
        .await
        .unwrap();

    let weeks: Vec<u32> = result.snapshots.iter().map(|s| s.dengue_week).collect();
    assert_eq!(weeks, vec![3]);
    assert_eq!(
        result.missing_lag_weeks,
        vec!["2020-W52", "2020-W53", "2021-W02", "2021-W03"]
    );
}

#[tokio::test]
async fn area_without_case_data_is_reported_by_code() {
    let service = SnapshotService::new(MemoryStore::default());
    let query = SnapshotQuery::new("097332009", &[2023], WeekFilter::All).unwrap();

    let result = service
        .weekly_snapshots(&query, &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.snapshots.is_empty());
    assert_eq!(result.missing_lag_weeks, vec!["097332009"]);
}

fn multi_area_store(areas: &[String], latency: Option<Duration>) -> MemoryStore {
    let mut builder = MemoryStore::builder();
    for (index, area) in areas.iter().enumerate() {
        builder = builder.area(area, BARANGAY_LEVEL).cases([
            case(area, 2023, 10, index as i32),
            case(area, 2023, 11, 1),
        ]);
        // Odd areas only have weather for week 10's lag window.
        builder = builder.weather(lag_week(area, 2023, 10, [27.0; 7], [1.0; 7], "Light rain"));
        if index % 2 == 0 {
            builder = builder.weather(lag_week(area, 2023, 11, [28.0; 7], [0.0; 7], "clear"));
        }
    }
    if let Some(latency) = latency {
        builder = builder.latency(latency);
    }
    builder.build()
}

fn area_codes(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("0973{i:05}")).collect()
}

#[tokio::test]
async fn bulk_output_is_sorted_regardless_of_workers() {
    let mut areas = area_codes(12);
    let store = multi_area_store(&areas, None);
    areas.reverse();

    let service = SnapshotService::new(store.clone());
    let result = service
        .bulk(4)
        .run(&areas, &[2023], WeekFilter::All, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.snapshots.len(), 12 + 6);
    let keys: Vec<(String, u32)> = result
        .snapshots
        .iter()
        .map(|s| (s.area_code.clone(), s.dengue_week))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    // Every odd area misses the same lag week; markers are deduplicated.
    assert_eq!(result.missing_lag_weeks, vec!["2023-W09"]);
    assert_eq!(store.sessions_opened(), 4);

    let single_worker = SnapshotService::new(store)
        .bulk(1)
        .run(&areas, &[2023], WeekFilter::All, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(single_worker, result);
}

#[tokio::test]
async fn bulk_discovers_barangays() {
    let areas = area_codes(3);
    let service = SnapshotService::new(multi_area_store(&areas, None));
    let cancel = CancellationToken::new();

    let discovered = service.barangay_codes(&cancel).await.unwrap();
    assert_eq!(discovered, areas);

    let result = service
        .bulk(8)
        .run(&discovered, &[2023], WeekFilter::Range { from: 10, to: 10 }, &cancel)
        .await
        .unwrap();
    assert_eq!(result.snapshots.len(), 3);
    assert!(result.missing_lag_weeks.is_empty());
}

#[tokio::test]
async fn bulk_cancellation_discards_partial_results() {
    let areas = area_codes(100);
    let store = multi_area_store(&areas, Some(Duration::from_millis(40)));
    let service = SnapshotService::new(store);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let outcome = service
        .bulk(4)
        .run(&areas, &[2023], WeekFilter::All, &cancel)
        .await;
    assert!(matches!(outcome, Err(EngineError::Cancelled)), "{outcome:?}");
}

#[tokio::test]
async fn bulk_stops_on_store_failure() {
    let areas = area_codes(6);
    let mut builder = MemoryStore::builder().failing_area(&areas[3]);
    for area in &areas {
        builder = builder.cases([case(area, 2023, 10, 1)]);
    }
    let service = SnapshotService::new(builder.build());

    let outcome = service
        .bulk(2)
        .run(&areas, &[2023], WeekFilter::All, &CancellationToken::new())
        .await;
    assert!(matches!(outcome, Err(EngineError::Store(_))), "{outcome:?}");
}

#[tokio::test]
async fn bulk_rejects_invalid_requests() {
    let service = SnapshotService::new(MemoryStore::default());
    let cancel = CancellationToken::new();

    let no_years = service
        .bulk(2)
        .run(&area_codes(2), &[], WeekFilter::All, &cancel)
        .await;
    assert!(matches!(no_years, Err(EngineError::Validation(_))));

    let bad_area = service
        .bulk(2)
        .run(&["not-a-code".to_string()], &[2023], WeekFilter::All, &cancel)
        .await;
    assert!(matches!(bad_area, Err(EngineError::Validation(_))));

    let empty = service
        .bulk(2)
        .run(&[], &[2023], WeekFilter::All, &cancel)
        .await
        .unwrap();
    assert!(empty.is_empty());
}
