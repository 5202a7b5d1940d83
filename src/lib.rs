//! Weekly weather and dengue feature aggregation.
//!
//! Pairs each dengue reporting week with the weather observed two weeks
//! earlier and reduces that week of daily observations into a feature
//! snapshot for training and live prediction.

pub mod assembler;
pub mod bulk;
pub mod calendar;
pub mod category;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod report;
pub mod service;
pub mod stats;
pub mod store;
pub mod weather_code;
pub mod wet;

pub use error::{EngineError, Result, StoreError};
pub use models::{
    AggregationResult, DailyWeatherObservation, LagWindow, WeeklyCaseRecord, WeeklySnapshot,
    WeeklyStatistic,
};
pub use query::{SnapshotQuery, WeekFilter};
pub use service::SnapshotService;
