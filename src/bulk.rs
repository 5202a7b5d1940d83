//! Bounded fan-out of per-area aggregation.
//!
//! A fixed number of workers pull area queries off a shared queue. Each worker
//! opens its own store session, so fetches run in parallel up to the worker
//! count and never queue behind a shared lock. Partial results travel over a
//! bounded channel and are merged into a deterministic order once every area
//! is done.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::error::{EngineError, Result};
use crate::models::AggregationResult;
use crate::query::{self, SnapshotQuery, WeekFilter};
use crate::service::{aggregate_area, cancellable};
use crate::store::WeatherStore;

type WorkQueue = Arc<Mutex<VecDeque<SnapshotQuery>>>;

pub struct BulkCoordinator<S: WeatherStore> {
    store: Arc<S>,
    workers: usize,
}

impl<S: WeatherStore + 'static> BulkCoordinator<S> {
    pub fn new(store: Arc<S>, workers: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
        }
    }

    /// Aggregates every area and merges the results. Cancellation or the first
    /// failing area stops all workers and discards what was collected so far.
    pub async fn run(
        &self,
        area_codes: &[String],
        years: &[i32],
        weeks: WeekFilter,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult> {
        let years = query::normalize_years(years)?;
        let queue: VecDeque<SnapshotQuery> = area_codes
            .iter()
            .map(|code| SnapshotQuery::new(code.as_str(), &years, weeks))
            .collect::<Result<_>>()?;

        if queue.is_empty() {
            return Ok(AggregationResult::default());
        }

        let worker_count = self.workers.min(queue.len());
        info!(
            areas = queue.len(),
            workers = worker_count,
            "starting bulk aggregation"
        );

        let queue: WorkQueue = Arc::new(Mutex::new(queue));
        let run_token = cancel.child_token();
        let (tx, mut rx) = mpsc::channel::<Result<AggregationResult>>(worker_count);

        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            workers.spawn(
                run_worker(
                    Arc::clone(&self.store),
                    Arc::clone(&queue),
                    tx.clone(),
                    run_token.clone(),
                )
                .instrument(info_span!("area_worker", worker)),
            );
        }
        drop(tx);

        let mut partials = Vec::new();
        let outcome = loop {
            tokio::select! {
                biased;
                _ = run_token.cancelled() => break Err(EngineError::Cancelled),
                message = rx.recv() => match message {
                    Some(Ok(partial)) => partials.push(partial),
                    Some(Err(err)) => break Err(err),
                    None => break Ok(()),
                },
            }
        };
        drop(rx);

        if outcome.is_err() {
            run_token.cancel();
            workers.abort_all();
        }

        let mut panicked = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    panicked = Some(EngineError::Worker(err.to_string()));
                }
            }
        }

        if let Err(err) = outcome {
            error!(error = %err, "bulk aggregation stopped");
            return Err(err);
        }
        if let Some(err) = panicked {
            error!(error = %err, "bulk worker panicked");
            return Err(err);
        }

        let merged = merge(partials);
        info!(
            snapshots = merged.snapshots.len(),
            missing = merged.missing_lag_weeks.len(),
            "bulk aggregation finished"
        );
        Ok(merged)
    }
}

async fn run_worker<S: WeatherStore>(
    store: Arc<S>,
    queue: WorkQueue,
    results: mpsc::Sender<Result<AggregationResult>>,
    cancel: CancellationToken,
) {
    let opened = cancellable(&cancel, async { Ok(store.open_session().await?) }).await;
    let mut session = match opened {
        Ok(session) => session,
        Err(err) => {
            let _ = results.send(Err(err)).await;
            return;
        }
    };

    loop {
        let next = queue.lock().pop_front();
        let Some(query) = next else {
            break;
        };

        debug!(area_code = %query.area_code, "processing area");
        let outcome = cancellable(&cancel, aggregate_area(&mut session, &query)).await;
        let failed = outcome.is_err();
        if results.send(outcome).await.is_err() || failed {
            break;
        }
    }
}

/// Snapshots ordered by (area, year, week); markers deduplicated and sorted.
pub fn merge(partials: Vec<AggregationResult>) -> AggregationResult {
    let mut snapshots = Vec::new();
    let mut missing = BTreeSet::new();
    for partial in partials {
        snapshots.extend(partial.snapshots);
        missing.extend(partial.missing_lag_weeks);
    }

    snapshots.sort_by(|a, b| {
        (a.area_code.as_str(), a.dengue_year, a.dengue_week).cmp(&(
            b.area_code.as_str(),
            b.dengue_year,
            b.dengue_week,
        ))
    });

    AggregationResult {
        snapshots,
        missing_lag_weeks: missing.into_iter().collect(),
    }
}
