//! Schedule trigger: fires due publications once per matching minute.
//!
//! Runs a single background loop. Each tick reads the wall clock in the configured
//! zone, asks the store for due publications and dispatches them in the background.
//! Minutes missed while the process was down are not caught up.

use crate::domain::{DomainError, FireSummary, Publication, PublicationId};
use crate::ports::PublicationStore;
use crate::usecases::dispatch_service::DispatchService;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct SchedulerService {
    store: Arc<dyn PublicationStore>,
    dispatcher: Arc<DispatchService>,
    zone: FixedOffset,
    tick: Duration,
    /// Signalled after commits/edits so a publication due this minute is not missed.
    wake: Arc<Notify>,
}

impl SchedulerService {
    pub fn new(
        store: Arc<dyn PublicationStore>,
        dispatcher: Arc<DispatchService>,
        zone: FixedOffset,
        tick: Duration,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            zone,
            tick,
            wake,
        }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.zone)
    }

    /// Evaluate one tick at `now`. Returns the publications fired with their outcome counts.
    ///
    /// Due publications are dispatched concurrently, one task each.
    pub async fn tick_at(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<(PublicationId, FireSummary)>, DomainError> {
        let due = self.store.list_due(now).await?;
        let handles: Vec<_> = due
            .into_iter()
            .map(|publication| {
                let store = Arc::clone(&self.store);
                let dispatcher = Arc::clone(&self.dispatcher);
                let id = publication.id.clone();
                let task = tokio::spawn(async move {
                    fire(&*store, &dispatcher, publication, now).await
                });
                (id, task)
            })
            .collect();

        let mut fired = Vec::with_capacity(handles.len());
        for (id, task) in handles {
            match task.await {
                Ok(summary) => fired.push((id, summary)),
                Err(e) => error!(publication_id = %id, error = %e, "fire task aborted"),
            }
        }
        Ok(fired)
    }

    /// Evaluate `now` in the background so a slow dispatch never holds up the next tick.
    /// The store's claim in `list_due` keeps overlapping ticks from firing twice.
    pub fn spawn_tick(
        &self,
        now: DateTime<FixedOffset>,
    ) -> JoinHandle<Result<Vec<(PublicationId, FireSummary)>, DomainError>> {
        let worker = self.clone();
        tokio::spawn(async move {
            let result = worker.tick_at(now).await;
            match &result {
                Ok(fired) if fired.is_empty() => {}
                Ok(fired) => debug!(count = fired.len(), "tick fired publications"),
                Err(e) => error!(error = %e, "scheduler tick failed"),
            }
            result
        })
    }

    /// Run forever: tick on minute-aligned boundaries and whenever woken.
    pub async fn run_loop(&self) {
        let first = Instant::now() + until_next_boundary(&self.now(), self.tick);
        let mut interval = tokio::time::interval_at(first, self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_secs = self.tick.as_secs(), zone = %self.zone, "scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.wake.notified() => debug!("scheduler woken by store change"),
            }
            self.spawn_tick(self.now());
        }
    }
}

/// Dispatch one claimed publication and record the result.
async fn fire(
    store: &dyn PublicationStore,
    dispatcher: &DispatchService,
    publication: Publication,
    now: DateTime<FixedOffset>,
) -> FireSummary {
    let summary = match dispatcher.dispatch(&publication.content).await {
        Ok(report) => report.summary(),
        Err(e) => {
            error!(publication_id = %publication.id, error = %e, "dispatch could not start");
            FireSummary::default()
        }
    };
    if let Err(e) = store.mark_fired(&publication.id, now, summary).await {
        warn!(publication_id = %publication.id, error = %e, "could not record fire result");
    }
    info!(
        publication_id = %publication.id,
        time = %publication.time,
        delivered = summary.delivered,
        failed = summary.failed,
        "publication fired"
    );
    summary
}

/// Time from `now` to the next instant whose offset into the minute is a multiple of `tick`.
pub fn until_next_boundary(now: &DateTime<FixedOffset>, tick: Duration) -> Duration {
    let tick_ns = tick.as_nanos().max(1);
    let into_minute =
        u128::from(now.second()) * 1_000_000_000 + u128::from(now.nanosecond() % 1_000_000_000);
    let wait = tick_ns - into_minute % tick_ns;
    Duration::from_nanos(u64::try_from(wait).unwrap_or(u64::MAX))
}
