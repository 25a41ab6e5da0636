use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use log::{info, warn};
use tokio::sync::watch;

use crate::config::Settings;
use crate::event_window::EventWindow;
use crate::health::HealthTracker;
use crate::ics_fetcher::{self, FetchOutcome};
use crate::ics_parser;
use crate::models::Event;
use crate::rrule_expander;
use crate::skip_store::SkipStore;
use crate::time_source::Clock;

const SOURCE_CONCURRENCY: usize = 4;

/// Holds the full (pre-truncation) occurrence list the Morning Summary
/// Analyzer reads, separate from the short `EventWindow` the next-event
/// handlers read.
pub struct FullEventCache {
    inner: arc_swap::ArcSwap<Vec<Event>>,
}

impl FullEventCache {
    pub fn new() -> Self {
        FullEventCache {
            inner: arc_swap::ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Event>> {
        self.inner.load_full()
    }

    pub fn replace(&self, events: Vec<Event>) {
        self.inner.store(Arc::new(events));
    }
}

impl Default for FullEventCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrates one refresh cycle: fetch -> parse -> expand -> normalize
/// -> filter -> sort -> truncate -> window swap. At most one cycle runs
/// at a time; a cycle already in flight makes a concurrent trigger a
/// no-op rather than stacking.
pub struct RefreshPipeline {
    settings: Settings,
    window: Arc<EventWindow>,
    full_cache: Arc<FullEventCache>,
    health: Arc<HealthTracker>,
    skip_store: Arc<SkipStore>,
    clock: Arc<dyn Clock>,
    http_client: reqwest::Client,
    in_flight: AtomicBool,
}

impl RefreshPipeline {
    pub fn new(
        settings: Settings,
        window: Arc<EventWindow>,
        full_cache: Arc<FullEventCache>,
        health: Arc<HealthTracker>,
        skip_store: Arc<SkipStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        RefreshPipeline {
            settings,
            window,
            full_cache,
            health,
            skip_store,
            clock,
            http_client: reqwest::Client::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs one cycle. Returns `true` if at least one source succeeded and
    /// the window was swapped.
    pub async fn run_once(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("refresh already in progress, skipping on-demand trigger");
            return false;
        }

        let result = self.run_once_inner().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run_once_inner(&self) -> bool {
        let now = self.clock.now_utc();
        self.health.mark_attempt(now);
        self.health.tick_heartbeat(now);

        if self.settings.sources.is_empty() {
            warn!("no ICS sources configured; window stays empty");
            self.window.replace(Vec::new());
            self.full_cache.replace(Vec::new());
            self.health.mark_success(now, 0);
            return true;
        }

        let fetched: Vec<(String, FetchOutcome)> = stream::iter(self.settings.sources.clone())
            .map(|source| async move {
                let outcome = ics_fetcher::fetch_ics(&self.http_client, &source.name, &source.url).await;
                (source.name, outcome)
            })
            .buffer_unordered(SOURCE_CONCURRENCY)
            .collect()
            .await;

        let mut any_succeeded = false;
        let mut all_events: Vec<Event> = Vec::new();

        for (name, outcome) in fetched {
            match outcome {
                FetchOutcome::Success { content } => {
                    any_succeeded = true;
                    let raw_events = ics_parser::parse_ics(&name, &content);
                    for raw in raw_events.iter().filter(|r| !r.is_cancelled) {
                        let occurrences =
                            rrule_expander::expand_occurrences(raw, now, self.settings.rrule_expansion_days);
                        for start in occurrences {
                            all_events.push(normalize(raw, start));
                        }
                    }
                }
                FetchOutcome::SuccessEmpty => {
                    any_succeeded = true;
                    info!("{name}: feed unchanged (304), no new content");
                }
                FetchOutcome::Failed { message } => {
                    warn!("{name}: fetch failed: {message}");
                }
            }
        }

        if !any_succeeded {
            warn!("refresh cycle failed: all sources failed, window left unchanged");
            return false;
        }

        self.full_cache.replace(all_events.clone());

        let mut filtered = Vec::with_capacity(all_events.len());
        for event in all_events {
            if event.start < now {
                continue;
            }
            if self.skip_store.is_skipped(&event.meeting_id).await {
                continue;
            }
            filtered.push(event);
        }
        filtered.sort_by_key(|e| e.start);
        filtered.truncate(self.settings.event_window_size);

        let count = filtered.len();
        self.window.replace(filtered);
        self.health.mark_success(self.clock.now_utc(), count);
        true
    }

    /// Runs the immediate-at-startup-then-periodic loop until `shutdown`
    /// fires. Sleep between ticks is chunked into <=1s waits so shutdown
    /// is observed promptly.
    pub async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) {
        self.run_once().await;

        let interval = self.settings.refresh_interval_seconds.max(1) as u64;
        loop {
            let mut waited = 0u64;
            while waited < interval {
                if *shutdown.borrow() {
                    return;
                }
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => { waited += 1; }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
            if *shutdown.borrow() {
                return;
            }
            self.health.tick_heartbeat(self.clock.now_utc());
            self.run_once().await;
        }
    }
}

fn normalize(raw: &crate::models::RawIcsEvent, start: chrono::DateTime<chrono::Utc>) -> Event {
    let duration_seconds = raw
        .dtend
        .map(|end| (end - raw.dtstart).num_seconds().max(0))
        .or(raw.duration_seconds)
        .unwrap_or(3600);

    let meeting_id = raw
        .uid
        .clone()
        .unwrap_or_else(|| Event::synthesize_id(&raw.source_name, start));

    Event {
        meeting_id,
        subject: raw.summary.clone(),
        start,
        duration_seconds,
        location: raw.location.clone(),
        is_online_meeting: raw.is_online_meeting,
        is_cancelled: raw.is_cancelled,
        raw_source: raw.source_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::FixedClock;
    use chrono::{TimeZone, Utc};

    fn test_pipeline(now: chrono::DateTime<chrono::Utc>) -> RefreshPipeline {
        RefreshPipeline::new(
            Settings::default(),
            Arc::new(EventWindow::new()),
            Arc::new(FullEventCache::new()),
            Arc::new(HealthTracker::new(now)),
            Arc::new(SkipStore::new(
                std::env::temp_dir().join(format!("refresh-test-{}.json", now.timestamp_nanos_opt().unwrap())),
                Box::new(FixedClock(now)),
            )),
            Arc::new(FixedClock(now)),
        )
    }

    #[tokio::test]
    async fn empty_sources_succeeds_with_empty_window() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let pipeline = test_pipeline(now);
        let ok = pipeline.run_once().await;
        assert!(ok);
        assert_eq!(pipeline.window.len(), 0);
    }

    #[tokio::test]
    async fn refresh_is_idempotent_with_no_sources() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let pipeline = test_pipeline(now);
        pipeline.run_once().await;
        let first = pipeline.window.snapshot().clone();
        pipeline.run_once().await;
        let second = pipeline.window.snapshot().clone();
        assert_eq!(*first, *second);
    }
}
