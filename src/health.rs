use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Degraded/stale thresholds used by `/api/health`.
const DEGRADED_AFTER_SECONDS: i64 = 900;
const STALE_AFTER_SECONDS: i64 = 600;

/// Timestamps tracked by the refresh pipeline and consumed by
/// `/api/health`. Fields are individually atomic; torn reads across fields
/// are acceptable since each is independently meaningful.
pub struct HealthTracker {
    last_attempt_unix: AtomicI64,
    last_success_unix: AtomicI64,
    heartbeat_unix: AtomicI64,
    event_count: AtomicI64,
    server_start: Instant,
    server_start_unix: DateTime<Utc>,
}

impl HealthTracker {
    pub fn new(now: DateTime<Utc>) -> Self {
        HealthTracker {
            last_attempt_unix: AtomicI64::new(0),
            last_success_unix: AtomicI64::new(0),
            heartbeat_unix: AtomicI64::new(now.timestamp()),
            event_count: AtomicI64::new(0),
            server_start: Instant::now(),
            server_start_unix: now,
        }
    }

    pub fn mark_attempt(&self, now: DateTime<Utc>) {
        self.last_attempt_unix.store(now.timestamp(), Ordering::SeqCst);
    }

    pub fn tick_heartbeat(&self, now: DateTime<Utc>) {
        self.heartbeat_unix.store(now.timestamp(), Ordering::SeqCst);
    }

    /// Monotonic: once set, `last_success` never moves backward.
    pub fn mark_success(&self, now: DateTime<Utc>, event_count: usize) {
        let prev = self.last_success_unix.load(Ordering::SeqCst);
        if now.timestamp() >= prev {
            self.last_success_unix.store(now.timestamp(), Ordering::SeqCst);
        }
        self.event_count.store(event_count as i64, Ordering::SeqCst);
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_success_unix.load(Ordering::SeqCst);
        if raw == 0 {
            None
        } else {
            DateTime::from_timestamp(raw, 0)
        }
    }

    fn heartbeat(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.heartbeat_unix.load(Ordering::SeqCst), 0).unwrap_or(self.server_start_unix)
    }

    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::SeqCst).max(0) as usize
    }

    pub fn uptime_seconds(&self, _now: DateTime<Utc>) -> i64 {
        self.server_start.elapsed().as_secs() as i64
    }

    pub fn status(&self, now: DateTime<Utc>) -> HealthStatus {
        let is_degraded = match self.last_success() {
            None => true,
            Some(success) => (now - success).num_seconds() > DEGRADED_AFTER_SECONDS,
        };

        let heartbeat_age = (now - self.heartbeat()).num_seconds().max(0);
        let task_status = if heartbeat_age > STALE_AFTER_SECONDS {
            "stale"
        } else {
            "running"
        };

        HealthStatus {
            status: if is_degraded { "degraded" } else { "ok" },
            server_time_iso: crate::ics_parser::serialize_iso(now),
            uptime_s: self.uptime_seconds(now),
            pid: std::process::id(),
            event_count: self.event_count(),
            last_refresh_success_age_s: self.last_success().map(|s| (now - s).num_seconds()),
            background_tasks: vec![BackgroundTaskStatus {
                name: "refresh_loop".to_string(),
                status: task_status.to_string(),
                last_heartbeat_age_s: heartbeat_age,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackgroundTaskStatus {
    pub name: String,
    pub status: String,
    pub last_heartbeat_age_s: i64,
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub status: &'static str,
    pub server_time_iso: String,
    pub uptime_s: i64,
    pub pid: u32,
    pub event_count: usize,
    pub last_refresh_success_age_s: Option<i64>,
    pub background_tasks: Vec<BackgroundTaskStatus>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn degraded_on_cold_start() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let tracker = HealthTracker::new(now);
        let status = tracker.status(now);
        assert_eq!(status.status, "degraded");
        assert!(status.last_refresh_success_age_s.is_none());
    }

    #[test]
    fn ok_shortly_after_success() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let tracker = HealthTracker::new(now);
        tracker.mark_success(now, 3);
        let status = tracker.status(now + chrono::Duration::seconds(10));
        assert_eq!(status.status, "ok");
        assert_eq!(status.event_count, 3);
    }

    #[test]
    fn degraded_after_900_seconds_since_success() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let tracker = HealthTracker::new(now);
        tracker.mark_success(now, 1);
        let status = tracker.status(now + chrono::Duration::seconds(901));
        assert_eq!(status.status, "degraded");
    }

    #[test]
    fn background_task_stale_after_600_seconds() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let tracker = HealthTracker::new(now);
        let status = tracker.status(now + chrono::Duration::seconds(601));
        assert_eq!(status.background_tasks[0].status, "stale");
    }

    #[test]
    fn last_success_never_moves_backward() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let tracker = HealthTracker::new(now);
        tracker.mark_success(now + chrono::Duration::seconds(100), 1);
        tracker.mark_success(now, 2); // an out-of-order/earlier call
        assert_eq!(
            tracker.last_success().unwrap(),
            now + chrono::Duration::seconds(100)
        );
    }
}
