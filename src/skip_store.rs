use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::ics_parser::serialize_iso;
use crate::time_source::Clock;

const SKIP_TTL_HOURS: i64 = 24;

/// Persisted as a single JSON object `{meeting_id: expiry_iso}`. All
/// mutating operations rewrite the whole file atomically (write to a temp
/// file in the same directory, then rename over the target) so a reader
/// racing a writer always sees a complete file.
pub struct SkipStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
    clock: Box<dyn Clock>,
}

impl SkipStore {
    pub fn new(path: PathBuf, clock: Box<dyn Clock>) -> Self {
        SkipStore {
            path,
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Loads the file from disk, purging expired entries before exposing
    /// any state. A corrupt or missing file is treated as empty; never
    /// blocks startup on a broken file.
    pub async fn load(&self) {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => {
                return; // missing file: start empty, nothing to warn about
            }
        };

        let parsed: HashMap<String, String> = match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(err) => {
                warn!("skip store at {:?} is corrupt, starting empty: {err}", self.path);
                return;
            }
        };

        let now = self.clock.now_utc();
        let mut entries = self.entries.lock().await;
        for (id, expiry_raw) in parsed {
            if let Ok(expiry) = DateTime::parse_from_rfc3339(&expiry_raw) {
                let expiry = expiry.with_timezone(&Utc);
                if expiry > now {
                    entries.insert(id, expiry);
                }
            }
        }
    }

    pub async fn is_skipped(&self, id: &str) -> bool {
        let now = self.clock.now_utc();
        let entries = self.entries.lock().await;
        entries.get(id).map(|expiry| *expiry > now).unwrap_or(false)
    }

    pub async fn add_skip(&self, id: &str) -> Result<String, AppError> {
        let now = self.clock.now_utc();
        let expiry = now + chrono::Duration::hours(SKIP_TTL_HOURS);
        let expiry_iso = serialize_iso(expiry);

        let mut entries = self.entries.lock().await;
        entries.insert(id.to_string(), expiry);
        self.persist(&entries)?;
        Ok(expiry_iso)
    }

    pub async fn clear_all(&self) -> Result<usize, AppError> {
        let mut entries = self.entries.lock().await;
        let count = entries.len();
        entries.clear();
        self.persist(&entries)?;
        Ok(count)
    }

    pub async fn active_list(&self) -> HashMap<String, String> {
        let now = self.clock.now_utc();
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|(_, expiry)| **expiry > now)
            .map(|(id, expiry)| (id.clone(), serialize_iso(*expiry)))
            .collect()
    }

    fn persist(&self, entries: &HashMap<String, DateTime<Utc>>) -> Result<(), AppError> {
        let serializable: HashMap<&str, String> = entries
            .iter()
            .map(|(id, expiry)| (id.as_str(), serialize_iso(*expiry)))
            .collect();

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::SkipStore(format!("cannot create {dir:?}: {e}")))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| AppError::SkipStore(format!("cannot create temp file: {e}")))?;
        let body = serde_json::to_string_pretty(&serializable)
            .map_err(|e| AppError::SkipStore(format!("cannot serialize skip store: {e}")))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| AppError::SkipStore(format!("cannot write temp file: {e}")))?;
        tmp.persist(&self.path)
            .map_err(|e| AppError::SkipStore(format!("cannot rename temp file: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::FixedClock;
    use chrono::TimeZone;

    fn store_at(dir: &tempfile::TempDir, now: DateTime<Utc>) -> SkipStore {
        SkipStore::new(dir.path().join("skipped.json"), Box::new(FixedClock(now)))
    }

    #[tokio::test]
    async fn add_skip_returns_expiry_about_24h_out() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let store = store_at(&dir, now);
        let expiry_iso = store.add_skip("m1").await.unwrap();
        let expiry = DateTime::parse_from_rfc3339(&expiry_iso).unwrap();
        let delta = expiry.with_timezone(&Utc) - now;
        assert!(delta.num_hours() >= 23 && delta.num_hours() <= 25);
        assert!(store.is_skipped("m1").await);
    }

    #[tokio::test]
    async fn add_skip_then_clear_all_then_not_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let store = store_at(&dir, now);
        store.add_skip("m1").await.unwrap();
        let count = store.clear_all().await.unwrap();
        assert_eq!(count, 1);
        assert!(!store.is_skipped("m1").await);
    }

    #[tokio::test]
    async fn load_purges_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let writer = store_at(&dir, past);
        writer.add_skip("stale").await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let reader = store_at(&dir, now);
        reader.load().await;
        assert!(!reader.is_skipped("stale").await);
        assert!(reader.active_list().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("skipped.json"), "{not json").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let store = store_at(&dir, now);
        store.load().await;
        assert!(store.active_list().await.is_empty());
    }
}
