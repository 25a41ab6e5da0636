use std::collections::{hash_map::DefaultHasher, HashMap};
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::models::{FreeBlock, MeetingInsight, MorningSummaryRequest, MorningSummaryResult};
use crate::models::Event;

const HIDDEN_SUBJECT_PATTERNS: [&str; 10] = [
    "busy", "free", "phantom", "hidden", "private", "personal", "birthday", "holiday",
    "vacation", "out of office",
];

const NON_ACTIONABLE_ALL_DAY_PATTERNS: [&str; 7] = [
    "birthday",
    "holiday",
    "vacation",
    "day off",
    "public holiday",
    "national holiday",
    "anniversary",
];

/// Distinct from the Event Prioritizer's keyword set — see DESIGN.md.
const FOCUS_TIME_KEYWORDS: [&str; 3] = ["focus time", "focus block", "do not schedule"];

const WINDOW_START_HOUR: u32 = 6;
const WINDOW_END_HOUR: u32 = 12;
const EARLY_START_HOUR: u32 = 8;
const FREE_BLOCK_MIN_MINUTES: i64 = 30;
const BACK_TO_BACK_MAX_GAP_MINUTES: i64 = 15;
const CACHE_TTL: Duration = Duration::from_secs(300);
const MAX_EVENTS_CLAMP: usize = 50;

fn is_hidden(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    HIDDEN_SUBJECT_PATTERNS.iter().any(|p| lower.contains(p))
}

fn is_actionable_all_day(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    !NON_ACTIONABLE_ALL_DAY_PATTERNS.iter().any(|p| lower.contains(p))
}

fn is_focus_time(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    FOCUS_TIME_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[derive(Hash, Eq, PartialEq, Clone)]
struct CacheKey {
    event_ids_hash: u64,
    date: String,
    timezone: String,
    detail_level: String,
}

/// An explicit struct instance owned by `AppState` — not a process-wide
/// singleton/`lru_cache` — per the Design Notes' guidance on removing
/// lazily-constructed service singletons.
pub struct MorningSummaryAnalyzer {
    cache: Mutex<HashMap<CacheKey, (Instant, MorningSummaryResult)>>,
}

impl MorningSummaryAnalyzer {
    pub fn new() -> Self {
        MorningSummaryAnalyzer {
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn analyze(
        &self,
        all_events: &[Event],
        request: &MorningSummaryRequest,
        now: DateTime<Utc>,
    ) -> Result<MorningSummaryResult, AppError> {
        let (tz, _tz_fallback) = crate::alexa::resolve_tz(&request.timezone);

        let max_events = request.max_events.min(MAX_EVENTS_CLAMP);
        let target_date = match &request.date {
            Some(date_str) => chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map_err(|_| AppError::Validation(format!("invalid date: {date_str}")))?,
            None => (now.with_timezone(&tz) + chrono::Duration::days(1)).date_naive(),
        };

        let window_start_local = tz
            .from_local_datetime(&target_date.and_hms_opt(WINDOW_START_HOUR, 0, 0).unwrap())
            .single()
            .ok_or_else(|| AppError::Timezone(request.timezone.clone()))?;
        let window_end_local = tz
            .from_local_datetime(&target_date.and_hms_opt(WINDOW_END_HOUR, 0, 0).unwrap())
            .single()
            .ok_or_else(|| AppError::Timezone(request.timezone.clone()))?;
        let window_start_utc = window_start_local.with_timezone(&Utc);
        let window_end_utc = window_end_local.with_timezone(&Utc);

        let mut relevant: Vec<&Event> = all_events
            .iter()
            .filter(|e| !e.is_cancelled)
            .filter(|e| !is_hidden(&e.subject))
            .filter(|e| e.start < window_end_utc && e.end() > window_start_utc)
            .take(max_events)
            .collect();
        relevant.sort_by_key(|e| e.start);

        let ids_hash = hash_event_ids(&relevant);
        let cache_key = CacheKey {
            event_ids_hash: ids_hash,
            date: target_date.to_string(),
            timezone: request.timezone.clone(),
            detail_level: request.detail_level.clone(),
        };

        {
            let mut cache = self.cache.lock().await;
            cache.retain(|_, (cached_at, _)| cached_at.elapsed() < CACHE_TTL);
            if let Some((cached_at, result)) = cache.get(&cache_key) {
                if cached_at.elapsed() < CACHE_TTL {
                    return Ok(result.clone());
                }
            }
        }

        let mut all_day: Vec<&Event> = Vec::new();
        let mut timed: Vec<&Event> = Vec::new();
        for event in relevant.iter().copied() {
            if event.duration_seconds >= 86400 || is_whole_day(event, &tz) {
                all_day.push(event);
            } else {
                timed.push(event);
            }
        }

        let actionable_all_day_count = all_day
            .iter()
            .filter(|e| is_actionable_all_day(&e.subject))
            .count();

        let mut all_timed: Vec<&Event> = timed.clone();
        all_timed.sort_by_key(|e| e.start);

        let timed_non_focus: Vec<&Event> = timed
            .into_iter()
            .filter(|e| !is_focus_time(&e.subject))
            .collect();

        let total_meetings_equivalent =
            (actionable_all_day_count as f64) * 0.5 + (timed_non_focus.len() as f64);

        let density = if total_meetings_equivalent <= 2.0 {
            "light"
        } else if total_meetings_equivalent <= 4.0 {
            "moderate"
        } else {
            "busy"
        };

        let early_start_flag = all_timed.iter().any(|e| {
            let local = e.start.with_timezone(&tz);
            local.time() < NaiveTime::from_hms_opt(EARLY_START_HOUR, 0, 0).unwrap()
        });

        let free_blocks = find_free_blocks(&all_timed, window_start_utc, window_end_utc);
        let back_to_back_count = count_back_to_back(&all_timed);

        let mut sorted_timed_non_focus: Vec<&Event> = timed_non_focus;
        sorted_timed_non_focus.sort_by_key(|e| e.start);

        let meeting_insights: Vec<MeetingInsight> = sorted_timed_non_focus
            .iter()
            .map(|e| MeetingInsight {
                subject: e.subject.clone(),
                start_iso: crate::ics_parser::serialize_iso(e.start),
                duration_minutes: e.duration_seconds / 60,
            })
            .collect();

        let wake_up_recommendation_iso = if early_start_flag {
            let earliest = all_timed.first().map(|e| e.start);
            earliest.map(|earliest_start| {
                let candidate = earliest_start - chrono::Duration::minutes(90);
                let floor = window_start_utc;
                crate::ics_parser::serialize_iso(candidate.max(floor))
            })
        } else {
            None
        };

        let speech_text = build_speech_text(
            total_meetings_equivalent,
            density,
            early_start_flag,
            &wake_up_recommendation_iso,
            &free_blocks,
            back_to_back_count,
            &request.detail_level,
        );

        let result = MorningSummaryResult {
            timeframe_start_iso: crate::ics_parser::serialize_iso(window_start_utc),
            timeframe_end_iso: crate::ics_parser::serialize_iso(window_end_utc),
            total_meetings_equivalent,
            early_start_flag,
            density: density.to_string(),
            free_blocks,
            back_to_back_count,
            meeting_insights,
            wake_up_recommendation_iso,
            speech_text,
            ssml: None,
        };

        let mut cache = self.cache.lock().await;
        cache.insert(cache_key, (Instant::now(), result.clone()));
        Ok(result)
    }
}

impl Default for MorningSummaryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_whole_day(event: &Event, tz: &Tz) -> bool {
    let local_start = event.start.with_timezone(tz);
    local_start.time() == NaiveTime::from_hms_opt(0, 0, 0).unwrap() && event.duration_seconds >= 86400
}

fn hash_event_ids(events: &[&Event]) -> u64 {
    let mut ids: Vec<&str> = events.iter().map(|e| e.meeting_id.as_str()).collect();
    ids.sort_unstable();
    let mut hasher = DefaultHasher::new();
    for id in ids {
        id.hash(&mut hasher);
    }
    hasher.finish()
}

fn find_free_blocks(
    sorted_timed: &[&Event],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<FreeBlock> {
    let mut blocks = Vec::new();
    let mut cursor = window_start;

    for event in sorted_timed {
        if event.start > cursor {
            push_free_block(&mut blocks, cursor, event.start);
        }
        if event.end() > cursor {
            cursor = event.end();
        }
    }
    if window_end > cursor {
        push_free_block(&mut blocks, cursor, window_end);
    }
    blocks
}

fn push_free_block(blocks: &mut Vec<FreeBlock>, start: DateTime<Utc>, end: DateTime<Utc>) {
    let minutes = (end - start).num_minutes();
    if minutes < FREE_BLOCK_MIN_MINUTES {
        return;
    }
    let recommended_action = if minutes >= 120 {
        Some("deep work session".to_string())
    } else if minutes >= 90 {
        Some("focused project work".to_string())
    } else if minutes >= 45 {
        Some("planning or preparation".to_string())
    } else {
        None
    };
    blocks.push(FreeBlock {
        start_iso: crate::ics_parser::serialize_iso(start),
        end_iso: crate::ics_parser::serialize_iso(end),
        duration_minutes: minutes,
        recommended_action,
    });
}

fn count_back_to_back(sorted_timed: &[&Event]) -> u32 {
    sorted_timed
        .windows(2)
        .filter(|pair| {
            let gap = (pair[1].start - pair[0].end()).num_minutes();
            gap < BACK_TO_BACK_MAX_GAP_MINUTES
        })
        .count() as u32
}

fn build_speech_text(
    total_meetings_equivalent: f64,
    density: &str,
    early_start_flag: bool,
    wake_up_recommendation_iso: &Option<String>,
    free_blocks: &[FreeBlock],
    back_to_back_count: u32,
    detail_level: &str,
) -> String {
    if total_meetings_equivalent == 0.0 {
        return "Good evening. You have a completely free morning tomorrow until noon. \
This is a great opportunity for deep work or personal time."
            .to_string();
    }

    let mut text = if early_start_flag {
        let wake_time = wake_up_recommendation_iso
            .as_deref()
            .unwrap_or("6:00 am")
            .to_string();
        format!(
            "Good evening. You have a very early start tomorrow morning. \
Consider waking up around {wake_time} to be ready in time."
        )
    } else {
        format!(
            "Good evening. Tomorrow morning looks {density}, with about {} meeting{} on your calendar.",
            format_equivalent(total_meetings_equivalent),
            if total_meetings_equivalent == 1.0 { "" } else { "s" }
        )
    };

    if detail_level != "brief" {
        if back_to_back_count > 0 {
            text.push_str(&format!(
                " You have {back_to_back_count} back-to-back meeting{} with little breathing room.",
                if back_to_back_count == 1 { "" } else { "s" }
            ));
        }
        if let Some(longest) = free_blocks.iter().max_by_key(|b| b.duration_minutes) {
            if longest.duration_minutes >= 45 {
                if let Some(action) = &longest.recommended_action {
                    text.push_str(&format!(
                        " You have a {}-minute free block — good time for {action}.",
                        longest.duration_minutes
                    ));
                }
            }
        }
    }

    text
}

fn format_equivalent(value: f64) -> String {
    if (value.fract()).abs() < f64::EPSILON {
        format!("{}", value as i64)
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: &str, subject: &str, start: DateTime<Utc>, duration_seconds: i64) -> Event {
        Event {
            meeting_id: id.to_string(),
            subject: subject.to_string(),
            start,
            duration_seconds,
            location: String::new(),
            is_online_meeting: false,
            is_cancelled: false,
            raw_source: "test".to_string(),
        }
    }

    fn request() -> MorningSummaryRequest {
        MorningSummaryRequest {
            date: Some("2026-01-02".to_string()),
            timezone: "UTC".to_string(),
            detail_level: "standard".to_string(),
            prefer_ssml: false,
            max_events: 50,
        }
    }

    #[tokio::test]
    async fn completely_free_morning() {
        let analyzer = MorningSummaryAnalyzer::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 20, 0, 0).unwrap();
        let result = analyzer.analyze(&[], &request(), now).await.unwrap();
        assert_eq!(result.density, "light");
        assert_eq!(result.total_meetings_equivalent, 0.0);
        assert!(result.speech_text.contains("completely free morning"));
    }

    #[tokio::test]
    async fn very_early_start_flags_and_recommends_wake_time() {
        let analyzer = MorningSummaryAnalyzer::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 20, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 2, 7, 15, 0).unwrap();
        let events = vec![event("m1", "Early Standup", start, 2700)];
        let result = analyzer.analyze(&events, &request(), now).await.unwrap();
        assert!(result.early_start_flag);
        assert!(result.speech_text.contains("very early"));
        assert_eq!(result.wake_up_recommendation_iso.as_deref(), Some("2026-01-02T06:00:00Z"));
    }

    #[tokio::test]
    async fn back_to_back_counted_for_small_gaps() {
        let analyzer = MorningSummaryAnalyzer::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 20, 0, 0).unwrap();
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 2, 9, 40, 0).unwrap();
        let events = vec![
            event("m1", "Planning", a, 1800),
            event("m2", "Review", b, 1800),
        ];
        let result = analyzer.analyze(&events, &request(), now).await.unwrap();
        assert_eq!(result.back_to_back_count, 1);
    }

    #[tokio::test]
    async fn hidden_events_are_excluded() {
        let analyzer = MorningSummaryAnalyzer::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 20, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap();
        let events = vec![event("m1", "Private appointment", start, 1800)];
        let result = analyzer.analyze(&events, &request(), now).await.unwrap();
        assert_eq!(result.total_meetings_equivalent, 0.0);
    }
}
