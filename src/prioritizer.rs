use chrono::{DateTime, Utc};

use crate::models::Event;
use crate::skip_store::SkipStore;

/// Case-insensitive substring keywords for the Event Prioritizer's
/// focus-time suppression. Distinct from the Morning Summary Analyzer's
/// own keyword set — see DESIGN.md's Open Question ledger.
const FOCUS_TIME_KEYWORDS: [&str; 5] =
    ["focus time", "focus", "deep work", "thinking time", "planning time"];

const GROUPING_WINDOW_SECONDS: i64 = 1800;
const LUNCH_SUBJECT_MAX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq)]
enum Category {
    Business,
    Lunch,
}

fn is_focus_time(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    FOCUS_TIME_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn categorize(subject: &str) -> Category {
    let lower = subject.to_lowercase();
    if lower.contains("lunch") && subject.chars().count() <= LUNCH_SUBJECT_MAX_LEN {
        Category::Lunch
    } else {
        Category::Business
    }
}

/// Picks the next qualifying event from an already-sorted-by-start window,
/// applying focus-time suppression, skip-store filtering, and the
/// business-over-lunch tie-break for events clustered within 30 minutes of
/// each other. Returns `(event, seconds_until_start)`.
pub async fn find_next_event<'a>(
    window: &'a [Event],
    now: DateTime<Utc>,
    skip_store: &SkipStore,
) -> Option<(&'a Event, i64)> {
    let mut candidates: Vec<&Event> = Vec::new();
    for event in window {
        if event.is_cancelled {
            continue;
        }
        if event.start < now {
            continue;
        }
        if is_focus_time(&event.subject) {
            continue;
        }
        if skip_store.is_skipped(&event.meeting_id).await {
            continue;
        }
        candidates.push(event);
    }

    let first = candidates.first()?;

    // Collect the group of candidates within GROUPING_WINDOW_SECONDS of
    // the first candidate.
    let group: Vec<&&Event> = candidates
        .iter()
        .take_while(|c| (c.start - first.start).num_seconds() < GROUPING_WINDOW_SECONDS)
        .collect();

    let chosen: &Event = if group.len() >= 2 {
        group
            .iter()
            .find(|c| categorize(&c.subject) == Category::Business)
            .map(|c| **c)
            .unwrap_or(*first)
    } else {
        first
    };

    let seconds_until_start = (chosen.start - now).num_seconds();
    Some((chosen, seconds_until_start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::FixedClock;
    use chrono::TimeZone;

    fn event(id: &str, subject: &str, start: DateTime<Utc>) -> Event {
        Event {
            meeting_id: id.to_string(),
            subject: subject.to_string(),
            start,
            duration_seconds: 1800,
            location: String::new(),
            is_online_meeting: false,
            is_cancelled: false,
            raw_source: "test".to_string(),
        }
    }

    fn empty_skip_store(now: DateTime<Utc>) -> SkipStore {
        SkipStore::new(
            std::env::temp_dir().join(format!("skip-{}.json", now.timestamp_nanos_opt().unwrap())),
            Box::new(FixedClock(now)),
        )
    }

    #[tokio::test]
    async fn happy_path_returns_only_candidate() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let window = vec![event("m1", "Team Sync", now + chrono::Duration::minutes(15))];
        let store = empty_skip_store(now);
        let (chosen, secs) = find_next_event(&window, now, &store).await.unwrap();
        assert_eq!(chosen.meeting_id, "m1");
        assert_eq!(secs, 900);
    }

    #[tokio::test]
    async fn business_beats_lunch_within_30_minutes() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let window = vec![
            event("lunch", "Lunch", now + chrono::Duration::hours(2)),
            event(
                "imp",
                "Important Meeting",
                now + chrono::Duration::hours(2) + chrono::Duration::minutes(15),
            ),
        ];
        let store = empty_skip_store(now);
        let (chosen, _) = find_next_event(&window, now, &store).await.unwrap();
        assert_eq!(chosen.meeting_id, "imp");
    }

    #[tokio::test]
    async fn focus_time_is_invisible() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let window = vec![
            event("focus", "Focus Time", now + chrono::Duration::hours(1)),
            event("standup", "Team Standup", now + chrono::Duration::hours(2)),
        ];
        let store = empty_skip_store(now);
        let (chosen, _) = find_next_event(&window, now, &store).await.unwrap();
        assert_eq!(chosen.meeting_id, "standup");
    }

    #[tokio::test]
    async fn past_events_are_skipped() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let window = vec![
            event("past", "Old Meeting", now - chrono::Duration::minutes(5)),
            event("future", "Next Up", now + chrono::Duration::minutes(30)),
        ];
        let store = empty_skip_store(now);
        let (chosen, _) = find_next_event(&window, now, &store).await.unwrap();
        assert_eq!(chosen.meeting_id, "future");
    }

    #[tokio::test]
    async fn skipped_meeting_is_excluded() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let window = vec![
            event("m1", "First", now + chrono::Duration::minutes(10)),
            event("m2", "Second", now + chrono::Duration::hours(1)),
        ];
        let store = empty_skip_store(now);
        store.add_skip("m1").await.unwrap();
        let (chosen, _) = find_next_event(&window, now, &store).await.unwrap();
        assert_eq!(chosen.meeting_id, "m2");
    }

    #[tokio::test]
    async fn no_qualifying_event_returns_none() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let window: Vec<Event> = vec![];
        let store = empty_skip_store(now);
        assert!(find_next_event(&window, now, &store).await.is_none());
    }
}
