use chrono::{DateTime, Utc};
use log::warn;
use rrule::RRuleSet;

use crate::models::RawIcsEvent;

/// Expands a (possibly recurring) raw event into one or more occurrence
/// start instants, bounded by `[now, now + horizon_days]`. Non-recurring
/// events pass through as a single occurrence. Expansion errors are
/// logged and the event is dropped rather than aborting the whole feed.
pub fn expand_occurrences(
    raw: &RawIcsEvent,
    now: DateTime<Utc>,
    horizon_days: i64,
) -> Vec<DateTime<Utc>> {
    let Some(rrule_line) = &raw.rrule_line else {
        return vec![raw.dtstart];
    };

    let dtstart_line = format!(
        "DTSTART:{}\nRRULE:{}",
        raw.dtstart.format("%Y%m%dT%H%M%SZ"),
        rrule_line
    );

    let rruleset: RRuleSet = match dtstart_line.parse() {
        Ok(set) => set,
        Err(err) => {
            warn!(
                "{}: failed to parse RRULE '{}': {}",
                raw.source_name, rrule_line, err
            );
            return Vec::new();
        }
    };

    let horizon = now + chrono::Duration::days(horizon_days);

    rruleset
        .into_iter()
        .take_while(|dt| dt.with_timezone(&Utc) <= horizon)
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| !raw.exdates.contains(dt))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_event(rrule: Option<&str>, start: DateTime<Utc>) -> RawIcsEvent {
        RawIcsEvent {
            uid: Some("evt-1".to_string()),
            summary: "Standup".to_string(),
            location: String::new(),
            dtstart: start,
            dtstart_is_all_day: false,
            dtend: None,
            duration_seconds: Some(900),
            rrule_line: rrule.map(|s| s.to_string()),
            exdates: vec![],
            source_name: "test".to_string(),
            is_online_meeting: false,
            is_cancelled: false,
        }
    }

    #[test]
    fn exdate_suppresses_the_matching_occurrence() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let mut raw = base_event(Some("FREQ=DAILY;COUNT=5"), start);
        raw.exdates = vec![start + chrono::Duration::days(1)];
        let occs = expand_occurrences(&raw, start, 14);
        assert!(!occs.contains(&(start + chrono::Duration::days(1))));
        assert_eq!(occs.len(), 4);
    }

    #[test]
    fn non_recurring_event_yields_single_occurrence() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let raw = base_event(None, start);
        let occs = expand_occurrences(&raw, start - chrono::Duration::days(1), 14);
        assert_eq!(occs, vec![start]);
    }

    #[test]
    fn daily_rrule_expands_within_horizon() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let raw = base_event(Some("FREQ=DAILY;COUNT=10"), start);
        let occs = expand_occurrences(&raw, start, 3);
        assert!(occs.len() >= 3 && occs.len() <= 5);
        assert!(occs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn malformed_rrule_yields_no_occurrences() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let raw = base_event(Some("not-a-valid-rrule"), start);
        let occs = expand_occurrences(&raw, start, 14);
        assert!(occs.is_empty());
    }
}
