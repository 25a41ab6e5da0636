use std::io::Cursor;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ical::parser::ical::component::IcalEvent;
use ical::IcalParser;
use log::warn;

use crate::models::RawIcsEvent;

const ONLINE_MEETING_MARKERS: [&str; 4] =
    ["zoom.us", "teams.microsoft.com", "meet.google.com", "webex.com"];

/// UTC "Z"-suffix canonicalization, matching the original's
/// `isoformat().replace("+00:00", "Z")` behavior.
pub fn serialize_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Parses raw ICS bytes into a flat list of raw event records. Malformed
/// VEVENT blocks are skipped and logged; one bad event never aborts
/// parsing of the rest of the feed.
pub fn parse_ics(source_name: &str, text: &str) -> Vec<RawIcsEvent> {
    let mut out = Vec::new();
    let reader = IcalParser::new(Cursor::new(text.as_bytes()));

    for cal in reader {
        let cal = match cal {
            Ok(cal) => cal,
            Err(err) => {
                warn!("{source_name}: failed to parse calendar block: {err}");
                continue;
            }
        };
        for event in cal.events {
            match parse_event(source_name, &event) {
                Ok(raw) => out.push(raw),
                Err(err) => warn!("{source_name}: skipping unparseable VEVENT: {err}"),
            }
        }
    }
    out
}

fn parse_event(source_name: &str, event: &IcalEvent) -> Result<RawIcsEvent, String> {
    let mut uid = None;
    let mut summary = String::new();
    let mut location = String::new();
    let mut description = String::new();
    let mut dtstart = None;
    let mut dtstart_is_all_day = false;
    let mut dtend = None;
    let mut rrule_line = None;
    let mut exdates = Vec::new();
    let mut is_cancelled = false;

    for prop in &event.properties {
        match prop.name.to_uppercase().as_str() {
            "UID" => uid = prop.value.clone(),
            "SUMMARY" => summary = prop.value.clone().unwrap_or_default(),
            "LOCATION" => location = prop.value.clone().unwrap_or_default(),
            "DESCRIPTION" => description = prop.value.clone().unwrap_or_default(),
            "RRULE" => rrule_line = prop.value.clone(),
            "STATUS" => {
                is_cancelled = prop
                    .value
                    .as_deref()
                    .map(|v| v.eq_ignore_ascii_case("CANCELLED"))
                    .unwrap_or(false);
            }
            "DTSTART" => {
                let tzid = prop.params.as_ref().and_then(|p| find_tzid(p));
                let (instant, all_day) = parse_ics_datetime(prop.value.as_deref().unwrap_or(""), tzid.as_deref())?;
                dtstart = Some(instant);
                dtstart_is_all_day = all_day;
            }
            "DTEND" => {
                let tzid = prop.params.as_ref().and_then(|p| find_tzid(p));
                let (instant, _all_day) =
                    parse_ics_datetime(prop.value.as_deref().unwrap_or(""), tzid.as_deref())?;
                dtend = Some(instant);
            }
            "EXDATE" => {
                let tzid = prop.params.as_ref().and_then(|p| find_tzid(p));
                for raw_date in prop.value.as_deref().unwrap_or("").split(',') {
                    if let Ok((instant, _all_day)) = parse_ics_datetime(raw_date, tzid.as_deref()) {
                        exdates.push(instant);
                    }
                }
            }
            _ => {}
        }
    }

    let dtstart = dtstart.ok_or("missing DTSTART")?;
    let haystack = format!("{location} {description}").to_lowercase();
    let is_online_meeting = ONLINE_MEETING_MARKERS.iter().any(|m| haystack.contains(m));

    Ok(RawIcsEvent {
        uid,
        summary,
        location,
        dtstart,
        dtstart_is_all_day,
        dtend,
        duration_seconds: None,
        rrule_line,
        exdates,
        source_name: source_name.to_string(),
        is_online_meeting,
        is_cancelled,
    })
}

fn find_tzid(params: &[(String, Vec<String>)]) -> Option<String> {
    params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("TZID"))
        .and_then(|(_, v)| v.first().cloned())
}

/// Parses a DTSTART/DTEND value into a UTC instant plus an all-day flag.
/// Handles: 8-char all-day dates, `Z`-suffixed UTC, TZID-qualified local
/// times, and bare-local fallback.
pub fn parse_ics_datetime(raw: &str, tzid: Option<&str>) -> Result<(DateTime<Utc>, bool), String> {
    let raw = raw.trim();
    if raw.len() == 8 && !raw.contains('T') {
        let date = NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map_err(|e| format!("bad all-day date {raw}: {e}"))?;
        let naive = date.and_hms_opt(0, 0, 0).unwrap();
        return Ok((Utc.from_utc_datetime(&naive), true));
    }

    if let Some(stripped) = raw.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ"))
            .map_err(|e| format!("bad UTC datetime {raw}: {e}"))?;
        return Ok((Utc.from_utc_datetime(&naive), false));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S")
        .map_err(|e| format!("bad local datetime {raw}: {e}"))?;

    if let Some(tzid) = tzid {
        let tz: chrono_tz::Tz = tzid
            .parse()
            .map_err(|_| format!("unknown TZID {tzid}"))?;
        let local = tz
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| format!("ambiguous local time in {tzid}"))?;
        return Ok((local.with_timezone(&Utc), false));
    }

    // No TZID: treat as UTC fallback (conservative — avoids depending on
    // the host machine's local zone for feed content).
    Ok((Utc.from_utc_datetime(&naive), false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_day_date_parses_as_midnight_utc() {
        let (instant, all_day) = parse_ics_datetime("20260115", None).unwrap();
        assert!(all_day);
        assert_eq!(instant.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn z_suffixed_parses_as_utc() {
        let (instant, all_day) = parse_ics_datetime("20260115T093000Z", None).unwrap();
        assert!(!all_day);
        assert_eq!(instant.format("%Y%m%dT%H%M%S").to_string(), "20260115T093000");
    }

    #[test]
    fn tzid_qualified_converts_to_utc() {
        let (instant, _) =
            parse_ics_datetime("20260115T090000", Some("America/New_York")).unwrap();
        // EST is UTC-5 in January.
        assert_eq!(instant.format("%H:%M").to_string(), "14:00");
    }

    #[test]
    fn serialize_iso_uses_z_suffix() {
        let (instant, _) = parse_ics_datetime("20260115T093000Z", None).unwrap();
        assert!(serialize_iso(instant).ends_with('Z'));
    }

    #[test]
    fn parse_ics_skips_bad_event_but_keeps_good_one() {
        let text = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
SUMMARY:Broken\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:good-1\r\n\
SUMMARY:Team Sync\r\n\
DTSTART:20260115T093000Z\r\n\
DTEND:20260115T100000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
        let events = parse_ics("test-feed", text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Team Sync");
    }
}
