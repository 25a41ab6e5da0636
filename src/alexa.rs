use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::warn;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::errors::AppError;
use crate::models::{Event, NextMeetingView};
use crate::{prioritizer, speech};

#[derive(Debug, Deserialize)]
pub struct TzQuery {
    #[serde(default = "default_tz")]
    pub tz: String,
}

fn default_tz() -> String {
    "UTC".to_string()
}

/// Shared auth check for every `/api/alexa/*` route. Plain JSON endpoints
/// (`/api/whats-next`, `/api/health`, `/api/skip`) are deliberately left
/// open — see the Alexa Handler Base notes on why bearer enforcement stops
/// at the voice-assistant surface.
pub fn require_bearer(req: &HttpRequest, settings: &crate::config::Settings) -> Result<(), AppError> {
    let Some(expected) = &settings.alexa_bearer_token else {
        return Ok(());
    };
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let want = format!("Bearer {expected}");
    if header == want {
        Ok(())
    } else {
        Err(AppError::Authentication)
    }
}

pub fn resolve_tz(raw: &str) -> (Tz, bool) {
    match raw.parse::<Tz>() {
        Ok(tz) => (tz, false),
        Err(_) => {
            warn!("unknown timezone {raw:?}, falling back to UTC");
            (chrono_tz::UTC, true)
        }
    }
}

async fn next_qualifying(data: &AppState, now: DateTime<Utc>) -> Option<(Event, i64)> {
    let snapshot = data.window.snapshot();
    prioritizer::find_next_event(&snapshot, now, &data.skip_store)
        .await
        .map(|(event, secs)| (event.clone(), secs))
}

pub fn view_for(event: &Event, seconds_until_start: i64) -> NextMeetingView {
    NextMeetingView {
        meeting_id: event.meeting_id.clone(),
        subject: event.subject.clone(),
        start_iso: crate::ics_parser::serialize_iso(event.start),
        seconds_until_start,
        speech_text: speech::next_meeting_speech(&event.subject, seconds_until_start),
        duration_spoken: speech::duration_spoken(seconds_until_start),
        ssml: None,
    }
}

pub async fn next_meeting(data: &web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let now = data.clock.now_utc();
    let meeting = next_qualifying(data, now).await.map(|(e, s)| view_for(&e, s));
    Ok(HttpResponse::Ok().json(json!({ "meeting": meeting })))
}

pub async fn time_until_next(data: &web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let now = data.clock.now_utc();
    match next_qualifying(data, now).await {
        Some((_, seconds_until_start)) => Ok(HttpResponse::Ok().json(json!({
            "seconds_until_start": seconds_until_start,
            "duration_spoken": speech::duration_spoken(seconds_until_start),
            "speech_text": format!("Your next meeting is {}.", speech::duration_spoken(seconds_until_start)),
        }))),
        None => Ok(HttpResponse::Ok().json(json!({
            "seconds_until_start": null,
            "duration_spoken": "",
            "speech_text": "You have no upcoming meetings.",
        }))),
    }
}

struct TodayState {
    has_meetings_today: bool,
    last_start: Option<DateTime<Utc>>,
    last_end: Option<DateTime<Utc>>,
}

async fn compute_today(data: &AppState, now: DateTime<Utc>, tz: &Tz) -> TodayState {
    let today_date = now.with_timezone(tz).date_naive();
    let events = data.full_cache.snapshot();
    let mut last_start = None;
    let mut last_end = None;

    for event in events.iter() {
        if event.is_cancelled {
            continue;
        }
        if data.skip_store.is_skipped(&event.meeting_id).await {
            continue;
        }
        if event.start.with_timezone(tz).date_naive() != today_date {
            continue;
        }
        let end = event.end();
        if last_end.map(|le| end > le).unwrap_or(true) {
            last_end = Some(end);
            last_start = Some(event.start);
        }
    }

    TodayState {
        has_meetings_today: last_end.is_some(),
        last_start,
        last_end,
    }
}

fn done_for_day_speech(state: &TodayState, now: DateTime<Utc>, tz: &Tz, tz_fallback: bool) -> String {
    if !state.has_meetings_today {
        return "You have no meetings today. Enjoy your free day!".to_string();
    }
    let last_end = state.last_end.unwrap();
    if now >= last_end {
        "You're all done for today!".to_string()
    } else {
        let local_time = last_end.with_timezone(tz).time();
        let suffix = if tz_fallback { " UTC" } else { "" };
        format!("You'll be done at {}.{suffix}", speech::spoken_local_time(local_time))
    }
}

pub async fn done_for_day(data: &web::Data<AppState>, tz_raw: &str) -> Result<HttpResponse, AppError> {
    let now = data.clock.now_utc();
    let (tz, tz_fallback) = resolve_tz(tz_raw);
    let state = compute_today(data, now, &tz).await;
    let speech_text = done_for_day_speech(&state, now, &tz, tz_fallback);

    Ok(HttpResponse::Ok().json(json!({
        "has_meetings_today": state.has_meetings_today,
        "last_meeting_start_iso": state.last_start.map(crate::ics_parser::serialize_iso),
        "last_meeting_end_iso": state.last_end.map(crate::ics_parser::serialize_iso),
        "last_meeting_end_local_iso": state.last_end.map(|e| e.with_timezone(&tz).to_rfc3339()),
        "speech_text": speech_text,
    })))
}

pub async fn launch_summary(data: &web::Data<AppState>, tz_raw: &str) -> Result<HttpResponse, AppError> {
    let now = data.clock.now_utc();
    let (tz, tz_fallback) = resolve_tz(tz_raw);
    let today_date = now.with_timezone(&tz).date_naive();
    let today_state = compute_today(data, now, &tz).await;

    let events = data.full_cache.snapshot();
    let mut remaining_today: Vec<Event> = Vec::new();
    for event in events.iter() {
        if event.is_cancelled {
            continue;
        }
        if data.skip_store.is_skipped(&event.meeting_id).await {
            continue;
        }
        if event.start < now {
            continue;
        }
        if event.start.with_timezone(&tz).date_naive() == today_date {
            remaining_today.push(event.clone());
        }
    }
    remaining_today.sort_by_key(|e| e.start);

    if let Some((event, seconds_until_start)) =
        prioritizer::find_next_event(&remaining_today, now, &data.skip_store).await
    {
        let next_meeting = view_for(event, seconds_until_start);
        let done_speech = done_for_day_speech(&today_state, now, &tz, tz_fallback);
        let speech_text = format!(
            "{} {}",
            speech::next_meeting_speech(&event.subject, seconds_until_start),
            done_speech
        );
        return Ok(HttpResponse::Ok().json(json!({
            "speech_text": speech_text,
            "has_meetings_today": true,
            "next_meeting": next_meeting,
            "done_for_day": false,
        })));
    }

    if today_state.has_meetings_today {
        let speech_text = done_for_day_speech(&today_state, now, &tz, tz_fallback);
        return Ok(HttpResponse::Ok().json(json!({
            "speech_text": speech_text,
            "has_meetings_today": true,
            "next_meeting": null,
            "done_for_day": true,
        })));
    }

    let mut future: Vec<&Event> = events
        .iter()
        .filter(|e| !e.is_cancelled)
        .filter(|e| e.start >= now && e.start.with_timezone(&tz).date_naive() > today_date)
        .collect();
    future.sort_by_key(|e| e.start);

    match future.first() {
        Some(event) => {
            let seconds_until_start = (event.start - now).num_seconds();
            let speech_text = format!(
                "No meetings today, you're free until {} {}.",
                event.subject,
                speech::duration_spoken(seconds_until_start)
            );
            Ok(HttpResponse::Ok().json(json!({
                "speech_text": speech_text,
                "has_meetings_today": false,
                "next_meeting": view_for(event, seconds_until_start),
                "done_for_day": false,
            })))
        }
        None => Ok(HttpResponse::Ok().json(json!({
            "speech_text": "No meetings today. You have no upcoming meetings scheduled.",
            "has_meetings_today": false,
            "next_meeting": null,
            "done_for_day": false,
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_tz_falls_back_to_utc_on_garbage_input() {
        let (tz, fell_back) = resolve_tz("not/a/zone");
        assert_eq!(tz, chrono_tz::UTC);
        assert!(fell_back);
    }

    #[test]
    fn resolve_tz_accepts_valid_iana_zone() {
        let (_tz, fell_back) = resolve_tz("America/New_York");
        assert!(!fell_back);
    }
}
