use actix_web::{web, HttpResponse, Result};
use serde_json::json;

use crate::app_state::AppState;
use crate::errors::AppError;
use crate::models::{MorningSummaryRequest, SkipRequest};
use crate::{alexa, prioritizer};

pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("../static/dashboard.html"))
}

pub async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    let now = data.clock.now_utc();
    let status = data.health.status(now);

    let body = json!({
        "status": status.status,
        "server_time_iso": status.server_time_iso,
        "server_status": {
            "uptime_s": status.uptime_s,
            "pid": status.pid,
        },
        "data_status": {
            "event_count": status.event_count,
            "last_refresh_success_age_s": status.last_refresh_success_age_s,
        },
        "background_tasks": status.background_tasks,
        "system_diagnostics": {
            "platform": std::env::consts::OS,
            "runtime_version": env!("CARGO_PKG_VERSION"),
            "event_loop_running": true,
        },
    });

    if status.is_healthy() {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn whats_next(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let now = data.clock.now_utc();
    let snapshot = data.window.snapshot();
    let meeting = prioritizer::find_next_event(&snapshot, now, &data.skip_store)
        .await
        .map(|(event, seconds_until_start)| alexa::view_for(event, seconds_until_start));
    Ok(HttpResponse::Ok().json(json!({ "meeting": meeting })))
}

pub async fn skip_meeting(
    body: web::Json<SkipRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if body.meeting_id.trim().is_empty() {
        return Err(AppError::Validation("meeting_id must not be empty".to_string()));
    }
    let expiry_iso = data.skip_store.add_skip(&body.meeting_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "meeting_id": body.meeting_id, "expires_at": expiry_iso })))
}

pub async fn clear_skips(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let count = data.skip_store.clear_all().await?;
    Ok(HttpResponse::Ok().json(json!({ "cleared": count })))
}

pub async fn clear_skips_and_refresh(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let count = data.skip_store.clear_all().await?;
    data.refresh.run_once().await;
    Ok(HttpResponse::Ok().json(json!({ "cleared": count, "refreshed": true })))
}

pub async fn alexa_next_meeting(
    req: actix_web::HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    alexa::require_bearer(&req, &data.settings)?;
    alexa::next_meeting(&data).await
}

pub async fn alexa_time_until_next(
    req: actix_web::HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    alexa::require_bearer(&req, &data.settings)?;
    alexa::time_until_next(&data).await
}

pub async fn alexa_done_for_day(
    req: actix_web::HttpRequest,
    query: web::Query<alexa::TzQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    alexa::require_bearer(&req, &data.settings)?;
    alexa::done_for_day(&data, &query.tz).await
}

pub async fn alexa_launch_summary(
    req: actix_web::HttpRequest,
    query: web::Query<alexa::TzQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    alexa::require_bearer(&req, &data.settings)?;
    alexa::launch_summary(&data, &query.tz).await
}

pub async fn alexa_morning_summary(
    req: actix_web::HttpRequest,
    query: web::Query<MorningSummaryRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    alexa::require_bearer(&req, &data.settings)?;
    let now = data.clock.now_utc();
    let events = data.full_cache.snapshot();
    let result = data.morning_summary.analyze(&events, &query, now).await?;
    Ok(HttpResponse::Ok().json(result))
}
