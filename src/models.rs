use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized calendar occurrence, produced by the refresh pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub meeting_id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub duration_seconds: i64,
    pub location: String,
    pub is_online_meeting: bool,
    pub is_cancelled: bool,
    pub raw_source: String,
}

impl Event {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::seconds(self.duration_seconds)
    }

    /// `source|start-iso` — used when the upstream feed has no stable UID.
    pub fn synthesize_id(source: &str, start: DateTime<Utc>) -> String {
        format!("{source}|{}", crate::ics_parser::serialize_iso(start))
    }
}

/// A raw record extracted from one VEVENT block, before recurrence
/// expansion and normalization. `rrule_line` carries the unparsed RRULE
/// property text through to the expander.
#[derive(Debug, Clone)]
pub struct RawIcsEvent {
    pub uid: Option<String>,
    pub summary: String,
    pub location: String,
    pub dtstart: DateTime<Utc>,
    pub dtstart_is_all_day: bool,
    pub dtend: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub rrule_line: Option<String>,
    pub exdates: Vec<DateTime<Utc>>,
    pub source_name: String,
    pub is_online_meeting: bool,
    pub is_cancelled: bool,
}

/// One descriptor of a configured ICS feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcsSource {
    pub name: String,
    pub url: String,
}

/// A meeting rendered for the `/api/whats-next` and Alexa "next meeting"
/// responses.
#[derive(Debug, Clone, Serialize)]
pub struct NextMeetingView {
    pub meeting_id: String,
    pub subject: String,
    pub start_iso: String,
    pub seconds_until_start: i64,
    pub speech_text: String,
    pub duration_spoken: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssml: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MorningSummaryRequest {
    pub date: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_detail_level")]
    pub detail_level: String,
    #[serde(default)]
    pub prefer_ssml: bool,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_detail_level() -> String {
    "standard".to_string()
}

fn default_max_events() -> usize {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct FreeBlock {
    pub start_iso: String,
    pub end_iso: String,
    pub duration_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingInsight {
    pub subject: String,
    pub start_iso: String,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MorningSummaryResult {
    pub timeframe_start_iso: String,
    pub timeframe_end_iso: String,
    pub total_meetings_equivalent: f64,
    pub early_start_flag: bool,
    pub density: String,
    pub free_blocks: Vec<FreeBlock>,
    pub back_to_back_count: u32,
    pub meeting_insights: Vec<MeetingInsight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_up_recommendation_iso: Option<String>,
    pub speech_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssml: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkipRequest {
    pub meeting_id: String,
}
