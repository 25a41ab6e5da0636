use std::sync::Arc;

use crate::config::Settings;
use crate::event_window::EventWindow;
use crate::health::HealthTracker;
use crate::morning_summary::MorningSummaryAnalyzer;
use crate::refresh::{FullEventCache, RefreshPipeline};
use crate::skip_store::SkipStore;
use crate::time_source::Clock;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub window: Arc<EventWindow>,
    pub full_cache: Arc<FullEventCache>,
    pub health: Arc<HealthTracker>,
    pub skip_store: Arc<SkipStore>,
    pub clock: Arc<dyn Clock>,
    pub refresh: Arc<RefreshPipeline>,
    pub morning_summary: Arc<MorningSummaryAnalyzer>,
}
