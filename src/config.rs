use config::{Config, File};
use serde::{Deserialize, Serialize};

use crate::models::IcsSource;

const MIN_REFRESH_INTERVAL: i64 = 60;
const MAX_REFRESH_INTERVAL: i64 = 1800;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub sources: Vec<IcsSource>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: i64,
    #[serde(default = "default_rrule_expansion_days")]
    pub rrule_expansion_days: i64,
    #[serde(default = "default_event_window_size")]
    pub event_window_size: usize,
    #[serde(default = "default_server_bind")]
    pub server_bind: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default)]
    pub alexa_bearer_token: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub noninteractive: bool,
}

fn default_refresh_interval() -> i64 {
    300
}
fn default_rrule_expansion_days() -> i64 {
    14
}
fn default_event_window_size() -> usize {
    5
}
fn default_server_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Settings {
    /// Layers hard defaults, then an optional `config.yaml`/`config.json`
    /// file, then a small set of recognized environment overrides (not a
    /// generic prefix scheme — specific named variables, several with a
    /// legacy alias).
    pub fn load(explicit_config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .set_default("refresh_interval_seconds", default_refresh_interval())?
            .set_default("rrule_expansion_days", default_rrule_expansion_days())?
            .set_default("event_window_size", default_event_window_size() as i64)?
            .set_default("server_bind", default_server_bind())?
            .set_default("server_port", default_server_port() as i64)?
            .set_default("log_level", default_log_level())?
            .set_default("noninteractive", false)?;

        builder = if let Some(path) = explicit_config_path {
            builder.add_source(File::with_name(path).required(true))
        } else {
            builder
                .add_source(File::with_name("config").required(false))
        };

        let config = builder.build()?;
        let mut settings: Settings = config.try_deserialize()?;
        settings.apply_env_overrides();
        settings.refresh_interval_seconds = settings
            .refresh_interval_seconds
            .clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL);
        settings.log_level = settings.log_level.to_uppercase();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CALENDARBOT_ICS_URL") {
            if !url.is_empty() {
                self.sources = vec![IcsSource {
                    name: "default".to_string(),
                    url,
                }];
            }
        }

        if let Some(raw) = env_any(&[
            "CALENDARBOT_REFRESH_INTERVAL",
            "CALENDARBOT_REFRESH_INTERVAL_SECONDS",
        ]) {
            if let Ok(parsed) = raw.parse::<i64>() {
                self.refresh_interval_seconds = parsed;
            }
        }

        if let Some(bind) = env_any(&["CALENDARBOT_WEB_HOST", "CALENDARBOT_SERVER_BIND"]) {
            self.server_bind = bind;
        }

        if let Some(raw) = env_any(&["CALENDARBOT_WEB_PORT", "CALENDARBOT_SERVER_PORT"]) {
            if let Ok(parsed) = raw.parse::<u16>() {
                self.server_port = parsed;
            }
        }

        if let Ok(raw) = std::env::var("CALENDARBOT_NONINTERACTIVE") {
            self.noninteractive = matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Ok(token) = std::env::var("CALENDARBOT_ALEXA_BEARER_TOKEN") {
            if !token.is_empty() {
                self.alexa_bearer_token = Some(token);
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_bind, self.server_port)
    }
}

fn env_any(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| std::env::var(name).ok())
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            sources: Vec::new(),
            refresh_interval_seconds: default_refresh_interval(),
            rrule_expansion_days: default_rrule_expansion_days(),
            event_window_size: default_event_window_size(),
            server_bind: default_server_bind(),
            server_port: default_server_port(),
            alexa_bearer_token: None,
            log_level: default_log_level(),
            noninteractive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.refresh_interval_seconds, 300);
        assert_eq!(settings.rrule_expansion_days, 14);
        assert_eq!(settings.event_window_size, 5);
        assert_eq!(settings.server_bind, "0.0.0.0");
        assert_eq!(settings.server_port, 8080);
    }

    #[test]
    fn refresh_interval_is_clamped() {
        let mut settings = Settings::default();
        settings.refresh_interval_seconds = 5;
        let clamped = settings
            .refresh_interval_seconds
            .clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL);
        assert_eq!(clamped, MIN_REFRESH_INTERVAL);
    }
}
