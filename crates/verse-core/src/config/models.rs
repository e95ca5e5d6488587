use crate::audio_resume::VoiceType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Flattened application configuration. On disk it is grouped into tables,
/// see `tables.rs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_translation_id")]
    pub translation_id: String,
    #[serde(default = "crate::config::defaults::default_auto_dismiss_delay_ms")]
    pub auto_dismiss_delay_ms: u64,
    #[serde(default = "crate::config::defaults::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "crate::config::defaults::default_analysis_endpoint")]
    pub analysis_endpoint: String,
    #[serde(default = "crate::config::defaults::default_analysis_model")]
    pub analysis_model: String,
    #[serde(default = "crate::config::defaults::default_analysis_api_key_env")]
    pub analysis_api_key_env: String,
    #[serde(default = "crate::config::defaults::default_analysis_temperature")]
    pub analysis_temperature: f32,
    #[serde(default = "crate::config::defaults::default_analysis_max_tokens")]
    pub analysis_max_tokens: u32,
    #[serde(default = "crate::config::defaults::default_analysis_request_timeout_secs")]
    pub analysis_request_timeout_secs: u64,
    #[serde(default = "crate::config::defaults::default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "crate::config::defaults::default_voice")]
    pub default_voice: VoiceType,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            translation_id: crate::config::defaults::default_translation_id(),
            auto_dismiss_delay_ms: crate::config::defaults::default_auto_dismiss_delay_ms(),
            tick_interval_ms: crate::config::defaults::default_tick_interval_ms(),
            analysis_endpoint: crate::config::defaults::default_analysis_endpoint(),
            analysis_model: crate::config::defaults::default_analysis_model(),
            analysis_api_key_env: crate::config::defaults::default_analysis_api_key_env(),
            analysis_temperature: crate::config::defaults::default_analysis_temperature(),
            analysis_max_tokens: crate::config::defaults::default_analysis_max_tokens(),
            analysis_request_timeout_secs:
                crate::config::defaults::default_analysis_request_timeout_secs(),
            cache_dir: crate::config::defaults::default_cache_dir(),
            default_voice: crate::config::defaults::default_voice(),
        }
    }
}

impl AppConfig {
    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }

    /// Clamp values that would make the reader misbehave.
    pub fn sanitize(&mut self) {
        self.translation_id = self.translation_id.trim().to_ascii_uppercase();
        if self.translation_id.is_empty() {
            self.translation_id = crate::config::defaults::default_translation_id();
        }
        self.auto_dismiss_delay_ms = self.auto_dismiss_delay_ms.min(60_000);
        self.tick_interval_ms = self.tick_interval_ms.clamp(10, 1000);
        self.analysis_temperature = self.analysis_temperature.clamp(0.0, 2.0);
        self.analysis_max_tokens = self.analysis_max_tokens.clamp(16, 8192);
        self.analysis_request_timeout_secs = self.analysis_request_timeout_secs.clamp(5, 600);
        if self.cache_dir.trim().is_empty() {
            self.cache_dir = crate::config::defaults::default_cache_dir();
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
