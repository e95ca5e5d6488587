use super::models::LogLevel;
use crate::audio_resume::VoiceType;

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}

pub(crate) fn default_translation_id() -> String {
    "KJV".to_string()
}

pub(crate) fn default_auto_dismiss_delay_ms() -> u64 {
    1500
}

pub(crate) fn default_tick_interval_ms() -> u64 {
    50
}

pub(crate) fn default_analysis_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

pub(crate) fn default_analysis_model() -> String {
    "gpt-4o-mini".to_string()
}

pub(crate) fn default_analysis_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

pub(crate) fn default_analysis_temperature() -> f32 {
    0.4
}

pub(crate) fn default_analysis_max_tokens() -> u32 {
    900
}

pub(crate) fn default_analysis_request_timeout_secs() -> u64 {
    60
}

pub(crate) fn default_cache_dir() -> String {
    crate::cache::DEFAULT_CACHE_DIR.to_string()
}

pub(crate) fn default_voice() -> VoiceType {
    VoiceType::Natural
}
