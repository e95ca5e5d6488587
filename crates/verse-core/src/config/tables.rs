use super::defaults;
use super::models::{AppConfig, LogLevel};
use crate::audio_resume::VoiceType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    reader: ReaderConfig,
    #[serde(default)]
    insight: InsightConfig,
    #[serde(default)]
    analysis: AnalysisConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    audio: AudioConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            log_level: tables.logging.log_level,
            translation_id: tables.reader.translation_id,
            auto_dismiss_delay_ms: tables.insight.auto_dismiss_delay_ms,
            tick_interval_ms: tables.insight.tick_interval_ms,
            analysis_endpoint: tables.analysis.endpoint,
            analysis_model: tables.analysis.model,
            analysis_api_key_env: tables.analysis.api_key_env,
            analysis_temperature: tables.analysis.temperature,
            analysis_max_tokens: tables.analysis.max_tokens,
            analysis_request_timeout_secs: tables.analysis.request_timeout_secs,
            cache_dir: tables.storage.cache_dir,
            default_voice: tables.audio.default_voice,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            reader: ReaderConfig {
                translation_id: config.translation_id.clone(),
            },
            insight: InsightConfig {
                auto_dismiss_delay_ms: config.auto_dismiss_delay_ms,
                tick_interval_ms: config.tick_interval_ms,
            },
            analysis: AnalysisConfig {
                endpoint: config.analysis_endpoint.clone(),
                model: config.analysis_model.clone(),
                api_key_env: config.analysis_api_key_env.clone(),
                temperature: config.analysis_temperature,
                max_tokens: config.analysis_max_tokens,
                request_timeout_secs: config.analysis_request_timeout_secs,
            },
            storage: StorageConfig {
                cache_dir: config.cache_dir.clone(),
            },
            audio: AudioConfig {
                default_voice: config.default_voice,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ReaderConfig {
    #[serde(default = "defaults::default_translation_id")]
    translation_id: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            translation_id: defaults::default_translation_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct InsightConfig {
    #[serde(default = "defaults::default_auto_dismiss_delay_ms")]
    auto_dismiss_delay_ms: u64,
    #[serde(default = "defaults::default_tick_interval_ms")]
    tick_interval_ms: u64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            auto_dismiss_delay_ms: defaults::default_auto_dismiss_delay_ms(),
            tick_interval_ms: defaults::default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct AnalysisConfig {
    #[serde(default = "defaults::default_analysis_endpoint")]
    endpoint: String,
    #[serde(default = "defaults::default_analysis_model")]
    model: String,
    #[serde(default = "defaults::default_analysis_api_key_env")]
    api_key_env: String,
    #[serde(default = "defaults::default_analysis_temperature")]
    temperature: f32,
    #[serde(default = "defaults::default_analysis_max_tokens")]
    max_tokens: u32,
    #[serde(default = "defaults::default_analysis_request_timeout_secs")]
    request_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::default_analysis_endpoint(),
            model: defaults::default_analysis_model(),
            api_key_env: defaults::default_analysis_api_key_env(),
            temperature: defaults::default_analysis_temperature(),
            max_tokens: defaults::default_analysis_max_tokens(),
            request_timeout_secs: defaults::default_analysis_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct StorageConfig {
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: defaults::default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct AudioConfig {
    #[serde(default = "defaults::default_voice")]
    default_voice: VoiceType,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_voice: defaults::default_voice(),
        }
    }
}
