//! Configuration system for kairos.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{KairosError, KairosResult};
use crate::traits::LlmConfig;

/// Longest analysis window accepted by [`EngineConfig::validate`].
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// No LLM; themes are never extracted.
    None,
    #[default]
    Anthropic,
    OpenAI,
}

/// Provider configuration with type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider type.
    pub provider: LlmProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: LlmConfig,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            config: LlmConfig {
                model: "claude-3-5-haiku-20241022".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Numeric gates of the phase state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    /// Minimum account age before leaving observer.
    pub architect_min_account_days: i64,
    /// Depth needed for the read-only observer -> architect inference.
    pub architect_min_depth: u32,
    /// Themes needed for a committed observer -> architect transition.
    pub architect_min_themes: usize,
    /// Depth needed for a committed observer -> architect transition.
    pub architect_commit_min_depth: u32,
    /// Days in architect before oracle.
    pub oracle_min_days_in_phase: i64,
    pub oracle_min_depth: u32,
    pub oracle_min_consistency: u32,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            architect_min_account_days: 14,
            architect_min_depth: 5,
            architect_min_themes: 3,
            architect_commit_min_depth: 4,
            oracle_min_days_in_phase: 30,
            oracle_min_depth: 7,
            oracle_min_consistency: 60,
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Days of events analysed per snapshot.
    pub window_days: i64,
    /// Hard timeout for one theme extraction call.
    pub theme_timeout_ms: u64,
    /// Reflective events required before the LLM is asked for themes.
    pub min_theme_events: usize,
    /// Most recent reflective texts sent to the LLM.
    pub theme_text_limit: usize,
    /// Memories requested from the vector memory service.
    pub memory_limit: usize,
    /// Offset from UTC used to bucket habit ticks by hour of day.
    pub timezone_offset_minutes: i32,
    /// Use lexicon themes for the observer gate when the LLM path degrades.
    pub lexical_theme_fallback: bool,
    /// Phase gates.
    pub phase: PhaseThresholds,
    /// LLM used for theme extraction.
    pub llm: LlmProviderConfig,
    /// SQLite database used by the bundled backend.
    pub database_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let kairos_dir = dirs::home_dir()
            .map(|h| h.join(".kairos"))
            .unwrap_or_else(|| PathBuf::from(".kairos"));

        Self {
            window_days: 30,
            theme_timeout_ms: 10_000,
            min_theme_events: 3,
            theme_text_limit: 20,
            memory_limit: 20,
            timezone_offset_minutes: 0,
            lexical_theme_fallback: true,
            phase: PhaseThresholds::default(),
            llm: LlmProviderConfig::default(),
            database_path: kairos_dir.join("kairos.db"),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> KairosResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| KairosError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| KairosError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| KairosError::Configuration(e.to_string()))?,
            _ => {
                return Err(KairosError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> KairosResult<Self> {
        let mut config = Self::default();

        if let Some(days) = env_parse::<i64>("KAIROS_WINDOW_DAYS")? {
            config.window_days = days;
        }
        if let Some(ms) = env_parse::<u64>("KAIROS_THEME_TIMEOUT_MS")? {
            config.theme_timeout_ms = ms;
        }
        if let Some(offset) = env_parse::<i32>("KAIROS_TZ_OFFSET_MINUTES")? {
            config.timezone_offset_minutes = offset;
        }
        if let Ok(path) = std::env::var("KAIROS_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }

        // LLM configuration
        if let Ok(provider) = std::env::var("KAIROS_LLM_PROVIDER") {
            config.llm.provider = match provider.to_lowercase().as_str() {
                "anthropic" => LlmProvider::Anthropic,
                "openai" => LlmProvider::OpenAI,
                "none" | "off" => LlmProvider::None,
                other => {
                    return Err(KairosError::UnsupportedProvider {
                        provider: other.to_string(),
                    })
                }
            };
        }
        if let Ok(model) = std::env::var("KAIROS_LLM_MODEL") {
            config.llm.config.model = model;
        }
        let key_var = match config.llm.provider {
            LlmProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            LlmProvider::OpenAI => Some("OPENAI_API_KEY"),
            LlmProvider::None => None,
        };
        if let Some(api_key) = key_var.and_then(|v| std::env::var(v).ok()) {
            config.llm.config.api_key = Some(api_key);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> KairosResult<()> {
        if self.window_days <= 0 || self.window_days > MAX_WINDOW_DAYS {
            return Err(KairosError::validation_with_suggestion(
                format!(
                    "window_days must be between 1 and {}, got {}",
                    MAX_WINDOW_DAYS, self.window_days
                ),
                "Use the default of 30 days",
            ));
        }
        if self.theme_timeout_ms == 0 {
            return Err(KairosError::validation("theme_timeout_ms must be non-zero"));
        }
        if self.timezone_offset_minutes.abs() >= 24 * 60 {
            return Err(KairosError::validation(format!(
                "timezone_offset_minutes out of range: {}",
                self.timezone_offset_minutes
            )));
        }
        Ok(())
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> KairosResult<Option<T>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| KairosError::Configuration(format!("{} has an invalid value: {}", var, raw))),
        Err(_) => Ok(None),
    }
}

/// Builder for EngineConfig.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the analysis window.
    pub fn window_days(mut self, days: i64) -> Self {
        self.config.window_days = days;
        self
    }

    /// Set the theme extraction timeout.
    pub fn theme_timeout_ms(mut self, ms: u64) -> Self {
        self.config.theme_timeout_ms = ms;
        self
    }

    /// Set the timezone offset used for hour-of-day bucketing.
    pub fn timezone_offset_minutes(mut self, minutes: i32) -> Self {
        self.config.timezone_offset_minutes = minutes;
        self
    }

    /// Enable or disable the lexical theme fallback.
    pub fn lexical_theme_fallback(mut self, enabled: bool) -> Self {
        self.config.lexical_theme_fallback = enabled;
        self
    }

    /// Set phase thresholds.
    pub fn phase(mut self, thresholds: PhaseThresholds) -> Self {
        self.config.phase = thresholds;
        self
    }

    /// Set LLM configuration.
    pub fn llm(mut self, config: LlmProviderConfig) -> Self {
        self.config.llm = config;
        self
    }

    /// Set database path.
    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database_path = path;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
