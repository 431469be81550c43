use crate::services::providers::gemini::GEMINI_API_BASE;
use serde::Deserialize;
use chat_core::config as core_config;
use chat_core::error::AppError;
use std::env;

/// Default model for answers.
const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub storage: StorageConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub api_key: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Which backend answers prompts
    pub provider: ProviderBackend,
    /// Model answering prompts (e.g., gemini-3-pro-preview)
    pub text_model: String,
    /// Whether answers are streamed in as they are generated
    pub streaming: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted history
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    pub backend: SpeechBackend,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderBackend {
    Gemini,
    Mock,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    None,
    Mock,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;
        let is_prod = common_config.is_prod();

        Ok(ChatConfig {
            common: common_config,
            google: GoogleConfig {
                // An empty key is accepted here and reported by the provider.
                api_key: get_env("GOOGLE_API_KEY", Some(""), is_prod)?,
                api_base: get_env("CHAT_API_BASE", Some(GEMINI_API_BASE), is_prod)?,
            },
            models: ModelConfig {
                provider: get_env("CHAT_PROVIDER", Some("gemini"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                text_model: get_env("CHAT_TEXT_MODEL", Some(DEFAULT_TEXT_MODEL), is_prod)?,
                streaming: parse_bool(&get_env("CHAT_STREAMING", Some("true"), is_prod)?)
                    .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            storage: StorageConfig {
                data_dir: get_env("CHAT_DATA_DIR", Some("data"), is_prod)?,
            },
            speech: SpeechConfig {
                backend: get_env("CHAT_SPEECH_BACKEND", Some("none"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
        })
    }
}

impl std::str::FromStr for ProviderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderBackend::Gemini),
            "mock" => Ok(ProviderBackend::Mock),
            _ => Err(format!("Invalid answer provider: {}", s)),
        }
    }
}

impl std::str::FromStr for SpeechBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(SpeechBackend::None),
            "mock" => Ok(SpeechBackend::Mock),
            _ => Err(format!("Invalid speech backend: {}", s)),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(format!("Invalid boolean: {}", value)),
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
