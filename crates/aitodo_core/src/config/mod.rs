use crate::ai::provider::DEFAULT_TIMEOUT;
use crate::error::AppError;
use crate::filter::TagFilterMode;
use crate::storage::json_store;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "AITODO_CONFIG_PATH";
/// Provider-independent credential variable, checked before the provider's own.
pub const API_KEY_ENV_VAR: &str = "AITODO_API_KEY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Anthropic,
}

impl ProviderKind {
    pub fn from_name(raw: &str) -> Option<Self> {
        match canonical_name(raw)?.as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn default_key_env(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

pub fn tag_filter_mode_from_name(raw: &str) -> Option<TagFilterMode> {
    match canonical_name(raw)?.as_str() {
        "tag_only" | "tag" | "short_circuit" => Some(TagFilterMode::TagOnly),
        "all" | "and" | "strict" => Some(TagFilterMode::All),
        _ => None,
    }
}

/// Lowercase, collapse punctuation runs to `_`, trim underscores.
pub fn canonical_name(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Environment variable holding the credential; defaults per provider.
    pub api_key_env: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            api_key_env: None,
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_key_env())
    }

    /// Credential lookup: explicit value, then `AITODO_API_KEY`, then the
    /// provider variable. Blank values count as absent.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Option<String> {
        let non_blank = |value: String| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        explicit
            .map(str::to_string)
            .and_then(non_blank)
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok().and_then(non_blank))
            .or_else(|| std::env::var(self.key_env()).ok().and_then(non_blank))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: Option<PathBuf>,
    pub tag_filter: TagFilterMode,
    pub ai: AiConfig,
}

impl Config {
    /// `AITODO_STORE_PATH`, then the configured path, then the platform default.
    pub fn store_path(&self) -> Result<PathBuf, AppError> {
        if let Some(path) = json_store::store_path_from_env() {
            return Ok(path);
        }
        match self.store_path.as_ref() {
            Some(path) => Ok(path.clone()),
            None => json_store::store_path(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub store_path: Option<PathBuf>,
    pub tag_filter: Option<TagFilterMode>,
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub api_key_env: Option<String>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("aitodo").join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("aitodo")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();

    if let Some(path) = overrides.store_path.as_ref() {
        merged.store_path = Some(path.clone());
    }
    if let Some(mode) = overrides.tag_filter {
        merged.tag_filter = mode;
    }
    if let Some(provider) = overrides.provider {
        merged.ai.provider = provider;
    }
    if let Some(model) = overrides.model.as_ref() {
        merged.ai.model = Some(model.clone());
    }
    if let Some(url) = overrides.base_url.as_ref() {
        merged.ai.base_url = Some(url.clone());
    }
    if let Some(timeout_secs) = overrides.timeout_secs {
        merged.ai.timeout_secs = timeout_secs;
    }
    if let Some(key_env) = overrides.api_key_env.as_ref() {
        merged.ai.api_key_env = Some(key_env.clone());
    }

    merged
}
