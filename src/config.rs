//! Configuration types, read once from the environment at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::onboarding::catalog::Locale;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// HTTP server and storage.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
}

/// Generation-service settings. The service is optional: without a key
/// every turn resolves deterministically.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub enabled: bool,
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Per-call deadline; on expiry the turn falls back to the
    /// deterministic question.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    pub server: ServerConfig,
    pub llm: LlmSettings,
    pub default_locale: Locale,
    /// Upper bound for generated biographies, in characters.
    pub bio_max_chars: usize,
    /// Wait in `confirm` for a finish intent instead of finalizing as soon
    /// as the last field is set.
    pub require_confirmation: bool,
    /// Mood-feed attempt cap; 0 disables the mood prompt.
    pub mood_max_attempts: u8,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8080,
                db_path: PathBuf::from("./data/onboarding.db"),
            },
            llm: LlmSettings {
                enabled: false,
                api_key: None,
                model: DEFAULT_MODEL.to_string(),
                timeout: Duration::from_secs(8),
            },
            default_locale: Locale::En,
            bio_max_chars: 220,
            require_confirmation: false,
            mood_max_attempts: 3,
        }
    }
}

impl OnboardingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_or(&lookup, "ONBOARD_PORT", defaults.server.port)?;
        let db_path = lookup("ONBOARD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.server.db_path);

        let default_locale = match lookup("ONBOARD_DEFAULT_LOCALE") {
            Some(tag) => Locale::parse(&tag).ok_or_else(|| ConfigError::InvalidValue {
                key: "ONBOARD_DEFAULT_LOCALE".to_string(),
                message: format!("unsupported locale '{tag}'"),
            })?,
            None => defaults.default_locale,
        };

        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);
        let enabled = match lookup("ONBOARD_LLM_ENABLED") {
            Some(raw) => parse_bool("ONBOARD_LLM_ENABLED", &raw)?,
            None => api_key.is_some(),
        };
        if enabled && api_key.is_none() {
            return Err(ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()));
        }
        let model = lookup("ONBOARD_MODEL").unwrap_or(defaults.llm.model);
        let timeout_secs: u64 = parse_or(&lookup, "ONBOARD_LLM_TIMEOUT_SECS", 8)?;

        let bio_max_chars = parse_or(&lookup, "ONBOARD_BIO_MAX_CHARS", defaults.bio_max_chars)?;
        if bio_max_chars == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ONBOARD_BIO_MAX_CHARS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        let require_confirmation = match lookup("ONBOARD_REQUIRE_CONFIRMATION") {
            Some(raw) => parse_bool("ONBOARD_REQUIRE_CONFIRMATION", &raw)?,
            None => defaults.require_confirmation,
        };
        let mood_max_attempts =
            parse_or(&lookup, "ONBOARD_MOOD_MAX_ATTEMPTS", defaults.mood_max_attempts)?;

        Ok(Self {
            server: ServerConfig { port, db_path },
            llm: LlmSettings {
                enabled,
                api_key,
                model,
                timeout: Duration::from_secs(timeout_secs),
            },
            default_locale,
            bio_max_chars,
            require_confirmation,
            mood_max_attempts,
        })
    }

    /// Provider configuration, if the generation service is enabled.
    pub fn llm_config(&self) -> Option<LlmConfig> {
        if !self.llm.enabled {
            return None;
        }
        self.llm.api_key.as_ref().map(|key| LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: key.clone(),
            model: self.llm.model.clone(),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<OnboardingConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OnboardingConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.db_path, PathBuf::from("./data/onboarding.db"));
        assert_eq!(config.default_locale, Locale::En);
        assert!(!config.llm.enabled);
        assert!(config.llm_config().is_none());
        assert_eq!(config.llm.timeout, Duration::from_secs(8));
        assert_eq!(config.bio_max_chars, 220);
        assert!(!config.require_confirmation);
        assert_eq!(config.mood_max_attempts, 3);
    }

    #[test]
    fn api_key_enables_service() {
        let config = config(&[("ANTHROPIC_API_KEY", "sk-test"), ("ONBOARD_MODEL", "m")]).unwrap();
        assert!(config.llm.enabled);
        assert_eq!(config.llm_config().unwrap().model, "m");

        let off = config_off();
        assert!(off.llm_config().is_none());
    }

    fn config_off() -> OnboardingConfig {
        config(&[("ANTHROPIC_API_KEY", "sk-test"), ("ONBOARD_LLM_ENABLED", "false")]).unwrap()
    }

    #[test]
    fn enabled_without_key_is_an_error() {
        assert!(matches!(
            config(&[("ONBOARD_LLM_ENABLED", "true")]),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            config(&[("ONBOARD_PORT", "eighty")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config(&[("ONBOARD_DEFAULT_LOCALE", "tlh")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config(&[("ONBOARD_REQUIRE_CONFIRMATION", "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config(&[("ONBOARD_BIO_MAX_CHARS", "0")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn locale_tags_resolve_by_primary_subtag() {
        let config = config(&[("ONBOARD_DEFAULT_LOCALE", "zh_Hans")]).unwrap();
        assert_eq!(config.default_locale, Locale::Zh);
    }
}
