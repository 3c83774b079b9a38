use anyhow::{Context, Result};

use crate::llm_client::{LlmSettings, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Nothing is required: without `OPENAI_API_KEY` every letter uses the template.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub port: u16,
    pub rust_log: String,
    pub app_env: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            openai_model: DEFAULT_MODEL.to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            app_env: "production".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        Ok(Config {
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_base_url: optional_env("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: optional_env("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            app_env: std::env::var("APP_ENV").unwrap_or(defaults.app_env),
        })
    }

    /// Development mode exposes failure details in error responses.
    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
            ..LlmSettings::default()
        }
    }
}

/// Reads a variable, treating blank values as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_mode_is_case_insensitive() {
        let config = Config {
            app_env: "Development".to_string(),
            ..Config::default()
        };
        assert!(config.is_development());
        assert!(!Config::default().is_development());
    }

    #[test]
    fn test_llm_settings_carry_credentials() {
        let config = Config {
            openai_api_key: Some("sk-test".to_string()),
            openai_model: "gpt-4o-mini".to_string(),
            ..Config::default()
        };
        let settings = config.llm_settings();
        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }
}
