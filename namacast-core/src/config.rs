use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub session: SessionConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// The `user_session` cookie value for an authenticated broadcaster account
    pub user_session: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_live_base_url")]
    pub live_base_url: String,
    #[serde(default = "default_community_base_url")]
    pub community_base_url: String,
    #[serde(default = "default_ad_base_url")]
    pub ad_base_url: String,
}

fn default_live_base_url() -> String {
    "https://live2.nicovideo.jp".to_string()
}

fn default_community_base_url() -> String {
    "https://com.nicovideo.jp".to_string()
}

fn default_ad_base_url() -> String {
    "https://api.nicoad.nicovideo.jp".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            live_base_url: default_live_base_url(),
            community_base_url: default_community_base_url(),
            ad_base_url: default_ad_base_url(),
        }
    }
}

impl Config {
    /// Get the configuration directory path (~/.config/namacast/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/namacast/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or if required fields are missing.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            // Write template config
            fs::write(&config_path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;

        // Validate required fields
        if config.session.user_session.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "session.user_session".to_string(),
            });
        }

        Ok(config)
    }
}

const CONFIG_TEMPLATE: &str = r##"# Namacast Configuration
# ~/.config/namacast/config.toml

[session]
# Required: the user_session cookie value of a logged-in broadcaster account
user_session = ""

[api]
live_base_url = "https://live2.nicovideo.jp"
community_base_url = "https://com.nicovideo.jp"
ad_base_url = "https://api.nicoad.nicovideo.jp"
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [session]
            user_session = "user_session_1234_abcd"
            "#,
        )
        .unwrap();
        assert_eq!(config.session.user_session, "user_session_1234_abcd");
        assert_eq!(config.api.live_base_url, "https://live2.nicovideo.jp");
        assert_eq!(config.api.community_base_url, "https://com.nicovideo.jp");
        assert_eq!(config.api.ad_base_url, "https://api.nicoad.nicovideo.jp");
    }

    #[test]
    fn test_parse_overridden_api_urls() {
        let config: Config = toml::from_str(
            r#"
            [session]
            user_session = "abc"

            [api]
            live_base_url = "http://127.0.0.1:8080"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.live_base_url, "http://127.0.0.1:8080");
        assert_eq!(config.api.ad_base_url, "https://api.nicoad.nicovideo.jp");
    }

    #[test]
    fn test_template_parses() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert!(config.session.user_session.is_empty());
    }
}
