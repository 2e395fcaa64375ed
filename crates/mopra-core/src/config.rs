use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::model::DEFAULT_MODEL;
use crate::platform::SearchPlatform;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Environment variable that overrides `server_url`
pub const SERVER_URL_ENV: &str = "MOPRA_SERVER_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_url: Option<String>,
    pub default_model: Option<String>,
    pub search_platform: Option<String>,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            default_model: Some(DEFAULT_MODEL.to_string()),
            search_platform: None,
            log_level: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Backend base URL: env var first, then config, then the local default.
    pub fn server_url(&self) -> String {
        std::env::var(SERVER_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    pub fn default_model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn search_platform(&self) -> SearchPlatform {
        self.search_platform
            .as_deref()
            .and_then(SearchPlatform::from_str)
            .unwrap_or_default()
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("mopra").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.default_model(), "phi3");
        assert_eq!(config.search_platform(), SearchPlatform::ChatGpt);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mopra").join("config.json");

        let mut config = Config::new();
        config.server_url = Some("http://10.0.0.2:5000".to_string());
        config.search_platform = Some("gemini".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.server_url.as_deref(), Some("http://10.0.0.2:5000"));
        assert_eq!(loaded.search_platform(), SearchPlatform::Gemini);
    }

    #[test]
    fn test_partial_file_fills_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"server_url": null, "default_model": null, "search_platform": "bogus", "log_level": "debug"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_model(), "phi3");
        assert_eq!(config.search_platform(), SearchPlatform::ChatGpt);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }
}
