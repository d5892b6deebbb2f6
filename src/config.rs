use crate::error::{ProviderError, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// API keys for the sources that require one. A missing key is not a
/// startup failure — the affected adapter reports a configuration error
/// when it is actually called.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub trove_api_key: Option<String>,
    pub europeana_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        // .env is optional; real environment variables win either way
        let _ = dotenv::dotenv();
        Credentials {
            trove_api_key: std::env::var("TROVE_API_KEY").ok().filter(|k| !k.is_empty()),
            europeana_api_key: std::env::var("EUROPEANA_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig { timeout_seconds: 10 }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Load `config.toml` when present, defaults otherwise.
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        if !std::path::Path::new(config_path).exists() {
            return Ok(Config::default());
        }
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ProviderError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;
        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }
}
