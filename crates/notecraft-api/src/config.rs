//! Configuration loading and management

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Main configuration for the API service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Origins allowed to call the API from a browser (with credentials)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Provider table holding notes
    #[serde(default = "default_notes_table")]
    pub notes_table: String,

    /// Timeout for each call to the provider, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "https://note-craft-inky.vercel.app".to_string(),
    ]
}

fn default_notes_table() -> String {
    notecraft_core::notes::NOTES_TABLE.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            notes_table: default_notes_table(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from the config directory
    pub fn load(config_path: &str) -> Result<Self> {
        let config_file = Path::new(config_path).join("config.json");

        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| "Failed to parse config.json")?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            Ok(config)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_file
            );
            let config = Config::default();

            std::fs::create_dir_all(config_path)
                .with_context(|| format!("Failed to create config directory: {}", config_path))?;

            // Write default config for reference
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            Ok(config)
        }
    }
}

/// Credentials for the identity/storage provider.
#[derive(Clone)]
pub struct ProviderSettings {
    pub url: Url,
    pub anon_key: String,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

impl ProviderSettings {
    /// Validate provider URL and anon key as given on the command line or environment.
    ///
    /// Returns `Ok(None)` when either is absent or blank.
    pub fn from_parts(url: Option<&str>, anon_key: Option<&str>) -> Result<Option<Self>> {
        let url = url.map(str::trim).filter(|s| !s.is_empty());
        let anon_key = anon_key.map(str::trim).filter(|s| !s.is_empty());

        let (Some(url), Some(anon_key)) = (url, anon_key) else {
            return Ok(None);
        };
        let url = Url::parse(url).with_context(|| format!("Invalid provider URL: {}", url))?;

        Ok(Some(Self {
            url,
            anon_key: anon_key.to_string(),
        }))
    }
}
