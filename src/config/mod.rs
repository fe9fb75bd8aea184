//! Configuration management for gcn
//!
//! Read from `config.toml` in the platform config directory (for example
//! `~/.config/gcn/config.toml`). Every section falls back to its defaults, so
//! a partial file only overrides what it names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub metadata: MetadataConfig,
    pub status: StatusConfig,
    pub upload: UploadConfig,
    pub session: SessionConfig,
}

/// Where the REST backend lives
///
/// One base URL serves every endpoint. The optional overrides exist for
/// deployments that still run the log and auth services on a separate port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub logs_base_url: Option<String>,
    pub auth_base_url: Option<String>,
    /// Per-request timeout in seconds (uploads are exempt)
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            logs_base_url: None,
            auth_base_url: None,
            timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    pub fn logs_url(&self) -> &str {
        self.logs_base_url.as_deref().unwrap_or(&self.base_url)
    }

    pub fn auth_url(&self) -> &str {
        self.auth_base_url.as_deref().unwrap_or(&self.base_url)
    }
}

/// How a proxy wraps the fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyFormat {
    /// Body is the page HTML
    Raw,
    /// Body is a JSON object whose `contents` field holds the HTML
    Json,
}

/// A CORS proxy used to read third-party pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub name: String,
    /// `{url}` is replaced by the target URL, `{url_encoded}` by its
    /// percent-encoded form
    pub template: String,
    pub format: ProxyFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,
    /// Delay between consecutive link fetches of one message
    pub stagger_ms: u64,
    pub timeout_secs: u64,
    pub proxies: Vec<ProxyConfig>,
    /// Request the page directly once every proxy failed
    pub direct_lookup: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stagger_ms: 1000,
            timeout_secs: 10,
            proxies: vec![
                ProxyConfig {
                    name: "allorigins".to_string(),
                    template: "https://api.allorigins.win/get?url={url_encoded}".to_string(),
                    format: ProxyFormat::Json,
                },
                ProxyConfig {
                    name: "cors-anywhere".to_string(),
                    template: "https://cors-anywhere.herokuapp.com/{url}".to_string(),
                    format: ProxyFormat::Raw,
                },
                ProxyConfig {
                    name: "cors.sh".to_string(),
                    template: "https://proxy.cors.sh/{url}".to_string(),
                    format: ProxyFormat::Raw,
                },
            ],
            direct_lookup: true,
        }
    }
}

impl MetadataConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

/// Status banner polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub hide_after_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 500,
            hide_after_ms: 3000,
        }
    }
}

impl StatusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn hide_after(&self) -> Duration {
        Duration::from_millis(self.hide_after_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Bytes per streamed chunk; progress is reported once per chunk
    pub chunk_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_recent_queries: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_recent_queries: 20,
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "gcn") {
            let config_dir = proj_dirs.config_dir();
            std::fs::create_dir_all(config_dir)?;
            Ok(config_dir.join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Directory for persisted client state (session, logs)
    pub fn data_dir() -> Result<PathBuf> {
        let dir = match directories::ProjectDirs::from("", "", "gcn") {
            Some(proj_dirs) => proj_dirs.data_dir().to_path_buf(),
            None => PathBuf::from(".gcn"),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(dir)
    }
}
