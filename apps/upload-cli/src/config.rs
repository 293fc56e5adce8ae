//! Uploader configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/resumable-upload/upload.toml`
//! - Windows: `%APPDATA%/resumable-upload/upload.toml`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use resumable_transfer::{ClientConfig, RetrySchedule, Url, default_store_path};
use serde::{Deserialize, Serialize};

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Creation endpoint of the tus server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bytes per chunk (0 = whole file in one request).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Upper bound on one request body.
    #[serde(default)]
    pub request_payload_cap: Option<u64>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Delays between attempts, in milliseconds.
    #[serde(default = "default_retry_delays")]
    pub retry_delays_ms: Vec<u64>,

    /// Forget finished uploads in the resume store.
    #[serde(default = "default_true")]
    pub remove_on_success: bool,

    /// Send PATCH as POST for proxies that drop it.
    #[serde(default)]
    pub method_override: bool,

    /// Resume store location. Defaults to the platform config directory.
    #[serde(default)]
    pub resume_store: Option<PathBuf>,

    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:1080/files/".into()
}

fn default_chunk_size() -> u64 {
    2 * 1024 * 1024
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

fn default_retry_delays() -> Vec<u64> {
    vec![500, 1000, 2000, 3000]
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            chunk_size: default_chunk_size(),
            request_payload_cap: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            retry_delays_ms: default_retry_delays(),
            remove_on_success: default_true(),
            method_override: false,
            resume_store: None,
            headers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads the configuration at the default path, writing defaults if
    /// none exists yet.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path().context("no config directory available")?;
        Self::load_from(&path)
    }

    /// Loads configuration from `path`, creating it with defaults if missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Engine settings for this configuration.
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let creation_url = Url::parse(&self.endpoint)
            .with_context(|| format!("invalid endpoint {:?}", self.endpoint))?;
        Ok(ClientConfig {
            creation_url: Some(creation_url),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            headers: self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            chunk_size: self.chunk_size,
            request_payload_cap: self.request_payload_cap,
            remove_on_success: self.remove_on_success,
            method_override: self.method_override,
        })
    }

    pub fn retry_schedule(&self) -> RetrySchedule {
        RetrySchedule::from_millis(&self.retry_delays_ms)
    }

    /// Where resume entries live.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.resume_store.clone().or_else(default_store_path)
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> Option<PathBuf> {
    resumable_transfer::config_dir().map(|d| d.join("resumable-upload").join("upload.toml"))
}
