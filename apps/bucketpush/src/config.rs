//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/bucketpush/config.toml`
//! - Windows: `%APPDATA%/bucketpush/config.toml`
//!
//! `BUCKETPUSH_TOKEN` and `BUCKETPUSH_BASE_URL` override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bucketpush_protocol::types::StorageProtocol;
use bucketpush_upload::ClientConfig;

pub const TOKEN_ENV: &str = "BUCKETPUSH_TOKEN";
pub const BASE_URL_ENV: &str = "BUCKETPUSH_BASE_URL";

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Protocol used when none is given on the command line.
    #[serde(default = "default_protocol")]
    pub default_protocol: StorageProtocol,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// API connection settings.
    #[serde(default)]
    pub api: ClientConfig,
}

fn default_protocol() -> StorageProtocol {
    StorageProtocol::Ipfs
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_protocol: default_protocol(),
            organization_id: None,
            api: ClientConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds the API token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Applies environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.api.token = token;
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.api.base_url = url;
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")?;
        Ok(PathBuf::from(appdata).join("bucketpush").join("config.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("bucketpush")
            .join("config.toml"))
    }
}
