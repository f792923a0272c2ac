//! Application configuration management.
//!
//! Configuration is stored at `~/.config/storeadmin/config.json` and can be
//! overridden with `STOREADMIN_*` environment variables. The file-backed
//! session record lives in the cache directory.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{
    CredentialStore, FilePersistence, KeyringPersistence, MemoryPersistence, TokenPersistence,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "storeadmin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_BASE_URL: &str = "https://api.escuelajs.co/api/v1";

/// HTTP request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where the credential record is persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for TokenBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(TokenBackend::File),
            "keyring" => Ok(TokenBackend::Keyring),
            "memory" => Ok(TokenBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown token backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub token_backend: TokenBackend,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `STOREADMIN_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("STOREADMIN_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(secs) = lookup("STOREADMIN_TIMEOUT_SECS") {
            let secs = secs
                .parse()
                .with_context(|| format!("Invalid STOREADMIN_TIMEOUT_SECS: {}", secs))?;
            self.request_timeout_secs = Some(secs);
        }
        if let Some(backend) = lookup("STOREADMIN_TOKEN_BACKEND") {
            self.token_backend = backend.parse()?;
        }
        Ok(())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn persistence(&self) -> Result<Box<dyn TokenPersistence>> {
        Ok(match self.token_backend {
            TokenBackend::File => Box::new(FilePersistence::new(self.cache_dir()?)),
            TokenBackend::Keyring => Box::new(KeyringPersistence::new()),
            TokenBackend::Memory => Box::new(MemoryPersistence::new()),
        })
    }

    /// Open the credential store for the configured backend
    pub fn open_store(&self) -> Result<CredentialStore> {
        Ok(CredentialStore::open(self.persistence()?))
    }
}
