//! Backends that keep the credential record across restarts.
//!
//! Every backend stores the whole [`PersistedSession`] as one unit, so a
//! reader never sees a fresh access token next to a stale refresh token.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tokens::CredentialPair;

/// Stable identifier the record is stored under
pub const STORE_KEY: &str = "auth";

/// Keychain service name for the keyring backend
const SERVICE_NAME: &str = "storeadmin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub session_ended: bool,
    pub saved_at: DateTime<Utc>,
}

impl PersistedSession {
    pub fn new(pair: &CredentialPair, session_ended: bool) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            session_ended,
            saved_at: Utc::now(),
        }
    }

    pub fn pair(&self) -> CredentialPair {
        CredentialPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

pub trait TokenPersistence: Send + Sync {
    /// Load the stored record, `None` if nothing has been saved yet
    fn load(&self) -> Result<Option<PersistedSession>>;

    /// Replace the stored record as a single write
    fn save(&self, record: &PersistedSession) -> Result<()>;

    /// Short backend name for status output
    fn describe(&self) -> String;
}

/// JSON file in a directory, replaced via temp file + rename.
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", STORE_KEY))
    }
}

impl TokenPersistence for FilePersistence {
    fn load(&self) -> Result<Option<PersistedSession>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).context("Failed to read session file")?;
        let record: PersistedSession =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(record))
    }

    fn save(&self, record: &PersistedSession) -> Result<()> {
        let contents = serde_json::to_string_pretty(record)?;
        write_atomic(&self.path(), contents.as_bytes())
    }

    fn describe(&self) -> String {
        format!("file ({})", self.path().display())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid session path: {}", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create session directory {}", dir.display()))?;

    let tmp_path = dir.join(format!("{}.json.tmp.{}", STORE_KEY, uuid::Uuid::new_v4()));
    let result = (|| -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!("Failed to replace {} with {}", path.display(), tmp_path.display())
        })?;
        if let Err(e) = sync_dir(dir) {
            debug!(error = %e, dir = %dir.display(), "Failed to sync session directory");
        }
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Flush the directory entry so a completed rename survives a crash.
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

/// One OS keychain secret holding the serialized record.
pub struct KeyringPersistence {
    service: String,
}

impl KeyringPersistence {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, STORE_KEY).context("Failed to create keyring entry")
    }
}

impl Default for KeyringPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenPersistence for KeyringPersistence {
    fn load(&self) -> Result<Option<PersistedSession>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                let record = serde_json::from_str(&secret)
                    .context("Failed to parse session stored in keychain")?;
                Ok(Some(record))
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No session stored in keychain");
                Ok(None)
            }
            Err(e) => Err(e).context("Failed to retrieve session from keychain"),
        }
    }

    fn save(&self, record: &PersistedSession) -> Result<()> {
        let secret = serde_json::to_string(record)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store session in keychain")
    }

    fn describe(&self) -> String {
        format!("keyring ({}/{})", self.service, STORE_KEY)
    }
}

/// In-process only; nothing survives a restart.
#[derive(Default)]
pub struct MemoryPersistence {
    record: Mutex<Option<PersistedSession>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<PersistedSession>> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save(&self, record: &PersistedSession) -> Result<()> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = Some(record.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
