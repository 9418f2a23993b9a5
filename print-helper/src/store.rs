//! Config Store
//!
//! Persists the default printer, submission settings and raw share name in
//! `config.json`. Loading is tolerant: a missing or unparsable file yields
//! defaults, and files written by older versions are backfilled in memory.
//!
//! The in-memory snapshot is the source of truth between loads. Readers take
//! an `Arc` snapshot; writers are serialized and swap in a new snapshot only
//! after the file has been durably written.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Config write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted printer configuration
///
/// Unknown keys found on disk are carried through untouched. A known key
/// holding the wrong type falls back to its default on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterConfig {
    #[serde(default, deserialize_with = "string_or_none")]
    pub default_printer: Option<String>,
    /// Submission options; only the whitelist in `PrintOptions` is honored
    #[serde(default, deserialize_with = "object_or_empty")]
    pub settings: Map<String, Value>,
    /// Local share used by the raw ESC/POS fallback
    #[serde(default, deserialize_with = "string_or_none")]
    pub raw_share: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PrinterConfig {
    /// Configured raw share, ignoring blank values
    pub fn raw_share(&self) -> Option<&str> {
        self.raw_share.as_deref().filter(|s| !s.trim().is_empty())
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Read a config file, never failing
pub fn load(path: &Path) -> PrinterConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Config unreadable, using defaults");
            }
            return PrinterConfig::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Config unparsable, using defaults");
        PrinterConfig::default()
    })
}

/// Write a config file: full overwrite, pretty JSON, fsync'd then renamed
pub fn save(path: &Path, config: &PrinterConfig) -> StoreResult<()> {
    use std::io::Write;

    let json = serde_json::to_string_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Process-scoped config holder
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<PrinterConfig>>,
    writer: Mutex<()>,
}

impl ConfigStore {
    /// Load `path` (tolerantly) and hold it as the current snapshot
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = load(&path);
        Self {
            path,
            current: RwLock::new(Arc::new(initial)),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> Arc<PrinterConfig> {
        self.current.read().clone()
    }

    /// Re-read the file and atomically swap the snapshot
    pub async fn reload(&self) -> Arc<PrinterConfig> {
        let _guard = self.writer.lock().await;
        let fresh = Arc::new(load(&self.path));
        *self.current.write() = fresh.clone();
        fresh
    }

    /// Apply a mutation, persist it, then publish the new snapshot
    ///
    /// Mutations are serialized; last write wins. On a write failure the
    /// previous snapshot stays current.
    pub async fn update<F>(&self, mutate: F) -> StoreResult<Arc<PrinterConfig>>
    where
        F: FnOnce(&mut PrinterConfig),
    {
        let _guard = self.writer.lock().await;

        let mut next = (*self.snapshot()).clone();
        mutate(&mut next);

        let path = self.path.clone();
        let to_write = next.clone();
        tokio::task::spawn_blocking(move || save(&path, &to_write)).await??;

        let next = Arc::new(next);
        *self.current.write() = next.clone();
        info!(
            default_printer = ?next.default_printer,
            raw_share = ?next.raw_share,
            "Printer config saved"
        );
        Ok(next)
    }
}
