//! Logging preference persistence
//!
//! Provides a trait-based key-value backend and the `PreferenceStore` that
//! the launcher and the UI shell share. Reads never fail from the caller's
//! point of view: backend errors are logged and the default takes effect.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Key under which the logging toggle is stored
pub const LOGGING_ENABLED_KEY: &str = "logging_enabled";

/// Key under which hosts forward the log file path alongside the toggle
pub const LOG_FILE_PATH_KEY: &str = "log_file_path";

/// Log file location used by the Android build
pub const DEFAULT_LOG_FILE_PATH: &str = "/storage/emulated/0/uqm-megamod/uqm_log.txt";

/// Error type for preference backend operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access preference store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse preference store: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Snapshot of the user's logging choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingPreference {
    /// Whether the engine should write a log file
    pub enabled: bool,
    /// Fixed destination of the log file
    pub log_file_path: PathBuf,
}

impl LoggingPreference {
    /// Logging disabled, default path
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE_PATH),
        }
    }

    /// Same path, logging forced off
    pub fn without_logging(&self) -> Self {
        Self {
            enabled: false,
            log_file_path: self.log_file_path.clone(),
        }
    }
}

impl Default for LoggingPreference {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Trait for boolean key-value persistence
///
/// Platform hosts implement this over their native preference storage.
/// A write must be durable before the next process start reads it.
pub trait KeyValueStore: Send + Sync {
    /// Read a flag, falling back to `default` when the key is absent
    fn read_bool(&self, key: &str, default: bool) -> Result<bool, StoreError>;

    /// Persist a flag
    fn write_bool(&self, key: &str, value: bool) -> Result<(), StoreError>;
}

// ============================================================================
// File-based Store
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferenceFileData {
    version: u32,
    values: HashMap<String, bool>,
}

impl PreferenceFileData {
    fn new() -> Self {
        Self {
            version: 1,
            values: HashMap::new(),
        }
    }
}

/// JSON-file backed store
///
/// Default: `~/.config/uqm-launcher/preferences.json`
pub struct FileKeyValueStore {
    path: PathBuf,
    data: RwLock<PreferenceFileData>,
}

impl FileKeyValueStore {
    /// Open (or lazily create) a store at the specified path
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let data = if path.exists() {
            let file = File::open(&path)?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            PreferenceFileData::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Open a store, starting empty if the file cannot be read
    ///
    /// The unreadable file is left in place and replaced by the next write.
    pub fn open_or_reset(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::new(path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Unreadable preference file, starting with defaults"
                );
                Self {
                    path: path.to_path_buf(),
                    data: RwLock::new(PreferenceFileData::new()),
                }
            }
        }
    }

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // Written beside the target and renamed over it, so a concurrent reader
    // sees either the old file or the new one.
    fn save(&self, data: &PreferenceFileData) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, data)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        sync_dir(parent)?;
        Ok(())
    }
}

// Makes a rename inside `dir` durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

impl KeyValueStore for FileKeyValueStore {
    fn read_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(data.values.get(key).copied().unwrap_or(default))
    }

    fn write_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        let previous = data.values.insert(key.to_string(), value);
        if let Err(e) = self.save(&data) {
            // Keep memory in line with what is on disk.
            match previous {
                Some(old) => data.values.insert(key.to_string(), old),
                None => data.values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyValueStore")
            .field("path", &self.path)
            .finish()
    }
}

/// Default preference file location for an application
pub fn default_preferences_path(app_name: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(app_name)
        .join("preferences.json")
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory store for tests or session-only preferences
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, bool>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn read_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).copied().unwrap_or(default))
    }

    fn write_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================================================
// Preference Store
// ============================================================================

/// Logging preference shared by the launch flow and the UI shell
#[derive(Clone)]
pub struct PreferenceStore {
    backend: Arc<dyn KeyValueStore>,
    log_file_path: PathBuf,
}

impl PreferenceStore {
    /// Create a store using the default log path
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_log_path(backend, DEFAULT_LOG_FILE_PATH)
    }

    /// Create a store with a different fixed log path
    pub fn with_log_path(backend: Arc<dyn KeyValueStore>, log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            log_file_path: log_file_path.into(),
        }
    }

    /// Current preference; backend failures read as the default
    pub fn get(&self) -> LoggingPreference {
        let enabled = match self.backend.read_bool(LOGGING_ENABLED_KEY, false) {
            Ok(enabled) => enabled,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read logging preference, using default");
                false
            }
        };

        LoggingPreference {
            enabled,
            log_file_path: self.log_file_path.clone(),
        }
    }

    /// Persist the toggle; failures are logged and dropped
    pub fn set(&self, enabled: bool) {
        match self.backend.write_bool(LOGGING_ENABLED_KEY, enabled) {
            Ok(()) => tracing::debug!(enabled, "Logging preference saved"),
            Err(e) => tracing::warn!(error = %e, enabled, "Failed to save logging preference"),
        }
    }

    /// Fixed log file destination
    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("log_file_path", &self.log_file_path)
            .finish_non_exhaustive()
    }
}
