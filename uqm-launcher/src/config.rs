//! Launcher configuration and wiring
//!
//! `LauncherConfig` is read from `~/.config/uqm-launcher/launcher.json` when
//! present; every field has a default. `EngineLauncherBuilder` assembles an
//! [`EngineLauncher`] from a config and the platform components.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::args::{LaunchArgumentBuilder, LibraryConfig};
use crate::launcher::{DenialPolicy, EngineLauncher, ProcessHost, RecordingProcessHost};
use crate::permission::{AutoPermissionHost, PermissionCoordinator, PermissionHost};
use crate::preference::{
    default_preferences_path, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore,
    PreferenceStore, DEFAULT_LOG_FILE_PATH,
};

/// Directory name under the platform config dir
pub const APP_NAME: &str = "uqm-launcher";

/// Error type for configuration loading and wiring
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No process host configured")]
    MissingProcessHost,

    #[error("No permission host configured")]
    MissingPermissionHost,
}

/// Serialisable launcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Preload libraries and engine identifier
    pub library: LibraryConfig,
    /// Fixed engine log destination
    pub log_file_path: PathBuf,
    /// Log paths under this directory need no storage permission
    pub private_storage_dir: Option<PathBuf>,
    pub denial_policy: DenialPolicy,
    /// Give up on a permission prompt after this long; `None` waits forever
    pub permission_timeout_ms: Option<u64>,
    /// Preference file; defaults to the platform config dir
    pub preferences_path: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            library: LibraryConfig::default(),
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE_PATH),
            private_storage_dir: None,
            denial_policy: DenialPolicy::default(),
            permission_timeout_ms: None,
            preferences_path: None,
        }
    }
}

impl LauncherConfig {
    /// Read a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path` if it exists, defaults otherwise
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!(path = %path.display(), "Loading launcher config");
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_NAME)
            .join("launcher.json")
    }

    pub fn permission_timeout(&self) -> Option<Duration> {
        self.permission_timeout_ms.map(Duration::from_millis)
    }

    /// Preference file this config points at
    pub fn preferences_file(&self) -> PathBuf {
        self.preferences_path
            .clone()
            .unwrap_or_else(|| default_preferences_path(APP_NAME))
    }

    /// Open the file-backed preference store; an unreadable file reads as defaults
    pub fn open_store(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(FileKeyValueStore::open_or_reset(self.preferences_file()))
    }

    /// Preference store with this config's log path
    pub fn preference_store(&self) -> PreferenceStore {
        PreferenceStore::with_log_path(self.open_store(), self.log_file_path.clone())
    }
}

/// Builder for [`EngineLauncher`]
pub struct EngineLauncherBuilder {
    config: LauncherConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    permission_host: Option<Arc<dyn PermissionHost>>,
    process_host: Option<Arc<dyn ProcessHost>>,
}

impl EngineLauncherBuilder {
    pub fn new(config: LauncherConfig) -> Self {
        Self {
            config,
            store: None,
            permission_host: None,
            process_host: None,
        }
    }

    /// Set the preference backend
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the platform permission host
    pub fn permission_host(mut self, host: Arc<dyn PermissionHost>) -> Self {
        self.permission_host = Some(host);
        self
    }

    /// Set the process host
    pub fn process_host(mut self, host: Arc<dyn ProcessHost>) -> Self {
        self.process_host = Some(host);
        self
    }

    /// Build the launcher
    ///
    /// Without an explicit store the file store at `preferences_path` (or the
    /// default location) is used.
    pub fn build(self) -> Result<EngineLauncher, ConfigError> {
        let config = self.config;

        let store = match self.store {
            Some(store) => store,
            None => config.open_store(),
        };

        let permission_host = self
            .permission_host
            .ok_or(ConfigError::MissingPermissionHost)?;
        let process_host = self.process_host.ok_or(ConfigError::MissingProcessHost)?;

        let coordinator =
            PermissionCoordinator::new(permission_host).with_timeout(config.permission_timeout());

        Ok(EngineLauncher::new(
            PreferenceStore::with_log_path(store, config.log_file_path),
            Arc::new(coordinator),
            LaunchArgumentBuilder::new(config.library),
            process_host,
        )
        .with_denial_policy(config.denial_policy)
        .with_private_storage_dir(config.private_storage_dir))
    }
}

impl std::fmt::Debug for EngineLauncherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLauncherBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Ready-made wiring for common setups
pub struct LauncherPresets;

impl LauncherPresets {
    /// In-memory preferences, every permission granted, launches recorded
    pub fn testing() -> (EngineLauncher, Arc<RecordingProcessHost>) {
        let process = Arc::new(RecordingProcessHost::new());
        let config = LauncherConfig::default();
        let launcher = EngineLauncher::new(
            PreferenceStore::with_log_path(
                Arc::new(MemoryKeyValueStore::new()),
                config.log_file_path,
            ),
            Arc::new(PermissionCoordinator::new(Arc::new(
                AutoPermissionHost::always_granted(),
            ))),
            LaunchArgumentBuilder::new(config.library),
            process.clone(),
        );
        (launcher, process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LauncherConfig = serde_json::from_str(
            r#"{
                "library": { "library_identifier": "uqm", "include_audio_library": false },
                "denial_policy": "keep_logging",
                "permission_timeout_ms": 1500
            }"#,
        )
        .unwrap();

        assert_eq!(config.library.library_identifier, "uqm");
        assert!(!config.library.include_audio_library);
        assert_eq!(config.library.windowing_library, "SDL2");
        assert_eq!(config.denial_policy, DenialPolicy::KeepLogging);
        assert_eq!(config.permission_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.log_file_path, PathBuf::from(DEFAULT_LOG_FILE_PATH));
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("launcher.json");
        assert_eq!(
            LauncherConfig::load_or_default(&missing).unwrap(),
            LauncherConfig::default()
        );

        std::fs::write(&missing, r#"{ "log_file_path": "/tmp/uqm.log" }"#).unwrap();
        let loaded = LauncherConfig::load_or_default(&missing).unwrap();
        assert_eq!(loaded.log_file_path, PathBuf::from("/tmp/uqm.log"));

        std::fs::write(&missing, "[").unwrap();
        assert!(matches!(
            LauncherConfig::load_or_default(&missing),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_builder_requires_hosts() {
        let result = EngineLauncherBuilder::new(LauncherConfig::default())
            .store(Arc::new(MemoryKeyValueStore::new()))
            .permission_host(Arc::new(AutoPermissionHost::always_granted()))
            .build();

        assert!(matches!(result, Err(ConfigError::MissingProcessHost)));
    }

    #[test]
    fn test_builder_applies_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig {
            log_file_path: PathBuf::from("/sdcard/uqm.log"),
            denial_policy: DenialPolicy::KeepLogging,
            preferences_path: Some(dir.path().join("preferences.json")),
            ..LauncherConfig::default()
        };

        let launcher = EngineLauncherBuilder::new(config)
            .permission_host(Arc::new(AutoPermissionHost::always_granted()))
            .process_host(Arc::new(RecordingProcessHost::new()))
            .build()
            .unwrap();

        assert_eq!(launcher.denial_policy(), DenialPolicy::KeepLogging);
        launcher.preferences().set(true);
        assert_eq!(launcher.preview().args, vec!["--log=/sdcard/uqm.log"]);
        assert!(dir.path().join("preferences.json").exists());
    }

    #[test]
    fn test_preference_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = LauncherConfig {
            preferences_path: Some(path.clone()),
            ..LauncherConfig::default()
        };

        let prefs = config.preference_store();
        assert!(!prefs.get().enabled);

        prefs.set(true);
        assert!(config.preference_store().get().enabled);
        assert_eq!(config.preferences_file(), path);
    }

    #[tokio::test]
    async fn test_testing_preset() {
        let (launcher, process) = LauncherPresets::testing();

        let report = launcher.launch().await.unwrap();

        assert!(report.arguments.args.is_empty());
        assert_eq!(process.launch_count(), 1);
    }
}
