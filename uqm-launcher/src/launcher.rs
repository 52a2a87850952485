//! Launch orchestration
//!
//! Reads the logging preference, acquires storage permission when the log
//! file needs it, builds the launch arguments and hands them to the process
//! host. Only a failure to load the engine is reported to the caller; every
//! permission problem degrades logging instead.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::args::{LaunchArgumentBuilder, LaunchArguments};
use crate::permission::{PermissionCoordinator, PermissionKind, PermissionOutcome};
use crate::preference::{LoggingPreference, PreferenceStore};

/// Error returned by a process host
#[derive(Debug, Error)]
pub enum EngineStartError {
    #[error("Failed to load library {library}: {reason}")]
    LibraryLoad { library: String, reason: String },

    #[error("Failed to start engine process: {0}")]
    Spawn(#[source] std::io::Error),
}

impl EngineStartError {
    pub fn library_load(library: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LibraryLoad {
            library: library.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned by [`EngineLauncher::launch`]
///
/// Both variants are fatal: retrying without fixing the installation cannot
/// succeed.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Engine library {library} could not be loaded: {reason}")]
    LibraryLoad { library: String, reason: String },

    #[error("Engine process could not be started: {0}")]
    Spawn(#[source] std::io::Error),
}

impl From<EngineStartError> for LaunchError {
    fn from(err: EngineStartError) -> Self {
        match err {
            EngineStartError::LibraryLoad { library, reason } => {
                Self::LibraryLoad { library, reason }
            }
            EngineStartError::Spawn(e) => Self::Spawn(e),
        }
    }
}

/// Platform mechanism that starts the engine
///
/// Control passes to the engine once `start` succeeds; its exit status is
/// not observed.
pub trait ProcessHost: Send + Sync {
    fn start(&self, launch: &LaunchArguments) -> Result<(), EngineStartError>;
}

/// What to do with the log flag when storage permission is not granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialPolicy {
    /// Start without the log flag
    #[default]
    DisableLogging,
    /// Pass the log flag anyway and let the engine cope
    KeepLogging,
}

/// Summary of a completed launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    /// What was handed to the process host
    pub arguments: LaunchArguments,
    /// Storage permission result, if one was needed
    pub permission: Option<PermissionOutcome>,
    /// Logging was requested but left out of this launch
    pub logging_degraded: bool,
}

/// Starts the engine from the current preference
pub struct EngineLauncher {
    preferences: PreferenceStore,
    coordinator: Arc<PermissionCoordinator>,
    builder: LaunchArgumentBuilder,
    process: Arc<dyn ProcessHost>,
    denial_policy: DenialPolicy,
    private_storage_dir: Option<PathBuf>,
}

impl EngineLauncher {
    pub fn new(
        preferences: PreferenceStore,
        coordinator: Arc<PermissionCoordinator>,
        builder: LaunchArgumentBuilder,
        process: Arc<dyn ProcessHost>,
    ) -> Self {
        Self {
            preferences,
            coordinator,
            builder,
            process,
            denial_policy: DenialPolicy::default(),
            private_storage_dir: None,
        }
    }

    pub fn with_denial_policy(mut self, policy: DenialPolicy) -> Self {
        self.denial_policy = policy;
        self
    }

    /// Log files under this directory need no storage permission
    pub fn with_private_storage_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.private_storage_dir = dir;
        self
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub fn coordinator(&self) -> &Arc<PermissionCoordinator> {
        &self.coordinator
    }

    pub fn denial_policy(&self) -> DenialPolicy {
        self.denial_policy
    }

    fn needs_storage_permission(&self, pref: &LoggingPreference) -> bool {
        if !pref.enabled || pref.log_file_path.as_os_str().is_empty() {
            return false;
        }
        match &self.private_storage_dir {
            Some(dir) => !pref.log_file_path.starts_with(dir),
            None => true,
        }
    }

    /// Arguments a launch would use right now, without prompting
    pub fn preview(&self) -> LaunchArguments {
        self.builder.build(&self.preferences.get())
    }

    /// Run the launch sequence and start the engine
    pub async fn launch(&self) -> Result<LaunchReport, LaunchError> {
        let requested = self.preferences.get();
        let mut effective = requested.clone();
        let mut permission = None;

        if self.needs_storage_permission(&requested) {
            let kind = PermissionKind::storage_for_sdk(self.coordinator.host().sdk_level());
            let outcome = match self.coordinator.request(kind).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(error = %e, "Storage permission unavailable");
                    PermissionOutcome::Denied
                }
            };
            permission = Some(outcome);

            if !outcome.is_granted() && self.denial_policy == DenialPolicy::DisableLogging {
                tracing::warn!(%kind, "Storage permission denied, starting without a log file");
                effective = requested.without_logging();
            }
        }

        let arguments = self.builder.build(&effective);
        let logging_degraded = requested.enabled && arguments.args.is_empty();

        tracing::info!(
            libraries = ?arguments.libraries,
            args = ?arguments.args,
            "Starting engine"
        );
        self.process.start(&arguments).map_err(|e| {
            tracing::error!(error = %e, "Engine failed to start");
            LaunchError::from(e)
        })?;

        Ok(LaunchReport {
            arguments,
            permission,
            logging_degraded,
        })
    }

    /// Ask for the external tool permission; the result is only logged
    pub async fn request_external_tool(&self) -> Option<PermissionOutcome> {
        match self
            .coordinator
            .request(PermissionKind::ExternalToolInvocation)
            .await
        {
            Ok(outcome) => {
                tracing::info!(?outcome, "External tool permission resolved");
                Some(outcome)
            }
            Err(e) => {
                tracing::warn!(error = %e, "External tool permission unavailable");
                None
            }
        }
    }
}

impl std::fmt::Debug for EngineLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLauncher")
            .field("preferences", &self.preferences)
            .field("builder", &self.builder)
            .field("denial_policy", &self.denial_policy)
            .field("private_storage_dir", &self.private_storage_dir)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Recording Host (for testing)
// ============================================================================

/// Process host that records launches instead of starting anything
#[derive(Debug, Default)]
pub struct RecordingProcessHost {
    launches: Mutex<Vec<LaunchArguments>>,
    missing_library: Option<String>,
}

impl RecordingProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every start as if `library` were not installed
    pub fn missing_library(library: impl Into<String>) -> Self {
        Self {
            launches: Mutex::new(Vec::new()),
            missing_library: Some(library.into()),
        }
    }

    pub fn launches(&self) -> Vec<LaunchArguments> {
        self.launches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl ProcessHost for RecordingProcessHost {
    fn start(&self, launch: &LaunchArguments) -> Result<(), EngineStartError> {
        if let Some(missing) = &self.missing_library {
            if launch.libraries.contains(missing) {
                return Err(EngineStartError::library_load(missing, "not installed"));
            }
        }
        self.launches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(launch.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::LibraryConfig;
    use crate::permission::{AutoPermissionHost, RecordingPermissionHost};
    use crate::preference::MemoryKeyValueStore;

    fn launcher(
        host: Arc<dyn crate::permission::PermissionHost>,
        process: Arc<RecordingProcessHost>,
        log_path: &str,
    ) -> EngineLauncher {
        let preferences =
            PreferenceStore::with_log_path(Arc::new(MemoryKeyValueStore::new()), log_path);
        EngineLauncher::new(
            preferences,
            Arc::new(PermissionCoordinator::new(host)),
            LaunchArgumentBuilder::new(LibraryConfig::default()),
            process,
        )
    }

    #[test]
    fn test_private_storage_needs_no_permission() {
        let process = Arc::new(RecordingProcessHost::new());
        let launcher = launcher(
            Arc::new(AutoPermissionHost::never_granted()),
            process,
            "/data/user/0/org.megamod.uqm/files/uqm_log.txt",
        )
        .with_private_storage_dir(Some(PathBuf::from("/data/user/0/org.megamod.uqm")));

        let enabled = LoggingPreference {
            enabled: true,
            log_file_path: PathBuf::from("/data/user/0/org.megamod.uqm/files/uqm_log.txt"),
        };
        assert!(!launcher.needs_storage_permission(&enabled));

        let shared = LoggingPreference {
            enabled: true,
            log_file_path: PathBuf::from("/storage/emulated/0/uqm_log.txt"),
        };
        assert!(launcher.needs_storage_permission(&shared));
        assert!(!launcher.needs_storage_permission(&shared.without_logging()));
    }

    #[tokio::test]
    async fn test_private_log_path_skips_prompt() {
        let host = Arc::new(RecordingPermissionHost::new(33));
        let process = Arc::new(RecordingProcessHost::new());
        let launcher = launcher(host.clone(), process.clone(), "/data/app/files/uqm_log.txt")
            .with_private_storage_dir(Some(PathBuf::from("/data/app")));
        launcher.preferences().set(true);

        let report = launcher.launch().await.unwrap();

        assert_eq!(host.request_count(), 0);
        assert_eq!(report.permission, None);
        assert_eq!(report.arguments.args, vec!["--log=/data/app/files/uqm_log.txt"]);
    }

    #[tokio::test]
    async fn test_missing_library_is_fatal() {
        let process = Arc::new(RecordingProcessHost::missing_library("SDL2"));
        let launcher = launcher(
            Arc::new(AutoPermissionHost::always_granted()),
            process.clone(),
            "/tmp/uqm.log",
        );

        let err = launcher.launch().await.unwrap_err();

        assert!(matches!(err, LaunchError::LibraryLoad { ref library, .. } if library == "SDL2"));
        assert_eq!(process.launch_count(), 0);
    }

    #[tokio::test]
    async fn test_external_tool_request() {
        let host = Arc::new(RecordingPermissionHost::with_granted(
            33,
            [PermissionKind::ExternalToolInvocation],
        ));
        let launcher = launcher(host, Arc::new(RecordingProcessHost::new()), "/tmp/uqm.log");

        assert_eq!(
            launcher.request_external_tool().await,
            Some(PermissionOutcome::Granted)
        );
    }

    #[test]
    fn test_preview_reflects_preference() {
        let launcher = launcher(
            Arc::new(AutoPermissionHost::always_granted()),
            Arc::new(RecordingProcessHost::new()),
            "/tmp/uqm.log",
        );
        assert!(launcher.preview().args.is_empty());

        launcher.preferences().set(true);
        assert_eq!(launcher.preview().args, vec!["--log=/tmp/uqm.log"]);
    }
}
