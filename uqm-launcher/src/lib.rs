//! uqm-launcher: permission handshake and launch arguments for the
//! UrQuan Masters engine
//!
//! The engine is a pre-built native library. This crate decides what it is
//! started with:
//!
//! - [`preference`]: the persisted "logging enabled" toggle
//! - [`permission`]: asynchronous storage / tool permission acquisition
//! - [`args`]: command line and library preload list
//! - [`launcher`]: the launch sequence tying them together
//! - [`config`]: serialisable settings and component wiring
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uqm_launcher::{EngineLauncherBuilder, LauncherConfig};
//!
//! let launcher = EngineLauncherBuilder::new(LauncherConfig::default())
//!     .permission_host(Arc::new(MyPlatformPermissions::new()))
//!     .process_host(Arc::new(MyProcessHost::new()))
//!     .build()?;
//!
//! launcher.preferences().set(true);
//! let report = launcher.launch().await?;
//! ```

pub mod args;
pub mod config;
pub mod launcher;
pub mod permission;
pub mod preference;

pub use args::{
    command_line, shared_object_name, LaunchArgumentBuilder, LaunchArguments, LibraryConfig,
};
pub use config::{ConfigError, EngineLauncherBuilder, LauncherConfig, LauncherPresets};
pub use launcher::{
    DenialPolicy, EngineLauncher, EngineStartError, LaunchError, LaunchReport, ProcessHost,
    RecordingProcessHost,
};
pub use permission::{
    GrantResult, PermissionCoordinator, PermissionError, PermissionHost, PermissionKind,
    PermissionOutcome, PermissionState, RequestCode,
};
pub use preference::{
    FileKeyValueStore, KeyValueStore, LoggingPreference, MemoryKeyValueStore, PreferenceStore,
    StoreError,
};
