//! Engine command line and library preload list

use serde::{Deserialize, Serialize};

use crate::preference::LoggingPreference;

/// Prefix of the engine's log file flag
pub const LOG_FLAG_PREFIX: &str = "--log=";

/// Engine library name shared by the stock builds
pub const DEFAULT_LIBRARY_IDENTIFIER: &str = "UrQuanMasters";

/// Which shared libraries to preload, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Engine library, loaded last
    pub library_identifier: String,
    /// Whether the audio library is part of this build
    pub include_audio_library: bool,
    /// C++ runtime, loaded first
    pub runtime_library: String,
    pub audio_library: String,
    /// Windowing and input
    pub windowing_library: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_identifier: DEFAULT_LIBRARY_IDENTIFIER.to_string(),
            include_audio_library: true,
            runtime_library: "c++_shared".to_string(),
            audio_library: "openal".to_string(),
            windowing_library: "SDL2".to_string(),
        }
    }
}

impl LibraryConfig {
    /// Config for a differently branded engine library
    pub fn for_library(identifier: impl Into<String>) -> Self {
        Self {
            library_identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Drop or restore the audio library
    pub fn with_audio(mut self, include: bool) -> Self {
        self.include_audio_library = include;
        self
    }

    /// Preload order; the engine library is always last
    pub fn preload_order(&self) -> Vec<String> {
        let mut libraries = vec![self.runtime_library.clone()];
        if self.include_audio_library {
            libraries.push(self.audio_library.clone());
        }
        libraries.push(self.windowing_library.clone());
        libraries.push(self.library_identifier.clone());
        libraries
    }
}

/// Everything handed to the engine process at start
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchArguments {
    /// Libraries to load, dependencies first
    pub libraries: Vec<String>,
    /// Command-line tokens
    pub args: Vec<String>,
}

impl LaunchArguments {
    /// The engine library, loaded after its dependencies
    pub fn main_library(&self) -> Option<&str> {
        self.libraries.last().map(String::as_str)
    }

    /// Libraries loaded before the engine
    pub fn dependencies(&self) -> &[String] {
        match self.libraries.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

/// File name of a shared library on disk, `lib<name>.so`
pub fn shared_object_name(name: &str) -> String {
    format!("lib{}.so", name)
}

/// Engine command line for a logging preference
pub fn command_line(pref: &LoggingPreference) -> Vec<String> {
    if !pref.enabled {
        return Vec::new();
    }

    let Some(path) = pref.log_file_path.to_str() else {
        tracing::warn!(
            path = %pref.log_file_path.display(),
            "Log path is not valid UTF-8, omitting log flag"
        );
        return Vec::new();
    };
    if path.is_empty() {
        tracing::warn!("Logging enabled without a log path, omitting log flag");
        return Vec::new();
    }

    vec![format!("{}{}", LOG_FLAG_PREFIX, path)]
}

/// Builds [`LaunchArguments`] from a preference
#[derive(Debug, Clone, Default)]
pub struct LaunchArgumentBuilder {
    libraries: LibraryConfig,
}

impl LaunchArgumentBuilder {
    pub fn new(libraries: LibraryConfig) -> Self {
        Self { libraries }
    }

    pub fn library_config(&self) -> &LibraryConfig {
        &self.libraries
    }

    pub fn build(&self, pref: &LoggingPreference) -> LaunchArguments {
        LaunchArguments {
            libraries: self.libraries.preload_order(),
            args: command_line(pref),
        }
    }
}
