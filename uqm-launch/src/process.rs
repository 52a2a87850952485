//! Engine process host for desktop builds

use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::Mutex;
use uqm_launcher::{shared_object_name, EngineStartError, LaunchArguments, ProcessHost};

/// Starts the engine executable as a child process
///
/// Every preload library must be present in `lib_dir`; the directory is
/// put on the dynamic loader path of the child.
#[derive(Debug)]
pub struct CommandProcessHost {
    engine: PathBuf,
    lib_dir: PathBuf,
    child: Mutex<Option<Child>>,
}

impl CommandProcessHost {
    pub fn new(engine: impl Into<PathBuf>, lib_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            lib_dir: lib_dir.into(),
            child: Mutex::new(None),
        }
    }

    fn check_libraries(&self, launch: &LaunchArguments) -> Result<(), EngineStartError> {
        for library in &launch.libraries {
            let file = self.lib_dir.join(shared_object_name(library));
            if !file.is_file() {
                return Err(EngineStartError::library_load(
                    library,
                    format!("{} not found", file.display()),
                ));
            }
        }
        Ok(())
    }

    /// Block until the engine exits; the status is only logged
    pub fn wait(&self) {
        let child = self
            .child
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut child) = child else {
            return;
        };
        match child.wait() {
            Ok(status) => tracing::info!(%status, "Engine exited"),
            Err(e) => tracing::warn!(error = %e, "Failed to wait for engine"),
        }
    }
}

impl ProcessHost for CommandProcessHost {
    fn start(&self, launch: &LaunchArguments) -> Result<(), EngineStartError> {
        self.check_libraries(launch)?;

        let child = Command::new(&self.engine)
            .args(&launch.args)
            .env(loader_path_var(), loader_path(&self.lib_dir))
            .spawn()
            .map_err(EngineStartError::Spawn)?;

        tracing::info!(pid = child.id(), engine = %self.engine.display(), "Engine started");
        *self.child.lock().unwrap_or_else(|e| e.into_inner()) = Some(child);
        Ok(())
    }
}

fn loader_path_var() -> &'static str {
    if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else if cfg!(windows) {
        "PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

// Prepends the library directory to whatever the loader path already holds.
fn loader_path(lib_dir: &Path) -> std::ffi::OsString {
    let mut paths = vec![lib_dir.to_path_buf()];
    if let Some(existing) = std::env::var_os(loader_path_var()) {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths).unwrap_or_else(|_| lib_dir.as_os_str().to_owned())
}
