//! Terminal permission prompts
//!
//! Prompts are answered on stdin from a detached thread; the answer is sent
//! back as a `(code, results)` pair that [`forward_results`] hands to the
//! coordinator, as the platform would deliver a result callback.

use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uqm_launcher::{GrantResult, PermissionCoordinator, PermissionHost, PermissionKind, RequestCode};

/// Result callback payload
pub type PermissionResult = (RequestCode, Vec<GrantResult>);

type Prompt = dyn Fn(PermissionKind) -> io::Result<bool> + Send + Sync;

/// Permission host that asks on the terminal
pub struct TerminalPermissionHost {
    granted: Arc<Mutex<HashSet<PermissionKind>>>,
    results: mpsc::UnboundedSender<PermissionResult>,
    sdk_level: u32,
    prompt: Arc<Prompt>,
}

impl TerminalPermissionHost {
    pub fn new(sdk_level: u32, results: mpsc::UnboundedSender<PermissionResult>) -> Self {
        Self {
            granted: Arc::new(Mutex::new(HashSet::new())),
            results,
            sdk_level,
            prompt: Arc::new(ask),
        }
    }

    /// Treat every permission as already granted
    pub fn assume_granted(self) -> Self {
        self.granted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(PermissionKind::ALL);
        self
    }

    #[cfg(test)]
    fn with_prompt(
        mut self,
        prompt: impl Fn(PermissionKind) -> io::Result<bool> + Send + Sync + 'static,
    ) -> Self {
        self.prompt = Arc::new(prompt);
        self
    }
}

impl PermissionHost for TerminalPermissionHost {
    fn is_granted(&self, kind: PermissionKind) -> bool {
        self.granted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind)
    }

    fn request_permission(&self, kind: PermissionKind, code: RequestCode) {
        let granted = self.granted.clone();
        let results = self.results.clone();
        let prompt = self.prompt.clone();

        let answer = move || {
            let result = match prompt(kind) {
                Ok(true) => {
                    granted
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(kind);
                    GrantResult::Granted
                }
                Ok(false) => GrantResult::Denied,
                Err(e) => {
                    tracing::warn!(error = %e, %kind, "Permission prompt failed, denying");
                    GrantResult::Denied
                }
            };
            if results.send((code, vec![result])).is_err() {
                tracing::debug!(%kind, "Nobody is waiting for the permission result");
            }
        };

        // Detached: an unanswered prompt must not hold up runtime shutdown.
        let spawned = std::thread::Builder::new()
            .name("permission-prompt".to_string())
            .spawn(answer);
        if let Err(e) = spawned {
            tracing::warn!(error = %e, %kind, "Failed to start permission prompt, denying");
            let _ = self.results.send((code, vec![GrantResult::Denied]));
        }
    }

    fn sdk_level(&self) -> u32 {
        self.sdk_level
    }
}

impl std::fmt::Debug for TerminalPermissionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalPermissionHost")
            .field("granted", &self.granted)
            .field("sdk_level", &self.sdk_level)
            .finish_non_exhaustive()
    }
}

/// Deliver prompt answers to the coordinator until every sender is gone
pub async fn forward_results(
    mut results: mpsc::UnboundedReceiver<PermissionResult>,
    coordinator: Arc<PermissionCoordinator>,
) {
    while let Some((code, grant_results)) = results.recv().await {
        coordinator.on_permission_result(code, &grant_results);
    }
}

fn describe(kind: PermissionKind) -> &'static str {
    match kind {
        PermissionKind::BroadStorageAccess => "manage all files on shared storage",
        PermissionKind::LegacyStorageWrite => "write to shared storage",
        PermissionKind::ExternalToolInvocation => "run commands through an external terminal",
    }
}

fn ask(kind: PermissionKind) -> io::Result<bool> {
    prompt_user(kind, atty_check(), &mut io::stdin().lock(), &mut io::stdout())
}

// Input that is not a terminal is never taken as consent.
fn prompt_user(
    kind: PermissionKind,
    interactive: bool,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    if !interactive {
        return Ok(false);
    }

    writeln!(output)?;
    writeln!(output, "The launcher needs permission to {}.", describe(kind))?;
    write!(output, "Allow? [y]es / [n]o: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    Ok(parse_answer(&line))
}

fn parse_answer(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Check if stdin is connected to a terminal
fn atty_check() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: isatty is safe to call with any file descriptor
        unsafe { libc::isatty(std::io::stdin().as_raw_fd()) != 0 }
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::System::Console::{GetConsoleMode, CONSOLE_MODE};
        let handle = std::io::stdin().as_raw_handle();
        let mut mode: CONSOLE_MODE = 0;
        // SAFETY: GetConsoleMode is safe with valid handle
        unsafe { GetConsoleMode(handle as _, &mut mode) != 0 }
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::env::var("TERM").is_ok()
    }
}
