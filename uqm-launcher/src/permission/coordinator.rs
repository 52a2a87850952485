//! Asynchronous permission acquisition
//!
//! `request` suspends the calling task until the platform delivers a result
//! through `on_permission_result`. No thread blocks while a prompt is shown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

use super::host::PermissionHost;
use super::kind::{GrantResult, PermissionKind, PermissionOutcome, PermissionState, RequestCode};

/// Error type for permission requests
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("A {0} request is already pending")]
    DuplicateRequest(PermissionKind),

    #[error("The {0} request was abandoned before a result arrived")]
    Abandoned(PermissionKind),

    #[error("No {kind} result after {after:?}")]
    Timeout { kind: PermissionKind, after: Duration },
}

impl PermissionError {
    /// Kind of the request that failed
    pub fn kind(&self) -> PermissionKind {
        match self {
            Self::DuplicateRequest(kind) | Self::Abandoned(kind) => *kind,
            Self::Timeout { kind, .. } => *kind,
        }
    }
}

struct PendingRequest {
    id: u64,
    tx: oneshot::Sender<PermissionOutcome>,
}

#[derive(Default)]
struct CoordinatorInner {
    states: HashMap<PermissionKind, PermissionState>,
    pending: HashMap<PermissionKind, PendingRequest>,
    next_id: u64,
}

/// Tracks outstanding permission prompts, at most one per kind
pub struct PermissionCoordinator {
    host: Arc<dyn PermissionHost>,
    timeout: Option<Duration>,
    inner: Mutex<CoordinatorInner>,
}

impl PermissionCoordinator {
    /// Create a coordinator that waits indefinitely for results
    pub fn new(host: Arc<dyn PermissionHost>) -> Self {
        Self {
            host,
            timeout: None,
            inner: Mutex::new(CoordinatorInner::default()),
        }
    }

    /// Give up on a prompt after `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The platform host behind this coordinator
    pub fn host(&self) -> &Arc<dyn PermissionHost> {
        &self.host
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire a permission, prompting the user if needed
    ///
    /// Resolves immediately when the host already reports the permission as
    /// granted. A second request for a kind that is still pending is
    /// rejected with [`PermissionError::DuplicateRequest`]; the pending one
    /// keeps its identity and still resolves.
    pub async fn request(&self, kind: PermissionKind) -> Result<PermissionOutcome, PermissionError> {
        let (id, rx) = {
            let mut inner = self.lock();

            if inner.pending.contains_key(&kind) {
                tracing::warn!(%kind, "Rejecting duplicate permission request");
                return Err(PermissionError::DuplicateRequest(kind));
            }

            if self.host.is_granted(kind) {
                tracing::debug!(%kind, "Permission already granted");
                inner.states.insert(kind, PermissionState::Granted);
                return Ok(PermissionOutcome::Granted);
            }

            let id = inner.next_id;
            inner.next_id += 1;
            let (tx, rx) = oneshot::channel();
            inner.pending.insert(kind, PendingRequest { id, tx });
            inner.states.insert(kind, PermissionState::Requested);
            (id, rx)
        };

        let _guard = PendingGuard {
            coordinator: self,
            kind,
            id,
        };

        let code = kind.request_code();
        tracing::info!(%kind, %code, "Requesting permission");
        self.host.request_permission(kind, code);

        let received = match self.timeout {
            Some(after) => match tokio::time::timeout(after, rx).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::warn!(%kind, ?after, "Permission prompt timed out");
                    return Err(PermissionError::Timeout { kind, after });
                }
            },
            None => rx.await,
        };

        received.map_err(|_| {
            tracing::warn!(%kind, "Permission request abandoned");
            PermissionError::Abandoned(kind)
        })
    }

    /// Deliver a platform result callback
    ///
    /// Returns `true` when the code matched a pending request, which then
    /// resolves. Unknown codes and codes with nothing pending are ignored.
    pub fn on_permission_result(&self, code: RequestCode, grant_results: &[GrantResult]) -> bool {
        let Some(kind) = PermissionKind::from_request_code(code) else {
            tracing::warn!(%code, "Ignoring result for unknown request code");
            return false;
        };

        // All-files access is toggled in a settings screen that reports no
        // grant array, so the platform is asked again.
        let outcome = match kind {
            PermissionKind::BroadStorageAccess => {
                if self.host.is_granted(kind) {
                    PermissionOutcome::Granted
                } else {
                    PermissionOutcome::Denied
                }
            }
            _ => match grant_results.first() {
                Some(GrantResult::Granted) => PermissionOutcome::Granted,
                _ => PermissionOutcome::Denied,
            },
        };

        let pending = {
            let mut inner = self.lock();
            let Some(pending) = inner.pending.remove(&kind) else {
                tracing::warn!(%kind, %code, "Ignoring result with no pending request");
                return false;
            };
            inner.states.insert(kind, outcome.into());
            pending
        };

        tracing::info!(%kind, ?outcome, "Permission resolved");
        if pending.tx.send(outcome).is_err() {
            tracing::debug!(%kind, "Requester went away before the result arrived");
        }
        true
    }

    /// Drop every pending request; waiters observe `Abandoned`
    pub fn abandon_all(&self) {
        let mut inner = self.lock();
        let kinds: Vec<_> = inner.pending.drain().map(|(kind, _)| kind).collect();
        for kind in kinds {
            tracing::debug!(%kind, "Abandoning permission request");
            inner.states.insert(kind, PermissionState::NotRequested);
        }
    }

    /// Current state of a kind
    pub fn state(&self, kind: PermissionKind) -> PermissionState {
        self.lock().states.get(&kind).copied().unwrap_or_default()
    }

    /// Whether a prompt of this kind is outstanding
    pub fn is_pending(&self, kind: PermissionKind) -> bool {
        self.lock().pending.contains_key(&kind)
    }
}

impl std::fmt::Debug for PermissionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("PermissionCoordinator")
            .field("timeout", &self.timeout)
            .field("pending", &inner.pending.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// Clears a request that stopped waiting (timeout or a dropped future) so the
// kind can be requested again. A resolved request is already gone.
struct PendingGuard<'a> {
    coordinator: &'a PermissionCoordinator,
    kind: PermissionKind,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.coordinator.lock();
        if inner.pending.get(&self.kind).map(|p| p.id) == Some(self.id) {
            inner.pending.remove(&self.kind);
            inner.states.insert(self.kind, PermissionState::NotRequested);
        }
    }
}
