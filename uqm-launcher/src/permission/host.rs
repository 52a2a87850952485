//! Platform permission seam
//!
//! The host platform implements `PermissionHost` to report and prompt for
//! permissions. Prompt results come back later through
//! [`PermissionCoordinator::on_permission_result`](super::PermissionCoordinator::on_permission_result).

use std::collections::HashSet;
use std::sync::Mutex;

use super::kind::{PermissionKind, RequestCode};

/// Trait implemented by the platform to expose its permission subsystem
///
/// # Example
///
/// ```rust
/// use uqm_launcher::permission::{PermissionHost, PermissionKind, RequestCode};
///
/// struct DesktopHost;
///
/// impl PermissionHost for DesktopHost {
///     fn is_granted(&self, _kind: PermissionKind) -> bool {
///         true
///     }
///
///     fn request_permission(&self, _kind: PermissionKind, _code: RequestCode) {}
///
///     fn sdk_level(&self) -> u32 {
///         34
///     }
/// }
/// ```
pub trait PermissionHost: Send + Sync {
    /// Whether the platform currently reports the permission as granted
    fn is_granted(&self, kind: PermissionKind) -> bool;

    /// Show the platform prompt; must return without waiting for the user
    fn request_permission(&self, kind: PermissionKind, code: RequestCode);

    /// Platform API level, used to pick the storage permission
    fn sdk_level(&self) -> u32;
}

// ============================================================================
// Auto Host
// ============================================================================

/// Host that reports every permission as granted or as denied
///
/// Prompts are dropped; a denying host therefore leaves requests pending
/// until the caller abandons them or a timeout fires.
#[derive(Debug)]
pub struct AutoPermissionHost {
    granted: bool,
    sdk_level: u32,
}

impl AutoPermissionHost {
    /// Every permission is granted
    pub fn always_granted() -> Self {
        Self {
            granted: true,
            sdk_level: super::kind::BROAD_STORAGE_MIN_SDK,
        }
    }

    /// No permission is granted
    pub fn never_granted() -> Self {
        Self {
            granted: false,
            sdk_level: super::kind::BROAD_STORAGE_MIN_SDK,
        }
    }

    /// Override the reported API level
    pub fn with_sdk_level(mut self, sdk_level: u32) -> Self {
        self.sdk_level = sdk_level;
        self
    }
}

impl PermissionHost for AutoPermissionHost {
    fn is_granted(&self, _kind: PermissionKind) -> bool {
        self.granted
    }

    fn request_permission(&self, kind: PermissionKind, code: RequestCode) {
        tracing::debug!(%kind, %code, "Auto host ignoring permission prompt");
    }

    fn sdk_level(&self) -> u32 {
        self.sdk_level
    }
}

// ============================================================================
// Recording Host (for testing)
// ============================================================================

/// A recorded prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub kind: PermissionKind,
    pub code: RequestCode,
}

/// Host that records prompts and holds a mutable set of granted kinds
#[derive(Debug)]
pub struct RecordingPermissionHost {
    granted: Mutex<HashSet<PermissionKind>>,
    requests: Mutex<Vec<RecordedRequest>>,
    sdk_level: u32,
}

impl RecordingPermissionHost {
    /// Create a host with nothing granted
    pub fn new(sdk_level: u32) -> Self {
        Self {
            granted: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
            sdk_level,
        }
    }

    /// Create a host that already grants the given kinds
    pub fn with_granted(sdk_level: u32, kinds: impl IntoIterator<Item = PermissionKind>) -> Self {
        let host = Self::new(sdk_level);
        for kind in kinds {
            host.grant(kind);
        }
        host
    }

    /// Mark a kind as granted, as if the user flipped it in settings
    pub fn grant(&self, kind: PermissionKind) {
        self.granted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind);
    }

    /// Withdraw a kind
    pub fn revoke(&self, kind: PermissionKind) {
        self.granted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&kind);
    }

    /// All prompts issued so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of prompts issued so far
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl PermissionHost for RecordingPermissionHost {
    fn is_granted(&self, kind: PermissionKind) -> bool {
        self.granted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind)
    }

    fn request_permission(&self, kind: PermissionKind, code: RequestCode) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest { kind, code });
    }

    fn sdk_level(&self) -> u32 {
        self.sdk_level
    }
}
