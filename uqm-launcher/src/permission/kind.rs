//! Permission kinds, request codes and result values

use serde::{Deserialize, Serialize};
use std::fmt;

/// First platform API level with all-files access (Android R)
pub const BROAD_STORAGE_MIN_SDK: u32 = 30;

/// Platform permission the launcher may need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    /// All-files access on newer platforms
    BroadStorageAccess,
    /// Write access to shared storage on older platforms
    LegacyStorageWrite,
    /// Running commands through an external terminal tool
    ExternalToolInvocation,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 3] = [
        PermissionKind::BroadStorageAccess,
        PermissionKind::LegacyStorageWrite,
        PermissionKind::ExternalToolInvocation,
    ];

    /// Storage permission appropriate for a platform API level
    pub fn storage_for_sdk(sdk_level: u32) -> Self {
        if sdk_level >= BROAD_STORAGE_MIN_SDK {
            Self::BroadStorageAccess
        } else {
            Self::LegacyStorageWrite
        }
    }

    /// Code correlating a prompt of this kind with its result
    pub fn request_code(self) -> RequestCode {
        match self {
            Self::LegacyStorageWrite => RequestCode(23),
            Self::BroadStorageAccess => RequestCode(24),
            Self::ExternalToolInvocation => RequestCode(26),
        }
    }

    /// Reverse of [`PermissionKind::request_code`]
    pub fn from_request_code(code: RequestCode) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.request_code() == code)
    }

    /// Whether this kind grants access to shared storage
    pub fn is_storage(self) -> bool {
        matches!(self, Self::BroadStorageAccess | Self::LegacyStorageWrite)
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BroadStorageAccess => "broad storage access",
            Self::LegacyStorageWrite => "legacy storage write",
            Self::ExternalToolInvocation => "external tool invocation",
        };
        f.write_str(name)
    }
}

/// Opaque tag attached to a platform permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestCode(pub i32);

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-permission entry of a platform result callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantResult {
    Granted,
    Denied,
}

/// Resolution of one permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

impl PermissionOutcome {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Observable state of a permission kind within a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    NotRequested,
    Requested,
    Granted,
    Denied,
}

impl From<PermissionOutcome> for PermissionState {
    fn from(outcome: PermissionOutcome) -> Self {
        match outcome {
            PermissionOutcome::Granted => Self::Granted,
            PermissionOutcome::Denied => Self::Denied,
        }
    }
}
