//! Permission acquisition for the launch flow
//!
//! The platform exposes its permission subsystem through [`PermissionHost`].
//! [`PermissionCoordinator`] turns the prompt/callback round trip into a
//! future with explicit per-kind states:
//!
//! ```text
//! NotRequested ──(already granted)──────────────► Granted
//!      │
//!      └──(prompt issued)──► Requested ──(result)──► Granted | Denied
//!                                 │
//!                                 └──(abandon / timeout)──► NotRequested
//! ```
//!
//! | Kind | Request code | Result source |
//! |------|--------------|---------------|
//! | LegacyStorageWrite | 23 | first grant result |
//! | BroadStorageAccess | 24 | platform re-query |
//! | ExternalToolInvocation | 26 | first grant result |

pub mod coordinator;
pub mod host;
pub mod kind;

pub use coordinator::{PermissionCoordinator, PermissionError};
pub use host::{AutoPermissionHost, PermissionHost, RecordedRequest, RecordingPermissionHost};
pub use kind::{
    GrantResult, PermissionKind, PermissionOutcome, PermissionState, RequestCode,
    BROAD_STORAGE_MIN_SDK,
};
