//! End-to-end launch scenarios

use std::sync::Arc;

use uqm_launcher::permission::RecordingPermissionHost;
use uqm_launcher::preference::DEFAULT_LOG_FILE_PATH;
use uqm_launcher::{
    DenialPolicy, EngineLauncher, EngineLauncherBuilder, FileKeyValueStore, GrantResult,
    LaunchError, LauncherConfig, MemoryKeyValueStore, PermissionKind, PermissionOutcome,
    PreferenceStore, RecordingProcessHost,
};

const LEGACY_SDK: u32 = 29;
const MODERN_SDK: u32 = 33;

fn build_launcher(
    host: Arc<RecordingPermissionHost>,
    process: Arc<RecordingProcessHost>,
    policy: DenialPolicy,
) -> Arc<EngineLauncher> {
    let config = LauncherConfig {
        denial_policy: policy,
        ..LauncherConfig::default()
    };
    let launcher = EngineLauncherBuilder::new(config)
        .store(Arc::new(MemoryKeyValueStore::new()))
        .permission_host(host)
        .process_host(process)
        .build()
        .expect("Failed to build launcher");
    Arc::new(launcher)
}

async fn wait_until_pending(launcher: &EngineLauncher, kind: PermissionKind) {
    while !launcher.coordinator().is_pending(kind) {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_default_preference_skips_permission() {
    let host = Arc::new(RecordingPermissionHost::new(MODERN_SDK));
    let process = Arc::new(RecordingProcessHost::new());
    let launcher = build_launcher(host.clone(), process.clone(), DenialPolicy::DisableLogging);

    let report = launcher.launch().await.expect("Launch failed");

    assert!(report.arguments.args.is_empty());
    assert_eq!(report.permission, None);
    assert!(!report.logging_degraded);
    assert_eq!(host.request_count(), 0);

    let launches = process.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(
        launches[0].libraries,
        vec!["c++_shared", "openal", "SDL2", "UrQuanMasters"]
    );
}

#[tokio::test]
async fn test_logging_with_granted_permission() {
    let host = Arc::new(RecordingPermissionHost::with_granted(
        MODERN_SDK,
        [PermissionKind::BroadStorageAccess],
    ));
    let process = Arc::new(RecordingProcessHost::new());
    let launcher = build_launcher(host.clone(), process.clone(), DenialPolicy::DisableLogging);
    launcher.preferences().set(true);

    let report = launcher.launch().await.expect("Launch failed");

    assert_eq!(
        report.arguments.args,
        vec![format!("--log={}", DEFAULT_LOG_FILE_PATH)]
    );
    assert_eq!(report.permission, Some(PermissionOutcome::Granted));
    assert_eq!(host.request_count(), 0);
    assert_eq!(process.launches()[0].args, report.arguments.args);
}

#[tokio::test]
async fn test_user_grants_legacy_permission() {
    let host = Arc::new(RecordingPermissionHost::new(LEGACY_SDK));
    let process = Arc::new(RecordingProcessHost::new());
    let launcher = build_launcher(host.clone(), process.clone(), DenialPolicy::DisableLogging);
    launcher.preferences().set(true);

    let launch = tokio::spawn({
        let launcher = launcher.clone();
        async move { launcher.launch().await }
    });
    wait_until_pending(&launcher, PermissionKind::LegacyStorageWrite).await;

    // Nothing starts while the prompt is up
    assert_eq!(process.launch_count(), 0);
    let requests = host.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, PermissionKind::LegacyStorageWrite);

    launcher
        .coordinator()
        .on_permission_result(requests[0].code, &[GrantResult::Granted]);

    let report = launch.await.unwrap().expect("Launch failed");
    assert_eq!(report.permission, Some(PermissionOutcome::Granted));
    assert_eq!(report.arguments.args.len(), 1);
    assert_eq!(process.launch_count(), 1);
}

#[tokio::test]
async fn test_denial_disables_logging() {
    let host = Arc::new(RecordingPermissionHost::new(LEGACY_SDK));
    let process = Arc::new(RecordingProcessHost::new());
    let launcher = build_launcher(host.clone(), process.clone(), DenialPolicy::DisableLogging);
    launcher.preferences().set(true);

    let launch = tokio::spawn({
        let launcher = launcher.clone();
        async move { launcher.launch().await }
    });
    wait_until_pending(&launcher, PermissionKind::LegacyStorageWrite).await;
    launcher.coordinator().on_permission_result(
        PermissionKind::LegacyStorageWrite.request_code(),
        &[GrantResult::Denied],
    );

    let report = launch.await.unwrap().expect("Launch failed");
    assert!(report.arguments.args.is_empty());
    assert_eq!(report.permission, Some(PermissionOutcome::Denied));
    assert!(report.logging_degraded);
    assert_eq!(process.launch_count(), 1);

    // The stored preference is left alone
    assert!(launcher.preferences().get().enabled);
}

#[tokio::test]
async fn test_denial_keeps_logging_when_configured() {
    let host = Arc::new(RecordingPermissionHost::new(MODERN_SDK));
    let process = Arc::new(RecordingProcessHost::new());
    let launcher = build_launcher(host.clone(), process.clone(), DenialPolicy::KeepLogging);
    launcher.preferences().set(true);

    let launch = tokio::spawn({
        let launcher = launcher.clone();
        async move { launcher.launch().await }
    });
    wait_until_pending(&launcher, PermissionKind::BroadStorageAccess).await;
    // Settings screen closed without granting
    launcher
        .coordinator()
        .on_permission_result(PermissionKind::BroadStorageAccess.request_code(), &[]);

    let report = launch.await.unwrap().expect("Launch failed");
    assert_eq!(report.permission, Some(PermissionOutcome::Denied));
    assert_eq!(
        report.arguments.args,
        vec![format!("--log={}", DEFAULT_LOG_FILE_PATH)]
    );
    assert!(!report.logging_degraded);
}

#[tokio::test]
async fn test_abandoned_prompt_counts_as_denied() {
    let host = Arc::new(RecordingPermissionHost::new(LEGACY_SDK));
    let process = Arc::new(RecordingProcessHost::new());
    let launcher = build_launcher(host.clone(), process.clone(), DenialPolicy::DisableLogging);
    launcher.preferences().set(true);

    let launch = tokio::spawn({
        let launcher = launcher.clone();
        async move { launcher.launch().await }
    });
    wait_until_pending(&launcher, PermissionKind::LegacyStorageWrite).await;
    launcher.coordinator().abandon_all();

    let report = launch.await.unwrap().expect("Launch failed");
    assert_eq!(report.permission, Some(PermissionOutcome::Denied));
    assert!(report.logging_degraded);
}

#[tokio::test]
async fn test_missing_engine_library_fails_launch() {
    let host = Arc::new(RecordingPermissionHost::new(MODERN_SDK));
    let process = Arc::new(RecordingProcessHost::missing_library("UrQuanMasters"));
    let launcher = build_launcher(host, process.clone(), DenialPolicy::DisableLogging);

    let err = launcher.launch().await.unwrap_err();

    assert!(matches!(err, LaunchError::LibraryLoad { .. }));
    assert!(err.to_string().contains("UrQuanMasters"));
    assert_eq!(process.launch_count(), 0);
}

#[tokio::test]
async fn test_preference_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("preferences.json");

    {
        let store = FileKeyValueStore::new(&path).unwrap();
        PreferenceStore::new(Arc::new(store)).set(true);
    }

    // New process: fresh store on the same file
    let host = Arc::new(RecordingPermissionHost::with_granted(
        MODERN_SDK,
        [PermissionKind::BroadStorageAccess],
    ));
    let process = Arc::new(RecordingProcessHost::new());
    let launcher = EngineLauncherBuilder::new(LauncherConfig {
        preferences_path: Some(path),
        ..LauncherConfig::default()
    })
    .permission_host(host)
    .process_host(process)
    .build()
    .unwrap();

    let report = launcher.launch().await.unwrap();
    assert_eq!(
        report.arguments.args,
        vec![format!("--log={}", DEFAULT_LOG_FILE_PATH)]
    );
}

#[tokio::test]
async fn test_corrupt_preference_file_still_launches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("preferences.json");
    std::fs::write(&path, "{ not json").unwrap();

    let host = Arc::new(RecordingPermissionHost::new(MODERN_SDK));
    let process = Arc::new(RecordingProcessHost::new());
    let launcher = EngineLauncherBuilder::new(LauncherConfig {
        preferences_path: Some(path.clone()),
        ..LauncherConfig::default()
    })
    .permission_host(host.clone())
    .process_host(process.clone())
    .build()
    .expect("Corrupt preferences must not block the launch");

    let report = launcher.launch().await.unwrap();
    assert!(report.arguments.args.is_empty());
    assert_eq!(host.request_count(), 0);
    assert_eq!(process.launch_count(), 1);

    // The next toggle replaces the unreadable file
    launcher.preferences().set(true);
    let reopened = FileKeyValueStore::new(&path).unwrap();
    assert!(PreferenceStore::new(Arc::new(reopened)).get().enabled);
}
