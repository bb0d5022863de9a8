use std::fs;

use piri_lifecycle::config::InvocationFlags;
use piri_lifecycle::core::PiriError;
use piri_lifecycle::installer::binary::{current_version, installed_versions};
use piri_lifecycle::installer::layout::InstallationLayout;
use piri_lifecycle::release::Platform;
use piri_lifecycle::test_utils::{FakeFetcher, FakeStatus, RecordingSupervisor, init_test_logging};
use piri_lifecycle::upgrade::{RestartAction, UnsafeReason, UpdateMode, UpdateOrchestrator, UpdateOutcome};

use crate::common::{ASSET_URL, CHECKSUMS_URL, FakeRelease, INDEX_URL, TestHost};

fn piri_error(err: &anyhow::Error) -> Option<&PiriError> {
    err.chain().find_map(|e| e.downcast_ref::<PiriError>())
}

async fn run_cycle(
    host: &TestHost,
    fetcher: &FakeFetcher,
    status: &FakeStatus,
    supervisor: &RecordingSupervisor,
) -> anyhow::Result<UpdateOutcome> {
    UpdateOrchestrator::new(
        fetcher,
        status,
        supervisor,
        &host.config,
        InstallationLayout::Managed(host.layout()),
        UpdateMode::Unattended,
    )
    .with_platform(Platform::new("linux", "amd64"))
    .run()
    .await
}

#[tokio::test]
async fn test_full_cycle_installs_new_version() {
    init_test_logging(None);
    let host = TestHost::new(InvocationFlags::default());
    let layout = host.seed_managed("v1.0.0");
    let release = FakeRelease::new("v1.2.0");
    let fetcher = release.fetcher();
    let status = FakeStatus::safe();
    let supervisor = RecordingSupervisor::new().with_active_unit("piri.service");

    let outcome = run_cycle(&host, &fetcher, &status, &supervisor).await.unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            from: "v1.0.0".into(),
            to: "v1.2.0".into(),
            restart: RestartAction::Restarted,
        }
    );
    assert_eq!(fs::read(layout.versioned_binary("v1.2.0")).unwrap(), release.binary);
    assert_eq!(fs::read(layout.current_binary()).unwrap(), release.binary);
    assert_eq!(current_version(&layout).unwrap().as_deref(), Some("v1.2.0"));
    assert_eq!(installed_versions(&layout).unwrap(), vec!["v1.0.0", "v1.2.0"]);
    assert_eq!(fetcher.requests(), vec![INDEX_URL, CHECKSUMS_URL, ASSET_URL]);

    let leftovers: Vec<_> = fs::read_dir(layout.bin_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.'))
        .collect();
    assert!(leftovers.is_empty(), "staging left behind: {leftovers:?}");
}

#[tokio::test]
async fn test_proving_node_defers_without_download() {
    let host = TestHost::new(InvocationFlags::default());
    let layout = host.seed_managed("v1.0.0");
    let fetcher = FakeRelease::new("v1.2.0").fetcher();
    let status = FakeStatus::always_proving();
    let supervisor = RecordingSupervisor::new().with_active_unit("piri.service");

    let outcome = run_cycle(&host, &fetcher, &status, &supervisor).await.unwrap();

    assert_eq!(outcome, UpdateOutcome::Deferred(UnsafeReason::ActivelyProving));
    assert!(!fetcher.requested(ASSET_URL));
    assert!(supervisor.calls().is_empty());
    assert_eq!(current_version(&layout).unwrap().as_deref(), Some("v1.0.0"));
}

#[tokio::test]
async fn test_unreachable_node_defers() {
    let host = TestHost::new(InvocationFlags::default());
    host.seed_managed("v1.0.0");
    let fetcher = FakeRelease::new("v1.2.0").fetcher();
    let status = FakeStatus::unavailable();
    let supervisor = RecordingSupervisor::new();

    let outcome = run_cycle(&host, &fetcher, &status, &supervisor).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Deferred(UnsafeReason::StatusUnavailable));
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn test_missing_checksum_aborts_before_archive_download() {
    let host = TestHost::new(InvocationFlags::default());
    let layout = host.seed_managed("v1.0.0");
    let fetcher = FakeRelease::new("v1.2.0").with_checksum_for("piri_linux_arm64.tar.gz").fetcher();
    let status = FakeStatus::safe();
    let supervisor = RecordingSupervisor::new();

    let err = run_cycle(&host, &fetcher, &status, &supervisor).await.unwrap_err();

    assert!(matches!(
        piri_error(&err),
        Some(PiriError::ChecksumNotFound { filename }) if filename == "piri_linux_amd64.tar.gz"
    ));
    assert!(piri_error(&err).unwrap().is_defect());
    assert!(fetcher.requested(CHECKSUMS_URL));
    assert!(!fetcher.requested(ASSET_URL));
    assert!(!layout.versioned_bin_dir("v1.2.0").exists());
}

#[tokio::test]
async fn test_tampered_archive_is_rejected() {
    let host = TestHost::new(InvocationFlags::default());
    let layout = host.seed_managed("v1.0.0");
    let fetcher = FakeRelease::new("v1.2.0").fetcher().with_response(ASSET_URL, b"not the published archive");
    let status = FakeStatus::safe();
    let supervisor = RecordingSupervisor::new().with_active_unit("piri.service");

    let err = run_cycle(&host, &fetcher, &status, &supervisor).await.unwrap_err();

    assert!(matches!(piri_error(&err), Some(PiriError::IntegrityError { .. })));
    assert!(!layout.versioned_bin_dir("v1.2.0").exists());
    assert_eq!(current_version(&layout).unwrap().as_deref(), Some("v1.0.0"));
    assert!(supervisor.calls().is_empty());
}

#[tokio::test]
async fn test_proving_starts_during_download() {
    let host = TestHost::new(InvocationFlags::default());
    let layout = host.seed_managed("v1.0.0");
    let fetcher = FakeRelease::new("v1.2.0").fetcher();
    let status = FakeStatus::sequence(vec![Ok(FakeStatus::idle()), Ok(FakeStatus::unproven_window())]);
    let supervisor = RecordingSupervisor::new().with_active_unit("piri.service");

    let outcome = run_cycle(&host, &fetcher, &status, &supervisor).await.unwrap();

    assert_eq!(outcome, UpdateOutcome::Deferred(UnsafeReason::UnprovenChallengeWindow));
    assert!(fetcher.requested(ASSET_URL));
    assert!(!layout.versioned_bin_dir("v1.2.0").exists());
    assert_eq!(current_version(&layout).unwrap().as_deref(), Some("v1.0.0"));
    assert!(supervisor.calls().is_empty());
}

#[tokio::test]
async fn test_release_index_outage_is_transient() {
    let host = TestHost::new(InvocationFlags::default());
    host.seed_managed("v1.0.0");
    let fetcher = FakeFetcher::new();
    let status = FakeStatus::safe();
    let supervisor = RecordingSupervisor::new();

    let err = run_cycle(&host, &fetcher, &status, &supervisor).await.unwrap_err();
    let cause = piri_error(&err).unwrap();
    assert!(matches!(cause, PiriError::NetworkError { .. }));
    assert!(!cause.is_defect());
}
