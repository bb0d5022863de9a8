use std::fs;

use piri_lifecycle::config::InvocationFlags;
use piri_lifecycle::constants::{SERVICE_UNIT, TEARDOWN_ORDER, UPDATER_SERVICE_UNIT, UPDATER_TIMER_UNIT};
use piri_lifecycle::installer::binary::current_version;
use piri_lifecycle::installer::layout::InstallationLayout;
use piri_lifecycle::installer::{InstallRequest, Installer, RollbackError, is_installed};
use piri_lifecycle::privilege::{ServiceAccount, detect_service_user};
use piri_lifecycle::release::Platform;
use piri_lifecycle::service::UnitAction;
use piri_lifecycle::test_utils::{FakeStatus, RecordingSupervisor};
use piri_lifecycle::upgrade::version::current_version as crate_version;
use piri_lifecycle::upgrade::{RestartAction, UpdateMode, UpdateOrchestrator, UpdateOutcome};
use serial_test::serial;

use crate::common::{FakeRelease, TestHost};

fn request(host: &TestHost) -> InstallRequest {
    InstallRequest {
        config_path: host.write_node_config(),
        binary_path: host.write_binary(),
        service_user: ServiceAccount::effective().unwrap(),
    }
}

#[tokio::test]
async fn test_install_update_rollback_uninstall() {
    let host = TestHost::new(InvocationFlags {
        auto_update: true,
        ..InvocationFlags::default()
    });
    let supervisor = RecordingSupervisor::new();

    let summary = Installer::new(&supervisor, &host.config).install(&request(&host)).await.unwrap();
    assert_eq!(summary.version, crate_version());
    assert_eq!(summary.units, vec![SERVICE_UNIT, UPDATER_SERVICE_UNIT, UPDATER_TIMER_UNIT]);
    let layout = host.layout();
    assert!(is_installed(layout.root()));

    let unit = fs::read_to_string(host.config.unit_dir.join(SERVICE_UNIT)).unwrap();
    assert!(unit.contains(&format!("ExecStart={} serve full", layout.current_binary().display())));
    assert!(unit.contains("TimeoutStopSec=40"));

    let release = FakeRelease::new("v99.1.0");
    let fetcher = release.fetcher();
    let status = FakeStatus::safe();
    let running = RecordingSupervisor::new().with_active_unit(SERVICE_UNIT);
    let orchestrator = UpdateOrchestrator::new(
        &fetcher,
        &status,
        &running,
        &host.config,
        InstallationLayout::Managed(layout.clone()),
        UpdateMode::Unattended,
    )
    .with_platform(Platform::new("linux", "amd64"));

    let outcome = orchestrator.run().await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            from: crate_version(),
            to: "v99.1.0".into(),
            restart: RestartAction::Restarted,
        }
    );
    assert_eq!(fs::read(layout.current_binary()).unwrap(), release.binary);

    let outcome = orchestrator.rollback().await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::RolledBack {
            from: "v99.1.0".into(),
            to: crate_version(),
            restart: RestartAction::Restarted,
        }
    );
    assert_eq!(current_version(&layout).unwrap(), Some(crate_version()));

    let report = Installer::new(&supervisor, &host.config).uninstall(false).await.unwrap();
    assert!(report.is_clean());
    for unit in TEARDOWN_ORDER {
        assert!(fs::symlink_metadata(host.config.unit_dir.join(unit)).is_err());
    }
    assert!(layout.versioned_binary("v99.1.0").is_file());
    assert!(layout.config_path().is_file());
}

#[tokio::test]
async fn test_uninstall_with_nothing_registered() {
    let host = TestHost::new(InvocationFlags::default());
    let mut supervisor = RecordingSupervisor::new();
    for unit in TEARDOWN_ORDER {
        supervisor = supervisor.with_missing_unit(unit);
    }

    let report = Installer::new(&supervisor, &host.config).uninstall(false).await.unwrap();

    assert!(report.is_clean());
    let calls = supervisor.calls();
    for unit in TEARDOWN_ORDER {
        assert!(calls.contains(&format!("stop {unit}")));
        assert!(calls.contains(&format!("disable {unit}")));
    }
    assert_eq!(calls.last().map(String::as_str), Some("daemon-reload"));
    assert!(!host.config.install_root.exists());
}

#[tokio::test]
async fn test_failed_install_leaves_no_trace() {
    let host = TestHost::new(InvocationFlags {
        auto_update: true,
        ..InvocationFlags::default()
    });
    let supervisor = RecordingSupervisor::new().with_failure(UnitAction::Enable, SERVICE_UNIT);

    let err = Installer::new(&supervisor, &host.config).install(&request(&host)).await.unwrap_err();

    let rollback = err.downcast_ref::<RollbackError>().unwrap();
    assert!(rollback.report.is_clean());
    assert!(!host.config.install_root.exists());
    for unit in TEARDOWN_ORDER {
        assert!(fs::symlink_metadata(host.config.unit_dir.join(unit)).is_err());
    }

    // A clean retry succeeds once the supervisor cooperates.
    let supervisor = RecordingSupervisor::new();
    Installer::new(&supervisor, &host.config).install(&request(&host)).await.unwrap();
}

#[test]
#[serial]
fn test_sudo_root_falls_back_to_effective_user() {
    let previous = std::env::var_os("SUDO_USER");
    // SAFETY: serialized with every other test touching the environment.
    unsafe {
        std::env::set_var("SUDO_USER", "root");
    }

    let account = detect_service_user(None);

    unsafe {
        match previous {
            Some(value) => std::env::set_var("SUDO_USER", value),
            None => std::env::remove_var("SUDO_USER"),
        }
    }
    assert_eq!(account.unwrap(), ServiceAccount::effective().unwrap());
}
