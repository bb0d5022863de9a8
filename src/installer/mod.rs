//! Installing and uninstalling the node as a supervised service.
//!
//! [`Installer`] turns a node binary and its configuration into a managed
//! installation registered with the service supervisor, and removes it again.
//!
//! # Installation Process
//!
//! 1. **Platform check**: the host must run systemd
//! 2. **Privilege check**: the installation root and the OS unit directory must be writable
//! 3. **Config validation**: the node configuration is parsed and validated
//! 4. **Pre-flight**: the service must not be running; existing files need `--force`
//! 5. **Lock**: the operation lock is taken for everything below
//! 6. **Layout**: `bin/`, `etc/` and `units/` are created under the root
//! 7. **Binary**: the running executable is installed as version `v<crate version>`
//! 8. **Config**: the validated config is rendered to `etc/piri-config.toml`
//! 9. **Units**: unit files are written, linked into the OS unit directory and loaded
//! 10. **Ownership**: the whole root is handed to the service user
//! 11. **Start**: the node service is enabled and started; the update timer too when requested
//!
//! Once step 6 begins, any failure tears down everything this run created
//! before the error is returned. An [`Interrupt`] is honoured between steps
//! and takes the same teardown path, with [`PiriError::Interrupted`] as the
//! cause. Teardown steps run independently of each
//! other; their outcomes are collected in a [`CleanupReport`] and attached to
//! the returned [`RollbackError`], whose source is the failure that triggered
//! the teardown.
//!
//! # Uninstall
//!
//! Units are stopped and disabled in [`TEARDOWN_ORDER`], unregistered, and
//! the supervisor reloaded. Units that do not exist are skipped. Binaries and
//! configuration stay on disk unless `purge` is set.

pub mod binary;
pub mod layout;
pub mod rollback;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{LifecycleConfig, NodeConfig};
use crate::constants::{SERVICE_UNIT, TEARDOWN_ORDER, UPDATER_TIMER_UNIT};
use crate::core::PiriError;
use crate::privilege::{ServiceAccount, needs_elevation};
use crate::service::{ServiceManager, ServiceTimeouts, ServiceUnitSet, Supervisor, UnitPaths, units};
use crate::upgrade::version::current_version;
use crate::utils::fs::{
    atomic_write, chown_tree, ensure_dir, path_present, remove_dir_if_exists, remove_file_if_exists,
};
use crate::utils::interrupt::Interrupt;
use crate::utils::lock::OperationLock;

use binary::InstallChange;
use layout::ManagedLayout;
pub use rollback::{CleanupFailure, CleanupReport, RollbackError};

/// Inputs of one install run.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Node configuration file to validate and install.
    pub config_path: PathBuf,
    /// Binary to install, normally the running executable.
    pub binary_path: PathBuf,
    pub service_user: ServiceAccount,
}

/// What a successful install produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSummary {
    pub version: String,
    pub service_user: String,
    pub units: Vec<String>,
    /// `false` when the update timer was requested but could not be started.
    pub auto_update_active: bool,
}

/// Everything an install has done so far, for teardown.
#[derive(Debug)]
struct InstallState {
    node_config: NodeConfig,
    destructive_started: bool,
    root_created: bool,
    previous_config: Option<Vec<u8>>,
    installed_version: Option<String>,
    previous_pointer: Option<String>,
    registered_units: Vec<String>,
}

/// Drives install and uninstall against one managed layout.
pub struct Installer<'a, S: Supervisor> {
    services: ServiceManager<'a, S>,
    config: &'a LifecycleConfig,
    layout: ManagedLayout,
    unit_paths: UnitPaths,
    interrupt: Interrupt,
}

impl<'a, S: Supervisor> Installer<'a, S> {
    pub fn new(supervisor: &'a S, config: &'a LifecycleConfig) -> Self {
        let layout = ManagedLayout::new(config.install_root.clone());
        let unit_paths = UnitPaths::new(layout.units_dir(), config.unit_dir.clone());
        Self {
            services: ServiceManager::new(supervisor),
            config,
            layout,
            unit_paths,
            interrupt: Interrupt::never(),
        }
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn layout(&self) -> &ManagedLayout {
        &self.layout
    }

    fn check_platform(&self) -> Result<(), PiriError> {
        if !cfg!(target_os = "linux") {
            return Err(PiriError::PlatformNotSupported {
                reason: format!("service installation requires Linux, this host runs {}", std::env::consts::OS),
            });
        }
        if !self.services.supervisor_available() {
            return Err(PiriError::PlatformNotSupported {
                reason: "systemd is not running on this host".to_string(),
            });
        }
        Ok(())
    }

    fn check_privileges(&self) -> Result<(), PiriError> {
        for path in [self.layout.root(), self.config.unit_dir.as_path()] {
            if needs_elevation(&[path]) {
                return Err(PiriError::PermissionDenied {
                    operation: "install piri as a system service".to_string(),
                    path: path.display().to_string(),
                });
            }
        }
        Ok(())
    }

    async fn preflight(&self, units: &ServiceUnitSet, version: &str) -> Result<()> {
        for name in units.names() {
            if self.services.is_active(name).await? {
                return Err(PiriError::ServiceActive {
                    unit: name.to_string(),
                }
                .into());
            }
        }

        if self.config.flags.force {
            debug!("--force given, existing files will be replaced");
            return Ok(());
        }

        let mut targets: Vec<(&str, PathBuf)> = vec![
            ("Node configuration", self.layout.config_path()),
            ("Node binary", self.layout.versioned_binary(version)),
        ];
        for unit in &units.units {
            targets.push(("Unit file", unit.install_path.clone()));
            targets.push(("Unit registration", unit.link_path.clone()));
        }
        if let Some((what, path)) = targets.into_iter().find(|(_, p)| path_present(p)) {
            return Err(PiriError::AlreadyInstalled {
                what: what.to_string(),
                path: path.display().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Install the node and start it as a service.
    pub async fn install(&self, request: &InstallRequest) -> Result<InstallSummary> {
        self.check_platform()?;
        self.check_privileges()?;

        let node_config = NodeConfig::load(&request.config_path).await?;
        let timeouts = ServiceTimeouts {
            shutdown_budget: node_config.shutdown_budget(),
        };
        let units = units::render(
            &request.service_user.name,
            &self.layout,
            &self.unit_paths,
            timeouts,
            self.config.flags.auto_update,
        )?;
        let version = current_version();

        self.interrupt.guard(self.preflight(&units, &version)).await??;

        let mut state = InstallState {
            node_config,
            destructive_started: false,
            root_created: !path_present(self.layout.root()),
            previous_config: None,
            installed_version: None,
            previous_pointer: None,
            registered_units: Vec::new(),
        };

        let lock = OperationLock::acquire(self.layout.root(), self.config.lock_timeout()).await?;
        state.destructive_started = true;

        match self.install_steps(request, &units, &version, &mut state).await {
            Ok(summary) => {
                drop(lock);
                Ok(summary)
            }
            Err(cause) => {
                warn!("Install failed, rolling back: {cause:#}");
                let mut report = self.teardown(&state).await;
                drop(lock);
                if state.root_created {
                    let root = self.layout.root();
                    report.record(format!("remove {}", root.display()), remove_dir_if_exists(root));
                }
                if report.is_clean() {
                    info!("Rollback completed");
                } else {
                    warn!("Rollback finished with errors: {report}");
                }
                Err(RollbackError {
                    cause,
                    report,
                }
                .into())
            }
        }
    }

    async fn install_steps(
        &self,
        request: &InstallRequest,
        units: &ServiceUnitSet,
        version: &str,
        state: &mut InstallState,
    ) -> Result<InstallSummary> {
        self.interrupt.check()?;
        for dir in [self.layout.bin_dir(), self.layout.etc_dir(), self.layout.units_dir()] {
            ensure_dir(&dir)?;
        }

        let bytes = tokio::fs::read(&request.binary_path)
            .await
            .with_context(|| format!("Failed to read {}", request.binary_path.display()))?;
        let installed = binary::install_managed(&self.layout, version, &bytes)?;
        if installed.change != InstallChange::Unchanged {
            state.previous_pointer = installed.previous.clone();
        }
        if installed.change == InstallChange::Installed {
            state.installed_version = Some(version.to_string());
        }
        self.interrupt.check()?;

        let config_path = self.layout.config_path();
        state.previous_config = match tokio::fs::read(&config_path).await {
            Ok(existing) => Some(existing),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", config_path.display()));
            }
        };
        let rendered = state.node_config.render()?;
        atomic_write(&config_path, rendered.as_bytes())?;
        info!("Installed node configuration at {}", config_path.display());
        self.interrupt.check()?;

        state.registered_units = units.names().into_iter().map(ToString::to_string).collect();
        self.services.install(units).await?;
        self.interrupt.check()?;

        chown_tree(self.layout.root(), request.service_user.uid, request.service_user.gid)
            .with_context(|| format!("Failed to hand {} to {}", self.layout.root().display(), request.service_user.name))?;

        self.interrupt.check()?;

        self.services.enable_and_start(SERVICE_UNIT).await?;

        let mut auto_update_active = false;
        if units.contains(UPDATER_TIMER_UNIT) {
            match self.services.enable_and_start(UPDATER_TIMER_UNIT).await {
                Ok(()) => auto_update_active = true,
                Err(e) => warn!(unit = UPDATER_TIMER_UNIT, "Failed to start update timer: {e:#}"),
            }
        }

        info!(version, user = %request.service_user.name, "Installation complete");
        Ok(InstallSummary {
            version: version.to_string(),
            service_user: request.service_user.name.clone(),
            units: state.registered_units.clone(),
            auto_update_active,
        })
    }

    /// Undo what `state` records. Never fails; outcomes go to the report.
    async fn teardown(&self, state: &InstallState) -> CleanupReport {
        let mut report = CleanupReport::new();
        if !state.destructive_started {
            return report;
        }

        for unit in TEARDOWN_ORDER {
            report.record(format!("stop {unit}"), self.services.disable_and_stop(unit).await);
        }

        let names: Vec<&str> = state.registered_units.iter().map(String::as_str).collect();
        self.services.unregister(&names, &self.unit_paths, &mut report).await;

        if state.root_created {
            // The whole root goes once the lock is released.
            return report;
        }

        let config_path = self.layout.config_path();
        match &state.previous_config {
            Some(previous) => report.record("restore node config", atomic_write(&config_path, previous)),
            None => report.record("remove node config", remove_file_if_exists(&config_path)),
        }

        match &state.previous_pointer {
            Some(previous) => {
                report.record("restore current pointer", binary::switch_pointer(&self.layout, previous));
            }
            None if state.installed_version.is_some() => {
                report.record("remove current pointer", remove_file_if_exists(&self.layout.current_pointer()));
            }
            None => {}
        }
        if let Some(version) = &state.installed_version {
            report.record(
                format!("remove binary {version}"),
                remove_dir_if_exists(&self.layout.versioned_bin_dir(version)),
            );
        }

        report
    }

    /// Stop and unregister every known unit; with `purge`, delete the root.
    ///
    /// Every step is attempted. Units that do not exist are not failures.
    pub async fn uninstall(&self, purge: bool) -> Result<CleanupReport> {
        self.check_platform()?;

        let root = self.layout.root();
        let lock = if path_present(root) {
            Some(OperationLock::acquire(root, self.config.lock_timeout()).await?)
        } else {
            None
        };

        let mut report = CleanupReport::new();
        for unit in TEARDOWN_ORDER {
            let result = self.services.disable_and_stop(unit).await;
            if let Ok(false) = result {
                info!(unit, "Not registered, skipping");
            }
            report.record(format!("stop {unit}"), result);
        }
        self.services.unregister(TEARDOWN_ORDER, &self.unit_paths, &mut report).await;

        drop(lock);
        if purge {
            report.record(format!("remove {}", root.display()), remove_dir_if_exists(root));
        } else {
            debug!("Keeping binaries and configuration under {}", root.display());
        }

        report.into_result("Uninstall")
    }
}

/// Whether `path` holds a managed installation.
pub fn is_installed(root: &Path) -> bool {
    ManagedLayout::new(root).current_binary().is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InvocationFlags;
    use crate::constants::UPDATER_SERVICE_UNIT;
    use crate::service::UnitAction;
    use crate::test_utils::RecordingSupervisor;
    use crate::test_utils::fixtures::node_config_toml;
    use std::fs;
    use tempfile::TempDir;

    struct Harness {
        temp: TempDir,
        config: LifecycleConfig,
        request: InstallRequest,
    }

    fn harness(flags: InvocationFlags) -> Harness {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("piri-config.toml");
        fs::write(&config_path, node_config_toml()).unwrap();
        let binary_path = temp.path().join("piri-build");
        fs::write(&binary_path, b"#!/bin/sh\necho piri\n").unwrap();

        let config = LifecycleConfig {
            install_root: temp.path().join("opt/piri"),
            unit_dir: temp.path().join("etc/systemd/system"),
            lock_timeout_secs: 1,
            ..LifecycleConfig::default()
        }
        .with_flags(flags);

        let request = InstallRequest {
            config_path,
            binary_path,
            service_user: ServiceAccount::effective().unwrap(),
        };
        Harness {
            temp,
            config,
            request,
        }
    }

    #[tokio::test]
    async fn test_install_creates_layout_and_starts_service() {
        let h = harness(InvocationFlags::default());
        let supervisor = RecordingSupervisor::new();
        let installer = Installer::new(&supervisor, &h.config);

        let summary = installer.install(&h.request).await.unwrap();
        assert_eq!(summary.version, current_version());
        assert_eq!(summary.units, vec![SERVICE_UNIT.to_string()]);

        let layout = installer.layout();
        assert!(layout.current_binary().is_file());
        assert!(layout.config_path().is_file());
        assert!(layout.units_dir().join(SERVICE_UNIT).is_file());
        assert!(fs::symlink_metadata(h.config.unit_dir.join(SERVICE_UNIT)).unwrap().file_type().is_symlink());
        assert!(!layout.root().join(crate::constants::LOCK_FILE_NAME).exists());
        assert!(is_installed(layout.root()));

        let calls = supervisor.calls();
        assert!(calls.contains(&"daemon-reload".to_string()));
        assert!(calls.ends_with(&["enable piri.service".to_string(), "start piri.service".to_string()]));
    }

    #[tokio::test]
    async fn test_install_with_auto_update_starts_timer() {
        let h = harness(InvocationFlags {
            auto_update: true,
            ..InvocationFlags::default()
        });
        let supervisor = RecordingSupervisor::new();
        let summary = Installer::new(&supervisor, &h.config).install(&h.request).await.unwrap();

        assert_eq!(summary.units.len(), 3);
        assert!(summary.auto_update_active);
        assert!(supervisor.calls().contains(&format!("start {UPDATER_TIMER_UNIT}")));
    }

    #[tokio::test]
    async fn test_timer_failure_is_not_fatal() {
        let h = harness(InvocationFlags {
            auto_update: true,
            ..InvocationFlags::default()
        });
        let supervisor = RecordingSupervisor::new().with_failure(UnitAction::Start, UPDATER_TIMER_UNIT);
        let installer = Installer::new(&supervisor, &h.config);

        let summary = installer.install(&h.request).await.unwrap();
        assert!(!summary.auto_update_active);
        assert!(installer.layout().current_binary().is_file());
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let h = harness(InvocationFlags::default());
        let supervisor = RecordingSupervisor::new().unavailable();
        let err = Installer::new(&supervisor, &h.config).install(&h.request).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PiriError>(), Some(PiriError::PlatformNotSupported { .. })));
        assert!(!h.config.install_root.exists());
    }

    #[tokio::test]
    async fn test_invalid_config_changes_nothing() {
        let h = harness(InvocationFlags::default());
        fs::write(&h.request.config_path, "[identity]\nkey_file = \"relative.pem\"\n").unwrap();
        let supervisor = RecordingSupervisor::new();

        let err = Installer::new(&supervisor, &h.config).install(&h.request).await.unwrap_err();
        assert!(err.chain().any(|e| matches!(e.downcast_ref::<PiriError>(), Some(PiriError::ConfigError { .. }))));
        assert!(!h.config.install_root.exists());
        assert!(supervisor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_active_service_is_rejected() {
        let h = harness(InvocationFlags::default());
        let supervisor = RecordingSupervisor::new().with_active_unit(SERVICE_UNIT);
        let err = Installer::new(&supervisor, &h.config).install(&h.request).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PiriError>(), Some(PiriError::ServiceActive { .. })));
        assert!(!h.config.install_root.exists());
    }

    #[tokio::test]
    async fn test_existing_install_requires_force() {
        let h = harness(InvocationFlags::default());
        let supervisor = RecordingSupervisor::new();
        Installer::new(&supervisor, &h.config).install(&h.request).await.unwrap();

        let err = Installer::new(&supervisor, &h.config).install(&h.request).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PiriError>(), Some(PiriError::AlreadyInstalled { .. })));

        let forced = h.config.clone().with_flags(InvocationFlags {
            force: true,
            ..InvocationFlags::default()
        });
        Installer::new(&supervisor, &forced).install(&h.request).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_failure_tears_down_everything() {
        let h = harness(InvocationFlags::default());
        let supervisor = RecordingSupervisor::new().with_failure(UnitAction::Start, SERVICE_UNIT);

        let err = Installer::new(&supervisor, &h.config).install(&h.request).await.unwrap_err();
        let rollback = err.downcast_ref::<RollbackError>().unwrap();
        assert!(rollback.report.is_clean());
        assert!(matches!(
            rollback.cause.downcast_ref::<PiriError>(),
            Some(PiriError::SupervisorError { action, .. }) if action == "start"
        ));

        assert!(!h.config.install_root.exists());
        assert!(!h.config.unit_dir.join(SERVICE_UNIT).exists());
        let calls = supervisor.calls();
        assert!(calls.contains(&format!("stop {UPDATER_TIMER_UNIT}")));
        assert!(calls.contains(&format!("disable {SERVICE_UNIT}")));
        assert_eq!(
            rollback.report.completed.last(),
            Some(&format!("remove {}", h.config.install_root.display()))
        );
    }

    #[tokio::test]
    async fn test_interrupt_mid_install_tears_down() {
        let h = harness(InvocationFlags {
            auto_update: true,
            ..InvocationFlags::default()
        });
        let (trigger, interrupt) = Interrupt::channel();
        let supervisor = RecordingSupervisor::new().with_interrupt_during(UnitAction::DaemonReload, trigger);

        let err = Installer::new(&supervisor, &h.config)
            .with_interrupt(interrupt)
            .install(&h.request)
            .await
            .unwrap_err();

        let rollback = err.downcast_ref::<RollbackError>().unwrap();
        assert!(matches!(rollback.cause.downcast_ref::<PiriError>(), Some(PiriError::Interrupted)));
        assert!(rollback.report.is_clean());
        assert!(!h.config.install_root.exists());
        for unit in TEARDOWN_ORDER {
            assert!(fs::symlink_metadata(h.config.unit_dir.join(unit)).is_err());
        }
        let calls = supervisor.calls();
        assert!(!calls.contains(&format!("start {SERVICE_UNIT}")));
        assert!(calls.contains(&format!("stop {SERVICE_UNIT}")));
    }

    #[tokio::test]
    async fn test_interrupt_before_lock_changes_nothing() {
        let h = harness(InvocationFlags::default());
        let (trigger, interrupt) = Interrupt::channel();
        trigger.fire();
        let supervisor = RecordingSupervisor::new();

        let err = Installer::new(&supervisor, &h.config)
            .with_interrupt(interrupt)
            .install(&h.request)
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<PiriError>(), Some(PiriError::Interrupted)));
        assert!(!h.config.install_root.exists());
        assert!(supervisor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_failure_does_not_mask_cause() {
        let h = harness(InvocationFlags::default());
        let supervisor = RecordingSupervisor::new()
            .with_failure(UnitAction::Start, SERVICE_UNIT)
            .with_failure(UnitAction::Stop, SERVICE_UNIT);

        let err = Installer::new(&supervisor, &h.config).install(&h.request).await.unwrap_err();
        let rollback = err.downcast_ref::<RollbackError>().unwrap();
        assert_eq!(rollback.report.failures.len(), 1);
        assert_eq!(rollback.report.failures[0].step, format!("stop {SERVICE_UNIT}"));
        assert!(matches!(
            rollback.cause.downcast_ref::<PiriError>(),
            Some(PiriError::SupervisorError { action, .. }) if action == "start"
        ));
        assert!(err.to_string().contains("cleanup errors"));
    }

    #[tokio::test]
    async fn test_rollback_restores_existing_installation() {
        let h = harness(InvocationFlags::default());
        let layout = ManagedLayout::new(&h.config.install_root);
        fs::create_dir_all(layout.versioned_bin_dir("v0.0.1")).unwrap();
        fs::write(layout.versioned_binary("v0.0.1"), b"old").unwrap();
        binary::switch_pointer(&layout, "v0.0.1").unwrap();
        fs::create_dir_all(layout.etc_dir()).unwrap();
        fs::write(layout.config_path(), b"# previous config\n").unwrap();

        let forced = h.config.clone().with_flags(InvocationFlags {
            force: true,
            ..InvocationFlags::default()
        });
        let supervisor = RecordingSupervisor::new().with_failure(UnitAction::Enable, SERVICE_UNIT);
        let err = Installer::new(&supervisor, &forced).install(&h.request).await.unwrap_err();
        assert!(err.downcast_ref::<RollbackError>().unwrap().report.is_clean());

        assert_eq!(binary::current_version(&layout).unwrap().as_deref(), Some("v0.0.1"));
        assert!(!layout.versioned_bin_dir(&current_version()).exists());
        assert_eq!(fs::read_to_string(layout.config_path()).unwrap(), "# previous config\n");
        assert!(!layout.units_dir().join(SERVICE_UNIT).exists());
    }

    #[tokio::test]
    async fn test_uninstall_keeps_binaries_without_purge() {
        let h = harness(InvocationFlags {
            auto_update: true,
            ..InvocationFlags::default()
        });
        let supervisor = RecordingSupervisor::new();
        let installer = Installer::new(&supervisor, &h.config);
        installer.install(&h.request).await.unwrap();

        let teardown = RecordingSupervisor::new();
        let report = Installer::new(&teardown, &h.config).uninstall(false).await.unwrap();
        assert!(report.is_clean());

        let stops: Vec<String> =
            teardown.calls().into_iter().filter(|c| c.starts_with("stop ")).collect();
        assert_eq!(
            stops,
            vec![
                format!("stop {UPDATER_TIMER_UNIT}"),
                format!("stop {UPDATER_SERVICE_UNIT}"),
                format!("stop {SERVICE_UNIT}"),
            ]
        );
        for unit in TEARDOWN_ORDER {
            assert!(!h.config.unit_dir.join(unit).exists());
            assert!(!installer.layout().units_dir().join(unit).exists());
        }
        assert!(installer.layout().current_binary().is_file());
        assert!(installer.layout().config_path().is_file());
    }

    #[tokio::test]
    async fn test_uninstall_purge_removes_root() {
        let h = harness(InvocationFlags::default());
        let supervisor = RecordingSupervisor::new();
        Installer::new(&supervisor, &h.config).install(&h.request).await.unwrap();

        Installer::new(&supervisor, &h.config).uninstall(true).await.unwrap();
        assert!(!h.config.install_root.exists());
        assert!(h.temp.path().exists());
    }

    #[tokio::test]
    async fn test_uninstall_aggregates_failures() {
        let h = harness(InvocationFlags::default());
        let supervisor = RecordingSupervisor::new()
            .with_failure(UnitAction::Stop, UPDATER_TIMER_UNIT)
            .with_failure(UnitAction::Disable, SERVICE_UNIT);

        let err = Installer::new(&supervisor, &h.config).uninstall(false).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&format!("stop {UPDATER_TIMER_UNIT}")));
        assert!(message.contains(&format!("stop {SERVICE_UNIT}")));
        assert!(supervisor.calls().contains(&"daemon-reload".to_string()));
    }
}
