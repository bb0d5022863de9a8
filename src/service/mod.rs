//! Service unit management.
//!
//! [`ServiceManager`] registers rendered units with the supervisor and drives
//! their lifecycle. Unit bodies live under the installation root and are
//! registered by symlinking them into the OS unit directory, so removing an
//! installation root never leaves orphaned unit files behind in `/etc`.
//!
//! Teardown-style operations ([`ServiceManager::disable_and_stop`],
//! [`ServiceManager::unregister`]) tolerate units that do not exist; a second
//! uninstall is a no-op rather than an error.

pub mod systemctl;
pub mod units;

use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::PiriError;
use crate::installer::rollback::CleanupReport;
use crate::utils::fs::{atomic_write, remove_file_if_exists};
pub use systemctl::{Supervisor, SupervisorOutput, Systemctl, SystemctlCommand, UnitAction};
pub use units::{ServiceTimeouts, ServiceUnitSet, UnitDefinition, UnitPaths};

pub struct ServiceManager<'a, S: Supervisor> {
    supervisor: &'a S,
}

impl<'a, S: Supervisor> ServiceManager<'a, S> {
    pub fn new(supervisor: &'a S) -> Self {
        Self {
            supervisor,
        }
    }

    pub fn supervisor_available(&self) -> bool {
        self.supervisor.is_available()
    }

    /// Write every unit file, link it into the OS unit directory and reload.
    pub async fn install(&self, set: &ServiceUnitSet) -> Result<()> {
        for unit in &set.units {
            atomic_write(&unit.install_path, unit.body.as_bytes())
                .with_context(|| format!("Failed to write unit {}", unit.name))?;
            link_unit(&unit.install_path, &unit.link_path)?;
            info!(unit = %unit.name, "Registered unit at {}", unit.link_path.display());
        }
        self.daemon_reload().await
    }

    pub async fn daemon_reload(&self) -> Result<()> {
        let output = self.supervisor.run(UnitAction::DaemonReload, None).await?;
        if !output.is_success() {
            return Err(output.into_error(UnitAction::DaemonReload, "").into());
        }
        Ok(())
    }

    async fn run_checked(&self, action: UnitAction, unit: &str) -> Result<(), PiriError> {
        let output = self.supervisor.run(action, Some(unit)).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(output.into_error(action, unit))
        }
    }

    /// `systemctl enable` then `systemctl start`.
    pub async fn enable_and_start(&self, unit: &str) -> Result<()> {
        self.run_checked(UnitAction::Enable, unit).await?;
        self.run_checked(UnitAction::Start, unit).await?;
        info!(unit, "Enabled and started");
        Ok(())
    }

    /// Stop then disable `unit`. "Not found" is tolerated.
    ///
    /// Returns `false` when the unit did not exist.
    pub async fn disable_and_stop(&self, unit: &str) -> Result<bool> {
        let mut existed = true;
        for action in [UnitAction::Stop, UnitAction::Disable] {
            let output = self.supervisor.run(action, Some(unit)).await?;
            if output.is_success() {
                continue;
            }
            if output.is_not_found() {
                debug!(unit, %action, "Unit not found, skipping");
                existed = false;
                continue;
            }
            return Err(output.into_error(action, unit).into());
        }
        if existed {
            info!(unit, "Stopped and disabled");
        }
        Ok(existed)
    }

    /// Whether `unit` is currently active. Any non-zero exit means inactive.
    pub async fn is_active(&self, unit: &str) -> Result<bool> {
        let output = self.supervisor.run(UnitAction::IsActive, Some(unit)).await?;
        Ok(output.is_success())
    }

    pub async fn restart(&self, unit: &str) -> Result<()> {
        self.run_checked(UnitAction::Restart, unit).await?;
        info!(unit, "Restarted");
        Ok(())
    }

    /// Remove the OS links and unit files for `names`, then reload.
    ///
    /// Every step is attempted; outcomes go to `report`.
    pub async fn unregister(&self, names: &[&str], paths: &UnitPaths, report: &mut CleanupReport) {
        for name in names {
            report.record(format!("remove unit link {name}"), remove_file_if_exists(&paths.link_path(name)));
            report.record(
                format!("remove unit file {name}"),
                remove_file_if_exists(&paths.install_path(name)),
            );
        }
        report.record("daemon-reload", self.daemon_reload().await);
    }
}

/// Point `link` at `target`, replacing an existing link.
fn link_unit(target: &Path, link: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(link) {
        if !meta.file_type().is_symlink() {
            warn!("Replacing regular file {} with a link", link.display());
        }
        fs::remove_file(link).with_context(|| format!("Failed to remove {}", link.display()))?;
    }
    if let Some(parent) = link.parent() {
        crate::utils::fs::ensure_dir(parent)?;
    }
    symlink(target, link)
        .with_context(|| format!("Failed to link {} -> {}", link.display(), target.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::layout::ManagedLayout;
    use crate::test_utils::RecordingSupervisor;
    use tempfile::TempDir;

    fn unit_set(temp: &TempDir, auto_update: bool) -> (ServiceUnitSet, UnitPaths) {
        let layout = ManagedLayout::new(temp.path().join("opt/piri"));
        let paths = UnitPaths::new(layout.units_dir(), temp.path().join("etc/systemd/system"));
        let set = units::render("piri", &layout, &paths, ServiceTimeouts::default(), auto_update).unwrap();
        (set, paths)
    }

    #[tokio::test]
    async fn test_install_writes_links_and_reloads() {
        let temp = TempDir::new().unwrap();
        let (set, paths) = unit_set(&temp, true);
        let supervisor = RecordingSupervisor::new();

        ServiceManager::new(&supervisor).install(&set).await.unwrap();

        for unit in &set.units {
            assert_eq!(fs::read_to_string(&unit.install_path).unwrap(), unit.body);
            assert_eq!(fs::read_link(&unit.link_path).unwrap(), unit.install_path);
        }
        assert!(paths.link_path("piri-updater.timer").exists());
        assert_eq!(supervisor.calls(), vec!["daemon-reload".to_string()]);
    }

    #[tokio::test]
    async fn test_reinstall_replaces_links() {
        let temp = TempDir::new().unwrap();
        let (set, _) = unit_set(&temp, false);
        let supervisor = RecordingSupervisor::new();
        let manager = ServiceManager::new(&supervisor);

        manager.install(&set).await.unwrap();
        manager.install(&set).await.unwrap();
        assert_eq!(supervisor.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_disable_and_stop_tolerates_missing_unit() {
        let supervisor = RecordingSupervisor::new().with_missing_unit("piri.service");
        let existed = ServiceManager::new(&supervisor).disable_and_stop("piri.service").await.unwrap();
        assert!(!existed);
        assert_eq!(supervisor.calls(), vec!["stop piri.service", "disable piri.service"]);
    }

    #[tokio::test]
    async fn test_disable_and_stop_surfaces_genuine_failure() {
        let supervisor = RecordingSupervisor::new().with_failure(UnitAction::Stop, "piri.service");
        let err = ServiceManager::new(&supervisor).disable_and_stop("piri.service").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PiriError>(), Some(PiriError::SupervisorError { .. })));
    }

    #[tokio::test]
    async fn test_enable_and_start_order_and_failure() {
        let supervisor = RecordingSupervisor::new();
        ServiceManager::new(&supervisor).enable_and_start("piri.service").await.unwrap();
        assert_eq!(supervisor.calls(), vec!["enable piri.service", "start piri.service"]);

        let supervisor = RecordingSupervisor::new().with_failure(UnitAction::Start, "piri.service");
        assert!(ServiceManager::new(&supervisor).enable_and_start("piri.service").await.is_err());
    }

    #[tokio::test]
    async fn test_is_active() {
        let supervisor = RecordingSupervisor::new().with_active_unit("piri.service");
        let manager = ServiceManager::new(&supervisor);
        assert!(manager.is_active("piri.service").await.unwrap());
        assert!(!manager.is_active("piri-updater.timer").await.unwrap());
    }

    #[tokio::test]
    async fn test_unregister_tolerates_absence() {
        let temp = TempDir::new().unwrap();
        let (set, paths) = unit_set(&temp, true);
        let supervisor = RecordingSupervisor::new();
        let manager = ServiceManager::new(&supervisor);
        manager.install(&set).await.unwrap();

        let mut report = CleanupReport::new();
        manager.unregister(&set.names(), &paths, &mut report).await;
        assert!(report.is_clean());
        for unit in &set.units {
            assert!(!crate::utils::fs::path_present(&unit.link_path));
            assert!(!unit.install_path.exists());
        }

        let mut again = CleanupReport::new();
        manager.unregister(&set.names(), &paths, &mut again).await;
        assert!(again.is_clean());
    }
}
