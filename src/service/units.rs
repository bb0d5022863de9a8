//! Typed systemd unit definitions.
//!
//! Each unit kind has its own builder holding exactly the values that vary
//! between installs. Builders validate before rendering, and rendering goes
//! through [`UnitFile`], a minimal section/entry writer, so no unit body is
//! ever assembled by string templating.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_SHUTDOWN_BUDGET, NOFILE_LIMIT, RESTART_DELAY, SERVICE_UNIT, SHUTDOWN_CLEANUP_BUFFER,
    START_LIMIT_BURST, START_LIMIT_INTERVAL, UPDATE_TIMER_BOOT_DELAY, UPDATE_TIMER_INTERVAL,
    UPDATE_TIMER_JITTER, UPDATER_SERVICE_UNIT, UPDATER_TIMER_UNIT,
};
use crate::core::PiriError;
use crate::installer::layout::ManagedLayout;

/// Section/entry writer for the INI-like unit file format.
#[derive(Debug, Default, Clone)]
pub struct UnitFile {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl UnitFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new section; following entries belong to it.
    pub fn section(mut self, name: &str) -> Self {
        self.sections.push((name.to_string(), Vec::new()));
        self
    }

    /// Add `key=value` to the most recent section.
    pub fn entry(mut self, key: &str, value: impl ToString) -> Self {
        if let Some((_, entries)) = self.sections.last_mut() {
            entries.push((key.to_string(), value.to_string()));
        }
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, (name, entries)) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("[{name}]\n"));
            for (key, value) in entries {
                out.push_str(&format!("{key}={value}\n"));
            }
        }
        out
    }
}

/// Stop timing for the main service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceTimeouts {
    /// How long the node itself takes to shut down gracefully.
    pub shutdown_budget: Duration,
}

impl Default for ServiceTimeouts {
    fn default() -> Self {
        Self {
            shutdown_budget: DEFAULT_SHUTDOWN_BUDGET,
        }
    }
}

impl ServiceTimeouts {
    /// `TimeoutStopSec`: the shutdown budget plus a fixed cleanup buffer.
    pub fn stop_timeout(&self) -> Duration {
        self.shutdown_budget + SHUTDOWN_CLEANUP_BUFFER
    }
}

/// Render a duration the way systemd time spans are usually written.
fn timespan(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{}min", secs / 60)
    } else {
        format!("{secs}s")
    }
}

fn invalid(unit: &str, reason: impl Into<String>) -> PiriError {
    PiriError::InvalidUnit {
        unit: unit.to_string(),
        reason: reason.into(),
    }
}

fn require_absolute(unit: &str, field: &str, path: &Path) -> Result<(), PiriError> {
    if path.as_os_str().is_empty() {
        return Err(invalid(unit, format!("{field} is empty")));
    }
    if !path.is_absolute() {
        return Err(invalid(unit, format!("{field} must be absolute: {}", path.display())));
    }
    let rendered = path.to_string_lossy();
    require_single_line(unit, field, &rendered)?;
    // Written unquoted into Exec lines, where whitespace splits arguments.
    if rendered.contains(char::is_whitespace) {
        return Err(invalid(unit, format!("{field} contains whitespace: {rendered}")));
    }
    Ok(())
}

fn require_single_line(unit: &str, field: &str, value: &str) -> Result<(), PiriError> {
    if value.contains(['\n', '\r']) {
        return Err(invalid(unit, format!("{field} contains a line break")));
    }
    Ok(())
}

/// `piri.service`: the long-running node.
#[derive(Debug, Clone)]
pub struct MainServiceUnit {
    pub user: String,
    pub executable: PathBuf,
    pub config_path: PathBuf,
    pub timeouts: ServiceTimeouts,
}

impl MainServiceUnit {
    pub fn validate(&self) -> Result<(), PiriError> {
        let user = self.user.trim();
        if user.is_empty() {
            return Err(invalid(SERVICE_UNIT, "service user is empty"));
        }
        if user.contains(char::is_whitespace) {
            return Err(invalid(SERVICE_UNIT, format!("service user '{user}' contains whitespace")));
        }
        require_absolute(SERVICE_UNIT, "executable", &self.executable)?;
        require_absolute(SERVICE_UNIT, "config path", &self.config_path)?;
        if self.timeouts.shutdown_budget.is_zero() {
            return Err(invalid(SERVICE_UNIT, "shutdown budget must be positive"));
        }
        Ok(())
    }

    pub fn render(&self) -> Result<String, PiriError> {
        self.validate()?;
        let exec_start = format!(
            "{} serve full --config {}",
            self.executable.display(),
            self.config_path.display()
        );

        Ok(UnitFile::new()
            .section("Unit")
            .entry("Description", "Piri storage node")
            .entry("Wants", "network-online.target")
            .entry("After", "network-online.target")
            .entry("StartLimitIntervalSec", START_LIMIT_INTERVAL.as_secs())
            .entry("StartLimitBurst", START_LIMIT_BURST)
            .section("Service")
            .entry("Type", "simple")
            .entry("User", self.user.trim())
            .entry("ExecStart", exec_start)
            .entry("Restart", "on-failure")
            .entry("RestartSec", RESTART_DELAY.as_secs())
            .entry("TimeoutStopSec", self.timeouts.stop_timeout().as_secs())
            .entry("LimitNOFILE", NOFILE_LIMIT)
            .section("Install")
            .entry("WantedBy", "multi-user.target")
            .render())
    }
}

/// `piri-updater.service`: one update check, run as root by the timer.
#[derive(Debug, Clone)]
pub struct UpdateCheckUnit {
    pub executable: PathBuf,
}

impl UpdateCheckUnit {
    pub fn validate(&self) -> Result<(), PiriError> {
        require_absolute(UPDATER_SERVICE_UNIT, "executable", &self.executable)
    }

    pub fn render(&self) -> Result<String, PiriError> {
        self.validate()?;
        Ok(UnitFile::new()
            .section("Unit")
            .entry("Description", "Piri update check")
            .entry("Wants", "network-online.target")
            .entry("After", "network-online.target")
            .section("Service")
            .entry("Type", "oneshot")
            .entry("User", "root")
            .entry("ExecStart", format!("{} update-internal", self.executable.display()))
            .render())
    }
}

/// `piri-updater.timer`: schedules the update check.
#[derive(Debug, Clone)]
pub struct UpdateTimerUnit {
    pub service: String,
    pub boot_delay: Duration,
    pub interval: Duration,
    pub jitter: Duration,
}

impl Default for UpdateTimerUnit {
    fn default() -> Self {
        Self {
            service: UPDATER_SERVICE_UNIT.to_string(),
            boot_delay: UPDATE_TIMER_BOOT_DELAY,
            interval: UPDATE_TIMER_INTERVAL,
            jitter: UPDATE_TIMER_JITTER,
        }
    }
}

impl UpdateTimerUnit {
    pub fn validate(&self) -> Result<(), PiriError> {
        if self.service.trim().is_empty() {
            return Err(invalid(UPDATER_TIMER_UNIT, "target service is empty"));
        }
        require_single_line(UPDATER_TIMER_UNIT, "target service", &self.service)?;
        if self.interval.is_zero() {
            return Err(invalid(UPDATER_TIMER_UNIT, "interval must be positive"));
        }
        Ok(())
    }

    pub fn render(&self) -> Result<String, PiriError> {
        self.validate()?;
        Ok(UnitFile::new()
            .section("Unit")
            .entry("Description", "Periodic piri update check")
            .section("Timer")
            .entry("OnBootSec", timespan(self.boot_delay))
            .entry("OnUnitActiveSec", timespan(self.interval))
            .entry("RandomizedDelaySec", timespan(self.jitter))
            .entry("Persistent", "true")
            .entry("Unit", self.service.trim())
            .section("Install")
            .entry("WantedBy", "timers.target")
            .render())
    }
}

/// Where unit files live and where the supervisor looks for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    /// `<root>/units`
    pub units_dir: PathBuf,
    /// OS unit directory, `/etc/systemd/system`
    pub link_dir: PathBuf,
}

impl UnitPaths {
    pub fn new(units_dir: impl Into<PathBuf>, link_dir: impl Into<PathBuf>) -> Self {
        Self {
            units_dir: units_dir.into(),
            link_dir: link_dir.into(),
        }
    }

    pub fn install_path(&self, name: &str) -> PathBuf {
        self.units_dir.join(name)
    }

    pub fn link_path(&self, name: &str) -> PathBuf {
        self.link_dir.join(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDefinition {
    pub name: String,
    pub install_path: PathBuf,
    pub link_path: PathBuf,
    pub body: String,
}

/// Rendered units in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceUnitSet {
    pub units: Vec<UnitDefinition>,
}

impl ServiceUnitSet {
    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&UnitDefinition> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn push(&mut self, paths: &UnitPaths, name: &str, body: String) {
        self.units.push(UnitDefinition {
            name: name.to_string(),
            install_path: paths.install_path(name),
            link_path: paths.link_path(name),
            body,
        });
    }
}

/// Render the unit set for a managed installation. Pure.
///
/// The updater service and timer are included only with `auto_update`.
pub fn render(
    service_user: &str,
    layout: &ManagedLayout,
    paths: &UnitPaths,
    timeouts: ServiceTimeouts,
    auto_update: bool,
) -> Result<ServiceUnitSet, PiriError> {
    let executable = layout.current_binary();
    let mut set = ServiceUnitSet::default();

    let main = MainServiceUnit {
        user: service_user.to_string(),
        executable: executable.clone(),
        config_path: layout.config_path(),
        timeouts,
    };
    set.push(paths, SERVICE_UNIT, main.render()?);

    if auto_update {
        let check = UpdateCheckUnit {
            executable,
        };
        set.push(paths, UPDATER_SERVICE_UNIT, check.render()?);
        set.push(paths, UPDATER_TIMER_UNIT, UpdateTimerUnit::default().render()?);
    }

    Ok(set)
}
