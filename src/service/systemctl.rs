//! `systemctl` invocation.
//!
//! [`SystemctlCommand`] is a small builder in the style used for every
//! external process: arguments, a timeout, an optional context label for
//! logs, captured stdout/stderr. A non-zero exit is not an error at this
//! layer; the caller decides whether "unit not found" is acceptable.
//!
//! [`Supervisor`] is the seam the service manager is generic over.

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::{SUPERVISOR_TIMEOUT, SYSTEMD_RUNTIME_DIR};
use crate::core::PiriError;

/// systemd exit status for "unit not installed".
const EXIT_UNIT_NOT_FOUND: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitAction {
    Enable,
    Disable,
    Start,
    Stop,
    Restart,
    IsActive,
    DaemonReload,
}

impl UnitAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::IsActive => "is-active",
            Self::DaemonReload => "daemon-reload",
        }
    }
}

impl fmt::Display for UnitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one supervisor call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SupervisorOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Whether the call failed because the unit does not exist.
    pub fn is_not_found(&self) -> bool {
        if self.code == Some(EXIT_UNIT_NOT_FOUND) {
            return true;
        }
        let stderr = self.stderr.to_ascii_lowercase();
        ["not loaded", "does not exist", "not found"].iter().any(|m| stderr.contains(m))
    }

    /// Convert a failed call into [`PiriError::SupervisorError`].
    pub fn into_error(self, action: UnitAction, unit: &str) -> PiriError {
        let stderr = if self.stderr.trim().is_empty() {
            format!("exit code {:?}", self.code)
        } else {
            self.stderr.trim().to_string()
        };
        PiriError::SupervisorError {
            action: action.to_string(),
            unit: unit.to_string(),
            stderr,
        }
    }
}

/// Something that can drive the service supervisor.
#[allow(async_fn_in_trait)]
pub trait Supervisor {
    /// Run `action`, optionally on `unit`. Only spawn failures and timeouts
    /// are errors; the exit status is reported in the output.
    async fn run(&self, action: UnitAction, unit: Option<&str>) -> Result<SupervisorOutput, PiriError>;

    /// Whether the host is running this supervisor.
    fn is_available(&self) -> bool;
}

/// Builder for one `systemctl` invocation.
pub struct SystemctlCommand {
    args: Vec<String>,
    timeout_duration: Duration,
    context: Option<String>,
}

impl Default for SystemctlCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            timeout_duration: SUPERVISOR_TIMEOUT,
            context: None,
        }
    }
}

impl SystemctlCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for `systemctl <action> [unit]`.
    pub fn action(action: UnitAction, unit: Option<&str>) -> Self {
        let cmd = Self::new().arg(action.as_str());
        match unit {
            Some(unit) => cmd.arg(unit),
            None => cmd,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub const fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn failure(&self, stderr: String) -> PiriError {
        PiriError::SupervisorError {
            action: self.args.first().cloned().unwrap_or_else(|| "unknown".to_string()),
            unit: self.args.get(1).cloned().unwrap_or_default(),
            stderr,
        }
    }

    pub async fn execute(self) -> Result<SupervisorOutput, PiriError> {
        let command_line = self.args.join(" ");
        match &self.context {
            Some(ctx) => {
                tracing::debug!(target: "systemctl", "({}) Executing: systemctl {}", ctx, command_line);
            }
            None => tracing::debug!(target: "systemctl", "Executing: systemctl {}", command_line),
        }

        let mut cmd = Command::new("systemctl");
        cmd.args(&self.args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = match timeout(self.timeout_duration, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(self.failure(format!("failed to execute systemctl: {e}"))),
            Err(_) => {
                tracing::warn!(
                    target: "systemctl",
                    "Command timed out after {} seconds: systemctl {}",
                    self.timeout_duration.as_secs(),
                    command_line
                );
                return Err(self.failure(format!(
                    "systemctl timed out after {} seconds",
                    self.timeout_duration.as_secs()
                )));
            }
        };

        let result = SupervisorOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.is_success() {
            tracing::debug!(
                target: "systemctl",
                "systemctl {} exited with {:?}: {}",
                command_line,
                result.code,
                result.stderr.trim()
            );
        }
        Ok(result)
    }
}

/// The host's systemd.
#[derive(Debug, Clone)]
pub struct Systemctl {
    timeout: Duration,
}

impl Default for Systemctl {
    fn default() -> Self {
        Self {
            timeout: SUPERVISOR_TIMEOUT,
        }
    }
}

impl Systemctl {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
        }
    }
}

impl Supervisor for Systemctl {
    async fn run(&self, action: UnitAction, unit: Option<&str>) -> Result<SupervisorOutput, PiriError> {
        SystemctlCommand::action(action, unit)
            .with_timeout(self.timeout)
            .with_context(unit.unwrap_or("manager"))
            .execute()
            .await
    }

    fn is_available(&self) -> bool {
        Path::new(SYSTEMD_RUNTIME_DIR).is_dir() && which::which("systemctl").is_ok()
    }
}
