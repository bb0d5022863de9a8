//! Privilege checks, elevation and service account resolution.
//!
//! Elevation is a two-phase protocol. Interactive commands first ask
//! [`needs_elevation`] whether the paths they are about to mutate are writable
//! by the current user. If not, [`elevate_and_delegate`] re-runs the same
//! command line under `sudo -E`, waits for it, and returns the child's exit
//! code; the caller exits with that code and does no further work itself.
//!
//! The unattended update path never elevates: it runs as root from the
//! supervisor, and a permission shortfall there is a hard failure.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::unistd::{AccessFlags, Gid, Uid, User, access, geteuid};
use tracing::{debug, info};

use crate::core::PiriError;

/// Whether the process runs with an effective uid of 0.
pub fn is_elevated() -> bool {
    geteuid().is_root()
}

/// Whether any of `paths` cannot be created or modified by the current user.
///
/// For paths that do not exist yet, the nearest existing ancestor must be
/// writable.
pub fn needs_elevation<P: AsRef<Path>>(paths: &[P]) -> bool {
    if is_elevated() {
        return false;
    }
    paths.iter().any(|p| !is_writable(p.as_ref()))
}

/// Whether `path` (or its nearest existing ancestor) is writable.
pub fn is_writable(path: &Path) -> bool {
    let Some(existing) = nearest_existing(path) else {
        return false;
    };
    let writable = access(&existing, AccessFlags::W_OK).is_ok();
    debug!("{} writable via {}: {}", path.display(), existing.display(), writable);
    writable
}

fn nearest_existing(path: &Path) -> Option<PathBuf> {
    path.ancestors().find(|p| std::fs::symlink_metadata(p).is_ok()).map(Path::to_path_buf)
}

/// Re-run this executable with `args` under `sudo -E` and return its exit code.
///
/// The environment is preserved so `RUST_LOG` and `SUDO_USER` detection keep
/// working in the child.
pub async fn elevate_and_delegate(args: &[OsString]) -> Result<i32> {
    let sudo = which::which("sudo").map_err(|_| PiriError::PermissionDenied {
        operation: "elevate privileges (sudo is not installed)".to_string(),
        path: "sudo".to_string(),
    })?;
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;

    info!("Re-running with elevated privileges: sudo -E {} ...", exe.display());
    let status = tokio::process::Command::new(&sudo)
        .arg("-E")
        .arg(&exe)
        .args(args)
        .status()
        .await
        .with_context(|| format!("Failed to execute {}", sudo.display()))?;

    // A signal-terminated child has no code; report it as a generic failure.
    Ok(status.code().unwrap_or(1))
}

/// The account the node service runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

impl ServiceAccount {
    /// Look up `name` in the user database.
    pub fn resolve(name: &str) -> Result<Self> {
        let user = User::from_name(name)
            .with_context(|| format!("Failed to look up user '{name}'"))?
            .ok_or_else(|| PiriError::ConfigError {
                message: format!("service user '{name}' does not exist"),
            })?;
        Ok(Self::from(user))
    }

    /// The effective user of this process.
    pub fn effective() -> Result<Self> {
        let uid = geteuid();
        let user = User::from_uid(uid)
            .with_context(|| format!("Failed to look up uid {uid}"))?
            .ok_or_else(|| PiriError::ConfigError {
                message: format!("effective uid {uid} has no passwd entry"),
            })?;
        Ok(Self::from(user))
    }

    pub fn uid(&self) -> Uid {
        Uid::from_raw(self.uid)
    }

    pub fn gid(&self) -> Gid {
        Gid::from_raw(self.gid)
    }
}

impl From<User> for ServiceAccount {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
        }
    }
}

/// Pick the service user name: explicit choice, then the invoking sudo user,
/// then `None` (meaning the effective user).
pub fn select_service_user(explicit: Option<&str>, sudo_user: Option<&str>) -> Option<String> {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        return Some(name.to_string());
    }
    sudo_user
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "root")
        .map(ToString::to_string)
}

/// Resolve the service account for an install.
pub fn detect_service_user(explicit: Option<&str>) -> Result<ServiceAccount> {
    let sudo_user = std::env::var("SUDO_USER").ok();
    match select_service_user(explicit, sudo_user.as_deref()) {
        Some(name) => ServiceAccount::resolve(&name),
        None => ServiceAccount::effective(),
    }
}
