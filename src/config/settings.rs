use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::constants::{
    DEFAULT_INSTALL_ROOT, DEFAULT_SETTINGS_PATH, DOWNLOAD_TIMEOUT, LOCK_TIMEOUT, METADATA_TIMEOUT,
    RELEASE_INDEX_URL, STATUS_TIMEOUT, SUPERVISOR_TIMEOUT, SYSTEMD_UNIT_DIR,
};

/// Everything an orchestrator needs to know about its environment.
///
/// Built once per invocation and passed by reference into the installer and
/// the update orchestrator; nothing reads process-global flag state.
///
/// The persistent part comes from an optional TOML settings file (default
/// `/etc/piri/lifecycle.toml`). All keys are optional:
///
/// ```toml
/// install_root = "/opt/piri"
/// unit_dir = "/etc/systemd/system"
/// release_index_url = "https://api.github.com/repos/storacha/piri/releases"
/// status_url = "http://127.0.0.1:3000/admin/proving/status"
/// metadata_timeout_secs = 30
/// download_timeout_secs = 600
/// status_timeout_secs = 5
/// lock_timeout_secs = 10
/// supervisor_timeout_secs = 60
/// ```
///
/// The per-invocation part ([`InvocationFlags`]) comes from the command line
/// and is never read from the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub install_root: PathBuf,
    /// OS unit directory the unit files are linked into.
    pub unit_dir: PathBuf,
    pub release_index_url: String,
    /// Overrides the status URL derived from the node config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
    pub metadata_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub lock_timeout_secs: u64,
    pub supervisor_timeout_secs: u64,
    #[serde(skip)]
    pub flags: InvocationFlags,
}

/// Command-line switches for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvocationFlags {
    /// A person is at the terminal; prompts, colors and elevation are allowed.
    pub interactive: bool,
    pub dry_run: bool,
    pub force: bool,
    pub auto_update: bool,
    pub progress: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            install_root: PathBuf::from(DEFAULT_INSTALL_ROOT),
            unit_dir: PathBuf::from(SYSTEMD_UNIT_DIR),
            release_index_url: RELEASE_INDEX_URL.to_string(),
            status_url: None,
            metadata_timeout_secs: METADATA_TIMEOUT.as_secs(),
            download_timeout_secs: DOWNLOAD_TIMEOUT.as_secs(),
            status_timeout_secs: STATUS_TIMEOUT.as_secs(),
            lock_timeout_secs: LOCK_TIMEOUT.as_secs(),
            supervisor_timeout_secs: SUPERVISOR_TIMEOUT.as_secs(),
            flags: InvocationFlags::default(),
        }
    }
}

impl LifecycleConfig {
    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, the default settings file
    /// is used when present and built-in defaults otherwise.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path).await,
            None => {
                let default = Path::new(DEFAULT_SETTINGS_PATH);
                if fs::try_exists(default).await.unwrap_or(false) {
                    Self::load_from(default).await
                } else {
                    debug!("No settings file at {}, using defaults", default.display());
                    Ok(Self::default())
                }
            }
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;
        debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: InvocationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub const fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub const fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub const fn supervisor_timeout(&self) -> Duration {
        Duration::from_secs(self.supervisor_timeout_secs)
    }
}
