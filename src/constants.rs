//! Global constants used throughout the piri lifecycle manager.
//!
//! Fixed names, paths, timeouts and unit tuning values. The installation
//! layout and unit set are re-derived from these on every run and never
//! persisted, so changing a value here changes what the next run expects
//! on disk.

use std::time::Duration;

/// Name of the node executable inside release archives and versioned dirs.
pub const BINARY_NAME: &str = "piri";

/// Release index queried for the latest published release.
pub const RELEASE_INDEX_URL: &str = "https://api.github.com/repos/storacha/piri/releases";

/// Substring identifying the checksums asset of a release.
pub const CHECKSUMS_ASSET_MARKER: &str = "checksums";

/// Fallback filename reported when a release carries no checksums asset.
pub const CHECKSUMS_ASSET_NAME: &str = "checksums.txt";

/// Marker in the name of the single universal macOS asset.
pub const MACOS_ASSET_MARKER: &str = "darwin_all";

/// Marker every Linux asset name must contain.
pub const LINUX_ASSET_MARKER: &str = "linux";

/// Release architecture tokens we publish Linux builds for.
pub const SUPPORTED_LINUX_ARCHES: &[&str] = &["amd64", "arm64"];

/// Default root of a managed installation.
pub const DEFAULT_INSTALL_ROOT: &str = "/opt/piri";

/// Directory systemd loads system unit files from.
pub const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";

/// Present only when the host was booted with systemd as PID 1.
pub const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";

/// Default location of the optional lifecycle settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/piri/lifecycle.toml";

/// Rendered node configuration filename under `<root>/etc`.
pub const CONFIG_FILE_NAME: &str = "piri-config.toml";

/// Name of the movable pointer inside `<root>/bin`.
pub const CURRENT_POINTER_NAME: &str = "current";

/// Prefix of the staging directory a new version is written into.
pub const STAGING_DIR_PREFIX: &str = ".tmp-";

/// Advisory lock file guarding concurrent lifecycle operations.
pub const LOCK_FILE_NAME: &str = ".lifecycle.lock";

/// Main node service unit.
pub const SERVICE_UNIT: &str = "piri.service";

/// One-shot unit running an unattended update cycle.
pub const UPDATER_SERVICE_UNIT: &str = "piri-updater.service";

/// Timer firing [`UPDATER_SERVICE_UNIT`].
pub const UPDATER_TIMER_UNIT: &str = "piri-updater.timer";

/// Units in the order they are stopped and disabled during teardown.
pub const TEARDOWN_ORDER: &[&str] = &[UPDATER_TIMER_UNIT, UPDATER_SERVICE_UNIT, SERVICE_UNIT];

/// Path of the node's proving status endpoint on its local admin API.
pub const PROVING_STATUS_PATH: &str = "/admin/proving/status";

/// Default host of the node's HTTP server.
pub const DEFAULT_SERVER_HOST: &str = "localhost";

/// Default port of the node's HTTP server.
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Timeout for release index and checksum requests.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for downloading a release archive body.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Upper bound on buffer space reserved up front from a declared length.
/// Bodies and archive entries larger than this still grow on demand.
pub const PREALLOCATION_LIMIT: u64 = 64 * 1024 * 1024;

/// Timeout for the local proving status query.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a single `systemctl` invocation.
pub const SUPERVISOR_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for another lifecycle operation to release the lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum backoff delay while waiting for the lock.
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for lock acquisition backoff.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Node shutdown budget used when the config does not set one.
pub const DEFAULT_SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);

/// Added to the node shutdown budget to form `TimeoutStopSec`.
pub const SHUTDOWN_CLEANUP_BUFFER: Duration = Duration::from_secs(10);

/// Delay between a crash and the supervisor restarting the node.
pub const RESTART_DELAY: Duration = Duration::from_secs(10);

/// Window over which [`START_LIMIT_BURST`] restarts are allowed.
pub const START_LIMIT_INTERVAL: Duration = Duration::from_secs(300);

/// Restarts allowed within [`START_LIMIT_INTERVAL`] before systemd gives up.
pub const START_LIMIT_BURST: u32 = 5;

/// File descriptor limit for the node service.
pub const NOFILE_LIMIT: u32 = 65536;

/// Delay after boot before the first update check.
pub const UPDATE_TIMER_BOOT_DELAY: Duration = Duration::from_secs(5 * 60);

/// Cadence of update checks.
pub const UPDATE_TIMER_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Randomized delay added to each update check.
pub const UPDATE_TIMER_JITTER: Duration = Duration::from_secs(5 * 60);
