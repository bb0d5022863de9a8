//! Command-line interface for the piri lifecycle manager.
//!
//! # Available Commands
//!
//! - `install` - install the running binary as the `piri` system service
//! - `uninstall` - stop and unregister the service, optionally deleting everything
//! - `update` - update to the latest release, or roll back with `--rollback`
//! - `update-internal` - unattended update cycle run by `piri-updater.timer` (hidden)
//!
//! ```bash
//! sudo piri install --config ./piri-config.toml --enable-auto-update
//! piri update --dry-run
//! sudo piri uninstall --purge
//! ```
//!
//! # Global Options
//!
//! - `--verbose` - debug logging
//! - `--quiet` - errors only
//! - `--no-progress` - no spinners or download bars
//! - `--settings` - lifecycle settings file (default `/etc/piri/lifecycle.toml`)
//!
//! Interactive commands re-run themselves under `sudo` when they lack write
//! access to what they are about to change, and print colored status lines.
//! `update-internal` never prompts or elevates and logs to stderr for journald.
//!
//! Every command returns the process exit code rather than exiting itself, so
//! an elevated child's code can be propagated unchanged.

mod install;
mod uninstall;
mod update;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use crate::config::{InvocationFlags, LifecycleConfig};
use crate::privilege::{elevate_and_delegate, needs_elevation};
use crate::utils::interrupt::Interrupt;

/// Install, update and uninstall the piri storage node service.
#[derive(Parser, Debug)]
#[command(
    name = "piri",
    about = "Deploy and self-update the piri storage node as a system service",
    version,
    author,
    long_about = "Installs the piri node as a supervised systemd service, keeps it up to date with \
                  published releases without interrupting proof submission, and removes it cleanly."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    ///
    /// Equivalent to `RUST_LOG=debug`; an explicit `RUST_LOG` still wins.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable progress bars and spinners.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Path to the lifecycle settings file.
    ///
    /// Defaults to `/etc/piri/lifecycle.toml` when it exists.
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install piri as a system service.
    ///
    /// See [`install::InstallCommand`].
    Install(install::InstallCommand),

    /// Stop and unregister the piri service.
    ///
    /// See [`uninstall::UninstallCommand`].
    Uninstall(uninstall::UninstallCommand),

    /// Update piri to the latest release.
    ///
    /// See [`update::UpdateCommand`].
    Update(update::UpdateCommand),

    /// Unattended update cycle, run by the update timer.
    #[command(name = "update-internal", hide = true)]
    UpdateInternal(update::UpdateInternalCommand),
}

impl Cli {
    /// Default log filter for this invocation when `RUST_LOG` is unset.
    ///
    /// Interactive commands print their own status lines, so they only log
    /// warnings by default; the unattended cycle logs at `info` for the journal.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else if self.is_interactive() {
            "warn"
        } else {
            "info"
        }
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        !matches!(self.command, Commands::UpdateInternal(_))
    }

    fn flags(&self) -> InvocationFlags {
        let interactive = self.is_interactive();
        let mut flags = InvocationFlags {
            interactive,
            progress: interactive && !self.no_progress && !self.quiet,
            ..InvocationFlags::default()
        };
        match &self.command {
            Commands::Install(cmd) => {
                flags.force = cmd.force;
                flags.auto_update = cmd.enable_auto_update;
            }
            Commands::Update(cmd) => flags.dry_run = cmd.dry_run,
            Commands::Uninstall(_) | Commands::UpdateInternal(_) => {}
        }
        flags
    }

    /// Run the command and return the process exit code.
    ///
    /// Ctrl-C abandons network work in flight and stops install and update
    /// before their next step, failing with
    /// [`Interrupted`](crate::core::PiriError::Interrupted). An
    /// install interrupted after it started changing the system is rolled
    /// back first. Uninstall always runs to completion.
    pub async fn execute(self) -> Result<i32> {
        let config = LifecycleConfig::load(self.settings.as_deref()).await?.with_flags(self.flags());
        debug!(?config, "Resolved lifecycle configuration");

        let interrupt = Interrupt::on_ctrl_c();
        match self.command {
            Commands::Install(cmd) => cmd.execute(&config, interrupt).await,
            Commands::Uninstall(cmd) => cmd.execute(&config).await,
            Commands::Update(cmd) => cmd.execute(&config, interrupt).await,
            Commands::UpdateInternal(cmd) => cmd.execute(&config, interrupt).await,
        }
    }
}

/// Re-run this command line under `sudo` when `paths` are not writable.
///
/// Returns the elevated child's exit code, or `None` when the current
/// process may proceed itself.
pub(crate) async fn elevate_if_needed(paths: &[&Path]) -> Result<Option<i32>> {
    if !needs_elevation(paths) {
        return Ok(None);
    }
    eprintln!("{}", "Administrator privileges are required, re-running with sudo".yellow());
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    Ok(Some(elevate_and_delegate(&args).await?))
}
