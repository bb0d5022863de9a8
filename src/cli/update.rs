use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::{debug, error, info, warn};

use crate::config::{LifecycleConfig, NodeConfig};
use crate::constants::{DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, PROVING_STATUS_PATH, SERVICE_UNIT};
use crate::core::PiriError;
use crate::http::HttpClient;
use crate::installer::layout::InstallationLayout;
use crate::privilege::needs_elevation;
use crate::service::Systemctl;
use crate::upgrade::version::format_version_info;
use crate::upgrade::{HttpStatusSource, RestartAction, UpdateMode, UpdateOrchestrator, UpdateOutcome};
use crate::utils::interrupt::Interrupt;

/// Update piri to the latest published release.
///
/// The update waits for a safe moment: while the node is proving, or inside
/// a challenge window it has not yet proven, nothing is changed and the
/// command reports why.
///
/// ```bash
/// piri update --dry-run     # show what would happen
/// sudo piri update          # update now
/// sudo piri update --rollback
/// ```
#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Look up the release and its checksum, but download nothing.
    #[arg(long, conflicts_with = "rollback")]
    pub dry_run: bool,

    /// Return to the previously installed version.
    #[arg(long)]
    pub rollback: bool,
}

/// The unattended cycle run by `piri-updater.service`.
#[derive(Args, Debug)]
pub struct UpdateInternalCommand {}

fn detect_layout(config: &LifecycleConfig) -> Result<InstallationLayout> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let layout = InstallationLayout::detect(&exe, &config.install_root);
    debug!(?layout, exe = %exe.display(), "Detected installation layout");
    Ok(layout)
}

/// Paths an update of `layout` writes to.
fn mutated_paths(layout: &InstallationLayout) -> Vec<PathBuf> {
    match layout {
        InstallationLayout::Managed(managed) => vec![managed.root().to_path_buf()],
        InstallationLayout::Standalone {
            binary_path,
        } => vec![binary_path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)],
    }
}

/// Proving status URL: settings override, then the installed node config,
/// then the node's default listen address.
async fn status_url(config: &LifecycleConfig, layout: &InstallationLayout) -> String {
    if let Some(url) = &config.status_url {
        return url.clone();
    }
    if let InstallationLayout::Managed(managed) = layout {
        match NodeConfig::load(&managed.config_path()).await {
            Ok(node) => return node.status_url(),
            Err(e) => warn!("Could not read node config, using default status URL: {e:#}"),
        }
    }
    format!("http://{DEFAULT_SERVER_HOST}:{DEFAULT_SERVER_PORT}{PROVING_STATUS_PATH}")
}

/// Whether this process was started by systemd.
fn under_supervisor() -> bool {
    std::env::var_os("INVOCATION_ID").is_some_and(|id| !id.is_empty())
}

async fn run_cycle(
    config: &LifecycleConfig,
    layout: InstallationLayout,
    mode: UpdateMode,
    rollback: bool,
    interrupt: Interrupt,
) -> Result<UpdateOutcome> {
    let http = HttpClient::new()?;
    let url = status_url(config, &layout).await;
    let status = HttpStatusSource::new(&http, url, config.status_timeout());
    let supervisor = Systemctl::new(config.supervisor_timeout());

    let orchestrator = UpdateOrchestrator::new(&http, &status, &supervisor, config, layout, mode)
        .with_supervised(mode == UpdateMode::Unattended || under_supervisor())
        .with_interrupt(interrupt);

    if rollback {
        orchestrator.rollback().await
    } else {
        orchestrator.run().await
    }
}

fn print_restart(restart: &RestartAction, layout_managed: bool) {
    match restart {
        RestartAction::Restarted => println!("  {} {SERVICE_UNIT}", "restarted".green()),
        RestartAction::NotRunning => println!("  {SERVICE_UNIT} is not running; start it with: sudo systemctl start {SERVICE_UNIT}"),
        RestartAction::ManualRequired if layout_managed => {
            println!("  Restart the node to run the new version: sudo systemctl restart {SERVICE_UNIT}");
        }
        RestartAction::ManualRequired => println!("  Restart the node to run the new version"),
    }
}

impl UpdateCommand {
    pub async fn execute(self, config: &LifecycleConfig, interrupt: Interrupt) -> Result<i32> {
        let layout = detect_layout(config)?;
        if !config.flags.dry_run
            && let Some(code) = super::elevate_if_needed(
                &mutated_paths(&layout).iter().map(PathBuf::as_path).collect::<Vec<_>>(),
            )
            .await?
        {
            return Ok(code);
        }

        let managed = matches!(layout, InstallationLayout::Managed(_));
        if self.rollback {
            println!("{}", "Rolling back to the previous version...".yellow());
        } else {
            println!("{}", "Checking for updates...".cyan());
        }

        match run_cycle(config, layout, UpdateMode::Interactive, self.rollback, interrupt).await? {
            UpdateOutcome::UpToDate {
                version,
            } => println!("{}", format!("piri {version} is already the latest release").green()),
            UpdateOutcome::Deferred(reason) => {
                println!("{}", format!("Update deferred: {reason}").yellow());
                println!("Nothing was changed. Try again once the current proof has been submitted.");
            }
            UpdateOutcome::DryRun {
                from,
                to,
                asset,
            } => {
                println!("{}", format_version_info(&from, Some(&to)));
                println!("Would download and install {asset} (dry run, nothing downloaded)");
            }
            UpdateOutcome::Updated {
                from,
                to,
                restart,
            } => {
                println!("{}", format!("Updated piri {from} -> {to}").green());
                print_restart(&restart, managed);
            }
            UpdateOutcome::RolledBack {
                from,
                to,
                restart,
            } => {
                println!("{}", format!("Rolled back piri {from} -> {to}").green());
                print_restart(&restart, managed);
            }
        }
        Ok(0)
    }
}

impl UpdateInternalCommand {
    /// Run one cycle. Deferrals and transient failures exit 0 so the timer
    /// simply tries again; genuine defects exit non-zero.
    pub async fn execute(self, config: &LifecycleConfig, interrupt: Interrupt) -> Result<i32> {
        let layout = detect_layout(config)?;
        if let Some(path) = mutated_paths(&layout).into_iter().find(|p| needs_elevation(&[p])) {
            return Err(PiriError::PermissionDenied {
                operation: "unattended update".to_string(),
                path: path.display().to_string(),
            }
            .into());
        }

        match run_cycle(config, layout, UpdateMode::Unattended, false, interrupt).await {
            Ok(outcome) => {
                info!("{outcome}");
                Ok(0)
            }
            Err(e) => {
                let transient = e
                    .chain()
                    .find_map(|cause| cause.downcast_ref::<PiriError>())
                    .is_some_and(|piri| !piri.is_defect());
                if transient {
                    warn!("Update cycle failed, will retry on the next run: {e:#}");
                    Ok(0)
                } else {
                    error!("Update cycle failed: {e:#}");
                    Err(e)
                }
            }
        }
    }
}
