//! The update cycle.
//!
//! ```text
//! CheckSafety -> LocateRelease -> CompareVersions -> (stop if equal)
//!   -> FetchChecksums -> Download + Verify -> Extract
//!   -> CheckSafety -> Install -> CheckSafety -> RestartService
//! ```
//!
//! Every step either advances or aborts the cycle; nothing on disk changes
//! before the second safety check, which runs with the operation lock held.
//! A safety veto at any gate ends the cycle with [`UpdateOutcome::Deferred`],
//! which callers report as success so the next scheduled cycle simply tries
//! again.
//!
//! An [`Interrupt`] abandons the network phases. Once the install has begun it
//! runs to completion, restart included.

use std::fmt;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::config::LifecycleConfig;
use crate::constants::{BINARY_NAME, SERVICE_UNIT};
use crate::core::PiriError;
use crate::http::Fetch;
use crate::installer::binary::{self, InstallChange};
use crate::installer::layout::{InstallationLayout, ManagedLayout};
use crate::release::{Platform, ReleaseLocator, select_asset};
use crate::service::{ServiceManager, Supervisor};
use crate::upgrade::archive::extract_executable;
use crate::upgrade::safety::{SafetyVerdict, StatusSource, UnsafeReason, is_safe_to_update};
use crate::upgrade::verification::ChecksumVerifier;
use crate::upgrade::version::{current_version, is_downgrade, versions_match};
use crate::utils::interrupt::Interrupt;
use crate::utils::lock::OperationLock;
use crate::utils::progress::ProgressBar;

/// Who is driving the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// `piri update`: a person at a terminal.
    Interactive,
    /// `piri update-internal`: the update timer.
    Unattended,
}

/// What happened to the running service after an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartAction {
    Restarted,
    /// The service was not running; nothing to restart.
    NotRunning,
    /// Not under the supervisor; the operator must restart.
    ManualRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate {
        version: String,
    },
    Deferred(UnsafeReason),
    DryRun {
        from: String,
        to: String,
        asset: String,
    },
    Updated {
        from: String,
        to: String,
        restart: RestartAction,
    },
    RolledBack {
        from: String,
        to: String,
        restart: RestartAction,
    },
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate {
                version,
            } => write!(f, "piri {version} is up to date"),
            Self::Deferred(reason) => write!(f, "Update deferred: {reason}"),
            Self::DryRun {
                from,
                to,
                asset,
            } => write!(f, "Would update {from} -> {to} using {asset}"),
            Self::Updated {
                from,
                to,
                ..
            } => write!(f, "Updated {from} -> {to}"),
            Self::RolledBack {
                from,
                to,
                ..
            } => write!(f, "Rolled back {from} -> {to}"),
        }
    }
}

/// Runs update and rollback cycles against one installation.
pub struct UpdateOrchestrator<'a, F: Fetch, S: StatusSource, V: Supervisor> {
    fetcher: &'a F,
    status: &'a S,
    services: ServiceManager<'a, V>,
    config: &'a LifecycleConfig,
    layout: InstallationLayout,
    mode: UpdateMode,
    platform: Platform,
    running_version: Option<String>,
    supervised: bool,
    interrupt: Interrupt,
}

impl<'a, F: Fetch, S: StatusSource, V: Supervisor> UpdateOrchestrator<'a, F, S, V> {
    pub fn new(
        fetcher: &'a F,
        status: &'a S,
        supervisor: &'a V,
        config: &'a LifecycleConfig,
        layout: InstallationLayout,
        mode: UpdateMode,
    ) -> Self {
        Self {
            fetcher,
            status,
            services: ServiceManager::new(supervisor),
            config,
            layout,
            mode,
            platform: Platform::current(),
            running_version: None,
            supervised: mode == UpdateMode::Unattended,
            interrupt: Interrupt::never(),
        }
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Override the installed version instead of detecting it.
    #[must_use]
    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.running_version = Some(version.into());
        self
    }

    /// Whether the process runs under the service supervisor and may restart
    /// the node itself.
    #[must_use]
    pub const fn with_supervised(mut self, supervised: bool) -> Self {
        self.supervised = supervised;
        self
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    fn show_progress(&self) -> bool {
        self.mode == UpdateMode::Interactive && self.config.flags.progress
    }

    /// Installed version: the pointer target for managed layouts, this
    /// binary's version otherwise.
    fn installed_version(&self) -> Result<String> {
        if let Some(version) = &self.running_version {
            return Ok(version.clone());
        }
        if let InstallationLayout::Managed(layout) = &self.layout
            && let Some(version) = binary::current_version(layout)?
        {
            return Ok(version);
        }
        Ok(current_version())
    }

    /// Fails with [`PiriError::UnsafeState`] when the node vetoes.
    async fn gate(&self, stage: &str) -> Result<(), PiriError> {
        debug!(stage, "Checking node safety");
        let verdict = is_safe_to_update(self.status).await;
        if let SafetyVerdict::Unsafe(reason) = verdict {
            info!(stage, %reason, "Node is not safe to update");
        }
        verdict.into_result()
    }

    /// Safety check that an interrupt may cut short. Only for gates that
    /// precede any change on disk.
    async fn interruptible_gate(&self, stage: &str) -> Result<(), PiriError> {
        self.interrupt.guard(self.gate(stage)).await?
    }

    /// Run one update cycle.
    pub async fn run(&self) -> Result<UpdateOutcome> {
        deferred_on_veto(self.cycle().await)
    }

    async fn cycle(&self) -> Result<UpdateOutcome> {
        self.interruptible_gate("cycle start").await?;

        let spinner = ProgressBar::new_spinner(self.show_progress());
        spinner.set_message("Checking for the latest release");

        let locator = ReleaseLocator::new(
            self.fetcher,
            self.config.release_index_url.as_str(),
            self.config.metadata_timeout(),
        );
        let release = self.interrupt.guard(locator.latest_release()).await??;
        let from = self.installed_version()?;
        let to = release.version.clone();

        if versions_match(&from, &to) {
            spinner.finish_and_clear();
            info!(version = %from, "Already up to date");
            return Ok(UpdateOutcome::UpToDate {
                version: from,
            });
        }
        if is_downgrade(&from, &to) {
            warn!(installed = %from, release = %to, "Installed build is newer than the latest release, proceeding");
        }

        let asset = select_asset(&release, &self.platform)?;
        spinner.set_message(format!("Fetching checksums for {to}"));
        let checksums = self
            .interrupt
            .guard(ChecksumVerifier::fetch_checksums(
                self.fetcher,
                &release,
                &asset.filename,
                self.config.metadata_timeout(),
            ))
            .await??;
        let expected = ChecksumVerifier::expected_for(&checksums, &asset.filename)?.to_string();
        spinner.finish_and_clear();

        if self.config.flags.dry_run {
            info!(from = %from, to = %to, asset = %asset.filename, "Dry run, stopping before download");
            return Ok(UpdateOutcome::DryRun {
                from,
                to,
                asset: asset.filename,
            });
        }

        // Decides only whether to download; whether the version is still on
        // disk is checked again under the lock.
        let staged = match &self.layout {
            InstallationLayout::Managed(layout) => layout.versioned_binary(&to).is_file(),
            InstallationLayout::Standalone { .. } => false,
        };

        let executable = if staged {
            info!(version = %to, "Version already present on disk, skipping download");
            None
        } else {
            info!(version = %to, asset = %asset.filename, "Downloading release");
            let bar = ProgressBar::new_download(self.show_progress());
            bar.set_message(asset.filename.clone());
            let archive = self
                .interrupt
                .guard(self.fetcher.fetch(&asset.url, self.config.download_timeout(), Some(&bar)))
                .await??;
            bar.finish_and_clear();

            ChecksumVerifier::verify(&asset.filename, &archive, &expected)?;
            Some(extract_executable(&archive, &asset.filename, BINARY_NAME)?)
        };

        let _lock = self
            .interrupt
            .guard(OperationLock::acquire(&self.layout.lock_dir(), self.config.lock_timeout()))
            .await??;

        self.interruptible_gate("before install").await?;
        self.interrupt.check()?;

        match &self.layout {
            InstallationLayout::Managed(layout) => {
                let installed = match executable.as_deref() {
                    Some(bytes) => binary::install_managed(layout, &to, bytes),
                    None => binary::activate_installed(layout, &to),
                }
                .with_context(|| format!("Failed to install {to}"))?;

                let restart = self
                    .restart_after_install(layout, installed.previous.as_deref(), installed.change)
                    .await?;
                info!(from = %from, to = %to, "Update complete");
                Ok(UpdateOutcome::Updated {
                    from,
                    to,
                    restart,
                })
            }
            InstallationLayout::Standalone {
                binary_path,
            } => {
                let Some(bytes) = executable else {
                    bail!("No binary was downloaded for {to}");
                };
                binary::install_standalone(binary_path, &bytes).await?;
                info!(from = %from, to = %to, "Update complete");
                Ok(UpdateOutcome::Updated {
                    from,
                    to,
                    restart: RestartAction::ManualRequired,
                })
            }
        }
    }

    /// Restart the node onto the new pointer target.
    ///
    /// A veto at the final gate puts the pointer back and yields the reason.
    /// A failed restart puts the pointer back, restarts best-effort and
    /// returns the original error.
    async fn restart_after_install(
        &self,
        layout: &ManagedLayout,
        previous: Option<&str>,
        change: InstallChange,
    ) -> Result<RestartAction> {
        if !self.supervised {
            return Ok(RestartAction::ManualRequired);
        }
        if !self.services.is_active(SERVICE_UNIT).await? {
            info!(unit = SERVICE_UNIT, "Service is not running, no restart needed");
            return Ok(RestartAction::NotRunning);
        }

        let revert = |reason: &str| {
            if change == InstallChange::Unchanged {
                return;
            }
            if let Some(previous) = previous {
                warn!(previous, "{reason}, restoring previous pointer");
                if let Err(e) = binary::switch_pointer(layout, previous) {
                    warn!("Failed to restore pointer to {previous}: {e:#}");
                }
            }
        };

        if let Err(veto) = self.gate("before restart").await {
            revert("Restart vetoed");
            return Err(veto.into());
        }

        if let Err(e) = self.services.restart(SERVICE_UNIT).await {
            revert("Restart failed");
            if let Err(again) = self.services.restart(SERVICE_UNIT).await {
                warn!("Best-effort restart on previous version failed: {again:#}");
            }
            return Err(e.context(format!("Failed to restart {SERVICE_UNIT}")));
        }
        Ok(RestartAction::Restarted)
    }

    /// Go back to the previously installed binary.
    pub async fn rollback(&self) -> Result<UpdateOutcome> {
        deferred_on_veto(self.roll_back().await)
    }

    async fn roll_back(&self) -> Result<UpdateOutcome> {
        let _lock = self
            .interrupt
            .guard(OperationLock::acquire(&self.layout.lock_dir(), self.config.lock_timeout()))
            .await??;

        match &self.layout {
            InstallationLayout::Managed(layout) => {
                let (from, to) = binary::rollback(layout)?;
                let restart = self
                    .restart_after_install(layout, Some(&from), InstallChange::PointerSwitched)
                    .await?;
                Ok(UpdateOutcome::RolledBack {
                    from,
                    to,
                    restart,
                })
            }
            InstallationLayout::Standalone {
                binary_path,
            } => {
                binary::restore_standalone(binary_path).await?;
                Ok(UpdateOutcome::RolledBack {
                    from: self.installed_version()?,
                    to: "previous binary".to_string(),
                    restart: RestartAction::ManualRequired,
                })
            }
        }
    }
}

/// A safety veto ends the cycle as [`UpdateOutcome::Deferred`], not as an error.
fn deferred_on_veto(result: Result<UpdateOutcome>) -> Result<UpdateOutcome> {
    if let Err(e) = &result
        && let Some(PiriError::UnsafeState {
            reason,
        }) = e.downcast_ref::<PiriError>()
    {
        info!(%reason, "Update deferred");
        return Ok(UpdateOutcome::Deferred(*reason));
    }
    result
}
