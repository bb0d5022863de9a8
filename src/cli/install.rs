use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::LifecycleConfig;
use crate::constants::SERVICE_UNIT;
use crate::installer::{InstallRequest, Installer};
use crate::privilege::detect_service_user;
use crate::service::Systemctl;
use crate::utils::interrupt::Interrupt;

/// Install the running binary as the `piri` system service.
///
/// ```bash
/// sudo piri install --config ./piri-config.toml
/// sudo piri install --config ./piri-config.toml --user piri --enable-auto-update
/// ```
#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Node configuration file to install.
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Replace an existing installation's files.
    #[arg(long)]
    pub force: bool,

    /// Also install a timer that checks for updates every 30 minutes.
    #[arg(long)]
    pub enable_auto_update: bool,

    /// Account the service runs as. Defaults to the user who invoked sudo.
    #[arg(long, value_name = "NAME")]
    pub user: Option<String>,
}

impl InstallCommand {
    pub async fn execute(self, config: &LifecycleConfig, interrupt: Interrupt) -> Result<i32> {
        if let Some(code) =
            super::elevate_if_needed(&[config.install_root.as_path(), config.unit_dir.as_path()]).await?
        {
            return Ok(code);
        }

        let config_path = std::path::absolute(&self.config)
            .with_context(|| format!("Invalid config path {}", self.config.display()))?;
        let service_user = detect_service_user(self.user.as_deref())?;
        let binary_path = std::env::current_exe().context("Failed to locate the running executable")?;

        println!(
            "{} piri to {} (service user: {})",
            "Installing".cyan(),
            config.install_root.display(),
            service_user.name
        );

        let supervisor = Systemctl::new(config.supervisor_timeout());
        let summary = Installer::new(&supervisor, config)
            .with_interrupt(interrupt)
            .install(&InstallRequest {
                config_path,
                binary_path,
                service_user,
            })
            .await?;

        println!("{}", format!("Installed piri {} and started {SERVICE_UNIT}", summary.version).green());
        for unit in &summary.units {
            println!("  {} {unit}", "registered".dimmed());
        }
        if config.flags.auto_update && !summary.auto_update_active {
            println!(
                "{}",
                "Automatic updates could not be enabled; see 'systemctl status piri-updater.timer'".yellow()
            );
        }
        println!("Follow the node with: journalctl -u {SERVICE_UNIT} -f");
        Ok(0)
    }
}
