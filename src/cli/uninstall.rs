use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::config::LifecycleConfig;
use crate::installer::{Installer, is_installed};
use crate::service::Systemctl;

/// Stop and unregister the `piri` service.
///
/// Without `--purge`, binaries and configuration stay under the installation
/// root so the node can be reinstalled or rolled back.
#[derive(Args, Debug)]
pub struct UninstallCommand {
    /// Also delete the installation root (binaries, configuration, unit files).
    #[arg(long)]
    pub purge: bool,
}

impl UninstallCommand {
    pub async fn execute(self, config: &LifecycleConfig) -> Result<i32> {
        if let Some(code) =
            super::elevate_if_needed(&[config.install_root.as_path(), config.unit_dir.as_path()]).await?
        {
            return Ok(code);
        }

        let root = config.install_root.as_path();
        if !is_installed(root) {
            println!("{}", format!("No managed installation at {}, removing any leftover units", root.display()).dimmed());
        }

        let supervisor = Systemctl::new(config.supervisor_timeout());
        let report = Installer::new(&supervisor, config).uninstall(self.purge).await?;

        println!("{}", "Uninstalled the piri service".green());
        println!("  {}", report.to_string().dimmed());
        if self.purge {
            println!("Removed {}", root.display());
        } else {
            println!("Binaries and configuration were kept in {} (use --purge to delete them)", root.display());
        }
        Ok(0)
    }
}
