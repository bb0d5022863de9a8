use anyhow::{Context, Result, bail};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Keeps the previous standalone binary next to the installed one.
///
/// Before a standalone update replaces `<path>`, the running binary is copied
/// to `<path>.backup` with its permissions. The copy is left in place after a
/// successful update so `piri update --rollback` (or an administrator) can
/// restore it.
///
/// Restoring never overwrites the target in place: the backup is copied to a
/// temporary file in the same directory and renamed over the target, so a
/// running process keeps its open inode and a crash leaves either binary
/// intact.
///
/// # Examples
///
/// ```rust,no_run
/// use piri_lifecycle::upgrade::backup::BackupManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let manager = BackupManager::new(PathBuf::from("/usr/local/bin/piri"));
/// manager.create_backup().await?;
/// // ... replace the binary ...
/// if manager.backup_exists() {
///     manager.restore_backup().await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackupManager {
    original_path: PathBuf,
    backup_path: PathBuf,
}

impl BackupManager {
    /// Manage the backup of `executable_path` at `<executable_path>.backup`.
    pub fn new(executable_path: PathBuf) -> Self {
        let mut backup_path = executable_path.clone();
        backup_path.set_file_name(format!(
            "{}.backup",
            executable_path.file_name().unwrap_or_default().to_string_lossy()
        ));

        Self {
            original_path: executable_path,
            backup_path,
        }
    }

    /// Copy the current binary to the backup path, replacing any older backup.
    pub async fn create_backup(&self) -> Result<()> {
        if !self.original_path.exists() {
            bail!("Original file does not exist: {}", self.original_path.display());
        }

        if self.backup_path.exists() {
            debug!("Removing old backup at {}", self.backup_path.display());
            fs::remove_file(&self.backup_path).await.context("Failed to remove old backup")?;
        }

        info!("Creating backup at {}", self.backup_path.display());
        fs::copy(&self.original_path, &self.backup_path)
            .await
            .with_context(|| format!("Failed to create backup at {}", self.backup_path.display()))?;

        let permissions = fs::metadata(&self.original_path)
            .await
            .context("Failed to read original file metadata")?
            .permissions();
        fs::set_permissions(&self.backup_path, permissions)
            .await
            .context("Failed to set backup permissions")?;

        Ok(())
    }

    /// Put the backup back in place of the original binary.
    ///
    /// The backup itself is kept.
    pub async fn restore_backup(&self) -> Result<()> {
        if !self.backup_path.exists() {
            bail!("No backup found at {}", self.backup_path.display());
        }

        warn!("Restoring {} from backup", self.original_path.display());

        let staging = self.original_path.with_extension("restore");
        fs::copy(&self.backup_path, &staging)
            .await
            .with_context(|| format!("Failed to stage backup at {}", staging.display()))?;

        let mode = fs::metadata(&self.backup_path)
            .await
            .context("Failed to read backup metadata")?
            .permissions()
            .mode();
        fs::set_permissions(&staging, std::fs::Permissions::from_mode(mode))
            .await
            .context("Failed to set restored permissions")?;

        if let Err(e) = fs::rename(&staging, &self.original_path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e).with_context(|| {
                format!("Failed to move backup into place at {}", self.original_path.display())
            });
        }

        info!("Restored {} from backup", self.original_path.display());
        Ok(())
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_backup_path_naming() {
        let manager = BackupManager::new(PathBuf::from("/usr/local/bin/piri"));
        assert_eq!(manager.backup_path(), Path::new("/usr/local/bin/piri.backup"));
    }

    #[tokio::test]
    async fn test_backup_and_restore() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("piri");
        std::fs::write(&exe, b"old").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let manager = BackupManager::new(exe.clone());
        manager.create_backup().await.unwrap();
        assert!(manager.backup_exists());
        let mode = std::fs::metadata(manager.backup_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        std::fs::write(&exe, b"new").unwrap();
        manager.restore_backup().await.unwrap();

        assert_eq!(std::fs::read(&exe).unwrap(), b"old");
        assert!(manager.backup_exists());
        assert!(!exe.with_extension("restore").exists());
    }

    #[tokio::test]
    async fn test_restore_without_backup() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::new(temp.path().join("piri"));
        let err = manager.restore_backup().await.unwrap_err();
        assert!(err.to_string().contains("No backup found"));
    }

    #[tokio::test]
    async fn test_backup_requires_original() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::new(temp.path().join("missing"));
        assert!(manager.create_backup().await.is_err());
    }
}
