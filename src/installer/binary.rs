//! Placing the node binary on disk.
//!
//! Standalone installs replace a single file: the new bytes go to a temporary
//! file in the target's directory, are synced and marked executable, then
//! renamed over the target. The previous binary is kept as `<path>.backup`.
//!
//! Managed installs never touch a binary that may be running. Each version
//! gets its own directory, populated through a `.tmp-<version>` staging
//! directory that is renamed into place once complete, and the `current`
//! pointer is swapped to it by removing the old symlink and creating a new
//! one. A failure before the swap leaves the previous pointer untouched.

use std::fs;
use std::io::Write;
use std::os::unix::fs::{MetadataExt, symlink};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::constants::BINARY_NAME;
use crate::installer::layout::ManagedLayout;
use crate::upgrade::backup::BackupManager;
use crate::upgrade::version::compare_versions;
use crate::utils::fs::{chown_tree, ensure_dir, make_executable, path_present, remove_dir_if_exists};

/// What a managed install actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallChange {
    /// New version directory created and pointer swapped to it.
    Installed,
    /// Version was already on disk; only the pointer moved.
    PointerSwitched,
    /// Version already installed and current.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedInstall {
    pub version: String,
    /// Pointer target before the install, if there was one.
    pub previous: Option<String>,
    pub change: InstallChange,
}

/// Replace the binary at `path` with `bytes`, keeping a `.backup` copy.
pub async fn install_standalone(path: &Path, bytes: &[u8]) -> Result<()> {
    if path.exists() {
        BackupManager::new(path.to_path_buf()).create_backup().await?;
    }

    let parent = path
        .parent()
        .with_context(|| format!("Binary path has no parent directory: {}", path.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    temp.write_all(bytes).context("Failed to write new binary")?;
    temp.as_file().sync_all().context("Failed to sync new binary to disk")?;
    make_executable(temp.path())?;

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move new binary into place at {}", path.display()))?;

    info!("Installed {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Restore the `.backup` copy of a standalone binary.
pub async fn restore_standalone(path: &Path) -> Result<()> {
    BackupManager::new(path.to_path_buf()).restore_backup().await
}

/// Install `bytes` as `version` under `layout` and point `current` at it.
///
/// New files take the owner of the installation root.
pub fn install_managed(layout: &ManagedLayout, version: &str, bytes: &[u8]) -> Result<ManagedInstall> {
    let previous = current_version(layout)?;
    let version_dir = layout.versioned_bin_dir(version);

    if layout.versioned_binary(version).is_file() {
        return point_at_installed(layout, version, previous);
    }

    if path_present(&version_dir) {
        warn!(version, "Removing incomplete version directory {}", version_dir.display());
        remove_dir_if_exists(&version_dir)?;
    }

    let staging = layout.staging_dir(version);
    if let Err(e) = stage_version(layout, &staging, &version_dir, bytes) {
        if let Err(cleanup) = remove_dir_if_exists(&staging) {
            warn!("Failed to remove staging directory {}: {cleanup:#}", staging.display());
        }
        return Err(e);
    }

    switch_pointer(layout, version)?;
    info!(version, "Installed {}", layout.versioned_binary(version).display());

    Ok(ManagedInstall {
        version: version.to_string(),
        previous,
        change: InstallChange::Installed,
    })
}

/// Point `current` at a `version` that is already on disk.
///
/// Fails if the version directory has no binary; nothing is written then.
pub fn activate_installed(layout: &ManagedLayout, version: &str) -> Result<ManagedInstall> {
    let previous = current_version(layout)?;
    if !layout.versioned_binary(version).is_file() {
        bail!(
            "Version {version} is no longer installed under {}",
            layout.bin_dir().display()
        );
    }
    point_at_installed(layout, version, previous)
}

fn point_at_installed(layout: &ManagedLayout, version: &str, previous: Option<String>) -> Result<ManagedInstall> {
    if previous.as_deref() == Some(version) {
        info!(version, "Version already installed and current, nothing to do");
        return Ok(ManagedInstall {
            version: version.to_string(),
            previous,
            change: InstallChange::Unchanged,
        });
    }
    info!(version, "Version already installed, switching pointer");
    switch_pointer(layout, version)?;
    Ok(ManagedInstall {
        version: version.to_string(),
        previous,
        change: InstallChange::PointerSwitched,
    })
}

fn stage_version(layout: &ManagedLayout, staging: &Path, version_dir: &Path, bytes: &[u8]) -> Result<()> {
    remove_dir_if_exists(staging)?;
    ensure_dir(staging)?;

    let binary = staging.join(BINARY_NAME);
    {
        let mut file = fs::File::create(&binary)
            .with_context(|| format!("Failed to create {}", binary.display()))?;
        file.write_all(bytes).with_context(|| format!("Failed to write {}", binary.display()))?;
        file.sync_all().context("Failed to sync binary to disk")?;
    }
    make_executable(&binary)?;

    let root_meta = fs::metadata(layout.root())
        .with_context(|| format!("Failed to read {}", layout.root().display()))?;
    chown_tree(staging, root_meta.uid(), root_meta.gid())?;

    fs::rename(staging, version_dir).with_context(|| {
        format!("Failed to move {} to {}", staging.display(), version_dir.display())
    })?;
    Ok(())
}

/// Point `current` at an installed `version`.
///
/// The old link is removed and a new relative link created; it is never
/// edited in place.
pub fn switch_pointer(layout: &ManagedLayout, version: &str) -> Result<()> {
    if !layout.versioned_binary(version).is_file() {
        bail!("Version {version} is not installed under {}", layout.bin_dir().display());
    }

    let pointer = layout.current_pointer();
    if path_present(&pointer) {
        let meta = fs::symlink_metadata(&pointer)?;
        if !meta.file_type().is_symlink() {
            bail!("{} exists and is not a symlink", pointer.display());
        }
        fs::remove_file(&pointer)
            .with_context(|| format!("Failed to remove pointer {}", pointer.display()))?;
    }

    symlink(version, &pointer)
        .with_context(|| format!("Failed to point {} at {version}", pointer.display()))?;
    debug!("{} -> {}", pointer.display(), version);
    Ok(())
}

/// Version the `current` pointer targets, if the pointer exists.
pub fn current_version(layout: &ManagedLayout) -> Result<Option<String>> {
    let pointer = layout.current_pointer();
    match fs::read_link(&pointer) {
        Ok(target) => Ok(target.file_name().map(|n| n.to_string_lossy().into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read pointer {}", pointer.display())),
    }
}

/// Installed versions, oldest first. Staging directories are excluded.
pub fn installed_versions(layout: &ManagedLayout) -> Result<Vec<String>> {
    let bin_dir = layout.bin_dir();
    let entries = match fs::read_dir(&bin_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", bin_dir.display())),
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        if entry.path().join(BINARY_NAME).is_file() {
            versions.push(name);
        }
    }

    versions.sort_by(|a, b| compare_versions(a, b).unwrap_or_else(|| a.cmp(b)));
    Ok(versions)
}

/// Swap the pointer back to the newest installed version older than the
/// current one. Returns `(from, to)`.
pub fn rollback(layout: &ManagedLayout) -> Result<(String, String)> {
    let Some(current) = current_version(layout)? else {
        bail!("No current version is installed under {}", layout.root().display());
    };

    let versions = installed_versions(layout)?;
    let position = versions.iter().position(|v| *v == current);
    let target = match position {
        Some(idx) if idx > 0 => versions[idx - 1].clone(),
        _ => bail!("No version older than {current} is installed to roll back to"),
    };

    switch_pointer(layout, &target)?;
    info!(from = %current, to = %target, "Rolled back current pointer");
    Ok((current, target))
}
