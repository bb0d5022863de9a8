//! Filesystem layouts the binary can be installed in.
//!
//! ```text
//! <root>/                       managed installation root (default /opt/piri)
//! ├── bin/
//! │   ├── v1.2.3/piri
//! │   ├── v1.3.0/piri
//! │   └── current -> v1.3.0     relative symlink, swapped on update
//! ├── etc/piri-config.toml
//! └── units/                    unit files, symlinked into /etc/systemd/system
//! ```
//!
//! A standalone installation is a single binary at a fixed path, replaced in
//! place by temp-file-then-rename.

use std::path::{Path, PathBuf};

use crate::constants::{
    BINARY_NAME, CONFIG_FILE_NAME, CURRENT_POINTER_NAME, STAGING_DIR_PREFIX,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallationLayout {
    Standalone {
        binary_path: PathBuf,
    },
    Managed(ManagedLayout),
}

impl InstallationLayout {
    /// Classify the running executable.
    ///
    /// The executable belongs to a managed installation when it lives at
    /// `<root>/bin/<something>/piri`, either reached through the `current`
    /// pointer or through a versioned directory.
    pub fn detect(exe: &Path, root: &Path) -> Self {
        let managed = ManagedLayout::new(root);
        let bin_dir = managed.bin_dir();

        let under_bin = exe
            .parent()
            .and_then(Path::parent)
            .is_some_and(|grandparent| paths_equal(grandparent, &bin_dir));

        if under_bin {
            Self::Managed(managed)
        } else {
            Self::Standalone {
                binary_path: exe.to_path_buf(),
            }
        }
    }

    /// Directory holding the operation lock for this layout.
    pub fn lock_dir(&self) -> PathBuf {
        match self {
            Self::Standalone {
                binary_path,
            } => binary_path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf),
            Self::Managed(layout) => layout.root().to_path_buf(),
        }
    }
}

fn paths_equal(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Paths of a managed installation rooted at `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedLayout {
    root: PathBuf,
}

impl ManagedLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn etc_dir(&self) -> PathBuf {
        self.root.join("etc")
    }

    pub fn units_dir(&self) -> PathBuf {
        self.root.join("units")
    }

    pub fn versioned_bin_dir(&self, version: &str) -> PathBuf {
        self.bin_dir().join(version)
    }

    pub fn versioned_binary(&self, version: &str) -> PathBuf {
        self.versioned_bin_dir(version).join(BINARY_NAME)
    }

    pub fn staging_dir(&self, version: &str) -> PathBuf {
        self.bin_dir().join(format!("{STAGING_DIR_PREFIX}{version}"))
    }

    pub fn current_pointer(&self) -> PathBuf {
        self.bin_dir().join(CURRENT_POINTER_NAME)
    }

    /// The binary as the supervisor launches it, through the pointer.
    pub fn current_binary(&self) -> PathBuf {
        self.current_pointer().join(BINARY_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.etc_dir().join(CONFIG_FILE_NAME)
    }
}
