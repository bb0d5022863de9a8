//! Shared harness for integration tests
//!
//! Builds a fake release index with one release, its archive and checksums,
//! and a lifecycle configuration rooted in a temp directory.

// Not every test module uses every helper.
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use piri_lifecycle::config::{InvocationFlags, LifecycleConfig};
use piri_lifecycle::installer::layout::ManagedLayout;
use piri_lifecycle::test_utils::fixtures::{ArchiveEntry, node_config_toml, tar_gz};
use piri_lifecycle::test_utils::{FakeFetcher, sha256_hex};
use tempfile::TempDir;

pub const INDEX_URL: &str = "https://releases.piri.test/repos/storacha/piri/releases";
pub const ASSET: &str = "piri_linux_amd64.tar.gz";
pub const ASSET_URL: &str = "https://releases.piri.test/download/piri_linux_amd64.tar.gz";
pub const CHECKSUMS_URL: &str = "https://releases.piri.test/download/piri_checksums.txt";

/// A published release as the fake network serves it.
pub struct FakeRelease {
    pub version: String,
    pub binary: Vec<u8>,
    pub archive: Vec<u8>,
    /// Filename the checksums line is written for.
    pub checksum_for: String,
}

impl FakeRelease {
    /// A release whose archive nests the binary in a versioned directory.
    pub fn new(version: &str) -> Self {
        let binary = format!("#!/bin/sh\necho piri {version}\n").into_bytes();
        let dir = format!("piri_{}_linux_amd64", version.trim_start_matches('v'));
        let archive = tar_gz(&[
            ArchiveEntry::dir(&format!("{dir}/")),
            ArchiveEntry::file(&format!("{dir}/LICENSE"), b"MIT"),
            ArchiveEntry::file(&format!("{dir}/piri"), &binary),
        ]);
        Self {
            version: version.to_string(),
            binary,
            archive,
            checksum_for: ASSET.to_string(),
        }
    }

    #[must_use]
    pub fn with_checksum_for(mut self, filename: &str) -> Self {
        self.checksum_for = filename.to_string();
        self
    }

    pub fn fetcher(&self) -> FakeFetcher {
        let index = format!(
            r#"[
  {{"tag_name":"v99.0.0-rc.1","draft":false,"prerelease":true,"assets":[]}},
  {{"tag_name":"{version}","draft":false,"prerelease":false,"published_at":"2026-10-01T12:00:00Z","assets":[
    {{"name":"piri_darwin_all.zip","browser_download_url":"https://releases.piri.test/download/piri_darwin_all.zip"}},
    {{"name":"{ASSET}","browser_download_url":"{ASSET_URL}"}},
    {{"name":"piri_checksums.txt","browser_download_url":"{CHECKSUMS_URL}"}}
  ]}}
]"#,
            version = self.version
        );
        let checksums = format!(
            "{}  piri_darwin_all.zip\n{}  {}\n",
            sha256_hex(b"darwin"),
            sha256_hex(&self.archive),
            self.checksum_for
        );
        FakeFetcher::new()
            .with_response(INDEX_URL, index.as_bytes())
            .with_response(CHECKSUMS_URL, checksums.as_bytes())
            .with_response(ASSET_URL, &self.archive)
    }
}

/// A temp directory standing in for `/`.
pub struct TestHost {
    pub temp: TempDir,
    pub config: LifecycleConfig,
}

impl TestHost {
    pub fn new(flags: InvocationFlags) -> Self {
        let temp = TempDir::new().unwrap();
        let config = LifecycleConfig {
            install_root: temp.path().join("opt/piri"),
            unit_dir: temp.path().join("etc/systemd/system"),
            release_index_url: INDEX_URL.to_string(),
            lock_timeout_secs: 1,
            ..LifecycleConfig::default()
        }
        .with_flags(flags);
        Self {
            temp,
            config,
        }
    }

    pub fn layout(&self) -> ManagedLayout {
        ManagedLayout::new(self.config.install_root.clone())
    }

    /// A managed installation with `version` current, without units.
    pub fn seed_managed(&self, version: &str) -> ManagedLayout {
        let layout = self.layout();
        fs::create_dir_all(layout.bin_dir()).unwrap();
        piri_lifecycle::installer::binary::install_managed(&layout, version, b"seeded-binary").unwrap();
        layout
    }

    pub fn write_node_config(&self) -> PathBuf {
        let path = self.temp.path().join("piri-config.toml");
        fs::write(&path, node_config_toml()).unwrap();
        path
    }

    pub fn write_binary(&self) -> PathBuf {
        let path = self.temp.path().join("piri-build");
        fs::write(&path, b"#!/bin/sh\necho piri dev\n").unwrap();
        path
    }
}
