//! Release lookup and platform asset selection.
//!
//! The release index is a JSON array of releases, newest first:
//!
//! ```json
//! [{"tag_name": "v1.2.3", "draft": false, "prerelease": false,
//!   "published_at": "2025-06-01T12:00:00Z",
//!   "assets": [{"name": "piri_linux_amd64.tar.gz", "browser_download_url": "https://..."}]}]
//! ```
//!
//! Asset naming follows the release pipeline: one `piri_linux_<arch>.tar.gz`
//! per supported Linux architecture and a single universal macOS zip whose
//! name contains `darwin_all`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::constants::{LINUX_ASSET_MARKER, MACOS_ASSET_MARKER, SUPPORTED_LINUX_ARCHES};
use crate::core::PiriError;
use crate::http::Fetch;

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(alias = "browser_download_url")]
    pub download_url: String,
}

/// One entry of the release index. Fetched fresh for every check.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseManifest {
    #[serde(rename = "tag_name")]
    pub version: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseManifest {
    /// Find an asset by exact filename.
    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// The asset chosen for this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedAsset {
    pub url: String,
    pub filename: String,
}

/// Host operating system and architecture in release naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// `linux`, `macos`, ...
    pub os: String,
    /// Release architecture token, e.g. `amd64`
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, release_arch(std::env::consts::ARCH))
    }
}

/// Map a Rust architecture name to the token used in asset names.
pub fn release_arch(rust_arch: &str) -> &str {
    match rust_arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Looks up releases through a [`Fetch`] implementation.
pub struct ReleaseLocator<'a, F: Fetch> {
    fetcher: &'a F,
    index_url: String,
    timeout: Duration,
}

impl<'a, F: Fetch> ReleaseLocator<'a, F> {
    pub fn new(fetcher: &'a F, index_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            index_url: index_url.into(),
            timeout,
        }
    }

    /// Fetch the index and return the newest published, non-draft,
    /// non-prerelease release.
    pub async fn latest_release(&self) -> Result<ReleaseManifest, PiriError> {
        debug!("Fetching release index from {}", self.index_url);
        let body = self.fetcher.fetch(&self.index_url, self.timeout, None).await?;

        let releases: Vec<ReleaseManifest> =
            serde_json::from_slice(&body).map_err(|e| PiriError::NetworkError {
                operation: format!("parse release index {}", self.index_url),
                reason: e.to_string(),
            })?;

        let latest = newest_stable(releases).ok_or_else(|| PiriError::NoRelease {
            index: self.index_url.clone(),
        })?;

        info!(version = %latest.version, "Latest release located");
        Ok(latest)
    }
}

/// Pick the newest eligible release. Releases without a publish time keep
/// index order, which is newest first.
fn newest_stable(releases: Vec<ReleaseManifest>) -> Option<ReleaseManifest> {
    let mut best: Option<ReleaseManifest> = None;
    for release in releases.into_iter().filter(|r| !r.draft && !r.prerelease) {
        let replace = match &best {
            None => true,
            Some(current) => match (release.published_at, current.published_at) {
                (Some(candidate), Some(held)) => candidate > held,
                _ => false,
            },
        };
        if replace {
            best = Some(release);
        }
    }
    best
}

/// Choose the asset for `platform` from `manifest`.
pub fn select_asset(
    manifest: &ReleaseManifest,
    platform: &Platform,
) -> Result<SelectedAsset, PiriError> {
    let not_found = || PiriError::AssetNotFound {
        version: manifest.version.clone(),
        os: platform.os.clone(),
        arch: platform.arch.clone(),
    };

    let asset = match platform.os.as_str() {
        "macos" => manifest
            .assets
            .iter()
            .find(|a| a.name.contains(MACOS_ASSET_MARKER) && a.name.ends_with(".zip")),
        "linux" => {
            if !SUPPORTED_LINUX_ARCHES.contains(&platform.arch.as_str()) {
                return Err(not_found());
            }
            manifest.assets.iter().find(|a| {
                a.name.contains(LINUX_ASSET_MARKER)
                    && has_arch_token(&a.name, &platform.arch)
                    && a.name.ends_with(".tar.gz")
            })
        }
        other => {
            return Err(PiriError::PlatformNotSupported {
                reason: format!("no release assets are published for {other}"),
            });
        }
    };

    let asset = asset.ok_or_else(not_found)?;
    debug!("Selected asset {} for {}/{}", asset.name, platform.os, platform.arch);
    Ok(SelectedAsset {
        url: asset.download_url.clone(),
        filename: asset.name.clone(),
    })
}

/// Match `arch` as a whole `_`/`-`/`.` delimited token so `arm64` does not
/// match an `arm64v8` build and `amd64` does not match `amd64p32`.
fn has_arch_token(name: &str, arch: &str) -> bool {
    name.split(['_', '-', '.']).any(|token| token == arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            download_url: format!("https://example.com/{name}"),
        }
    }

    fn manifest(assets: &[&str]) -> ReleaseManifest {
        ReleaseManifest {
            version: "v1.2.3".to_string(),
            draft: false,
            prerelease: false,
            published_at: None,
            assets: assets.iter().map(|n| asset(n)).collect(),
        }
    }

    #[test]
    fn test_select_linux_asset() {
        let m = manifest(&[
            "checksums.txt",
            "piri_darwin_all.zip",
            "piri_linux_arm64.tar.gz",
            "piri_linux_amd64.tar.gz",
        ]);
        let selected = select_asset(&m, &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(selected.filename, "piri_linux_amd64.tar.gz");
        assert_eq!(selected.url, "https://example.com/piri_linux_amd64.tar.gz");
    }

    #[test]
    fn test_select_linux_requires_exact_arch_and_tarball() {
        let m = manifest(&["piri_linux_amd64p32.tar.gz", "piri_linux_amd64.zip"]);
        let err = select_asset(&m, &Platform::new("linux", "amd64")).unwrap_err();
        assert!(matches!(err, PiriError::AssetNotFound { .. }));
    }

    #[test]
    fn test_select_linux_rejects_unlisted_arch() {
        let m = manifest(&["piri_linux_386.tar.gz"]);
        let err = select_asset(&m, &Platform::new("linux", "386")).unwrap_err();
        assert!(matches!(err, PiriError::AssetNotFound { .. }));
    }

    #[test]
    fn test_select_macos_universal_zip() {
        let m = manifest(&["piri_linux_amd64.tar.gz", "piri_darwin_all.zip"]);
        let selected = select_asset(&m, &Platform::new("macos", "arm64")).unwrap();
        assert_eq!(selected.filename, "piri_darwin_all.zip");
    }

    #[test]
    fn test_select_unsupported_os() {
        let m = manifest(&["piri_windows_amd64.zip"]);
        let err = select_asset(&m, &Platform::new("windows", "amd64")).unwrap_err();
        assert!(matches!(err, PiriError::PlatformNotSupported { .. }));
    }

    #[test]
    fn test_release_arch_mapping() {
        assert_eq!(release_arch("x86_64"), "amd64");
        assert_eq!(release_arch("aarch64"), "arm64");
        assert_eq!(release_arch("riscv64"), "riscv64");
    }

    #[test]
    fn test_manifest_parses_github_shape() {
        let json = r#"[{
            "tag_name": "v0.1.0",
            "draft": false,
            "prerelease": false,
            "published_at": "2025-06-01T12:00:00Z",
            "assets": [{"name": "checksums.txt", "browser_download_url": "https://x/checksums.txt"}]
        }]"#;
        let releases: Vec<ReleaseManifest> = serde_json::from_str(json).unwrap();
        assert_eq!(releases[0].version, "v0.1.0");
        assert_eq!(releases[0].asset("checksums.txt").unwrap().download_url, "https://x/checksums.txt");
    }

    #[test]
    fn test_newest_stable_skips_drafts_and_prereleases() {
        let parse = |s: &str| Some(s.parse::<DateTime<Utc>>().unwrap());
        let mut draft = manifest(&[]);
        draft.version = "v3.0.0".into();
        draft.draft = true;
        draft.published_at = parse("2025-09-01T00:00:00Z");
        let mut pre = manifest(&[]);
        pre.version = "v2.1.0-rc1".into();
        pre.prerelease = true;
        pre.published_at = parse("2025-08-01T00:00:00Z");
        let mut old = manifest(&[]);
        old.version = "v1.0.0".into();
        old.published_at = parse("2025-01-01T00:00:00Z");
        let mut new = manifest(&[]);
        new.version = "v2.0.0".into();
        new.published_at = parse("2025-07-01T00:00:00Z");

        let latest = newest_stable(vec![draft, pre, old, new]).unwrap();
        assert_eq!(latest.version, "v2.0.0");
    }

    #[test]
    fn test_newest_stable_keeps_index_order_without_timestamps() {
        let mut first = manifest(&[]);
        first.version = "v2.0.0".into();
        let mut second = manifest(&[]);
        second.version = "v1.0.0".into();
        assert_eq!(newest_stable(vec![first, second]).unwrap().version, "v2.0.0");
        assert!(newest_stable(vec![]).is_none());
    }
}
