use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::CHECKSUMS_ASSET_MARKER;
use crate::core::PiriError;
use crate::http::Fetch;
use crate::release::ReleaseManifest;

/// Verifies downloaded release archives against the published SHA-256 digests.
///
/// Every archive is hashed in full and compared before it is handed to the
/// extractor. There is no "skip if unavailable" path: a release without a
/// checksum entry for the selected asset cannot be installed.
///
/// # Checksum File Format
///
/// One entry per line, digest first:
/// ```text
/// 3a7bd3e2360a3d29eea436fcfb7e44c735d117c42d1c1835420b6b9942dd4f1b  piri_linux_amd64.tar.gz
/// 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08 *piri_darwin_all.zip
/// ```
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Locate the checksums asset in `manifest`, download it and parse it.
    ///
    /// Returns [`PiriError::ChecksumNotFound`] naming `target` when the release
    /// publishes no checksums asset at all.
    pub async fn fetch_checksums<F: Fetch>(
        fetcher: &F,
        manifest: &ReleaseManifest,
        target: &str,
        timeout: Duration,
    ) -> Result<HashMap<String, String>, PiriError> {
        let Some(asset) = manifest
            .assets
            .iter()
            .find(|a| a.name.contains(CHECKSUMS_ASSET_MARKER) && a.name.ends_with(".txt"))
        else {
            warn!(version = %manifest.version, "Release publishes no checksums asset");
            return Err(PiriError::ChecksumNotFound {
                filename: target.to_string(),
            });
        };

        debug!("Fetching checksums from: {}", asset.download_url);
        let body = fetcher.fetch(&asset.download_url, timeout, None).await?;
        let content = String::from_utf8_lossy(&body);

        let checksums = Self::parse_checksums(&content);
        debug!("Parsed {} checksum entries from {}", checksums.len(), asset.name);
        Ok(checksums)
    }

    /// Parse `<hex digest> <filename>` lines into a filename -> digest map.
    ///
    /// Blank and malformed lines are skipped. A leading `*` (binary mode
    /// marker) on the filename is dropped and digests are lowercased.
    pub fn parse_checksums(content: &str) -> HashMap<String, String> {
        let mut checksums = HashMap::new();

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let (Some(digest), Some(filename), None) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };

            let filename = filename.strip_prefix('*').unwrap_or(filename);
            if filename.is_empty() || !is_sha256_hex(digest) {
                continue;
            }

            checksums.insert(filename.to_string(), digest.to_lowercase());
        }

        checksums
    }

    /// Look up the digest for `filename`.
    pub fn expected_for<'a>(
        checksums: &'a HashMap<String, String>,
        filename: &str,
    ) -> Result<&'a str, PiriError> {
        checksums.get(filename).map(String::as_str).ok_or_else(|| PiriError::ChecksumNotFound {
            filename: filename.to_string(),
        })
    }

    /// Hex-encoded SHA-256 of `data`.
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Verify `data` against `expected`.
    ///
    /// Comparison is case-insensitive and tolerates a `sha256:` prefix on the
    /// expected digest.
    pub fn verify(filename: &str, data: &[u8], expected: &str) -> Result<(), PiriError> {
        info!("Verifying checksum for: {}", filename);

        let expected = expected.trim();
        let expected = expected.strip_prefix("sha256:").unwrap_or(expected).to_lowercase();
        let actual = Self::compute_sha256(data);

        if actual != expected {
            return Err(PiriError::IntegrityError {
                file: filename.to_string(),
                expected,
                actual,
            });
        }

        info!("Checksum verification successful");
        Ok(())
    }
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}
