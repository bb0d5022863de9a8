//! Version normalization and comparison.
//!
//! Release tags look like `v1.2.3`; local builds can carry a suffix such as
//! `1.2.3-dirty` or `1.2.3+abc123`. Two versions are the same release when
//! they agree after stripping the leading `v`/`V` and anything from the first
//! `-` or `+`.

use std::cmp::Ordering;

/// The version compiled into this binary, in tag form (`v0.4.10`).
pub fn current_version() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}

/// Strip the leading version marker and any pre-release/build suffix.
pub fn normalize_version(version: &str) -> &str {
    let trimmed = version.trim();
    let without_marker = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    match without_marker.find(['-', '+']) {
        Some(idx) => &without_marker[..idx],
        None => without_marker,
    }
}

/// Whether `a` and `b` name the same release after normalization.
pub fn versions_match(a: &str, b: &str) -> bool {
    normalize_version(a) == normalize_version(b)
}

/// Semantic ordering of two normalized versions, if both parse.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let a = semver::Version::parse(normalize_version(a)).ok()?;
    let b = semver::Version::parse(normalize_version(b)).ok()?;
    Some(a.cmp(&b))
}

/// `true` when moving from `current` to `target` goes backwards.
pub fn is_downgrade(current: &str, target: &str) -> bool {
    compare_versions(current, target) == Some(Ordering::Greater)
}

/// Human-readable summary for status output.
pub fn format_version_info(current: &str, latest: Option<&str>) -> String {
    match latest {
        Some(v) if !versions_match(v, current) => {
            format!("Current version: {current}\nLatest version:  {v} (update available)")
        }
        _ => format!("Current version: {current} (up to date)"),
    }
}
