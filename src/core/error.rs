//! Error handling for the piri lifecycle manager
//!
//! Two layers, the same way the rest of the CLI works:
//! - [`PiriError`] - strongly-typed failure cases, returned by leaf components
//!   (release lookup, checksum verification, archive extraction, supervisor calls)
//! - [`ErrorContext`] - wrapper adding details and a remediation suggestion for
//!   interactive output
//!
//! Orchestration code propagates with [`anyhow`] and `.context(..)`. Use
//! [`user_friendly_error`] at the CLI boundary; it searches the whole error chain
//! for a [`PiriError`] so context layers and rollback wrappers never hide the cause.
//!
//! # Error Categories
//!
//! - **Transport**: [`PiriError::NetworkError`]
//! - **Integrity/packaging**: [`PiriError::IntegrityError`], [`PiriError::AssetNotFound`],
//!   [`PiriError::ChecksumNotFound`], [`PiriError::ExecutableNotFound`], [`PiriError::ArchiveError`]
//! - **Host**: [`PiriError::PermissionDenied`], [`PiriError::PlatformNotSupported`],
//!   [`PiriError::SupervisorError`], [`PiriError::LockContention`]
//! - **Gate veto**: [`PiriError::UnsafeState`] is not a failure; orchestrators turn it into a
//!   deferred outcome and a successful exit
//!
//! # Examples
//!
//! ```rust,no_run
//! use piri_lifecycle::core::{PiriError, user_friendly_error};
//!
//! let err = PiriError::ChecksumNotFound {
//!     filename: "piri_linux_amd64.tar.gz".to_string(),
//! };
//! user_friendly_error(anyhow::Error::from(err)).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::upgrade::safety::UnsafeReason;

/// Every typed failure the lifecycle manager can report.
#[derive(Error, Debug)]
pub enum PiriError {
    /// Transport or HTTP status failure. Retried only by the next scheduled cycle.
    #[error("Network error: {operation}")]
    NetworkError {
        /// What was being fetched
        operation: String,
        /// Underlying transport or status detail
        reason: String,
    },

    /// Downloaded bytes do not hash to the published digest.
    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    IntegrityError {
        /// Asset that failed verification
        file: String,
        /// Digest from the checksums resource
        expected: String,
        /// Digest computed over the downloaded buffer
        actual: String,
    },

    #[error("Release {version} has no asset for {os}/{arch}")]
    AssetNotFound {
        version: String,
        os: String,
        arch: String,
    },

    #[error("No checksum entry for {filename}")]
    ChecksumNotFound {
        filename: String,
    },

    #[error("Executable '{binary}' not found in archive {archive}")]
    ExecutableNotFound {
        binary: String,
        archive: String,
    },

    #[error("Invalid archive {archive}: {reason}")]
    ArchiveError {
        archive: String,
        reason: String,
    },

    #[error("No published release found at {index}")]
    NoRelease {
        index: String,
    },

    #[error("Permission denied: {operation}")]
    PermissionDenied {
        operation: String,
        path: String,
    },

    /// Safety gate veto. Never surfaced as a failed command.
    #[error("Node is not safe to update right now: {reason}")]
    UnsafeState {
        reason: UnsafeReason,
    },

    #[error("Service supervisor command failed: systemctl {action} {unit}")]
    SupervisorError {
        action: String,
        unit: String,
        stderr: String,
    },

    #[error("Operation not supported on this platform: {reason}")]
    PlatformNotSupported {
        reason: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    #[error("Invalid unit definition '{unit}': {reason}")]
    InvalidUnit {
        unit: String,
        reason: String,
    },

    #[error("{what} already exists at {path}")]
    AlreadyInstalled {
        what: String,
        path: String,
    },

    #[error("Service {unit} is already active")]
    ServiceActive {
        unit: String,
    },

    #[error("Another lifecycle operation holds the lock at {path}")]
    LockContention {
        path: String,
    },

    #[error("Operation interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{message}")]
    Other {
        message: String,
    },
}

impl Clone for PiriError {
    fn clone(&self) -> Self {
        match self {
            Self::NetworkError {
                operation,
                reason,
            } => Self::NetworkError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::IntegrityError {
                file,
                expected,
                actual,
            } => Self::IntegrityError {
                file: file.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::AssetNotFound {
                version,
                os,
                arch,
            } => Self::AssetNotFound {
                version: version.clone(),
                os: os.clone(),
                arch: arch.clone(),
            },
            Self::ChecksumNotFound {
                filename,
            } => Self::ChecksumNotFound {
                filename: filename.clone(),
            },
            Self::ExecutableNotFound {
                binary,
                archive,
            } => Self::ExecutableNotFound {
                binary: binary.clone(),
                archive: archive.clone(),
            },
            Self::ArchiveError {
                archive,
                reason,
            } => Self::ArchiveError {
                archive: archive.clone(),
                reason: reason.clone(),
            },
            Self::NoRelease {
                index,
            } => Self::NoRelease {
                index: index.clone(),
            },
            Self::PermissionDenied {
                operation,
                path,
            } => Self::PermissionDenied {
                operation: operation.clone(),
                path: path.clone(),
            },
            Self::UnsafeState {
                reason,
            } => Self::UnsafeState {
                reason: *reason,
            },
            Self::SupervisorError {
                action,
                unit,
                stderr,
            } => Self::SupervisorError {
                action: action.clone(),
                unit: unit.clone(),
                stderr: stderr.clone(),
            },
            Self::PlatformNotSupported {
                reason,
            } => Self::PlatformNotSupported {
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::InvalidUnit {
                unit,
                reason,
            } => Self::InvalidUnit {
                unit: unit.clone(),
                reason: reason.clone(),
            },
            Self::AlreadyInstalled {
                what,
                path,
            } => Self::AlreadyInstalled {
                what: what.clone(),
                path: path.clone(),
            },
            Self::ServiceActive {
                unit,
            } => Self::ServiceActive {
                unit: unit.clone(),
            },
            Self::LockContention {
                path,
            } => Self::LockContention {
                path: path.clone(),
            },
            Self::Interrupted => Self::Interrupted,
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

impl PiriError {
    /// Whether the unattended update path should treat this as a genuine defect
    /// (non-zero exit) rather than a transient condition the next cycle retries.
    #[must_use]
    pub const fn is_defect(&self) -> bool {
        !matches!(
            self,
            Self::NetworkError { .. }
                | Self::UnsafeState { .. }
                | Self::LockContention { .. }
                | Self::Interrupted
        )
    }
}

/// A [`PiriError`] with optional details and a remediation hint for the terminal.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: PiriError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: PiriError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a cause-specific remediation.
///
/// The first [`PiriError`] found anywhere in the chain decides the suggestion;
/// the full chain is kept in the details so wrapping context is not lost.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let chain = error_chain_text(&error);

    if let Some(piri_error) = error.chain().find_map(|e| e.downcast_ref::<PiriError>()) {
        let ctx = create_error_context(piri_error.clone());
        return match chain {
            Some(chain) if ctx.details.is_none() => ctx.with_details(chain),
            Some(chain) => {
                let details = ctx.details.clone().unwrap_or_default();
                ctx.with_details(format!("{details}\n{chain}"))
            }
            None => ctx,
        };
    }

    if let Some(io_error) = error.chain().find_map(|e| e.downcast_ref::<std::io::Error>())
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(PiriError::PermissionDenied {
            operation: error.to_string(),
            path: "unknown".to_string(),
        })
        .with_suggestion("Re-run the command with sudo, or check ownership of the installation root");
    }

    let mut message = error.to_string();
    if let Some(chain) = chain {
        message.push_str("\n\n");
        message.push_str(&chain);
    }

    ErrorContext::new(PiriError::Other {
        message,
    })
}

fn error_chain_text(error: &anyhow::Error) -> Option<String> {
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if chain.is_empty() {
        return None;
    }

    let mut message = String::from("Caused by:");
    for (i, cause) in chain.iter().enumerate() {
        message.push_str(&format!("\n  {}: {}", i + 1, cause));
    }
    Some(message)
}

fn create_error_context(error: PiriError) -> ErrorContext {
    match &error {
        PiriError::NetworkError { reason, .. } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_suggestion("Check network connectivity to the release index and retry; scheduled update cycles retry automatically")
                .with_details(reason)
        }
        PiriError::IntegrityError { .. } => ErrorContext::new(error)
            .with_suggestion("The download was discarded. Retry later; if the mismatch persists, report it to the piri maintainers")
            .with_details("The archive did not match the digest published in the release checksums"),
        PiriError::AssetNotFound { .. } | PiriError::ExecutableNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("This release was not published for your platform. Check the release page or build from source"),
        PiriError::ChecksumNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("The release is missing a checksum for this asset; it will not be installed unverified")
            .with_details("Every archive must be listed in the release checksums file"),
        PiriError::PermissionDenied { path, .. } => {
            let path = path.clone();
            ErrorContext::new(error)
                .with_suggestion("Re-run the command with sudo")
                .with_details(format!("Write access is required to {path}"))
        }
        PiriError::SupervisorError { action, unit, stderr } => {
            let suggestion = format!("Inspect the unit with 'systemctl status {unit}' and 'journalctl -u {unit}'");
            let details = if stderr.trim().is_empty() {
                format!("systemctl {action} {unit} exited unsuccessfully")
            } else {
                stderr.trim().to_string()
            };
            ErrorContext::new(error).with_suggestion(suggestion).with_details(details)
        }
        PiriError::PlatformNotSupported { .. } => ErrorContext::new(error)
            .with_suggestion("Service installation requires Linux with systemd; run the node binary directly elsewhere"),
        PiriError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Fix the node configuration file and retry"),
        PiriError::AlreadyInstalled { .. } => ErrorContext::new(error)
            .with_suggestion("Use --force to overwrite the existing installation, or run 'piri uninstall' first"),
        PiriError::ServiceActive { unit } => {
            let suggestion = format!("Stop the running service first: sudo systemctl stop {unit}");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        PiriError::LockContention { .. } => ErrorContext::new(error)
            .with_suggestion("Wait for the other install, update or uninstall to finish and retry"),
        PiriError::UnsafeState { .. } => ErrorContext::new(error)
            .with_suggestion("Retry after the current proving period has been proven"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_display() {
        let err = PiriError::IntegrityError {
            file: "piri_linux_amd64.tar.gz".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Checksum mismatch for piri_linux_amd64.tar.gz: expected aa, got bb"
        );
    }

    #[test]
    fn test_clone_maps_io_error() {
        let err = PiriError::IoError(std::io::Error::other("disk full"));
        let cloned = err.clone();
        assert!(matches!(cloned, PiriError::Other { .. }));
        assert!(cloned.to_string().contains("disk full"));
    }

    #[test]
    fn test_user_friendly_error_finds_cause_through_context() {
        let err: anyhow::Result<()> = Err(PiriError::ChecksumNotFound {
            filename: "piri_linux_amd64.tar.gz".to_string(),
        }
        .into());
        let err = err.context("Update cycle failed").unwrap_err();

        let ctx = user_friendly_error(err);
        assert!(matches!(ctx.error, PiriError::ChecksumNotFound { .. }));
        assert!(ctx.suggestion.is_some());
        assert!(ctx.details.unwrap().contains("Caused by"));
    }

    #[test]
    fn test_user_friendly_error_generic() {
        let ctx = user_friendly_error(anyhow::anyhow!("something odd"));
        assert!(matches!(ctx.error, PiriError::Other { .. }));
        assert_eq!(ctx.to_string(), "something odd");
    }

    #[test]
    fn test_defect_classification() {
        assert!(
            !PiriError::NetworkError {
                operation: "fetch".into(),
                reason: "timeout".into()
            }
            .is_defect()
        );
        assert!(
            PiriError::IntegrityError {
                file: "a".into(),
                expected: "b".into(),
                actual: "c".into()
            }
            .is_defect()
        );
    }
}
