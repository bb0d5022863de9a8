//! Proving-aware safety gate.
//!
//! A storage node must submit a proof inside each challenge window. Replacing
//! or restarting the binary while a proof is being computed, or before the
//! current window's proof has landed, risks a missed deadline. Every
//! self-triggered update and restart is therefore gated on a fresh status
//! snapshot from the running node:
//!
//! ```text
//! upgrade_safe = !is_proving && !(in_challenge_window && !has_proven)
//! ```
//!
//! The gate fails closed: if the status cannot be determined the answer is
//! "not safe".

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::PiriError;
use crate::http::Fetch;

/// Snapshot returned by the node's admin status endpoint. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProvingStatus {
    pub is_proving: bool,
    pub in_challenge_window: bool,
    pub has_proven: bool,
    /// The node's own verdict, if it reports one.
    #[serde(default)]
    pub upgrade_safe: Option<bool>,
}

impl NodeProvingStatus {
    /// Evaluate the snapshot. `ActivelyProving` wins over the window check.
    pub fn verdict(&self) -> SafetyVerdict {
        if self.is_proving {
            return SafetyVerdict::Unsafe(UnsafeReason::ActivelyProving);
        }
        if self.in_challenge_window && !self.has_proven {
            return SafetyVerdict::Unsafe(UnsafeReason::UnprovenChallengeWindow);
        }
        // The node may be stricter than the derivation, never more permissive.
        if self.upgrade_safe == Some(false) {
            return SafetyVerdict::Unsafe(UnsafeReason::NodeReportedUnsafe);
        }
        SafetyVerdict::Safe
    }
}

/// Why the gate refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeReason {
    ActivelyProving,
    UnprovenChallengeWindow,
    /// The derived flags looked fine but the node reported `upgradeSafe: false`.
    NodeReportedUnsafe,
    StatusUnavailable,
}

impl fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ActivelyProving => "node is actively proving",
            Self::UnprovenChallengeWindow => {
                "node is inside a challenge window and has not yet proven"
            }
            Self::NodeReportedUnsafe => "node reports it is not safe to upgrade",
            Self::StatusUnavailable => "node proving status is unavailable",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    Unsafe(UnsafeReason),
}

impl SafetyVerdict {
    pub const fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    /// `Ok(())` when safe, otherwise [`PiriError::UnsafeState`].
    pub fn into_result(self) -> Result<(), PiriError> {
        match self {
            Self::Safe => Ok(()),
            Self::Unsafe(reason) => Err(PiriError::UnsafeState {
                reason,
            }),
        }
    }
}

/// Where proving status comes from.
#[allow(async_fn_in_trait)]
pub trait StatusSource {
    async fn proving_status(&self) -> Result<NodeProvingStatus, PiriError>;
}

/// Queries the node's local admin endpoint over HTTP.
pub struct HttpStatusSource<'a, F: Fetch> {
    fetcher: &'a F,
    url: String,
    timeout: Duration,
}

impl<'a, F: Fetch> HttpStatusSource<'a, F> {
    pub fn new(fetcher: &'a F, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl<F: Fetch> StatusSource for HttpStatusSource<'_, F> {
    async fn proving_status(&self) -> Result<NodeProvingStatus, PiriError> {
        let body = self.fetcher.fetch(&self.url, self.timeout, None).await?;
        serde_json::from_slice(&body).map_err(|e| PiriError::NetworkError {
            operation: format!("parse proving status from {}", self.url),
            reason: e.to_string(),
        })
    }
}

/// Ask `source` whether a disruptive action may run now.
///
/// Errors from the source are folded into
/// [`UnsafeReason::StatusUnavailable`]; this function never fails.
pub async fn is_safe_to_update<S: StatusSource>(source: &S) -> SafetyVerdict {
    match source.proving_status().await {
        Ok(status) => {
            debug!(?status, "Proving status received");
            let verdict = status.verdict();
            match verdict {
                SafetyVerdict::Safe => info!("Node is safe to update"),
                SafetyVerdict::Unsafe(reason) => info!(%reason, "Node is not safe to update"),
            }
            verdict
        }
        Err(e) => {
            warn!(error = %e, "Could not determine proving status, treating node as unsafe");
            SafetyVerdict::Unsafe(UnsafeReason::StatusUnavailable)
        }
    }
}
