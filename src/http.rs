//! HTTP transport for release metadata, archives and the local status query.
//!
//! Every component that talks HTTP is generic over [`Fetch`], so tests can
//! substitute an in-memory implementation. [`HttpClient`] is the production
//! implementation on top of `reqwest`.
//!
//! Requests are never retried here: a failed fetch surfaces as
//! [`PiriError::NetworkError`] and the next scheduled update cycle is the retry.

use std::time::Duration;

use tracing::{debug, trace};

use crate::constants::PREALLOCATION_LIMIT;
use crate::core::PiriError;
use crate::utils::progress::ProgressBar;

/// Fetch a URL into memory.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    /// GET `url` and return the whole body.
    ///
    /// `timeout` bounds the entire request including the body. When `progress`
    /// is given it receives the expected length (if known) and each chunk.
    async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<u8>, PiriError>;
}

/// `reqwest`-backed [`Fetch`] implementation.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, PiriError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("piri/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PiriError::NetworkError {
                operation: "build HTTP client".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
        })
    }
}

fn network_error(url: &str, err: &reqwest::Error) -> PiriError {
    let reason = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    };
    PiriError::NetworkError {
        operation: format!("GET {url}"),
        reason,
    }
}

impl Fetch for HttpClient {
    async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<u8>, PiriError> {
        debug!("GET {} (timeout {}s)", url, timeout.as_secs());

        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PiriError::NetworkError {
                operation: format!("GET {url}"),
                reason: format!("HTTP {status}"),
            });
        }

        let expected = response.content_length();
        if let (Some(bar), Some(len)) = (progress, expected) {
            bar.set_length(len);
        }

        let mut body = Vec::with_capacity(expected.unwrap_or(0).min(PREALLOCATION_LIMIT) as usize);
        while let Some(chunk) = response.chunk().await.map_err(|e| network_error(url, &e))? {
            trace!("received {} bytes from {}", chunk.len(), url);
            body.extend_from_slice(&chunk);
            if let Some(bar) = progress {
                bar.inc(chunk.len() as u64);
            }
        }

        debug!("GET {} complete: {} bytes", url, body.len());
        Ok(body)
    }
}
