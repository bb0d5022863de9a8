//! Test utilities for the lifecycle manager.
//!
//! In-memory stand-ins for the three external seams, so orchestrators can be
//! driven end to end without network, a running node or systemd:
//!
//! - [`FakeFetcher`] - canned HTTP bodies keyed by URL, records requests
//! - [`FakeStatus`] - scripted proving status snapshots
//! - [`RecordingSupervisor`] - records `systemctl` calls, configurable unit state
//!
//! plus archive builders in [`fixtures`].
//!
//! # Example
//!
//! ```rust,no_run
//! use piri_lifecycle::test_utils::{FakeFetcher, FakeStatus, RecordingSupervisor};
//!
//! let fetcher = FakeFetcher::new().with_response("https://example.test/index", b"[]");
//! let status = FakeStatus::safe();
//! let supervisor = RecordingSupervisor::new().with_missing_unit("piri.service");
//! ```

pub mod fixtures;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::PiriError;
use crate::http::Fetch;
use crate::service::{Supervisor, SupervisorOutput, UnitAction};
use crate::upgrade::safety::{NodeProvingStatus, StatusSource};
use crate::utils::interrupt::InterruptTrigger;
use crate::utils::progress::ProgressBar;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays
/// off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Hex SHA-256 of `data`, for building checksum files.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// [`Fetch`] implementation serving canned bodies.
///
/// Unknown URLs fail with an HTTP 404 [`PiriError::NetworkError`]. Clones share
/// the request log.
#[derive(Debug, Clone, Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_response(mut self, url: &str, body: &[u8]) -> Self {
        self.responses.insert(url.to_string(), body.to_vec());
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn requested(&self, url: &str) -> bool {
        self.requests().iter().any(|r| r == url)
    }
}

impl Fetch for FakeFetcher {
    async fn fetch(
        &self,
        url: &str,
        _timeout: Duration,
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<u8>, PiriError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        let body = self.responses.get(url).cloned().ok_or_else(|| PiriError::NetworkError {
            operation: format!("GET {url}"),
            reason: "HTTP 404 Not Found".to_string(),
        })?;
        if let Some(bar) = progress {
            bar.set_length(body.len() as u64);
            bar.inc(body.len() as u64);
        }
        Ok(body)
    }
}

/// Scripted [`StatusSource`].
///
/// Answers are consumed in order; the last one repeats once the script runs
/// out.
#[derive(Debug)]
pub struct FakeStatus {
    script: Mutex<VecDeque<Result<NodeProvingStatus, PiriError>>>,
    last: Mutex<Option<Result<NodeProvingStatus, PiriError>>>,
    calls: AtomicUsize,
}

impl FakeStatus {
    pub fn sequence(script: Vec<Result<NodeProvingStatus, PiriError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always idle and safe.
    pub fn safe() -> Self {
        Self::sequence(vec![Ok(Self::idle())])
    }

    /// Always actively proving.
    pub fn always_proving() -> Self {
        Self::sequence(vec![Ok(Self::proving())])
    }

    /// The node cannot be reached.
    pub fn unavailable() -> Self {
        Self::sequence(vec![Err(PiriError::NetworkError {
            operation: "GET http://localhost:3000/admin/proving/status".to_string(),
            reason: "connection refused".to_string(),
        })])
    }

    pub fn idle() -> NodeProvingStatus {
        NodeProvingStatus {
            is_proving: false,
            in_challenge_window: false,
            has_proven: false,
            upgrade_safe: Some(true),
        }
    }

    pub fn proving() -> NodeProvingStatus {
        NodeProvingStatus {
            is_proving: true,
            in_challenge_window: true,
            has_proven: false,
            upgrade_safe: Some(false),
        }
    }

    pub fn unproven_window() -> NodeProvingStatus {
        NodeProvingStatus {
            is_proving: false,
            in_challenge_window: true,
            has_proven: false,
            upgrade_safe: Some(false),
        }
    }

    /// Number of status queries made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StatusSource for FakeStatus {
    async fn proving_status(&self) -> Result<NodeProvingStatus, PiriError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let mut last = self.last.lock().map_err(|_| PiriError::Other {
            message: "status script poisoned".to_string(),
        })?;
        if let Some(answer) = next {
            *last = Some(answer);
        }
        last.clone().unwrap_or_else(|| {
            Err(PiriError::Other {
                message: "empty status script".to_string(),
            })
        })
    }
}

/// [`Supervisor`] that records calls instead of running `systemctl`.
///
/// Calls are recorded as `"<action> <unit>"` (or just `"<action>"`). By default
/// every unit exists, is inactive, and every action succeeds.
#[derive(Debug, Default)]
pub struct RecordingSupervisor {
    calls: Mutex<Vec<String>>,
    active: HashSet<String>,
    missing: HashSet<String>,
    failures: HashSet<(UnitAction, String)>,
    unavailable: bool,
    interrupt_during: Option<(UnitAction, InterruptTrigger)>,
}

impl RecordingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_active_unit(mut self, unit: &str) -> Self {
        self.active.insert(unit.to_string());
        self
    }

    /// `unit` is not loaded: actions on it exit 5.
    #[must_use]
    pub fn with_missing_unit(mut self, unit: &str) -> Self {
        self.missing.insert(unit.to_string());
        self
    }

    /// `action` on `unit` exits 1 with an error message.
    #[must_use]
    pub fn with_failure(mut self, action: UnitAction, unit: &str) -> Self {
        self.failures.insert((action, unit.to_string()));
        self
    }

    /// Fire `trigger` while an `action` call is in progress, as if
    /// Ctrl-C arrived during it.
    #[must_use]
    pub fn with_interrupt_during(mut self, action: UnitAction, trigger: InterruptTrigger) -> Self {
        self.interrupt_during = Some((action, trigger));
        self
    }

    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Supervisor for RecordingSupervisor {
    async fn run(&self, action: UnitAction, unit: Option<&str>) -> Result<SupervisorOutput, PiriError> {
        let call = match unit {
            Some(unit) => format!("{action} {unit}"),
            None => action.to_string(),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if let Some((interrupt_action, trigger)) = &self.interrupt_during
            && *interrupt_action == action
        {
            trigger.fire();
            tokio::task::yield_now().await;
        }

        let Some(unit) = unit else {
            return Ok(SupervisorOutput::success());
        };

        if self.failures.contains(&(action, unit.to_string())) {
            return Ok(SupervisorOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: format!("Job for {unit} failed."),
            });
        }
        if self.missing.contains(unit) {
            return Ok(SupervisorOutput {
                code: Some(5),
                stdout: String::new(),
                stderr: format!("Unit {unit} not loaded."),
            });
        }
        if action == UnitAction::IsActive && !self.active.contains(unit) {
            return Ok(SupervisorOutput {
                code: Some(3),
                stdout: "inactive\n".to_string(),
                stderr: String::new(),
            });
        }
        Ok(SupervisorOutput::success())
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }
}
