//! Collect-and-continue cleanup reporting.
//!
//! Teardown runs every step even when earlier ones fail. Each outcome is
//! recorded in a [`CleanupReport`]; the report is logged and attached to the
//! [`RollbackError`] returned to the caller, whose `source()` stays the error
//! that triggered the teardown.

use std::fmt;

use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub step: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub completed: Vec<String>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one cleanup step.
    pub fn record<T>(&mut self, step: impl Into<String>, result: anyhow::Result<T>) {
        let step = step.into();
        match result {
            Ok(_) => {
                debug!(step = %step, "Cleanup step completed");
                self.completed.push(step);
            }
            Err(e) => {
                warn!(step = %step, error = %format!("{e:#}"), "Cleanup step failed");
                self.failures.push(CleanupFailure {
                    step,
                    error: format!("{e:#}"),
                });
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn a non-clean report into an error listing every failed step.
    pub fn into_result(self, operation: &str) -> anyhow::Result<Self> {
        if self.is_clean() {
            return Ok(self);
        }
        Err(anyhow::anyhow!("{operation} finished with errors:\n{self}"))
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} step(s) completed, {} failed", self.completed.len(), self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.step, failure.error)?;
        }
        Ok(())
    }
}

/// An install failure after teardown ran.
#[derive(Debug)]
pub struct RollbackError {
    pub cause: anyhow::Error,
    pub report: CleanupReport,
}

impl fmt::Display for RollbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Installation failed and was rolled back")?;
        if !self.report.is_clean() {
            write!(f, " with cleanup errors ({})", self.report)?;
        }
        Ok(())
    }
}

impl std::error::Error for RollbackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.cause)
    }
}
