//! Ctrl-C as a signal the orchestrators observe at safe points.
//!
//! Network phases race the interrupt through [`Interrupt::guard`] and are
//! abandoned as soon as it fires. Mutating phases only poll it between steps
//! with [`Interrupt::check`], so a step that has started always finishes and
//! the caller can roll back from a known state.

use std::future::Future;

use tokio::sync::watch;
use tracing::warn;

use crate::core::PiriError;

/// Sending half, fired once when the operation should stop.
#[derive(Debug)]
pub struct InterruptTrigger(watch::Sender<bool>);

impl InterruptTrigger {
    pub fn fire(&self) {
        self.0.send_replace(true);
    }
}

/// Receiving half, cheap to clone into each orchestrator.
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::never()
    }
}

impl Interrupt {
    pub fn channel() -> (InterruptTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (InterruptTrigger(tx), Self {
            rx,
        })
    }

    /// An interrupt that never fires.
    pub fn never() -> Self {
        Self::channel().1
    }

    /// Fire on the first Ctrl-C. Must be called inside a runtime.
    pub fn on_ctrl_c() -> Self {
        let (trigger, interrupt) = Self::channel();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current step");
                trigger.fire();
            }
        });
        interrupt
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Fail with [`PiriError::Interrupted`] if the interrupt has fired.
    pub fn check(&self) -> Result<(), PiriError> {
        if self.is_set() {
            return Err(PiriError::Interrupted);
        }
        Ok(())
    }

    /// Resolve once the interrupt fires; never, if its trigger is gone.
    pub async fn fired(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|set| *set).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Run `fut` unless the interrupt fires first, in which case `fut` is
    /// dropped and [`PiriError::Interrupted`] returned.
    pub async fn guard<T>(&self, fut: impl Future<Output = T>) -> Result<T, PiriError> {
        tokio::select! {
            biased;
            () = self.fired() => Err(PiriError::Interrupted),
            out = fut => Ok(out),
        }
    }
}
