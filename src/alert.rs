//! Cooperative cancellation for waiting consumers
//!
//! An alert never interrupts a thread. It sets a flag that waiting threads
//! observe at well-defined points: at the start of every wait, on every spin
//! iteration, and after an explicit wake signal for blocking strategies.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{GateError, Result};

/// Cancellation flag owned by a single sequence barrier
///
/// Settable from any thread, checked cooperatively by the waiting thread.
/// Once active it stays active until explicitly deactivated. Activation may
/// be observed with bounded delay, never early.
#[derive(Debug, Default)]
pub struct Alert {
    active: AtomicBool,
}

impl Alert {
    /// Create a new, inactive alert
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the alert. Idempotent.
    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// Lower the alert so waits may proceed again. Idempotent.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Current state of the alert
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Fail with [`GateError::Cancelled`] if the alert is active
    ///
    /// Called at the very start of every wait so cancellation is observed
    /// before any blocking begins.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_active() {
            Err(GateError::Cancelled)
        } else {
            Ok(())
        }
    }
}
