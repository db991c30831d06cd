//! # Attempt State
//!
//! Phase tracking and cancellation for one checkout attempt.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Idle ──► Validating ──► Reserving ──┬──► Committed                    │
//! │    │           │                      ├──► PartiallyCommitted           │
//! │    │           ├──► Rejected          ├──► Rejected (rolled back)       │
//! │    │           │                      └──► Failed                       │
//! │    │           └──► Failed                                              │
//! │    │                                                                    │
//! │    └───────────┴──► Cancelled   (cancel while Idle or Validating)       │
//! │                                                                         │
//! │   cancel() during Reserving  ──► Err(CheckoutInProgress)                │
//! │   cancel() after settling    ──► Err(AlreadySettled)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The phase lives behind a mutex shared by the running attempt and every
//! [`CancelHandle`]. The Validating → Reserving step and cancel() both
//! happen under that lock, so an attempt is either cancelled before any
//! decrement or not at all.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::error::{CheckoutError, CheckoutResult};

/// Where an attempt is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    Idle,
    Validating,
    Reserving,
    Committed,
    PartiallyCommitted,
    Rejected,
    Cancelled,
    /// Ended with an error.
    Failed,
}

impl CheckoutPhase {
    /// True once the attempt can no longer change.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            CheckoutPhase::Committed
                | CheckoutPhase::PartiallyCommitted
                | CheckoutPhase::Rejected
                | CheckoutPhase::Cancelled
                | CheckoutPhase::Failed
        )
    }
}

#[derive(Debug)]
pub(crate) struct AttemptShared {
    phase: Mutex<CheckoutPhase>,
    cancelled: watch::Sender<bool>,
}

impl AttemptShared {
    pub(crate) fn new() -> Arc<Self> {
        let (cancelled, _) = watch::channel(false);
        Arc::new(AttemptShared {
            phase: Mutex::new(CheckoutPhase::Idle),
            cancelled,
        })
    }

    fn lock(&self) -> MutexGuard<'_, CheckoutPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn phase(&self) -> CheckoutPhase {
        *self.lock()
    }

    /// Moves `from` → `to`. Returns false, changing nothing, if the attempt
    /// is no longer in `from` (it was cancelled in the meantime).
    pub(crate) fn advance(&self, from: CheckoutPhase, to: CheckoutPhase) -> bool {
        let mut phase = self.lock();
        if *phase != from {
            return false;
        }
        *phase = to;
        true
    }

    /// Records the final phase, unless the attempt was already cancelled.
    pub(crate) fn settle(&self, to: CheckoutPhase) {
        let mut phase = self.lock();
        if *phase != CheckoutPhase::Cancelled {
            *phase = to;
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancelled.subscribe()
    }
}

/// Cancels a checkout attempt from another task.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    attempt_id: String,
    shared: Arc<AttemptShared>,
}

impl CancelHandle {
    pub(crate) fn new(attempt_id: String, shared: Arc<AttemptShared>) -> Self {
        CancelHandle { attempt_id, shared }
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn phase(&self) -> CheckoutPhase {
        self.shared.phase()
    }

    /// Requests cancellation.
    ///
    /// Succeeds while the attempt is idle or validating; an in-flight
    /// snapshot read is abandoned. Cancelling twice is fine.
    ///
    /// ## Errors
    /// - `CheckoutInProgress` once decrements have started
    /// - `AlreadySettled` once the attempt has finished
    pub fn cancel(&self) -> CheckoutResult<()> {
        let mut phase = self.shared.lock();
        match *phase {
            CheckoutPhase::Idle | CheckoutPhase::Validating => {
                *phase = CheckoutPhase::Cancelled;
                self.shared.cancelled.send_replace(true);
                info!(attempt_id = %self.attempt_id, "Checkout cancelled");
                Ok(())
            }
            CheckoutPhase::Cancelled => Ok(()),
            CheckoutPhase::Reserving => Err(CheckoutError::CheckoutInProgress {
                attempt_id: self.attempt_id.clone(),
            }),
            CheckoutPhase::Committed
            | CheckoutPhase::PartiallyCommitted
            | CheckoutPhase::Rejected
            | CheckoutPhase::Failed => Err(CheckoutError::AlreadySettled {
                attempt_id: self.attempt_id.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> CancelHandle {
        CancelHandle::new("att-1".to_string(), AttemptShared::new())
    }

    #[test]
    fn test_cancel_while_idle_or_validating() {
        let h = handle();
        h.cancel().unwrap();
        assert_eq!(h.phase(), CheckoutPhase::Cancelled);
        h.cancel().unwrap();

        let h = handle();
        assert!(h.shared.advance(CheckoutPhase::Idle, CheckoutPhase::Validating));
        h.cancel().unwrap();
        assert!(*h.shared.subscribe().borrow());
        assert!(!h.shared.advance(CheckoutPhase::Validating, CheckoutPhase::Reserving));
    }

    #[test]
    fn test_cancel_during_reserving_is_refused() {
        let h = handle();
        h.shared.advance(CheckoutPhase::Idle, CheckoutPhase::Validating);
        h.shared.advance(CheckoutPhase::Validating, CheckoutPhase::Reserving);

        assert!(matches!(h.cancel(), Err(CheckoutError::CheckoutInProgress { .. })));
        assert_eq!(h.phase(), CheckoutPhase::Reserving);
    }

    #[test]
    fn test_cancel_after_settling() {
        let h = handle();
        h.shared.settle(CheckoutPhase::Committed);
        assert!(matches!(h.cancel(), Err(CheckoutError::AlreadySettled { .. })));
    }

    #[test]
    fn test_settle_keeps_cancelled() {
        let h = handle();
        h.cancel().unwrap();
        h.shared.settle(CheckoutPhase::Failed);
        assert_eq!(h.phase(), CheckoutPhase::Cancelled);
        assert!(h.phase().is_settled());
    }
}
