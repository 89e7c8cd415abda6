//! In-flight flag for the single operation an engine may run at a time

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::domain::lending::LoanRequest;
use crate::shared::errors::ArbitrageError;

/// Operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationPhase {
    Idle,
    LoanRequested,
    CallbackReceived,
    Swapped1,
    Swapped2,
    Verified,
    Repaid,
}

#[derive(Debug)]
struct Inner {
    phase: OperationPhase,
    pending: Option<LoanRequest>,
    /// Borrow-asset balance measured before the loan was requested
    opening_balance: Option<u64>,
}

/// Phase and pending loan of an engine, guarded by one lock
#[derive(Debug)]
pub struct OperationState {
    inner: Mutex<Inner>,
}

impl Default for OperationState {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: OperationPhase::Idle,
                pending: None,
                opening_balance: None,
            }),
        }
    }
}

impl OperationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> OperationPhase {
        self.inner.lock().phase
    }

    pub fn pending(&self) -> Option<LoanRequest> {
        self.inner.lock().pending.clone()
    }

    pub fn opening_balance(&self) -> Option<u64> {
        self.inner.lock().opening_balance
    }

    /// Remember the borrow-asset balance held before any loan funds arrive
    pub fn record_opening_balance(&self, balance: u64) {
        self.inner.lock().opening_balance = Some(balance);
    }

    /// Claim the engine for `request`. Fails without side effects if an
    /// operation is already in flight.
    pub fn acquire(&self, request: LoanRequest) -> Result<OperationGuard<'_>, ArbitrageError> {
        let mut inner = self.inner.lock();
        if inner.phase != OperationPhase::Idle {
            return Err(ArbitrageError::ReentrantOperation);
        }
        inner.phase = OperationPhase::LoanRequested;
        inner.pending = Some(request);
        debug!("operation acquired");
        Ok(OperationGuard { state: self })
    }

    /// Move from `from` to `to`, rejecting any other current phase
    pub fn advance(&self, from: OperationPhase, to: OperationPhase) -> Result<(), ArbitrageError> {
        let mut inner = self.inner.lock();
        if inner.phase != from {
            return Err(ArbitrageError::ReentrantOperation);
        }
        inner.phase = to;
        debug!(?from, ?to, "operation phase");
        Ok(())
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        inner.phase = OperationPhase::Idle;
        inner.pending = None;
        inner.opening_balance = None;
    }
}

/// Holds the engine busy; dropping it returns the engine to `Idle`
/// on every exit path.
#[derive(Debug)]
pub struct OperationGuard<'a> {
    state: &'a OperationState,
}

impl OperationGuard<'_> {
    pub fn phase(&self) -> OperationPhase {
        self.state.phase()
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.state.release();
    }
}
