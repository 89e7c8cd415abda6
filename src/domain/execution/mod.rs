//! Execution domain - operation lifecycle and loan settlement

mod operation_guard;
mod repayment_settler;

pub use operation_guard::{OperationGuard, OperationPhase, OperationState};
pub use repayment_settler::{RepaymentSettler, SettlementReport, VenueSnapshot};
