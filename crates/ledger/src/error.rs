//! Ledger error taxonomy
//!
//! Shared by every core operation. Variants group into the caller-facing
//! classes: validation (`ZeroAmount`, `EmptyReason`, `EmptyCorrelationId`,
//! `InvalidPeriod`, `InvalidRate`), business refusals (`InsufficientFunds`,
//! `AccountNotFound`, `RequestNotFound`, `SelfTransfer`), lost races
//! (`InvalidStateTransition`) and the fatal internal class
//! (`AtomicityViolation`), which signals a store bug and must never be
//! silently swallowed.

use crate::account::AccountKind;
use crate::redemption::RedemptionStatus;
use rust_decimal::Decimal;
use slh_core::{AccountId, InvestorId};
use thiserror::Error;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("entry amount must be non-zero")]
    ZeroAmount,

    #[error("entry reason cannot be empty")]
    EmptyReason,

    #[error("correlation_id cannot be empty")]
    EmptyCorrelationId,

    #[error("invalid accrual period (expected YYYY-MM): {0}")]
    InvalidPeriod(String),

    #[error("annual rate must be non-negative, got {0}")]
    InvalidRate(Decimal),

    #[error(
        "insufficient available balance on account {account}: available {available} {currency}, requested {requested}"
    )]
    InsufficientFunds {
        account: AccountId,
        currency: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("no {kind} account for investor {investor}")]
    AccountNotFound {
        investor: InvestorId,
        kind: AccountKind,
    },

    #[error("redemption request not found: {0}")]
    RequestNotFound(i64),

    #[error("cannot transfer from an account to itself (investor {0})")]
    SelfTransfer(InvestorId),

    #[error("invalid state transition for request {request}: expected {expected}, found {found}")]
    InvalidStateTransition {
        request: i64,
        expected: RedemptionStatus,
        found: RedemptionStatus,
    },

    #[error("atomicity violation: {0}")]
    AtomicityViolation(String),
}

impl LedgerError {
    /// Fatal errors indicate an internal consistency bug rather than a
    /// caller mistake; the shell alerts operators instead of rendering a
    /// user message.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::AtomicityViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_atomicity_is_fatal() {
        assert!(LedgerError::AtomicityViolation("lock mismatch".into()).is_fatal());
        assert!(!LedgerError::ZeroAmount.is_fatal());
        assert!(!LedgerError::RequestNotFound(9).is_fatal());
    }

    #[test]
    fn test_messages_render() {
        let err = LedgerError::InsufficientFunds {
            account: AccountId::new(3),
            currency: "SLHA".to_string(),
            available: Decimal::new(20, 0),
            requested: Decimal::new(50, 0),
        };
        let msg = err.to_string();
        assert!(msg.contains("available 20 SLHA"));
        assert!(msg.contains("requested 50"));
    }
}
