//! Balance derivation
//!
//! A balance is never stored; it is always computed from the entry log.
//! `raw` is the signed sum of value-bearing entries. `available` is raw
//! minus every outstanding redemption lock, where a lock is outstanding
//! until a release or settle entry appears in its correlation family.

use crate::entry::LedgerEntry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Raw and available balance of one (account, currency) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Signed sum of value-bearing entries; includes locked funds
    pub raw: Decimal,

    /// Raw minus outstanding locks; the figure transfers and new
    /// redemption requests check against
    pub available: Decimal,
}

impl Balance {
    pub const ZERO: Self = Self {
        raw: Decimal::ZERO,
        available: Decimal::ZERO,
    };

    /// Derive the balance from an entry slice.
    ///
    /// The slice must already be restricted to a single (account,
    /// currency) pair; entry order does not matter.
    pub fn of(entries: &[LedgerEntry]) -> Self {
        let mut raw = Decimal::ZERO;
        let mut resolved: HashSet<&str> = HashSet::new();

        for entry in entries {
            if entry.reason.affects_raw_balance() {
                raw += entry.signed_amount();
            }
            if entry.reason.resolves_lock() {
                resolved.insert(entry.correlation_id.as_str());
            }
        }

        let mut locked = Decimal::ZERO;
        for entry in entries {
            if entry.reason.is_lock() && !resolved.contains(entry.correlation_id.as_str()) {
                locked += entry.amount.value();
            }
        }

        Self {
            raw,
            available: raw - locked,
        }
    }

    /// Whether `amount` can be spent from the available figure
    pub fn covers(&self, amount: Decimal) -> bool {
        self.available >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Direction, EntryReason};
    use rust_decimal_macros::dec;
    use slh_core::{AccountId, Amount, Currency};

    fn entry(
        direction: Direction,
        amount: Decimal,
        reason: EntryReason,
        correlation: &str,
    ) -> LedgerEntry {
        LedgerEntry {
            id: 0,
            account_id: AccountId::new(1),
            direction,
            amount: Amount::new(amount).unwrap(),
            currency: Currency::Slha,
            reason,
            correlation_id: correlation.to_string(),
            meta: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_empty_log_is_zero() {
        assert_eq!(Balance::of(&[]), Balance::ZERO);
    }

    #[test]
    fn test_credits_and_debits_sum() {
        let entries = vec![
            entry(Direction::Credit, dec!(100), EntryReason::Deposit, "c1"),
            entry(Direction::Debit, dec!(30), EntryReason::TransferOut, "c2"),
            entry(Direction::Credit, dec!(5), EntryReason::ReferralBonus, "c3"),
        ];
        let balance = Balance::of(&entries);
        assert_eq!(balance.raw, dec!(75));
        assert_eq!(balance.available, dec!(75));
    }

    #[test]
    fn test_pending_lock_reduces_available_only() {
        // Raw 70, then a 50-point redemption is opened.
        let entries = vec![
            entry(Direction::Credit, dec!(100), EntryReason::Deposit, "c1"),
            entry(Direction::Debit, dec!(30), EntryReason::TransferOut, "c2"),
            entry(Direction::Debit, dec!(50), EntryReason::RedemptionLock, "red-1"),
        ];
        let balance = Balance::of(&entries);
        assert_eq!(balance.raw, dec!(70));
        assert_eq!(balance.available, dec!(20));
    }

    #[test]
    fn test_approved_redemption_debits_raw() {
        // Approve resolves the lock and settles the debit: raw drops by
        // the requested amount and available catches up to raw.
        let entries = vec![
            entry(Direction::Credit, dec!(70), EntryReason::Deposit, "c1"),
            entry(Direction::Debit, dec!(50), EntryReason::RedemptionLock, "red-1"),
            entry(Direction::Credit, dec!(50), EntryReason::RedemptionRelease, "red-1"),
            entry(Direction::Debit, dec!(50), EntryReason::RedemptionSettle, "red-1"),
        ];
        let balance = Balance::of(&entries);
        assert_eq!(balance.raw, dec!(20));
        assert_eq!(balance.available, dec!(20));
    }

    #[test]
    fn test_rejected_redemption_restores_available() {
        let entries = vec![
            entry(Direction::Credit, dec!(70), EntryReason::Deposit, "c1"),
            entry(Direction::Debit, dec!(50), EntryReason::RedemptionLock, "red-1"),
            entry(Direction::Credit, dec!(50), EntryReason::RedemptionRelease, "red-1"),
        ];
        let balance = Balance::of(&entries);
        assert_eq!(balance.raw, dec!(70));
        assert_eq!(balance.available, dec!(70));
    }

    #[test]
    fn test_multiple_outstanding_locks_accumulate() {
        let entries = vec![
            entry(Direction::Credit, dec!(100), EntryReason::Deposit, "c1"),
            entry(Direction::Debit, dec!(40), EntryReason::RedemptionLock, "red-1"),
            entry(Direction::Debit, dec!(25), EntryReason::RedemptionLock, "red-2"),
        ];
        let balance = Balance::of(&entries);
        assert_eq!(balance.raw, dec!(100));
        assert_eq!(balance.available, dec!(35));
    }

    #[test]
    fn test_resolution_is_per_correlation_family() {
        // Rejecting red-1 must not release red-2.
        let entries = vec![
            entry(Direction::Credit, dec!(100), EntryReason::Deposit, "c1"),
            entry(Direction::Debit, dec!(40), EntryReason::RedemptionLock, "red-1"),
            entry(Direction::Debit, dec!(25), EntryReason::RedemptionLock, "red-2"),
            entry(Direction::Credit, dec!(40), EntryReason::RedemptionRelease, "red-1"),
        ];
        let balance = Balance::of(&entries);
        assert_eq!(balance.raw, dec!(100));
        assert_eq!(balance.available, dec!(75));
    }

    #[test]
    fn test_covers() {
        let entries = vec![entry(Direction::Credit, dec!(10), EntryReason::Deposit, "c1")];
        let balance = Balance::of(&entries);
        assert!(balance.covers(dec!(10)));
        assert!(!balance.covers(dec!(10.00000001)));
    }
}
