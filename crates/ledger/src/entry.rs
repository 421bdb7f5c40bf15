//! Ledger entries - the immutable unit of balance change
//!
//! An entry is never updated or deleted once written; corrections are
//! made by appending a reversing entry in the same correlation family.
//! Raw balances are the signed sum of entries, with the redemption
//! lock/release pair excluded: those two reasons move availability, not
//! value (see [`crate::balance`]).

use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use slh_core::{AccountId, Amount, Currency};
use std::fmt;
use std::str::FromStr;

/// Which side of the account an entry moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Increases the balance
    Credit,
    /// Decreases the balance
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(Direction::Credit),
            "debit" => Some(Direction::Debit),
            _ => None,
        }
    }

    /// +1 for credits, -1 for debits
    pub fn sign(&self) -> Decimal {
        match self {
            Direction::Credit => Decimal::ONE,
            Direction::Debit => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Business reason of an entry.
///
/// The reason decides how the entry participates in balance derivation:
/// `redemption_lock` and `redemption_release` are availability markers
/// with zero raw-balance effect, everything else counts at face value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntryReason {
    /// Funds deposited into the platform
    Deposit,
    /// Monthly yield credited by the accrual run
    MonthlyReward,
    /// Receiving leg of an internal transfer
    TransferIn,
    /// Sending leg of an internal transfer
    TransferOut,
    /// Amount reserved by an open redemption request
    RedemptionLock,
    /// Lock removed after an admin decision
    RedemptionRelease,
    /// Raw-balance debit of an approved redemption
    RedemptionSettle,
    /// Minted referral bonus
    ReferralBonus,
    /// Manual admin credit
    ManualCredit,
    /// Manual admin debit
    ManualDebit,
    /// Free-form reason supplied by an admin correction
    Other(String),
}

impl EntryReason {
    /// Returns the reason code as a string slice
    pub fn code(&self) -> &str {
        match self {
            EntryReason::Deposit => "deposit",
            EntryReason::MonthlyReward => "monthly_reward",
            EntryReason::TransferIn => "transfer_in",
            EntryReason::TransferOut => "transfer_out",
            EntryReason::RedemptionLock => "redemption_lock",
            EntryReason::RedemptionRelease => "redemption_release",
            EntryReason::RedemptionSettle => "redemption_settle",
            EntryReason::ReferralBonus => "referral_bonus",
            EntryReason::ManualCredit => "manual_credit",
            EntryReason::ManualDebit => "manual_debit",
            EntryReason::Other(s) => s.as_str(),
        }
    }

    /// Whether this entry counts toward the raw balance.
    ///
    /// Lock and release are availability bookkeeping only; the value
    /// itself leaves the account through `redemption_settle`.
    pub fn affects_raw_balance(&self) -> bool {
        !matches!(
            self,
            EntryReason::RedemptionLock | EntryReason::RedemptionRelease
        )
    }

    /// Whether this entry reserves availability
    pub fn is_lock(&self) -> bool {
        matches!(self, EntryReason::RedemptionLock)
    }

    /// Whether this entry resolves an outstanding lock in its
    /// correlation family
    pub fn resolves_lock(&self) -> bool {
        matches!(
            self,
            EntryReason::RedemptionRelease | EntryReason::RedemptionSettle
        )
    }
}

impl fmt::Display for EntryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for EntryReason {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        if s.is_empty() {
            return Err(LedgerError::EmptyReason);
        }

        Ok(match s.as_str() {
            "deposit" => EntryReason::Deposit,
            "monthly_reward" => EntryReason::MonthlyReward,
            "transfer_in" => EntryReason::TransferIn,
            "transfer_out" => EntryReason::TransferOut,
            "redemption_lock" => EntryReason::RedemptionLock,
            "redemption_release" => EntryReason::RedemptionRelease,
            "redemption_settle" => EntryReason::RedemptionSettle,
            "referral_bonus" => EntryReason::ReferralBonus,
            "manual_credit" => EntryReason::ManualCredit,
            "manual_debit" => EntryReason::ManualDebit,
            _ => EntryReason::Other(s),
        })
    }
}

impl TryFrom<String> for EntryReason {
    type Error = LedgerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntryReason> for String {
    fn from(r: EntryReason) -> Self {
        r.code().to_string()
    }
}

/// A committed, immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Store-allocated id; also the reverse-chronological sort key
    pub id: i64,

    /// Account the entry is booked against
    pub account_id: AccountId,

    /// Credit or debit
    pub direction: Direction,

    /// Non-negative magnitude
    pub amount: Amount,

    /// Currency tag; balances never mix tags
    pub currency: Currency,

    /// Business reason code
    pub reason: EntryReason,

    /// Links the entries of one atomic business event
    pub correlation_id: String,

    /// Optional structured metadata (canonical JSON in storage)
    pub meta: Option<serde_json::Value>,

    /// When the entry was committed
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed view of the amount: positive = credit, negative = debit
    pub fn signed_amount(&self) -> Decimal {
        self.direction.sign() * self.amount.value()
    }
}

/// Input form of an entry, prior to commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub account_id: AccountId,
    pub direction: Direction,
    pub amount: Amount,
    pub currency: Currency,
    pub reason: EntryReason,
    pub correlation_id: String,
    pub meta: Option<serde_json::Value>,
}

impl NewEntry {
    pub fn new(
        account_id: AccountId,
        direction: Direction,
        amount: Amount,
        currency: Currency,
        reason: EntryReason,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            direction,
            amount,
            currency,
            reason,
            correlation_id: correlation_id.into(),
            meta: None,
        }
    }

    /// Attach structured metadata
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Validate the entry before it is written.
    ///
    /// The `Amount` type already bars negatives, so the only malformed
    /// magnitude left is zero; a zero entry would be pure noise in the
    /// log and is rejected.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        if self.correlation_id.trim().is_empty() {
            return Err(LedgerError::EmptyCorrelationId);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(direction: Direction, amount: Decimal) -> NewEntry {
        NewEntry::new(
            AccountId::new(1),
            direction,
            Amount::new(amount).unwrap(),
            Currency::Slha,
            EntryReason::Deposit,
            "corr-1",
        )
    }

    #[test]
    fn test_reason_codes_roundtrip() {
        let reasons = [
            EntryReason::Deposit,
            EntryReason::MonthlyReward,
            EntryReason::TransferIn,
            EntryReason::TransferOut,
            EntryReason::RedemptionLock,
            EntryReason::RedemptionRelease,
            EntryReason::RedemptionSettle,
            EntryReason::ReferralBonus,
            EntryReason::ManualCredit,
            EntryReason::ManualDebit,
        ];

        for reason in reasons {
            let parsed: EntryReason = reason.code().parse().unwrap();
            assert_eq!(parsed, reason);
        }
    }

    #[test]
    fn test_reason_other_catch_all() {
        let parsed: EntryReason = "Promo_Credit".parse().unwrap();
        assert_eq!(parsed, EntryReason::Other("promo_credit".to_string()));
    }

    #[test]
    fn test_empty_reason_rejected() {
        let result: Result<EntryReason, _> = "  ".parse();
        assert!(matches!(result, Err(LedgerError::EmptyReason)));
    }

    #[test]
    fn test_raw_balance_participation() {
        assert!(EntryReason::Deposit.affects_raw_balance());
        assert!(EntryReason::RedemptionSettle.affects_raw_balance());
        assert!(!EntryReason::RedemptionLock.affects_raw_balance());
        assert!(!EntryReason::RedemptionRelease.affects_raw_balance());
    }

    #[test]
    fn test_lock_resolution_markers() {
        assert!(EntryReason::RedemptionRelease.resolves_lock());
        assert!(EntryReason::RedemptionSettle.resolves_lock());
        assert!(!EntryReason::RedemptionLock.resolves_lock());
        assert!(!EntryReason::TransferOut.resolves_lock());
    }

    #[test]
    fn test_signed_amount() {
        assert_eq!(Direction::Credit.sign() * dec!(5), dec!(5));
        assert_eq!(Direction::Debit.sign() * dec!(5), dec!(-5));
    }

    #[test]
    fn test_validate_rejects_zero_amount() {
        let e = entry(Direction::Credit, dec!(0));
        assert!(matches!(e.validate(), Err(LedgerError::ZeroAmount)));
    }

    #[test]
    fn test_validate_rejects_empty_correlation() {
        let mut e = entry(Direction::Credit, dec!(10));
        e.correlation_id = "   ".to_string();
        assert!(matches!(e.validate(), Err(LedgerError::EmptyCorrelationId)));
    }

    #[test]
    fn test_validate_accepts_positive() {
        let e = entry(Direction::Debit, dec!(10));
        assert!(e.validate().is_ok());
    }
}
