//! Redemption requests - the lock-then-release state machine
//!
//! `pending -> approved -> settled` and `pending -> rejected`; nothing
//! ever returns to `pending`. While a request is pending its amount is
//! held by a `redemption_lock` entry with no release/settle entry in the
//! same correlation family, which is exactly what makes the amount
//! unavailable without touching the raw balance.

use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slh_core::{AccountId, Amount, Currency, InvestorId};
use std::fmt;
use strum_macros::{Display, EnumString};

/// Status of a redemption request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    /// Awaiting an admin decision; funds locked
    Pending,
    /// Admin approved; funds debited, awaiting external delivery
    Approved,
    /// Admin rejected; lock released
    Rejected,
    /// External delivery confirmed
    Settled,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Pending => "pending",
            RedemptionStatus::Approved => "approved",
            RedemptionStatus::Rejected => "rejected",
            RedemptionStatus::Settled => "settled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RedemptionStatus::Pending),
            "approved" => Some(RedemptionStatus::Approved),
            "rejected" => Some(RedemptionStatus::Rejected),
            "settled" => Some(RedemptionStatus::Settled),
            _ => None,
        }
    }

    /// Whether any further admin decision is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, RedemptionStatus::Rejected | RedemptionStatus::Settled)
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Redemption mode requested by the investor.
///
/// Carried through as a tag for the admin to weigh; no penalty or
/// schedule computation hangs off it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionMode {
    /// At the end of the agreed term
    Regular,
    /// Before the agreed term
    Early,
}

impl RedemptionMode {
    /// Short code for storage
    pub fn code(&self) -> &'static str {
        match self {
            RedemptionMode::Regular => "regular",
            RedemptionMode::Early => "early",
        }
    }
}

/// A redemption request row.
///
/// Never deleted; admin decisions mutate only `status`, `note` and
/// `decided_at`. The correlation id is shared with the lock entry (and
/// later the release/settle entries) so the ledger and the request row
/// can always be cross-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    pub id: i64,

    /// Account whose funds are locked
    pub account_id: AccountId,

    /// Owning investor, denormalized for display and payout dispatch
    pub investor: InvestorId,

    pub amount: Amount,
    pub currency: Currency,
    pub mode: RedemptionMode,

    /// Where the external signer should deliver funds, if known
    pub payout_address: Option<String>,

    /// Investment cohort tag, passed through for the admin
    pub cohort: Option<String>,

    pub status: RedemptionStatus,

    /// Admin note, set on rejection
    pub note: Option<String>,

    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Input form of a redemption request, prior to commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRedemption {
    pub investor: InvestorId,
    pub amount: Amount,
    pub currency: Currency,
    pub mode: RedemptionMode,
    pub payout_address: Option<String>,
    pub cohort: Option<String>,
    pub correlation_id: String,
}

impl NewRedemption {
    pub fn new(
        investor: InvestorId,
        amount: Amount,
        currency: Currency,
        mode: RedemptionMode,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            investor,
            amount,
            currency,
            mode,
            payout_address: None,
            cohort: None,
            correlation_id: correlation_id.into(),
        }
    }

    pub fn with_payout_address(mut self, address: impl Into<String>) -> Self {
        self.payout_address = Some(address.into());
        self
    }

    pub fn with_cohort(mut self, cohort: impl Into<String>) -> Self {
        self.cohort = Some(cohort.into());
        self
    }

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
