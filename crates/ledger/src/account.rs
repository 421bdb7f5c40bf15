//! Ledger accounts
//!
//! An account is the (investor, kind) pair an entry is booked against.
//! There is at most one account per pair; the store enforces this with a
//! uniqueness constraint so concurrent creators converge on one row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slh_core::{AccountId, InvestorId};
use strum_macros::{Display, EnumString};

/// Kind of wallet an investor holds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Plain holding wallet
    Base,
    /// Investment wallet; accrues yield and can open redemptions
    Investor,
}

impl AccountKind {
    /// Short code for storage
    pub fn code(&self) -> &'static str {
        match self {
            AccountKind::Base => "base",
            AccountKind::Investor => "investor",
        }
    }
}

/// A ledger account row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store-allocated identity
    pub id: AccountId,

    /// Owning investor
    pub investor: InvestorId,

    /// Wallet kind
    pub kind: AccountKind,

    /// When the account row was created
    pub created_at: DateTime<Utc>,
}
