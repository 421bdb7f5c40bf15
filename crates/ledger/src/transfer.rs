//! Internal transfer audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slh_core::{AccountId, Amount, Currency};
use std::fmt;

/// Status of an internal transfer.
///
/// Transfers are synchronous and all-or-nothing, so the only state a
/// persisted row can carry is `completed`; the column exists for audit
/// symmetry with redemption requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Completed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(TransferStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit row written alongside the two legs of a transfer.
///
/// Shares its correlation id with the `transfer_out` and `transfer_in`
/// entries; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalTransfer {
    pub id: i64,
    pub correlation_id: String,
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Amount,
    pub currency: Currency,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}
