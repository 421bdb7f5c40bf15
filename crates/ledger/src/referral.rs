//! Referral counters
//!
//! One row per referrer. The count and the cumulative bonus move only in
//! lock-step with a `referral_bonus` ledger entry; a counter increment
//! with no matching entry (or vice versa) is a consistency bug.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slh_core::{Amount, InvestorId};

/// Per-investor referral statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralCounter {
    pub investor: InvestorId,

    /// Number of qualifying referrals, monotonically increasing
    pub referral_count: u64,

    /// Total bonus points credited so far
    pub total_bonus: Amount,

    pub updated_at: DateTime<Utc>,
}

impl ReferralCounter {
    /// The counter an investor has before their first referral
    pub fn empty(investor: InvestorId) -> Self {
        Self {
            investor,
            referral_count: 0,
            total_bonus: Amount::ZERO,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_counter() {
        let counter = ReferralCounter::empty(InvestorId::new(5));
        assert_eq!(counter.referral_count, 0);
        assert!(counter.total_bonus.is_zero());
    }
}
