//! Referral bonus program.

use std::sync::Arc;

use serde_json::json;
use slh_core::{Amount, Currency, InvestorId};
use slh_ledger::{AccountKind, LedgerError, ReferralCounter};
use slh_store::{LedgerStore, StoreError};
use uuid::Uuid;

/// Mints the configured SLHA bonus for each qualifying referral and keeps
/// the per-investor counter in step with the bonus entries.
pub struct ReferralProgram {
    store: Arc<LedgerStore>,
    kind: AccountKind,
    bonus: Amount,
}

impl ReferralProgram {
    pub fn new(store: Arc<LedgerStore>, kind: AccountKind, bonus: Amount) -> Self {
        Self { store, kind, bonus }
    }

    pub fn bonus(&self) -> Amount {
        self.bonus
    }

    /// Credits the referrer for one qualifying referral. The referred
    /// investor, when known, is recorded on the bonus entry's meta.
    pub fn credit(
        &self,
        referrer: InvestorId,
        referee: Option<InvestorId>,
    ) -> Result<ReferralCounter, StoreError> {
        if self.bonus.is_zero() {
            return Err(LedgerError::ZeroAmount.into());
        }

        let correlation_id = Uuid::new_v4().to_string();
        let meta = referee.map(|r| json!({ "referee": r.value() }));
        let counter = self.store.credit_referral(
            referrer,
            self.kind,
            self.bonus,
            Currency::Slha,
            &correlation_id,
            meta,
        )?;
        tracing::info!(
            %referrer,
            referral_count = counter.referral_count,
            total_bonus = %counter.total_bonus,
            "referral bonus credited"
        );
        Ok(counter)
    }

    pub fn counter(&self, investor: InvestorId) -> Result<ReferralCounter, StoreError> {
        self.store.referral_counter(investor)
    }
}
