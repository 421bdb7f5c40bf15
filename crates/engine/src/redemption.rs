//! Redemption request workflow.
//!
//! Opening and deciding requests is ledger work and lives here; handing
//! an approved request to a payout channel is the caller's move, made
//! with whatever [`crate::PayoutSink`] it holds. Keeping dispatch out of
//! this workflow means a sink outage can never wedge the state machine.

use std::sync::Arc;

use slh_core::{Amount, Currency, InvestorId};
use slh_ledger::{
    AccountKind, LedgerError, NewRedemption, RedemptionMode, RedemptionRequest, RedemptionStatus,
};
use slh_store::{LedgerStore, StoreError};
use uuid::Uuid;

pub struct RedemptionWorkflow {
    store: Arc<LedgerStore>,
    kind: AccountKind,
}

impl RedemptionWorkflow {
    pub fn new(store: Arc<LedgerStore>, kind: AccountKind) -> Self {
        Self { store, kind }
    }

    /// Opens a request against the investor's SLHA balance, locking the
    /// amount until an admin decides.
    pub fn open(
        &self,
        investor: InvestorId,
        amount: Amount,
        mode: RedemptionMode,
        payout_address: Option<String>,
        cohort: Option<String>,
    ) -> Result<RedemptionRequest, StoreError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount.into());
        }

        let mut request = NewRedemption::new(
            investor,
            amount,
            Currency::Slha,
            mode,
            Uuid::new_v4().to_string(),
        );
        request.payout_address = payout_address;
        request.cohort = cohort;

        let committed = self.store.open_redemption(self.kind, &request)?;
        tracing::info!(
            request_id = committed.id,
            %investor,
            amount = %committed.amount,
            mode = %committed.mode,
            "redemption request opened"
        );
        Ok(committed)
    }

    /// Approves a pending request. The locked amount leaves the raw
    /// balance; delivery is the caller's next step.
    pub fn approve(&self, request_id: i64) -> Result<RedemptionRequest, StoreError> {
        let approved = self.store.approve_redemption(request_id)?;
        tracing::info!(
            request_id,
            investor = %approved.investor,
            amount = %approved.amount,
            "redemption approved"
        );
        Ok(approved)
    }

    /// Rejects a pending request and releases the lock.
    pub fn reject(
        &self,
        request_id: i64,
        note: Option<&str>,
    ) -> Result<RedemptionRequest, StoreError> {
        let rejected = self.store.reject_redemption(request_id, note)?;
        tracing::info!(request_id, investor = %rejected.investor, "redemption rejected");
        Ok(rejected)
    }

    /// Marks an approved request settled after external delivery.
    pub fn settle(&self, request_id: i64) -> Result<RedemptionRequest, StoreError> {
        let settled = self.store.settle_redemption(request_id)?;
        tracing::info!(request_id, "redemption settled");
        Ok(settled)
    }

    pub fn get(&self, request_id: i64) -> Result<RedemptionRequest, StoreError> {
        self.store.get_redemption(request_id)
    }

    pub fn list(
        &self,
        status: Option<RedemptionStatus>,
        limit: u32,
    ) -> Result<Vec<RedemptionRequest>, StoreError> {
        self.store.list_redemptions(status, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use slh_ledger::{Direction, EntryReason, NewEntry};

    fn workflow_with_funds(amount: Decimal) -> (RedemptionWorkflow, Arc<LedgerStore>) {
        let store = Arc::new(LedgerStore::in_memory().unwrap());
        let account = store
            .get_or_create_account(InvestorId::new(1), AccountKind::Investor)
            .unwrap();
        store
            .append(&NewEntry::new(
                account.id,
                Direction::Credit,
                Amount::new(amount).unwrap(),
                Currency::Slha,
                EntryReason::Deposit,
                "seed",
            ))
            .unwrap();
        (
            RedemptionWorkflow::new(store.clone(), AccountKind::Investor),
            store,
        )
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (workflow, _) = workflow_with_funds(dec!(100));
        let err = workflow
            .open(
                InvestorId::new(1),
                Amount::ZERO,
                RedemptionMode::Regular,
                None,
                None,
            )
            .unwrap_err();
        assert!(matches!(err.as_ledger(), Some(LedgerError::ZeroAmount)));
    }

    #[test]
    fn test_open_then_approve_full_cycle() {
        let (workflow, store) = workflow_with_funds(dec!(70));
        let request = workflow
            .open(
                InvestorId::new(1),
                Amount::new(dec!(50)).unwrap(),
                RedemptionMode::Regular,
                Some("UQabc".to_string()),
                None,
            )
            .unwrap();
        assert_eq!(request.status, RedemptionStatus::Pending);

        let approved = workflow.approve(request.id).unwrap();
        assert_eq!(approved.status, RedemptionStatus::Approved);

        let account = store
            .get_account(InvestorId::new(1), AccountKind::Investor)
            .unwrap();
        let balance = store.balance(account.id, &Currency::Slha).unwrap();
        assert_eq!(balance.raw, dec!(20));
        assert_eq!(balance.available, dec!(20));

        let settled = workflow.settle(request.id).unwrap();
        assert_eq!(settled.status, RedemptionStatus::Settled);
    }

    #[test]
    fn test_concurrent_decisions_single_winner() {
        let (workflow, _) = workflow_with_funds(dec!(100));
        let request = workflow
            .open(
                InvestorId::new(1),
                Amount::new(dec!(60)).unwrap(),
                RedemptionMode::Early,
                None,
                None,
            )
            .unwrap();

        let workflow = Arc::new(workflow);
        let approver = {
            let workflow = Arc::clone(&workflow);
            let id = request.id;
            std::thread::spawn(move || workflow.approve(id))
        };
        let rejecter = {
            let workflow = Arc::clone(&workflow);
            let id = request.id;
            std::thread::spawn(move || workflow.reject(id, Some("late")))
        };

        let outcomes = [
            approver.join().unwrap().is_ok(),
            rejecter.join().unwrap().is_ok(),
        ];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);

        let decided = workflow.get(request.id).unwrap();
        assert!(matches!(
            decided.status,
            RedemptionStatus::Approved | RedemptionStatus::Rejected
        ));
    }

    #[test]
    fn test_list_pending_only() {
        let (workflow, _) = workflow_with_funds(dec!(100));
        let first = workflow
            .open(
                InvestorId::new(1),
                Amount::new(dec!(10)).unwrap(),
                RedemptionMode::Regular,
                None,
                None,
            )
            .unwrap();
        workflow
            .open(
                InvestorId::new(1),
                Amount::new(dec!(10)).unwrap(),
                RedemptionMode::Regular,
                None,
                None,
            )
            .unwrap();
        workflow.reject(first.id, None).unwrap();

        let pending = workflow
            .list(Some(RedemptionStatus::Pending), 20)
            .unwrap();
        assert_eq!(pending.len(), 1);
    }
}
