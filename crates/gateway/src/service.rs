//! Service facade - wires everything together
//!
//! One [`LedgerService`] owns the store, the engines, and the payout
//! sink picked from [`Settings`] at startup. The CLI and the
//! integration tests both talk to the ledger through this type only.

use std::sync::Arc;

use rust_decimal::Decimal;
use slh_core::{Amount, Currency, InvestorId};
use slh_engine::{
    AccrualReport, DisabledPayout, PayoutSink, RedemptionWorkflow, ReferralProgram, SpoolPayout,
    TransferEngine, YieldEngine,
};
use slh_ledger::{
    AccountKind, Balance, Direction, EntryReason, InternalTransfer, LedgerEntry, LedgerError,
    NewEntry, RedemptionMode, RedemptionRequest, RedemptionStatus, ReferralCounter,
};
use slh_store::{LedgerStore, StoreError};
use uuid::Uuid;

use crate::config::{PayoutMode, Settings};

/// Everything an operator session needs, built once from [`Settings`].
pub struct LedgerService {
    store: Arc<LedgerStore>,
    transfers: TransferEngine,
    redemptions: RedemptionWorkflow,
    referrals: ReferralProgram,
    accruals: YieldEngine,
    payout: Arc<dyn PayoutSink>,
    kind: AccountKind,
    annual_rate: Decimal,
}

impl LedgerService {
    /// Opens (creating if absent) the database named by the settings and
    /// wires the engines around it.
    pub fn open(settings: &Settings) -> Result<Self, anyhow::Error> {
        let store = Arc::new(LedgerStore::new(&settings.database)?);
        Ok(Self::with_store(store, settings))
    }

    /// Wires the engines around an already-open store. Tests use this
    /// with in-memory databases.
    pub fn with_store(store: Arc<LedgerStore>, settings: &Settings) -> Self {
        let payout: Arc<dyn PayoutSink> = match &settings.payout {
            PayoutMode::Disabled => Arc::new(DisabledPayout),
            PayoutMode::Spool(path) => Arc::new(SpoolPayout::new(path)),
        };
        tracing::info!(sink = payout.name(), "payout channel selected");

        let kind = settings.default_kind;
        Self {
            transfers: TransferEngine::new(Arc::clone(&store), kind),
            redemptions: RedemptionWorkflow::new(Arc::clone(&store), kind),
            referrals: ReferralProgram::new(Arc::clone(&store), kind, settings.referral_bonus),
            accruals: YieldEngine::new(Arc::clone(&store), kind),
            payout,
            kind,
            annual_rate: settings.annual_rate,
            store,
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn payout_sink(&self) -> &str {
        self.payout.name()
    }

    /// Balance in one currency. An investor with no account yet simply
    /// holds zero.
    pub fn balance(&self, investor: InvestorId, currency: &Currency) -> Result<Balance, StoreError> {
        match self.store.get_account(investor, self.kind) {
            Ok(account) => self.store.balance(account.id, currency),
            Err(error) if is_missing_account(&error) => Ok(Balance::ZERO),
            Err(error) => Err(error),
        }
    }

    /// Most recent entries first. An unknown investor has an empty
    /// statement, not an error.
    pub fn statement(
        &self,
        investor: InvestorId,
        currency: Option<&Currency>,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        match self.store.get_account(investor, self.kind) {
            Ok(account) => self.store.statement(account.id, currency, limit),
            Err(error) if is_missing_account(&error) => Ok(Vec::new()),
            Err(error) => Err(error),
        }
    }

    pub fn transfer(
        &self,
        sender: InvestorId,
        receiver: InvestorId,
        amount: Amount,
        currency: Currency,
    ) -> Result<InternalTransfer, StoreError> {
        self.transfers.transfer(sender, receiver, amount, currency)
    }

    pub fn open_redemption(
        &self,
        investor: InvestorId,
        amount: Amount,
        mode: RedemptionMode,
        payout_address: Option<String>,
        cohort: Option<String>,
    ) -> Result<RedemptionRequest, StoreError> {
        self.redemptions
            .open(investor, amount, mode, payout_address, cohort)
    }

    /// Approves a pending request, then hands it to the payout sink. A
    /// sink failure is logged and the approval stands; the request can
    /// still be settled once the channel recovers.
    pub fn approve_redemption(&self, request_id: i64) -> Result<RedemptionRequest, StoreError> {
        let approved = self.redemptions.approve(request_id)?;
        if let Err(error) = self.payout.dispatch(&approved) {
            tracing::error!(
                request_id,
                sink = self.payout.name(),
                %error,
                "payout dispatch failed, request stays approved"
            );
        }
        Ok(approved)
    }

    pub fn reject_redemption(
        &self,
        request_id: i64,
        note: Option<&str>,
    ) -> Result<RedemptionRequest, StoreError> {
        self.redemptions.reject(request_id, note)
    }

    pub fn settle_redemption(&self, request_id: i64) -> Result<RedemptionRequest, StoreError> {
        self.redemptions.settle(request_id)
    }

    pub fn get_redemption(&self, request_id: i64) -> Result<RedemptionRequest, StoreError> {
        self.redemptions.get(request_id)
    }

    pub fn list_redemptions(
        &self,
        status: Option<RedemptionStatus>,
        limit: u32,
    ) -> Result<Vec<RedemptionRequest>, StoreError> {
        self.redemptions.list(status, limit)
    }

    pub fn credit_referral(
        &self,
        referrer: InvestorId,
        referee: Option<InvestorId>,
    ) -> Result<ReferralCounter, StoreError> {
        self.referrals.credit(referrer, referee)
    }

    pub fn referral_counter(&self, investor: InvestorId) -> Result<ReferralCounter, StoreError> {
        self.referrals.counter(investor)
    }

    pub fn referral_bonus(&self) -> Amount {
        self.referrals.bonus()
    }

    /// Manual credit. Creates the account when the investor is new, so
    /// seeding a fresh ledger starts here.
    pub fn admin_credit(
        &self,
        investor: InvestorId,
        amount: Amount,
        currency: Currency,
        note: Option<&str>,
    ) -> Result<LedgerEntry, StoreError> {
        let account = self.store.get_or_create_account(investor, self.kind)?;
        let mut entry = NewEntry::new(
            account.id,
            Direction::Credit,
            amount,
            currency,
            EntryReason::ManualCredit,
            Uuid::new_v4().to_string(),
        );
        if let Some(note) = note {
            entry = entry.with_meta(serde_json::json!({ "note": note }));
        }
        let committed = self.store.append(&entry)?;
        tracing::info!(%investor, amount = %committed.amount, "manual credit applied");
        Ok(committed)
    }

    /// Manual debit against the available balance. The account must
    /// already exist.
    pub fn admin_debit(
        &self,
        investor: InvestorId,
        amount: Amount,
        currency: Currency,
        note: Option<&str>,
    ) -> Result<LedgerEntry, StoreError> {
        let account = self.store.get_account(investor, self.kind)?;
        let mut entry = NewEntry::new(
            account.id,
            Direction::Debit,
            amount,
            currency,
            EntryReason::ManualDebit,
            Uuid::new_v4().to_string(),
        );
        if let Some(note) = note {
            entry = entry.with_meta(serde_json::json!({ "note": note }));
        }
        let committed = self.store.append_checked(&entry)?;
        tracing::info!(%investor, amount = %committed.amount, "manual debit applied");
        Ok(committed)
    }

    /// Runs the monthly SLHA yield for `period` at the configured annual
    /// rate.
    pub fn run_accrual(&self, period: &str) -> Result<AccrualReport, StoreError> {
        self.accruals
            .run_monthly(period, self.annual_rate, Currency::Slha)
    }
}

fn is_missing_account(error: &StoreError) -> bool {
    matches!(error.as_ledger(), Some(LedgerError::AccountNotFound { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn service() -> LedgerService {
        let store = Arc::new(LedgerStore::in_memory().unwrap());
        LedgerService::with_store(store, &Settings::default())
    }

    #[test]
    fn test_unknown_investor_has_zero_balance_and_empty_statement() {
        let service = service();
        let ghost = InvestorId::new(404);

        let balance = service.balance(ghost, &Currency::Slha).unwrap();
        assert_eq!(balance, Balance::ZERO);
        assert!(service.statement(ghost, None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_admin_credit_seeds_account() {
        let service = service();
        let investor = InvestorId::new(1);

        service
            .admin_credit(
                investor,
                Amount::new(dec!(100)).unwrap(),
                Currency::Slha,
                Some("seed"),
            )
            .unwrap();

        let balance = service.balance(investor, &Currency::Slha).unwrap();
        assert_eq!(balance.raw, dec!(100));
        assert_eq!(balance.available, dec!(100));
    }

    #[test]
    fn test_admin_debit_requires_existing_account() {
        let service = service();
        let result = service.admin_debit(
            InvestorId::new(404),
            Amount::new(dec!(5)).unwrap(),
            Currency::Slha,
            None,
        );
        assert!(matches!(
            result.unwrap_err().as_ledger(),
            Some(LedgerError::AccountNotFound { .. })
        ));
    }

    #[test]
    fn test_admin_debit_checks_available_funds() {
        let service = service();
        let investor = InvestorId::new(1);
        service
            .admin_credit(investor, Amount::new(dec!(30)).unwrap(), Currency::Slha, None)
            .unwrap();

        let result = service.admin_debit(
            investor,
            Amount::new(dec!(31)).unwrap(),
            Currency::Slha,
            None,
        );
        assert!(matches!(
            result.unwrap_err().as_ledger(),
            Some(LedgerError::InsufficientFunds { .. })
        ));

        service
            .admin_debit(investor, Amount::new(dec!(30)).unwrap(), Currency::Slha, None)
            .unwrap();
    }

    #[test]
    fn test_approval_survives_spool_dispatch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            // A directory is not writable as a file, so dispatch fails.
            payout: PayoutMode::Spool(dir.path().to_path_buf()),
            ..Settings::default()
        };
        let store = Arc::new(LedgerStore::in_memory().unwrap());
        let service = LedgerService::with_store(store, &settings);

        let investor = InvestorId::new(1);
        service
            .admin_credit(investor, Amount::new(dec!(100)).unwrap(), Currency::Slha, None)
            .unwrap();
        let request = service
            .open_redemption(
                investor,
                Amount::new(dec!(40)).unwrap(),
                RedemptionMode::Regular,
                None,
                None,
            )
            .unwrap();

        let approved = service.approve_redemption(request.id).unwrap();
        assert_eq!(approved.status, RedemptionStatus::Approved);
    }
}
