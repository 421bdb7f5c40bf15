//! Investor-to-investor transfers.

use std::sync::Arc;

use slh_core::{Amount, Currency, InvestorId};
use slh_ledger::{AccountKind, InternalTransfer, LedgerError};
use slh_store::{LedgerStore, StoreError};
use uuid::Uuid;

/// Validates transfer requests and hands them to the store as one atomic
/// paired write.
pub struct TransferEngine {
    store: Arc<LedgerStore>,
    kind: AccountKind,
}

impl TransferEngine {
    pub fn new(store: Arc<LedgerStore>, kind: AccountKind) -> Self {
        Self { store, kind }
    }

    pub fn transfer(
        &self,
        sender: InvestorId,
        receiver: InvestorId,
        amount: Amount,
        currency: Currency,
    ) -> Result<InternalTransfer, StoreError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount.into());
        }
        if sender == receiver {
            return Err(LedgerError::SelfTransfer(sender).into());
        }

        let correlation_id = Uuid::new_v4().to_string();
        let transfer = self.store.execute_transfer(
            sender,
            receiver,
            self.kind,
            amount,
            currency,
            &correlation_id,
        )?;
        tracing::info!(
            %sender,
            %receiver,
            amount = %transfer.amount,
            correlation_id = %transfer.correlation_id,
            "internal transfer completed"
        );
        Ok(transfer)
    }
}
