//! Internal transfers between investor accounts.
//!
//! One transfer is one transaction containing exactly three writes: the
//! sender's debit entry, the receiver's credit entry and the audit row in
//! `internal_transfers`. Either all three commit or none do.

use chrono::Utc;
use rusqlite::{params, TransactionBehavior};
use rust_decimal::Decimal;
use serde_json::json;
use slh_core::{AccountId, Amount, Currency, InvestorId};
use slh_ledger::{
    AccountKind, Direction, EntryReason, InternalTransfer, LedgerError, NewEntry, TransferStatus,
};

use crate::accounts::{ensure_account, get_account};
use crate::db::{
    parse_currency, parse_datetime, parse_decimal, parse_transfer_status, LedgerStore,
};
use crate::entries::{balance_of, insert_entry};
use crate::error::StoreError;

impl LedgerStore {
    /// Moves `amount` from the sender's account to the receiver's account
    /// of the same kind.
    ///
    /// The sender must exist and must have `amount` available inside the
    /// transaction that writes the legs. The receiver's account is created
    /// on the fly; that row rolls back with everything else if the
    /// transfer fails.
    pub fn execute_transfer(
        &self,
        sender: InvestorId,
        receiver: InvestorId,
        kind: AccountKind,
        amount: Amount,
        currency: Currency,
        correlation_id: &str,
    ) -> Result<InternalTransfer, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sender_account = get_account(&tx, sender, kind)?;
        let receiver_account = ensure_account(&tx, receiver, kind)?;

        let balance = balance_of(&tx, sender_account.id, &currency)?;
        if !balance.covers(amount.value()) {
            return Err(LedgerError::InsufficientFunds {
                account: sender_account.id,
                currency: currency.code().to_string(),
                available: balance.available,
                requested: amount.value(),
            }
            .into());
        }

        insert_entry(
            &tx,
            &NewEntry::new(
                sender_account.id,
                Direction::Debit,
                amount,
                currency.clone(),
                EntryReason::TransferOut,
                correlation_id,
            )
            .with_meta(json!({ "to": receiver.value() })),
        )?;
        insert_entry(
            &tx,
            &NewEntry::new(
                receiver_account.id,
                Direction::Credit,
                amount,
                currency.clone(),
                EntryReason::TransferIn,
                correlation_id,
            )
            .with_meta(json!({ "from": sender.value() })),
        )?;

        let created_at = Utc::now();
        tx.execute(
            "INSERT INTO internal_transfers
             (correlation_id, from_account, to_account, amount, currency, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                correlation_id,
                sender_account.id.value(),
                receiver_account.id.value(),
                amount.value().to_string(),
                currency.code(),
                TransferStatus::Completed.as_str(),
                created_at.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();

        // Re-derive the sender's balance from the rows just written. A
        // negative available figure here means the paired legs do not add
        // up; abort rather than commit a broken state.
        let after = balance_of(&tx, sender_account.id, &currency)?;
        if after.available < Decimal::ZERO {
            return Err(LedgerError::AtomicityViolation(format!(
                "transfer {correlation_id} would overdraw account {}",
                sender_account.id
            ))
            .into());
        }

        tx.commit()?;
        Ok(InternalTransfer {
            id,
            correlation_id: correlation_id.to_string(),
            from_account: sender_account.id,
            to_account: receiver_account.id,
            amount,
            currency,
            status: TransferStatus::Completed,
            created_at,
        })
    }

    /// Audit row lookup, mostly for reconciliation.
    pub fn transfer_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Option<InternalTransfer>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, correlation_id, from_account, to_account, amount, currency, status, created_at
             FROM internal_transfers WHERE correlation_id = ?1",
        )?;
        let raw = match stmt.query_row(params![correlation_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        }) {
            Ok(raw) => raw,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(other) => return Err(other.into()),
        };

        let amount = Amount::new(parse_decimal(&raw.4, "transfer amount")?)
            .map_err(|_| StoreError::Corrupt(format!("negative amount in transfer {}", raw.0)))?;
        Ok(Some(InternalTransfer {
            id: raw.0,
            correlation_id: raw.1,
            from_account: AccountId::new(raw.2),
            to_account: AccountId::new(raw.3),
            amount,
            currency: parse_currency(&raw.5)?,
            status: parse_transfer_status(&raw.6)?,
            created_at: parse_datetime(&raw.7, "transfer created_at")?,
        }))
    }
}
