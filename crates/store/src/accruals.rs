//! Monthly yield entries and their idempotence marker.
//!
//! An accrual entry carries `{"accrual_month": "YYYY-MM"}` in its meta.
//! The marker is checked inside the transaction that writes the credit,
//! so replaying a month is a no-op rather than a double payment.

use rusqlite::{params, Connection, TransactionBehavior};
use rust_decimal::Decimal;
use serde_json::json;
use slh_core::{AccountId, Amount, Currency};
use slh_ledger::{Direction, EntryReason, LedgerEntry, NewEntry};

use crate::db::LedgerStore;
use crate::entries::insert_entry;
use crate::error::StoreError;

impl LedgerStore {
    /// Writes the yield credit for one account and period, unless that
    /// period was already credited. Returns `None` on the replay path.
    pub fn credit_accrual(
        &self,
        account: AccountId,
        currency: Currency,
        amount: Amount,
        period: &str,
        annual_rate: Decimal,
        correlation_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if accrual_exists(&tx, account, &currency, period)? {
            return Ok(None);
        }

        let entry = insert_entry(
            &tx,
            &NewEntry::new(
                account,
                Direction::Credit,
                amount,
                currency,
                EntryReason::MonthlyReward,
                correlation_id,
            )
            .with_meta(json!({ "accrual_month": period, "annual_rate": annual_rate })),
        )?;
        tx.commit()?;
        Ok(Some(entry))
    }

    /// Whether the account was already credited for the period.
    pub fn has_accrual(
        &self,
        account: AccountId,
        currency: &Currency,
        period: &str,
    ) -> Result<bool, StoreError> {
        let conn = self.lock();
        accrual_exists(&conn, account, currency, period)
    }
}

fn accrual_exists(
    conn: &Connection,
    account: AccountId,
    currency: &Currency,
    period: &str,
) -> Result<bool, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT meta FROM ledger_entries
         WHERE account_id = ?1 AND currency = ?2 AND reason = ?3 AND meta IS NOT NULL",
    )?;
    let metas = stmt
        .query_map(
            params![
                account.value(),
                currency.code(),
                EntryReason::MonthlyReward.code()
            ],
            |row| row.get::<_, String>(0),
        )?
        .collect::<Result<Vec<_>, _>>()?;

    for meta in metas {
        let value: serde_json::Value = serde_json::from_str(&meta)?;
        if value.get("accrual_month").and_then(|v| v.as_str()) == Some(period) {
            return Ok(true);
        }
    }
    Ok(false)
}
