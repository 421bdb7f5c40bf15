//! Append and read ledger entries.
//!
//! Entries are written through [`insert_entry`] only, which validates the
//! input and stamps the commit time. There is no update or delete path.

use chrono::Utc;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use slh_core::{AccountId, Amount, Currency};
use slh_ledger::{Balance, Direction, LedgerEntry, LedgerError, NewEntry};

use crate::db::{
    parse_currency, parse_datetime, parse_decimal, parse_direction, parse_reason, LedgerStore,
};
use crate::error::StoreError;

const ENTRY_COLUMNS: &str =
    "id, account_id, direction, amount, currency, reason, correlation_id, meta, created_at";

type EntryRow = (
    i64,
    i64,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
);

impl LedgerStore {
    /// Appends a single entry with no balance precondition.
    ///
    /// Callers that debit against available funds go through
    /// [`LedgerStore::append_checked`] instead.
    pub fn append(&self, entry: &NewEntry) -> Result<LedgerEntry, StoreError> {
        entry.validate()?;
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let committed = insert_entry(&tx, entry)?;
        tx.commit()?;
        Ok(committed)
    }

    /// Appends an entry, first requiring that a debit fits within the
    /// account's available balance as derived inside the same transaction.
    pub fn append_checked(&self, entry: &NewEntry) -> Result<LedgerEntry, StoreError> {
        entry.validate()?;
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if entry.direction == Direction::Debit {
            let balance = balance_of(&tx, entry.account_id, &entry.currency)?;
            if !balance.covers(entry.amount.value()) {
                return Err(LedgerError::InsufficientFunds {
                    account: entry.account_id,
                    currency: entry.currency.code().to_string(),
                    available: balance.available,
                    requested: entry.amount.value(),
                }
                .into());
            }
        }
        let committed = insert_entry(&tx, entry)?;
        tx.commit()?;
        Ok(committed)
    }

    /// Derives the balance of one account in one currency from its entries.
    pub fn balance(&self, account: AccountId, currency: &Currency) -> Result<Balance, StoreError> {
        let conn = self.lock();
        balance_of(&conn, account, currency)
    }

    /// Most recent entries first, optionally narrowed to one currency.
    pub fn statement(
        &self,
        account: AccountId,
        currency: Option<&Currency>,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let conn = self.lock();
        let rows = match currency {
            Some(currency) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM ledger_entries
                     WHERE account_id = ?1 AND currency = ?2
                     ORDER BY id DESC LIMIT ?3"
                ))?;
                let mapped =
                    stmt.query_map(params![account.value(), currency.code(), limit], read_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM ledger_entries
                     WHERE account_id = ?1
                     ORDER BY id DESC LIMIT ?2"
                ))?;
                let mapped = stmt.query_map(params![account.value(), limit], read_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
        };
        rows.into_iter().map(decode).collect()
    }

    /// All entries sharing a correlation id, oldest first.
    pub fn entries_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries
             WHERE correlation_id = ?1
             ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![correlation_id], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode).collect()
    }
}

/// Writes one validated entry inside the caller's transaction and returns
/// the committed form.
pub(crate) fn insert_entry(conn: &Connection, entry: &NewEntry) -> Result<LedgerEntry, StoreError> {
    entry.validate()?;
    let meta_json = entry
        .meta
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO ledger_entries
         (account_id, direction, amount, currency, reason, correlation_id, meta, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.account_id.value(),
            entry.direction.as_str(),
            entry.amount.value().to_string(),
            entry.currency.code(),
            entry.reason.code(),
            entry.correlation_id,
            meta_json,
            created_at.to_rfc3339(),
        ],
    )?;
    Ok(LedgerEntry {
        id: conn.last_insert_rowid(),
        account_id: entry.account_id,
        direction: entry.direction,
        amount: entry.amount,
        currency: entry.currency.clone(),
        reason: entry.reason.clone(),
        correlation_id: entry.correlation_id.clone(),
        meta: entry.meta.clone(),
        created_at,
    })
}

/// Loads the full entry history for one account and currency and folds it
/// into a [`Balance`]. Runs inside whatever transaction `conn` belongs to.
pub(crate) fn balance_of(
    conn: &Connection,
    account: AccountId,
    currency: &Currency,
) -> Result<Balance, StoreError> {
    let entries = account_entries(conn, account, currency)?;
    Ok(Balance::of(&entries))
}

pub(crate) fn account_entries(
    conn: &Connection,
    account: AccountId,
    currency: &Currency,
) -> Result<Vec<LedgerEntry>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM ledger_entries
         WHERE account_id = ?1 AND currency = ?2
         ORDER BY id"
    ))?;
    let rows = stmt
        .query_map(params![account.value(), currency.code()], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(decode).collect()
}

fn read_row(row: &Row) -> rusqlite::Result<EntryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn decode(raw: EntryRow) -> Result<LedgerEntry, StoreError> {
    let (id, account_id, direction, amount, currency, reason, correlation_id, meta, created_at) =
        raw;
    let amount = Amount::new(parse_decimal(&amount, "entry amount")?)
        .map_err(|_| StoreError::Corrupt(format!("negative amount in entry {id}")))?;
    let meta = meta
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    Ok(LedgerEntry {
        id,
        account_id: AccountId::new(account_id),
        direction: parse_direction(&direction)?,
        amount,
        currency: parse_currency(&currency)?,
        reason: parse_reason(&reason)?,
        correlation_id,
        meta,
        created_at: parse_datetime(&created_at, "entry created_at")?,
    })
}
