use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use slh_core::Currency;
use slh_ledger::{AccountKind, Direction, EntryReason, RedemptionMode, RedemptionStatus, TransferStatus};

use crate::error::StoreError;

/// Handle over the SQLite database holding accounts, entries, transfers,
/// redemption requests and referral counters.
///
/// The connection sits behind a mutex. Writers take the lock for the whole
/// validate-then-write transaction, which serializes every mutation against
/// the rows it just read.
pub struct LedgerStore {
    conn: Mutex<Connection>,
}

impl LedgerStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Takes the connection lock. A poisoned lock is recovered: a writer
    /// that panicked mid-transaction left an uncommitted transaction, and
    /// rusqlite rolls that back when the transaction guard drops.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("connection lock poisoned by a panicked writer, recovering");
            poisoned.into_inner()
        })
    }

    /// Round-trips a trivial query, proving the connection is usable.
    pub fn ping(&self) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Names of the user tables present in the database.
    pub fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            investor_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (investor_id, kind)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            direction TEXT NOT NULL,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            reason TEXT NOT NULL,
            correlation_id TEXT NOT NULL,
            meta TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_account_currency
         ON ledger_entries (account_id, currency)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_correlation
         ON ledger_entries (correlation_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS internal_transfers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            correlation_id TEXT NOT NULL UNIQUE,
            from_account INTEGER NOT NULL REFERENCES accounts(id),
            to_account INTEGER NOT NULL REFERENCES accounts(id),
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS redemption_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            investor_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            mode TEXT NOT NULL,
            payout_address TEXT,
            cohort TEXT,
            status TEXT NOT NULL,
            note TEXT,
            correlation_id TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            decided_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_redemptions_status
         ON redemption_requests (status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS referral_counters (
            investor_id INTEGER PRIMARY KEY,
            referral_count INTEGER NOT NULL,
            total_bonus TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub(crate) fn parse_decimal(value: &str, what: &str) -> Result<Decimal, StoreError> {
    value
        .parse::<Decimal>()
        .map_err(|_| StoreError::Corrupt(format!("{what} is not a decimal: {value:?}")))
}

pub(crate) fn parse_datetime(value: &str, what: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt(format!("{what} is not an RFC 3339 timestamp: {value:?}")))
}

pub(crate) fn parse_currency(value: &str) -> Result<Currency, StoreError> {
    value
        .parse::<Currency>()
        .map_err(|_| StoreError::Corrupt(format!("unknown currency code: {value:?}")))
}

pub(crate) fn parse_direction(value: &str) -> Result<Direction, StoreError> {
    Direction::from_str(value)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown entry direction: {value:?}")))
}

pub(crate) fn parse_reason(value: &str) -> Result<EntryReason, StoreError> {
    value
        .parse::<EntryReason>()
        .map_err(|_| StoreError::Corrupt(format!("unknown entry reason: {value:?}")))
}

pub(crate) fn parse_kind(value: &str) -> Result<AccountKind, StoreError> {
    value
        .parse::<AccountKind>()
        .map_err(|_| StoreError::Corrupt(format!("unknown account kind: {value:?}")))
}

pub(crate) fn parse_status(value: &str) -> Result<RedemptionStatus, StoreError> {
    RedemptionStatus::from_str(value)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown redemption status: {value:?}")))
}

pub(crate) fn parse_mode(value: &str) -> Result<RedemptionMode, StoreError> {
    value
        .parse::<RedemptionMode>()
        .map_err(|_| StoreError::Corrupt(format!("unknown redemption mode: {value:?}")))
}

pub(crate) fn parse_transfer_status(value: &str) -> Result<TransferStatus, StoreError> {
    TransferStatus::from_str(value)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown transfer status: {value:?}")))
}
