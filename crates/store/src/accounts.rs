//! Account rows, keyed by (investor, kind).
//!
//! An account row is pure identity. It carries no balance column, so
//! creating one on demand is harmless and the write paths that credit a
//! counterparty do exactly that.

use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use slh_core::{AccountId, InvestorId};
use slh_ledger::{Account, AccountKind, LedgerError};

use crate::db::{parse_datetime, parse_kind, LedgerStore};
use crate::error::StoreError;

impl LedgerStore {
    /// Fetches the investor's account of the given kind, creating the row
    /// if it does not exist yet.
    pub fn get_or_create_account(
        &self,
        investor: InvestorId,
        kind: AccountKind,
    ) -> Result<Account, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let account = ensure_account(&tx, investor, kind)?;
        tx.commit()?;
        Ok(account)
    }

    /// Fetches an existing account or fails with
    /// [`LedgerError::AccountNotFound`].
    pub fn get_account(
        &self,
        investor: InvestorId,
        kind: AccountKind,
    ) -> Result<Account, StoreError> {
        let conn = self.lock();
        get_account(&conn, investor, kind)
    }

    /// Every account of one kind, in creation order. The accrual run walks
    /// this list.
    pub fn accounts_by_kind(&self, kind: AccountKind) -> Result<Vec<Account>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, investor_id, kind, created_at FROM accounts
             WHERE kind = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![kind.code()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode).collect()
    }
}

/// Idempotent insert-then-read. The UNIQUE(investor_id, kind) constraint
/// makes the INSERT OR IGNORE a no-op when the row already exists.
pub(crate) fn ensure_account(
    conn: &Connection,
    investor: InvestorId,
    kind: AccountKind,
) -> Result<Account, StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO accounts (investor_id, kind, created_at) VALUES (?1, ?2, ?3)",
        params![investor.value(), kind.code(), Utc::now().to_rfc3339()],
    )?;
    get_account(conn, investor, kind)
}

pub(crate) fn get_account(
    conn: &Connection,
    investor: InvestorId,
    kind: AccountKind,
) -> Result<Account, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, investor_id, kind, created_at FROM accounts
         WHERE investor_id = ?1 AND kind = ?2",
    )?;
    let raw = stmt
        .query_row(params![investor.value(), kind.code()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::Ledger(LedgerError::AccountNotFound { investor, kind })
            }
            other => StoreError::Database(other),
        })?;
    decode(raw)
}

fn decode(raw: (i64, i64, String, String)) -> Result<Account, StoreError> {
    Ok(Account {
        id: AccountId::new(raw.0),
        investor: InvestorId::new(raw.1),
        kind: parse_kind(&raw.2)?,
        created_at: parse_datetime(&raw.3, "account created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = LedgerStore::in_memory().unwrap();
        let investor = InvestorId::new(42);

        let first = store
            .get_or_create_account(investor, AccountKind::Investor)
            .unwrap();
        let second = store
            .get_or_create_account(investor, AccountKind::Investor)
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_kinds_are_separate_accounts() {
        let store = LedgerStore::in_memory().unwrap();
        let investor = InvestorId::new(42);

        let investor_acct = store
            .get_or_create_account(investor, AccountKind::Investor)
            .unwrap();
        let base_acct = store
            .get_or_create_account(investor, AccountKind::Base)
            .unwrap();
        assert_ne!(investor_acct.id, base_acct.id);
    }

    #[test]
    fn test_get_account_missing() {
        let store = LedgerStore::in_memory().unwrap();
        let err = store
            .get_account(InvestorId::new(7), AccountKind::Investor)
            .unwrap_err();
        assert!(matches!(
            err.as_ledger(),
            Some(LedgerError::AccountNotFound { .. })
        ));
    }

    #[test]
    fn test_accounts_by_kind() {
        let store = LedgerStore::in_memory().unwrap();
        for id in 1..=3 {
            store
                .get_or_create_account(InvestorId::new(id), AccountKind::Investor)
                .unwrap();
        }
        store
            .get_or_create_account(InvestorId::new(9), AccountKind::Base)
            .unwrap();

        let investors = store.accounts_by_kind(AccountKind::Investor).unwrap();
        assert_eq!(investors.len(), 3);
        assert!(investors.windows(2).all(|w| w[0].id.value() < w[1].id.value()));
    }
}
