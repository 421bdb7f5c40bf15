//! Redemption requests: open, decide, settle.
//!
//! Opening a request writes the lock entry and the request row in one
//! transaction. Decisions run as a conditional UPDATE on the expected
//! current status, so two admins racing on the same request cannot both
//! win: the loser's UPDATE matches zero rows and the call fails with
//! `InvalidStateTransition` before any entry is written.

use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use rust_decimal::Decimal;
use slh_core::{AccountId, Amount, InvestorId};
use slh_ledger::{
    AccountKind, Direction, EntryReason, LedgerError, NewEntry, NewRedemption, RedemptionRequest,
    RedemptionStatus,
};

use crate::accounts::get_account;
use crate::db::{
    parse_currency, parse_datetime, parse_decimal, parse_mode, parse_reason, parse_status,
    LedgerStore,
};
use crate::entries::{balance_of, insert_entry};
use crate::error::StoreError;

const REQUEST_COLUMNS: &str = "id, account_id, investor_id, amount, currency, mode, \
     payout_address, cohort, status, note, correlation_id, created_at, decided_at";

type RequestRow = (
    i64,
    i64,
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
);

impl LedgerStore {
    /// Opens a redemption request, locking its amount.
    ///
    /// The investor must already hold an account of the given kind with
    /// the amount available; availability is derived inside the same
    /// transaction that writes the lock, so concurrent opens cannot both
    /// reserve the same funds.
    pub fn open_redemption(
        &self,
        kind: AccountKind,
        request: &NewRedemption,
    ) -> Result<RedemptionRequest, StoreError> {
        request.validate()?;
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let account = get_account(&tx, request.investor, kind)?;
        let balance = balance_of(&tx, account.id, &request.currency)?;
        if !balance.covers(request.amount.value()) {
            return Err(LedgerError::InsufficientFunds {
                account: account.id,
                currency: request.currency.code().to_string(),
                available: balance.available,
                requested: request.amount.value(),
            }
            .into());
        }

        insert_entry(
            &tx,
            &NewEntry::new(
                account.id,
                Direction::Debit,
                request.amount,
                request.currency.clone(),
                EntryReason::RedemptionLock,
                &request.correlation_id,
            ),
        )?;

        tx.execute(
            "INSERT INTO redemption_requests
             (account_id, investor_id, amount, currency, mode, payout_address, cohort,
              status, correlation_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                account.id.value(),
                request.investor.value(),
                request.amount.value().to_string(),
                request.currency.code(),
                request.mode.code(),
                request.payout_address,
                request.cohort,
                RedemptionStatus::Pending.as_str(),
                request.correlation_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let committed = get_request(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(committed)
    }

    /// Approves a pending request: the lock is released and the amount
    /// leaves the raw balance through a settle entry, atomically with the
    /// status flip.
    pub fn approve_redemption(&self, request_id: i64) -> Result<RedemptionRequest, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let request = get_request(&tx, request_id)?;
        transition(
            &tx,
            &request,
            RedemptionStatus::Pending,
            RedemptionStatus::Approved,
            None,
        )?;
        verify_outstanding_lock(&tx, &request)?;

        insert_entry(
            &tx,
            &NewEntry::new(
                request.account_id,
                Direction::Credit,
                request.amount,
                request.currency.clone(),
                EntryReason::RedemptionRelease,
                &request.correlation_id,
            ),
        )?;
        insert_entry(
            &tx,
            &NewEntry::new(
                request.account_id,
                Direction::Debit,
                request.amount,
                request.currency.clone(),
                EntryReason::RedemptionSettle,
                &request.correlation_id,
            ),
        )?;

        let updated = get_request(&tx, request_id)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Rejects a pending request: the lock is released and the funds are
    /// available again. No raw-balance entry is written.
    pub fn reject_redemption(
        &self,
        request_id: i64,
        note: Option<&str>,
    ) -> Result<RedemptionRequest, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let request = get_request(&tx, request_id)?;
        transition(
            &tx,
            &request,
            RedemptionStatus::Pending,
            RedemptionStatus::Rejected,
            note,
        )?;
        verify_outstanding_lock(&tx, &request)?;

        insert_entry(
            &tx,
            &NewEntry::new(
                request.account_id,
                Direction::Credit,
                request.amount,
                request.currency.clone(),
                EntryReason::RedemptionRelease,
                &request.correlation_id,
            ),
        )?;

        let updated = get_request(&tx, request_id)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Marks an approved request settled once the external payout is
    /// confirmed. Pure status flip; the balance moved at approval time.
    pub fn settle_redemption(&self, request_id: i64) -> Result<RedemptionRequest, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let request = get_request(&tx, request_id)?;
        transition(
            &tx,
            &request,
            RedemptionStatus::Approved,
            RedemptionStatus::Settled,
            None,
        )?;

        let updated = get_request(&tx, request_id)?;
        tx.commit()?;
        Ok(updated)
    }

    pub fn get_redemption(&self, request_id: i64) -> Result<RedemptionRequest, StoreError> {
        let conn = self.lock();
        get_request(&conn, request_id)
    }

    /// Most recent requests first, optionally narrowed to one status.
    pub fn list_redemptions(
        &self,
        status: Option<RedemptionStatus>,
        limit: u32,
    ) -> Result<Vec<RedemptionRequest>, StoreError> {
        let conn = self.lock();
        let rows = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM redemption_requests
                     WHERE status = ?1 ORDER BY id DESC LIMIT ?2"
                ))?;
                let mapped = stmt.query_map(params![status.as_str(), limit], read_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM redemption_requests
                     ORDER BY id DESC LIMIT ?1"
                ))?;
                let mapped = stmt.query_map(params![limit], read_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
        };
        rows.into_iter().map(decode).collect()
    }
}

/// Conditional status flip. The WHERE clause names the status the caller
/// read inside this transaction; zero affected rows means another decision
/// already landed and the transition must fail.
fn transition(
    conn: &Connection,
    request: &RedemptionRequest,
    from: RedemptionStatus,
    to: RedemptionStatus,
    note: Option<&str>,
) -> Result<(), StoreError> {
    let is_decision = matches!(to, RedemptionStatus::Approved | RedemptionStatus::Rejected);
    let rows = if is_decision {
        conn.execute(
            "UPDATE redemption_requests
             SET status = ?1, note = COALESCE(?2, note), decided_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                to.as_str(),
                note,
                Utc::now().to_rfc3339(),
                request.id,
                from.as_str()
            ],
        )?
    } else {
        conn.execute(
            "UPDATE redemption_requests SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![to.as_str(), request.id, from.as_str()],
        )?
    };
    if rows == 0 {
        return Err(LedgerError::InvalidStateTransition {
            request: request.id,
            expected: from,
            found: request.status,
        }
        .into());
    }
    Ok(())
}

/// Confirms the request's correlation family still holds exactly one
/// unresolved lock for the request amount before a decision writes its
/// resolving entries. Anything else means the ledger and the request row
/// have diverged, which no decision may build on.
fn verify_outstanding_lock(
    conn: &Connection,
    request: &RedemptionRequest,
) -> Result<(), StoreError> {
    let mut stmt = conn
        .prepare("SELECT reason, amount FROM ledger_entries WHERE correlation_id = ?1")?;
    let rows = stmt
        .query_map(params![request.correlation_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut locked = Decimal::ZERO;
    let mut resolved = false;
    for (reason, amount) in rows {
        let reason = parse_reason(&reason)?;
        if reason.is_lock() {
            locked += parse_decimal(&amount, "lock amount")?;
        }
        if reason.resolves_lock() {
            resolved = true;
        }
    }
    if resolved || locked != request.amount.value() {
        return Err(LedgerError::AtomicityViolation(format!(
            "request {} lock accounting diverged: locked {locked}, resolved {resolved}, expected {}",
            request.id, request.amount
        ))
        .into());
    }
    Ok(())
}

pub(crate) fn get_request(
    conn: &Connection,
    request_id: i64,
) -> Result<RedemptionRequest, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS} FROM redemption_requests WHERE id = ?1"
    ))?;
    let raw = stmt
        .query_row(params![request_id], read_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::Ledger(LedgerError::RequestNotFound(request_id))
            }
            other => StoreError::Database(other),
        })?;
    decode(raw)
}

fn read_row(row: &rusqlite::Row) -> rusqlite::Result<RequestRow> {
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
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

fn decode(raw: RequestRow) -> Result<RedemptionRequest, StoreError> {
    let (
        id,
        account_id,
        investor_id,
        amount,
        currency,
        mode,
        payout_address,
        cohort,
        status,
        note,
        correlation_id,
        created_at,
        decided_at,
    ) = raw;
    let amount = Amount::new(parse_decimal(&amount, "redemption amount")?)
        .map_err(|_| StoreError::Corrupt(format!("negative amount in redemption {id}")))?;
    let decided_at = decided_at
        .as_deref()
        .map(|s| parse_datetime(s, "redemption decided_at"))
        .transpose()?;
    Ok(RedemptionRequest {
        id,
        account_id: AccountId::new(account_id),
        investor: InvestorId::new(investor_id),
        amount,
        currency: parse_currency(&currency)?,
        mode: parse_mode(&mode)?,
        payout_address,
        cohort,
        status: parse_status(&status)?,
        note,
        correlation_id,
        created_at: parse_datetime(&created_at, "redemption created_at")?,
        decided_at,
    })
}
