//! Referral bonuses and the per-investor counter.
//!
//! The bonus entry and the counter row move in the same transaction, so
//! `referral_count * bonus == total_bonus` holds whenever every bonus used
//! the same configured amount. Bonuses are minted credits; no account is
//! debited to fund them.

use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use slh_core::{Amount, Currency, InvestorId};
use slh_ledger::{
    AccountKind, Direction, EntryReason, LedgerError, NewEntry, ReferralCounter,
};

use crate::accounts::ensure_account;
use crate::db::{parse_datetime, parse_decimal, LedgerStore};
use crate::entries::insert_entry;
use crate::error::StoreError;

impl LedgerStore {
    /// Credits one referral bonus and bumps the investor's counter. The
    /// optional meta lands on the bonus entry, typically naming the
    /// referred investor.
    pub fn credit_referral(
        &self,
        investor: InvestorId,
        kind: AccountKind,
        bonus: Amount,
        currency: Currency,
        correlation_id: &str,
        meta: Option<serde_json::Value>,
    ) -> Result<ReferralCounter, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let account = ensure_account(&tx, investor, kind)?;
        let mut entry = NewEntry::new(
            account.id,
            Direction::Credit,
            bonus,
            currency,
            EntryReason::ReferralBonus,
            correlation_id,
        );
        entry.meta = meta;
        insert_entry(&tx, &entry)?;

        let (count, total) = match counter_row(&tx, investor)? {
            Some(counter) => (
                counter.referral_count + 1,
                counter.total_bonus.checked_add(&bonus).ok_or_else(|| {
                    LedgerError::AtomicityViolation(format!(
                        "referral total overflowed for investor {investor}"
                    ))
                })?,
            ),
            None => (1, bonus),
        };
        let updated_at = Utc::now();
        tx.execute(
            "INSERT OR REPLACE INTO referral_counters
             (investor_id, referral_count, total_bonus, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                investor.value(),
                count as i64,
                total.value().to_string(),
                updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(ReferralCounter {
            investor,
            referral_count: count,
            total_bonus: total,
            updated_at,
        })
    }

    /// The investor's counter, or the zero counter if they have never
    /// referred anyone.
    pub fn referral_counter(&self, investor: InvestorId) -> Result<ReferralCounter, StoreError> {
        let conn = self.lock();
        Ok(counter_row(&conn, investor)?.unwrap_or_else(|| ReferralCounter::empty(investor)))
    }
}

fn counter_row(
    conn: &Connection,
    investor: InvestorId,
) -> Result<Option<ReferralCounter>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT referral_count, total_bonus, updated_at FROM referral_counters
         WHERE investor_id = ?1",
    )?;
    let raw = match stmt.query_row(params![investor.value()], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    }) {
        Ok(raw) => raw,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(other) => return Err(other.into()),
    };

    let count = u64::try_from(raw.0).map_err(|_| {
        StoreError::Corrupt(format!("negative referral count for investor {investor}"))
    })?;
    let total = Amount::new(parse_decimal(&raw.1, "referral total_bonus")?).map_err(|_| {
        StoreError::Corrupt(format!("negative referral total for investor {investor}"))
    })?;
    Ok(Some(ReferralCounter {
        investor,
        referral_count: count,
        total_bonus: total,
        updated_at: parse_datetime(&raw.2, "referral updated_at")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bonus() -> Amount {
        Amount::new(dec!(10)).unwrap()
    }

    #[test]
    fn test_first_referral_creates_counter_and_entry() {
        let store = LedgerStore::in_memory().unwrap();
        let investor = InvestorId::new(1);

        let counter = store
            .credit_referral(
                investor,
                AccountKind::Investor,
                bonus(),
                Currency::Slha,
                "ref-1",
                None,
            )
            .unwrap();
        assert_eq!(counter.referral_count, 1);
        assert_eq!(counter.total_bonus.value(), dec!(10));

        let account = store.get_account(investor, AccountKind::Investor).unwrap();
        let balance = store.balance(account.id, &Currency::Slha).unwrap();
        assert_eq!(balance.raw, dec!(10));

        let entries = store.entries_by_correlation("ref-1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, EntryReason::ReferralBonus);
    }

    #[test]
    fn test_referrals_accumulate() {
        let store = LedgerStore::in_memory().unwrap();
        let investor = InvestorId::new(1);
        for i in 1..=3 {
            store
                .credit_referral(
                    investor,
                    AccountKind::Investor,
                    bonus(),
                    Currency::Slha,
                    &format!("ref-{i}"),
                    None,
                )
                .unwrap();
        }

        let counter = store.referral_counter(investor).unwrap();
        assert_eq!(counter.referral_count, 3);
        assert_eq!(counter.total_bonus.value(), dec!(30));

        let account = store.get_account(investor, AccountKind::Investor).unwrap();
        assert_eq!(
            store.balance(account.id, &Currency::Slha).unwrap().raw,
            dec!(30)
        );
    }

    #[test]
    fn test_counter_defaults_to_zero() {
        let store = LedgerStore::in_memory().unwrap();
        let counter = store.referral_counter(InvestorId::new(77)).unwrap();
        assert_eq!(counter.referral_count, 0);
        assert!(counter.total_bonus.is_zero());
    }
}
