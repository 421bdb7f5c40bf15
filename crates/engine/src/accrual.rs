//! Monthly yield accrual.
//!
//! One run walks every account of the configured kind and credits
//! `raw * annual_rate / 12`, quantized to 8 decimal places toward zero.
//! The per-period marker written by the store makes reruns harmless, so
//! an operator can replay a month after a crash without double-paying.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use slh_core::{Amount, Currency};
use slh_ledger::{AccountKind, LedgerError};
use slh_store::{LedgerStore, StoreError};

const MONTHS_PER_YEAR: u32 = 12;
const ACCRUAL_SCALE: u32 = 8;

/// Outcome of one accrual run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualReport {
    pub period: String,
    /// Accounts examined
    pub processed: usize,
    /// Accounts that received a credit in this run
    pub credited: usize,
    /// Accounts with nothing to credit or already credited for the period
    pub skipped: usize,
    /// Sum of the credits written by this run
    pub total: Decimal,
}

pub struct YieldEngine {
    store: Arc<LedgerStore>,
    kind: AccountKind,
}

impl YieldEngine {
    pub fn new(store: Arc<LedgerStore>, kind: AccountKind) -> Self {
        Self { store, kind }
    }

    /// Credits the monthly yield for `period` (format `YYYY-MM`) across
    /// every account of the engine's kind.
    pub fn run_monthly(
        &self,
        period: &str,
        annual_rate: Decimal,
        currency: Currency,
    ) -> Result<AccrualReport, StoreError> {
        validate_period(period)?;
        if annual_rate < Decimal::ZERO {
            return Err(LedgerError::InvalidRate(annual_rate).into());
        }

        let accounts = self.store.accounts_by_kind(self.kind)?;
        let mut report = AccrualReport {
            period: period.to_string(),
            processed: 0,
            credited: 0,
            skipped: 0,
            total: Decimal::ZERO,
        };

        for account in accounts {
            report.processed += 1;
            let balance = self.store.balance(account.id, &currency)?;
            if balance.raw <= Decimal::ZERO {
                report.skipped += 1;
                continue;
            }

            let credit =
                Amount::new_unchecked(balance.raw * annual_rate / Decimal::from(MONTHS_PER_YEAR))
                    .round_down(ACCRUAL_SCALE);
            if credit.is_zero() {
                report.skipped += 1;
                continue;
            }

            let correlation_id = format!("accrual-{period}-{}", account.id);
            match self.store.credit_accrual(
                account.id,
                currency.clone(),
                credit,
                period,
                annual_rate,
                &correlation_id,
            )? {
                Some(entry) => {
                    report.credited += 1;
                    report.total += entry.amount.value();
                }
                None => report.skipped += 1,
            }
        }

        tracing::info!(
            period,
            credited = report.credited,
            skipped = report.skipped,
            total = %report.total,
            "monthly accrual run finished"
        );
        Ok(report)
    }
}

fn validate_period(period: &str) -> Result<(), LedgerError> {
    NaiveDate::parse_from_str(&format!("{period}-01"), "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| LedgerError::InvalidPeriod(period.to_string()))
}
