//! Runtime settings, read once at startup.
//!
//! Every knob comes from an `SLH_*` environment variable. A malformed
//! value never aborts startup: it is logged and the default applies, so
//! a typo in one variable cannot take the ledger offline.

use std::env;
use std::path::PathBuf;

use rust_decimal::Decimal;
use slh_core::Amount;
use slh_ledger::AccountKind;

pub const DEFAULT_DATABASE: &str = "slh-ledger.db";

/// How approved redemptions leave the system.
///
/// The mode is resolved to a concrete [`slh_engine::PayoutSink`] exactly
/// once, when the service starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutMode {
    /// No payout channel; approved requests wait for manual settlement.
    Disabled,
    /// Approved requests are appended to a JSONL spool at this path.
    Spool(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database path (`SLH_DATABASE`)
    pub database: PathBuf,
    /// Account kind the investor-facing operations work on
    /// (`SLH_DEFAULT_KIND`)
    pub default_kind: AccountKind,
    /// SLHA minted per qualifying referral (`SLH_REFERRAL_BONUS`)
    pub referral_bonus: Amount,
    /// Annual yield rate as a fraction, e.g. `0.18` (`SLH_ANNUAL_RATE`)
    pub annual_rate: Decimal,
    /// Payout channel (`SLH_PAYOUT_MODE`, `SLH_PAYOUT_SPOOL`)
    pub payout: PayoutMode,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database = PathBuf::from(
            lookup("SLH_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        );

        let default_kind = match lookup("SLH_DEFAULT_KIND") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid SLH_DEFAULT_KIND, using investor");
                AccountKind::Investor
            }),
            None => AccountKind::Investor,
        };

        let referral_bonus =
            Amount::new_unchecked(decimal_var(&lookup, "SLH_REFERRAL_BONUS", Decimal::from(10)));
        let annual_rate = decimal_var(&lookup, "SLH_ANNUAL_RATE", Decimal::new(18, 2));

        let payout = match lookup("SLH_PAYOUT_MODE").map(|m| m.to_lowercase()) {
            None => PayoutMode::Disabled,
            Some(mode) if mode == "disabled" => PayoutMode::Disabled,
            Some(mode) if mode == "spool" => match lookup("SLH_PAYOUT_SPOOL") {
                Some(path) => PayoutMode::Spool(PathBuf::from(path)),
                None => {
                    tracing::warn!(
                        "SLH_PAYOUT_MODE=spool without SLH_PAYOUT_SPOOL, payouts disabled"
                    );
                    PayoutMode::Disabled
                }
            },
            Some(mode) => {
                tracing::warn!(value = %mode, "unknown SLH_PAYOUT_MODE, payouts disabled");
                PayoutMode::Disabled
            }
        };

        Self {
            database,
            default_kind,
            referral_bonus,
            annual_rate,
            payout,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Non-negative decimal setting with a fallback.
fn decimal_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Decimal,
) -> Decimal {
    match lookup(key) {
        Some(raw) => match raw.parse::<Decimal>() {
            Ok(value) if value >= Decimal::ZERO => value,
            _ => {
                tracing::warn!(key, value = %raw, "invalid decimal setting, using default");
                default
            }
        },
        None => default,
    }
}
