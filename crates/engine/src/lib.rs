//! Business workflows over the ledger store.
//!
//! Each engine owns one operation family, validates its inputs, mints the
//! correlation id and delegates the transactional write to
//! [`slh_store::LedgerStore`]. Payout delivery is behind the
//! [`PayoutSink`] trait so a deployment chooses its sink once, at startup.

pub mod accrual;
pub mod payout;
pub mod redemption;
pub mod referral;
pub mod transfer;

pub use accrual::{AccrualReport, YieldEngine};
pub use payout::{DisabledPayout, PayoutError, PayoutSink, SpoolPayout};
pub use redemption::RedemptionWorkflow;
pub use referral::ReferralProgram;
pub use transfer::TransferEngine;
