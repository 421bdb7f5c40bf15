//! SQLite persistence for the SLH ledger.
//!
//! Every mutating operation in this crate follows the same discipline:
//! take the connection lock, open an IMMEDIATE transaction, validate
//! against the rows visible inside that transaction, write, and commit.
//! Nothing is validated outside the transaction that writes.
//!
//! Balances are never stored. The store returns entry rows and the
//! [`slh_ledger::Balance`] fold derives raw and available figures from
//! them on every read.

pub mod accounts;
pub mod accruals;
pub mod db;
pub mod entries;
pub mod error;
pub mod redemptions;
pub mod referrals;
pub mod transfers;

pub use db::LedgerStore;
pub use error::StoreError;
