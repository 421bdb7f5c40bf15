//! SLH Ledger - Append-only entry model and balance derivation
//!
//! This is the HEART of the platform. Every balance-affecting event is an
//! immutable `LedgerEntry`; balances are always derived from the entry log,
//! never stored as fields.
//!
//! # Key Types
//! - `LedgerEntry` / `NewEntry`: the immutable record and its input form
//! - `Direction` / `EntryReason`: sign and business reason of an entry
//! - `Balance`: raw + available figures derived from an entry slice
//! - `RedemptionRequest`: the lock-then-release state machine row
//! - `LedgerError`: the error taxonomy shared by every operation

pub mod account;
pub mod balance;
pub mod entry;
pub mod error;
pub mod redemption;
pub mod referral;
pub mod transfer;

pub use account::{Account, AccountKind};
pub use balance::Balance;
pub use entry::{Direction, EntryReason, LedgerEntry, NewEntry};
pub use error::LedgerError;
pub use redemption::{NewRedemption, RedemptionMode, RedemptionRequest, RedemptionStatus};
pub use referral::ReferralCounter;
pub use transfer::{InternalTransfer, TransferStatus};
