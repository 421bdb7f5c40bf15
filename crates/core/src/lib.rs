//! SLH Core - Domain primitives
//!
//! This crate contains the fundamental types used across the SLH ledger
//! platform:
//! - `Amount`: Non-negative decimal wrapper for money values
//! - `Currency`: Type-safe currency tags (SLH, SLHA, deposit assets)
//! - `InvestorId` / `AccountId`: identity newtypes

pub mod amount;
pub mod currency;
pub mod ids;

pub use amount::Amount;
pub use currency::Currency;
pub use ids::{AccountId, InvestorId};
