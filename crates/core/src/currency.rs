//! Currency - Type-safe currency/asset tags
//!
//! The two platform units (SLH, SLHA) and the deposit assets are
//! pre-defined; anything else falls back to the `Other` variant.
//! Balances are computed per currency tag and never summed across tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing currencies
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("Empty currency code")]
    EmptyCode,

    #[error("Currency code too long (max 10 chars): {0}")]
    TooLong(String),

    #[error("Invalid currency code format: {0}")]
    InvalidFormat(String),
}

/// Currency/asset tags tracked by the ledger.
///
/// # Examples
/// ```
/// use slh_core::Currency;
///
/// let points: Currency = "slha".parse().unwrap();
/// assert_eq!(points, Currency::Slha);
///
/// let token = Currency::Slh;
/// assert_eq!(token.to_string(), "SLH");
///
/// // Custom tag
/// let custom: Currency = "MYTOKEN".parse().unwrap();
/// assert!(matches!(custom, Currency::Other(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    /// SLH token unit
    Slh,
    /// SLHA internal reward points
    Slha,
    /// Toncoin (deposit asset)
    Ton,
    /// Tether USD on the TON network (deposit asset)
    UsdtTon,
    /// Any other asset tag
    Other(String),
}

impl Currency {
    /// Returns the currency code as a string slice
    pub fn code(&self) -> &str {
        match self {
            Currency::Slh => "SLH",
            Currency::Slha => "SLHA",
            Currency::Ton => "TON",
            Currency::UsdtTon => "USDT_TON",
            Currency::Other(s) => s.as_str(),
        }
    }

    /// Returns true for the internal reward-point unit
    pub fn is_points(&self) -> bool {
        matches!(self, Currency::Slha)
    }

    /// Returns true for assets that exist outside the ledger
    /// (deposited or paid out on chain)
    pub fn is_external(&self) -> bool {
        matches!(self, Currency::Slh | Currency::Ton | Currency::UsdtTon)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        if s.is_empty() {
            return Err(CurrencyError::EmptyCode);
        }

        if s.len() > 10 {
            return Err(CurrencyError::TooLong(s));
        }

        // Validate: alphanumeric plus underscore (USDT_TON style tags)
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CurrencyError::InvalidFormat(s));
        }

        Ok(match s.as_str() {
            "SLH" => Currency::Slh,
            "SLHA" => Currency::Slha,
            "TON" => Currency::Ton,
            "USDT_TON" => Currency::UsdtTon,
            _ => Currency::Other(s),
        })
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.code().to_string()
    }
}
