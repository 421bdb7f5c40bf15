use slh_ledger::LedgerError;
use thiserror::Error;

/// Errors surfaced by the persistence layer.
///
/// Domain failures pass through transparently so callers can match on
/// [`LedgerError`] without caring which layer raised it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl StoreError {
    /// The domain error behind this failure, if there is one.
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            StoreError::Ledger(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_passes_through() {
        let err = StoreError::from(LedgerError::RequestNotFound(7));
        assert_eq!(err.to_string(), "redemption request not found: 7");
        assert!(matches!(
            err.as_ledger(),
            Some(LedgerError::RequestNotFound(7))
        ));
    }

    #[test]
    fn test_corrupt_row_message() {
        let err = StoreError::Corrupt("bad amount".into());
        assert_eq!(err.to_string(), "corrupt row: bad amount");
        assert!(err.as_ledger().is_none());
    }
}
