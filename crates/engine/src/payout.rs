//! Payout delivery behind a capability trait.
//!
//! Approving a redemption settles the ledger; delivering the funds is a
//! separate concern owned by whichever [`PayoutSink`] the deployment
//! selected at startup. Holding a sink value IS the permission to
//! dispatch; nothing else in the system can reach a payout channel.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use slh_ledger::RedemptionRequest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("payout io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("payout serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A channel that can deliver an approved redemption to the outside world.
pub trait PayoutSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hands one approved request to the channel. The ledger has already
    /// settled when this runs; failures are an operational matter, not a
    /// ledger one.
    fn dispatch(&self, request: &RedemptionRequest) -> Result<(), PayoutError>;
}

/// Sink for deployments without an external signer. Dispatch is a logged
/// no-op and the approved request simply waits for manual settlement.
pub struct DisabledPayout;

impl PayoutSink for DisabledPayout {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn dispatch(&self, request: &RedemptionRequest) -> Result<(), PayoutError> {
        tracing::info!(request_id = request.id, "payout channel disabled, nothing dispatched");
        Ok(())
    }
}

/// Appends each approved request as one JSON line to a spool file that an
/// external signing process consumes.
pub struct SpoolPayout {
    path: PathBuf,
}

impl SpoolPayout {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PayoutSink for SpoolPayout {
    fn name(&self) -> &'static str {
        "spool"
    }

    fn dispatch(&self, request: &RedemptionRequest) -> Result<(), PayoutError> {
        let json = serde_json::to_string(request)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        tracing::info!(
            request_id = request.id,
            path = %self.path.display(),
            "queued payout in spool"
        );
        Ok(())
    }
}
