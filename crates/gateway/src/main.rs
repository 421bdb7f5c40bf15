//! SLH ledger CLI - Main entry point

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use slh_gateway::{commands, LedgerService, Settings};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slh")]
#[command(about = "SLH investor ledger and redemption desk", long_about = None)]
struct Cli {
    /// Database path (overrides SLH_DATABASE)
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show SLH and SLHA balances for an investor
    Balance {
        /// Investor ID
        investor: i64,
    },

    /// Show the most recent ledger entries for an investor
    Statement {
        /// Investor ID
        investor: i64,
        /// Restrict to one currency (SLH, SLHA, ...)
        #[arg(long)]
        currency: Option<String>,
        /// Maximum number of entries to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Transfer funds between two investors
    Transfer {
        /// Sending investor ID
        from: i64,
        /// Receiving investor ID
        to: i64,
        /// Amount to transfer
        amount: Decimal,
        /// Currency code
        #[arg(long, default_value = "SLHA")]
        currency: String,
    },

    /// Open a redemption request (locks the amount)
    Redeem {
        /// Investor ID
        investor: i64,
        /// SLHA amount to redeem
        amount: Decimal,
        /// Redemption mode (regular or early)
        #[arg(long, default_value = "regular")]
        mode: String,
        /// External address for the payout
        #[arg(long)]
        payout_address: Option<String>,
        /// Investment cohort tag
        #[arg(long)]
        cohort: Option<String>,
    },

    /// List redemption requests
    Redemptions {
        /// Filter by status (pending, approved, rejected, settled)
        #[arg(long)]
        status: Option<String>,
        /// Maximum number of requests to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Approve a pending redemption
    ApproveRedeem {
        /// Request ID
        request: i64,
    },

    /// Reject a pending redemption and release the lock
    RejectRedeem {
        /// Request ID
        request: i64,
        /// Reason shown to the investor
        #[arg(long)]
        note: Option<String>,
    },

    /// Mark an approved redemption as settled
    SettleRedeem {
        /// Request ID
        request: i64,
    },

    /// Credit a referral bonus to a referrer
    Referral {
        /// Referring investor ID
        referrer: i64,
        /// Referred investor ID, recorded on the bonus entry
        #[arg(long)]
        referee: Option<i64>,
    },

    /// Manually credit an investor
    Credit {
        /// Investor ID
        investor: i64,
        /// Amount to credit
        amount: Decimal,
        /// Currency code
        #[arg(long, default_value = "SLHA")]
        currency: String,
        /// Audit note stored on the entry
        #[arg(long)]
        note: Option<String>,
    },

    /// Manually debit an investor's available balance
    Debit {
        /// Investor ID
        investor: i64,
        /// Amount to debit
        amount: Decimal,
        /// Currency code
        #[arg(long, default_value = "SLHA")]
        currency: String,
        /// Audit note stored on the entry
        #[arg(long)]
        note: Option<String>,
    },

    /// Run the monthly yield accrual
    Accrue {
        /// Accrual period (YYYY-MM)
        period: String,
    },

    /// Run the operational self-test
    Selftest {
        /// Skip the deeper ledger probes
        #[arg(long)]
        quick: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(database) = cli.database {
        settings.database = database;
    }
    let service = LedgerService::open(&settings)?;

    match cli.command {
        Commands::Balance { investor } => {
            commands::balance(&service, investor)?;
        }

        Commands::Statement {
            investor,
            currency,
            limit,
        } => {
            commands::statement(&service, investor, currency.as_deref(), limit)?;
        }

        Commands::Transfer {
            from,
            to,
            amount,
            currency,
        } => {
            commands::transfer(&service, from, to, amount, &currency)?;
        }

        Commands::Redeem {
            investor,
            amount,
            mode,
            payout_address,
            cohort,
        } => {
            commands::redeem(&service, investor, amount, &mode, payout_address, cohort)?;
        }

        Commands::Redemptions { status, limit } => {
            commands::redemptions(&service, status.as_deref(), limit)?;
        }

        Commands::ApproveRedeem { request } => {
            commands::approve_redemption(&service, request)?;
        }

        Commands::RejectRedeem { request, note } => {
            commands::reject_redemption(&service, request, note.as_deref())?;
        }

        Commands::SettleRedeem { request } => {
            commands::settle_redemption(&service, request)?;
        }

        Commands::Referral { referrer, referee } => {
            commands::referral(&service, referrer, referee)?;
        }

        Commands::Credit {
            investor,
            amount,
            currency,
            note,
        } => {
            commands::credit(&service, investor, amount, &currency, note.as_deref())?;
        }

        Commands::Debit {
            investor,
            amount,
            currency,
            note,
        } => {
            commands::debit(&service, investor, amount, &currency, note.as_deref())?;
        }

        Commands::Accrue { period } => {
            commands::accrue(&service, &period)?;
        }

        Commands::Selftest { quick } => {
            commands::selftest(&service, &settings, quick)?;
        }
    }

    Ok(())
}
