//! CLI commands

use rust_decimal::Decimal;
use slh_core::{Amount, Currency, InvestorId};
use slh_ledger::{RedemptionMode, RedemptionStatus};

use crate::config::Settings;
use crate::selftest;
use crate::service::LedgerService;

/// Show raw and available SLH/SLHA balances for an investor
pub fn balance(service: &LedgerService, investor: i64) -> Result<(), anyhow::Error> {
    let investor = InvestorId::new(investor);
    let slh = service.balance(investor, &Currency::Slh)?;
    let slha = service.balance(investor, &Currency::Slha)?;

    println!("Balance for investor {}:", investor);
    println!(
        "  {:<6} raw {:>18}   available {:>18}",
        "SLH", slh.raw, slh.available
    );
    println!(
        "  {:<6} raw {:>18}   available {:>18}",
        "SLHA", slha.raw, slha.available
    );
    Ok(())
}

/// Show the most recent ledger entries for an investor
pub fn statement(
    service: &LedgerService,
    investor: i64,
    currency: Option<&str>,
    limit: u32,
) -> Result<(), anyhow::Error> {
    let investor = InvestorId::new(investor);
    let currency = currency.map(str::parse::<Currency>).transpose()?;
    let entries = service.statement(investor, currency.as_ref(), limit)?;

    if entries.is_empty() {
        println!("No entries found");
        return Ok(());
    }

    println!("Statement for investor {} ({} entries):", investor, entries.len());
    println!("{:-<80}", "");
    println!(
        "{:>6} | {:>6} | {:>18} | {:>8} | {:<18} | {}",
        "ID", "Dir", "Amount", "Asset", "Reason", "Created"
    );
    println!("{:-<80}", "");
    for entry in &entries {
        println!(
            "{:>6} | {:>6} | {:>18} | {:>8} | {:<18} | {}",
            entry.id,
            entry.direction.as_str(),
            entry.amount,
            entry.currency,
            entry.reason.code(),
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

/// Transfer funds between two investors
pub fn transfer(
    service: &LedgerService,
    sender: i64,
    receiver: i64,
    amount: Decimal,
    currency: &str,
) -> Result<(), anyhow::Error> {
    let amount = Amount::new(amount)?;
    let currency: Currency = currency.parse()?;

    let transfer =
        service.transfer(InvestorId::new(sender), InvestorId::new(receiver), amount, currency)?;

    println!(
        "✅ Transferred {} {} from {} to {} (correlation: {})",
        transfer.amount, transfer.currency, sender, receiver, transfer.correlation_id
    );
    Ok(())
}

/// Open a redemption request, locking the amount
pub fn redeem(
    service: &LedgerService,
    investor: i64,
    amount: Decimal,
    mode: &str,
    payout_address: Option<String>,
    cohort: Option<String>,
) -> Result<(), anyhow::Error> {
    let amount = Amount::new(amount)?;
    let Ok(mode) = mode.parse::<RedemptionMode>() else {
        anyhow::bail!("Unknown redemption mode: {} (expected regular or early)", mode);
    };

    let request =
        service.open_redemption(InvestorId::new(investor), amount, mode, payout_address, cohort)?;

    println!(
        "✅ Redemption {} opened: {} {} locked for investor {} ({})",
        request.id, request.amount, request.currency, investor, request.mode
    );
    Ok(())
}

/// List redemption requests, optionally filtered by status
pub fn redemptions(
    service: &LedgerService,
    status: Option<&str>,
    limit: u32,
) -> Result<(), anyhow::Error> {
    let status = match status {
        Some(raw) => match RedemptionStatus::from_str(raw) {
            Some(status) => Some(status),
            None => anyhow::bail!(
                "Unknown status: {} (expected pending, approved, rejected or settled)",
                raw
            ),
        },
        None => None,
    };

    let requests = service.list_redemptions(status, limit)?;
    if requests.is_empty() {
        println!("No redemption requests found");
        return Ok(());
    }

    println!("Redemption requests ({}):", requests.len());
    println!("{:-<80}", "");
    println!(
        "{:>6} | {:>8} | {:>18} | {:>8} | {:>8} | {}",
        "ID", "Investor", "Amount", "Mode", "Status", "Created"
    );
    println!("{:-<80}", "");
    for request in &requests {
        println!(
            "{:>6} | {:>8} | {:>18} | {:>8} | {:>8} | {}",
            request.id,
            request.investor,
            request.amount,
            request.mode,
            request.status,
            request.created_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

/// Approve a pending redemption and dispatch it to the payout channel
pub fn approve_redemption(service: &LedgerService, request_id: i64) -> Result<(), anyhow::Error> {
    let approved = service.approve_redemption(request_id)?;
    println!(
        "✅ Redemption {} approved: {} {} debited from investor {} (payout: {})",
        approved.id,
        approved.amount,
        approved.currency,
        approved.investor,
        service.payout_sink()
    );
    Ok(())
}

/// Reject a pending redemption, releasing the locked amount
pub fn reject_redemption(
    service: &LedgerService,
    request_id: i64,
    note: Option<&str>,
) -> Result<(), anyhow::Error> {
    let rejected = service.reject_redemption(request_id, note)?;
    println!(
        "✅ Redemption {} rejected: {} {} released to investor {}",
        rejected.id, rejected.amount, rejected.currency, rejected.investor
    );
    Ok(())
}

/// Mark an approved redemption as settled after external delivery
pub fn settle_redemption(service: &LedgerService, request_id: i64) -> Result<(), anyhow::Error> {
    let settled = service.settle_redemption(request_id)?;
    println!("✅ Redemption {} settled for investor {}", settled.id, settled.investor);
    Ok(())
}

/// Credit one referral bonus to a referrer
pub fn referral(
    service: &LedgerService,
    referrer: i64,
    referee: Option<i64>,
) -> Result<(), anyhow::Error> {
    let counter =
        service.credit_referral(InvestorId::new(referrer), referee.map(InvestorId::new))?;
    println!(
        "✅ Referral bonus {} SLHA credited to investor {} (referrals: {}, total: {})",
        service.referral_bonus(),
        referrer,
        counter.referral_count,
        counter.total_bonus
    );
    Ok(())
}

/// Manually credit an investor, creating the account if needed
pub fn credit(
    service: &LedgerService,
    investor: i64,
    amount: Decimal,
    currency: &str,
    note: Option<&str>,
) -> Result<(), anyhow::Error> {
    let amount = Amount::new(amount)?;
    let currency: Currency = currency.parse()?;

    let entry = service.admin_credit(InvestorId::new(investor), amount, currency, note)?;
    println!(
        "✅ Credited {} {} to investor {} (entry: {})",
        entry.amount, entry.currency, investor, entry.id
    );
    Ok(())
}

/// Manually debit an investor's available balance
pub fn debit(
    service: &LedgerService,
    investor: i64,
    amount: Decimal,
    currency: &str,
    note: Option<&str>,
) -> Result<(), anyhow::Error> {
    let amount = Amount::new(amount)?;
    let currency: Currency = currency.parse()?;

    let entry = service.admin_debit(InvestorId::new(investor), amount, currency, note)?;
    println!(
        "✅ Debited {} {} from investor {} (entry: {})",
        entry.amount, entry.currency, investor, entry.id
    );
    Ok(())
}

/// Run the monthly yield accrual for one period
pub fn accrue(service: &LedgerService, period: &str) -> Result<(), anyhow::Error> {
    let report = service.run_accrual(period)?;
    println!(
        "✅ Accrual {}: {} accounts processed, {} credited, {} skipped, {} SLHA total",
        report.period, report.processed, report.credited, report.skipped, report.total
    );
    Ok(())
}

/// Run the operational self-test and print each check
pub fn selftest(
    service: &LedgerService,
    settings: &Settings,
    quick: bool,
) -> Result<(), anyhow::Error> {
    let report = selftest::run(service, settings, quick);

    println!("Self-test ({}):", if quick { "quick" } else { "deep" });
    println!("{:-<80}", "");
    for check in &report.checks {
        let mark = if check.ok { "✅" } else { "❌" };
        println!("{} {:<22} {}", mark, check.name, check.detail);
    }
    println!("{:-<80}", "");
    println!("Status: {}", report.status());

    if !report.healthy() {
        anyhow::bail!("Self-test degraded");
    }
    Ok(())
}
