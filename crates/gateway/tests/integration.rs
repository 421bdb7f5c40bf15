//! Integration tests for the SLH ledger
//!
//! These tests drive the service facade end to end over a real SQLite
//! file: admin seeding, transfers, the redemption lock cycle, yield
//! accrual, payout spooling and concurrent access.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use rust_decimal_macros::dec;
use slh_core::{Amount, Currency, InvestorId};
use slh_gateway::config::PayoutMode;
use slh_gateway::{selftest, LedgerService, Settings};
use slh_ledger::{LedgerError, RedemptionMode, RedemptionStatus};
use tempfile::TempDir;

fn amount(value: i64) -> Amount {
    Amount::new(value.into()).unwrap()
}

fn settings_at(path: &Path) -> Settings {
    Settings {
        database: path.join("ledger.db"),
        ..Settings::default()
    }
}

fn service_at(path: &Path) -> LedgerService {
    LedgerService::open(&settings_at(path)).unwrap()
}

/// Test: seed → lock → approve → settle, checking both balances at
/// every step
#[test]
fn test_full_redemption_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let service = service_at(temp_dir.path());
    let investor = InvestorId::new(1);

    // 1. Seed 70 SLHA
    service
        .admin_credit(investor, amount(70), Currency::Slha, Some("seed"))
        .unwrap();

    // 2. Open a redemption for 50: raw unchanged, available shrinks
    let request = service
        .open_redemption(investor, amount(50), RedemptionMode::Regular, None, None)
        .unwrap();
    assert_eq!(request.status, RedemptionStatus::Pending);

    let balance = service.balance(investor, &Currency::Slha).unwrap();
    assert_eq!(balance.raw, dec!(70));
    assert_eq!(balance.available, dec!(20));

    // 3. Approve: the locked 50 leaves the raw balance
    let approved = service.approve_redemption(request.id).unwrap();
    assert_eq!(approved.status, RedemptionStatus::Approved);
    assert!(approved.decided_at.is_some());

    let balance = service.balance(investor, &Currency::Slha).unwrap();
    assert_eq!(balance.raw, dec!(20));
    assert_eq!(balance.available, dec!(20));

    // 4. Settle after external delivery: status only, no balance change
    let settled = service.settle_redemption(request.id).unwrap();
    assert_eq!(settled.status, RedemptionStatus::Settled);

    let balance = service.balance(investor, &Currency::Slha).unwrap();
    assert_eq!(balance.raw, dec!(20));
    assert_eq!(balance.available, dec!(20));

    // 5. The statement tells the whole story, newest first
    let statement = service.statement(investor, Some(&Currency::Slha), 10).unwrap();
    let reasons: Vec<&str> = statement.iter().map(|entry| entry.reason.code()).collect();
    assert_eq!(
        reasons,
        [
            "redemption_settle",
            "redemption_release",
            "redemption_lock",
            "manual_credit"
        ]
    );
}

/// Test: rejection releases the lock and restores the full balance
#[test]
fn test_rejection_releases_lock() {
    let temp_dir = TempDir::new().unwrap();
    let service = service_at(temp_dir.path());
    let investor = InvestorId::new(1);

    service
        .admin_credit(investor, amount(70), Currency::Slha, None)
        .unwrap();
    let request = service
        .open_redemption(investor, amount(50), RedemptionMode::Early, None, None)
        .unwrap();

    let rejected = service
        .reject_redemption(request.id, Some("cohort not yet matured"))
        .unwrap();
    assert_eq!(rejected.status, RedemptionStatus::Rejected);
    assert_eq!(rejected.note.as_deref(), Some("cohort not yet matured"));

    let balance = service.balance(investor, &Currency::Slha).unwrap();
    assert_eq!(balance.raw, dec!(70));
    assert_eq!(balance.available, dec!(70));

    // Nothing left in the pending queue
    assert!(service
        .list_redemptions(Some(RedemptionStatus::Pending), 10)
        .unwrap()
        .is_empty());
}

/// Test: transfer moves funds and both legs share one correlation id
#[test]
fn test_transfer_between_investors() {
    let temp_dir = TempDir::new().unwrap();
    let service = service_at(temp_dir.path());
    let alice = InvestorId::new(1);
    let bob = InvestorId::new(2);

    service
        .admin_credit(alice, amount(100), Currency::Slha, None)
        .unwrap();
    let transfer = service
        .transfer(alice, bob, amount(40), Currency::Slha)
        .unwrap();

    assert_eq!(service.balance(alice, &Currency::Slha).unwrap().raw, dec!(60));
    assert_eq!(service.balance(bob, &Currency::Slha).unwrap().raw, dec!(40));

    // Both statements carry the shared correlation id
    let alice_entry = &service.statement(alice, Some(&Currency::Slha), 1).unwrap()[0];
    let bob_entry = &service.statement(bob, Some(&Currency::Slha), 1).unwrap()[0];
    assert_eq!(alice_entry.correlation_id, transfer.correlation_id);
    assert_eq!(bob_entry.correlation_id, transfer.correlation_id);
}

/// Test: debits beyond the available balance are refused and nothing is
/// written
#[test]
fn test_overdraft_blocked() {
    let temp_dir = TempDir::new().unwrap();
    let service = service_at(temp_dir.path());
    let investor = InvestorId::new(1);

    service
        .admin_credit(investor, amount(100), Currency::Slha, None)
        .unwrap();

    let result = service.admin_debit(investor, amount(150), Currency::Slha, None);
    assert!(matches!(
        result.unwrap_err().as_ledger(),
        Some(LedgerError::InsufficientFunds { .. })
    ));

    let balance = service.balance(investor, &Currency::Slha).unwrap();
    assert_eq!(balance.raw, dec!(100));
    assert_eq!(service.statement(investor, None, 10).unwrap().len(), 1);
}

/// Test: SLH and SLHA never commingle
#[test]
fn test_currency_isolation() {
    let temp_dir = TempDir::new().unwrap();
    let service = service_at(temp_dir.path());
    let alice = InvestorId::new(1);
    let bob = InvestorId::new(2);

    service
        .admin_credit(alice, amount(100), Currency::Slh, None)
        .unwrap();
    service
        .admin_credit(alice, amount(50), Currency::Slha, None)
        .unwrap();

    service.transfer(alice, bob, amount(40), Currency::Slh).unwrap();

    assert_eq!(service.balance(alice, &Currency::Slh).unwrap().raw, dec!(60));
    assert_eq!(service.balance(alice, &Currency::Slha).unwrap().raw, dec!(50));
    assert_eq!(service.balance(bob, &Currency::Slh).unwrap().raw, dec!(40));
    assert_eq!(service.balance(bob, &Currency::Slha).unwrap().raw, dec!(0));
}

/// Test: statement limit and currency filter
#[test]
fn test_statement_pagination() {
    let temp_dir = TempDir::new().unwrap();
    let service = service_at(temp_dir.path());
    let investor = InvestorId::new(1);

    for value in 1..=5 {
        service
            .admin_credit(investor, amount(value), Currency::Slha, None)
            .unwrap();
    }
    service
        .admin_credit(investor, amount(99), Currency::Slh, None)
        .unwrap();

    let page = service
        .statement(investor, Some(&Currency::Slha), 3)
        .unwrap();
    assert_eq!(page.len(), 3);
    // Newest first
    assert_eq!(page[0].amount.value(), dec!(5));
    assert_eq!(page[2].amount.value(), dec!(3));

    let all_slha = service
        .statement(investor, Some(&Currency::Slha), 100)
        .unwrap();
    assert_eq!(all_slha.len(), 5);
}

/// Test: referral bonus mints SLHA and keeps the counter in step
#[test]
fn test_referral_bonus_and_counter() {
    let temp_dir = TempDir::new().unwrap();
    let service = service_at(temp_dir.path());
    let referrer = InvestorId::new(1);

    let counter = service
        .credit_referral(referrer, Some(InvestorId::new(2)))
        .unwrap();
    assert_eq!(counter.referral_count, 1);
    assert_eq!(counter.total_bonus.value(), dec!(10));

    let counter = service
        .credit_referral(referrer, Some(InvestorId::new(3)))
        .unwrap();
    assert_eq!(counter.referral_count, 2);
    assert_eq!(counter.total_bonus.value(), dec!(20));

    let balance = service.balance(referrer, &Currency::Slha).unwrap();
    assert_eq!(balance.raw, dec!(20));
    assert_eq!(
        service.referral_counter(referrer).unwrap().referral_count,
        2
    );
}

/// Test: rerunning an accrual period credits nothing the second time
#[test]
fn test_accrual_idempotent_per_period() {
    let temp_dir = TempDir::new().unwrap();
    let service = service_at(temp_dir.path());
    let investor = InvestorId::new(1);

    service
        .admin_credit(investor, amount(1000), Currency::Slha, None)
        .unwrap();

    // 0.18 / 12 of 1000
    let report = service.run_accrual("2026-01").unwrap();
    assert_eq!(report.credited, 1);
    assert_eq!(report.total, dec!(15));
    assert_eq!(
        service.balance(investor, &Currency::Slha).unwrap().raw,
        dec!(1015)
    );

    let rerun = service.run_accrual("2026-01").unwrap();
    assert_eq!(rerun.credited, 0);
    assert_eq!(rerun.skipped, 1);
    assert_eq!(
        service.balance(investor, &Currency::Slha).unwrap().raw,
        dec!(1015)
    );

    // The next period compounds on the new raw balance
    let february = service.run_accrual("2026-02").unwrap();
    assert_eq!(february.total, dec!(15.225));
}

/// Test: spool payout writes one JSON line per approved redemption
#[test]
fn test_spool_payout_writes_jsonl() {
    let temp_dir = TempDir::new().unwrap();
    let spool = temp_dir.path().join("payouts.jsonl");
    let settings = Settings {
        payout: PayoutMode::Spool(spool.clone()),
        ..settings_at(temp_dir.path())
    };
    let service = LedgerService::open(&settings).unwrap();
    let investor = InvestorId::new(1);

    service
        .admin_credit(investor, amount(100), Currency::Slha, None)
        .unwrap();
    let request = service
        .open_redemption(
            investor,
            amount(60),
            RedemptionMode::Regular,
            Some("EQDexternal".to_string()),
            None,
        )
        .unwrap();
    service.approve_redemption(request.id).unwrap();

    let spooled = std::fs::read_to_string(&spool).unwrap();
    let lines: Vec<&str> = spooled.lines().collect();
    assert_eq!(lines.len(), 1);

    let row: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(row["id"], request.id);
    assert_eq!(row["status"], "approved");
    assert_eq!(row["payout_address"], "EQDexternal");
}

/// Test: deep self-test is healthy on a freshly opened database
#[test]
fn test_selftest_on_fresh_database() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings_at(temp_dir.path());
    let service = LedgerService::open(&settings).unwrap();

    let report = selftest::run(&service, &settings, false);
    assert!(report.healthy(), "checks: {:?}", report.checks);
    assert_eq!(report.checks.len(), 6);
}

/// Test: concurrent transfers cannot overdraw and the total is
/// conserved
#[test]
fn test_concurrent_transfers_conserve_total() {
    let temp_dir = TempDir::new().unwrap();
    let service = Arc::new(service_at(temp_dir.path()));
    let alice = InvestorId::new(1);

    service
        .admin_credit(alice, amount(100), Currency::Slha, None)
        .unwrap();

    // 8 threads race to move 30 each; only three can fit in 100.
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let receiver = InvestorId::new(2 + (i % 2));
                service.transfer(alice, receiver, amount(30), Currency::Slha)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 3);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result.as_ref().unwrap_err().as_ledger(),
            Some(LedgerError::InsufficientFunds { .. })
        ));
    }

    let total = service.balance(alice, &Currency::Slha).unwrap().raw
        + service
            .balance(InvestorId::new(2), &Currency::Slha)
            .unwrap()
            .raw
        + service
            .balance(InvestorId::new(3), &Currency::Slha)
            .unwrap()
            .raw;
    assert_eq!(total, dec!(100));
    assert_eq!(service.balance(alice, &Currency::Slha).unwrap().raw, dec!(10));
}

/// Test: a reopened database derives the same balances and queue
#[test]
fn test_reopen_preserves_state() {
    let temp_dir = TempDir::new().unwrap();
    let investor = InvestorId::new(1);
    let request_id;

    // Phase 1: seed and lock
    {
        let service = service_at(temp_dir.path());
        service
            .admin_credit(investor, amount(70), Currency::Slha, None)
            .unwrap();
        let request = service
            .open_redemption(investor, amount(50), RedemptionMode::Regular, None, None)
            .unwrap();
        request_id = request.id;
    }

    // Phase 2: reopen and verify everything was derived, not cached
    {
        let service = service_at(temp_dir.path());

        let balance = service.balance(investor, &Currency::Slha).unwrap();
        assert_eq!(balance.raw, dec!(70));
        assert_eq!(balance.available, dec!(20));

        let pending = service
            .list_redemptions(Some(RedemptionStatus::Pending), 10)
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, request_id);

        // The decision still works after the restart
        let approved = service.approve_redemption(request_id).unwrap();
        assert_eq!(approved.status, RedemptionStatus::Approved);
    }
}

/// Test: deciding a request twice fails with the current status in the
/// error
#[test]
fn test_second_decision_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let service = service_at(temp_dir.path());
    let investor = InvestorId::new(1);

    service
        .admin_credit(investor, amount(70), Currency::Slha, None)
        .unwrap();
    let request = service
        .open_redemption(investor, amount(50), RedemptionMode::Regular, None, None)
        .unwrap();

    service.approve_redemption(request.id).unwrap();
    let result = service.reject_redemption(request.id, None);

    match result.unwrap_err().as_ledger() {
        Some(LedgerError::InvalidStateTransition { expected, found, .. }) => {
            assert_eq!(*expected, RedemptionStatus::Pending);
            assert_eq!(*found, RedemptionStatus::Approved);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // The losing call changed nothing
    let request = service.get_redemption(request.id).unwrap();
    assert_eq!(request.status, RedemptionStatus::Approved);
}

/// Test: two concurrent opens that jointly overdraw cannot both lock
#[test]
fn test_concurrent_opens_cannot_jointly_overdraw() {
    let temp_dir = TempDir::new().unwrap();
    let service = Arc::new(service_at(temp_dir.path()));
    let investor = InvestorId::new(1);

    service
        .admin_credit(investor, amount(70), Currency::Slha, None)
        .unwrap();

    // 60 + 60 over 70: only one lock fits
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                service.open_redemption(investor, amount(60), RedemptionMode::Regular, None, None)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let balance = service.balance(investor, &Currency::Slha).unwrap();
    assert_eq!(balance.raw, dec!(70));
    assert_eq!(balance.available, dec!(10));
}
