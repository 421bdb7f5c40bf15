//! Operational self-test
//!
//! Named checks over an opened service: database reachability, schema
//! shape, payout channel. Quick mode runs only the cheap probes; the
//! deep run also walks real query paths and reports queue depth.

use std::time::Instant;

use slh_ledger::RedemptionStatus;

use crate::config::{PayoutMode, Settings};
use crate::service::LedgerService;

const EXPECTED_TABLES: [&str; 5] = [
    "accounts",
    "internal_transfers",
    "ledger_entries",
    "redemption_requests",
    "referral_counters",
];

const QUEUE_PROBE_LIMIT: u32 = 1000;

#[derive(Debug)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            detail: detail.into(),
        }
    }
}

#[derive(Debug)]
pub struct SelfTestReport {
    pub checks: Vec<Check>,
}

impl SelfTestReport {
    pub fn healthy(&self) -> bool {
        self.checks.iter().all(|check| check.ok)
    }

    pub fn status(&self) -> &'static str {
        if self.healthy() {
            "ok"
        } else {
            "degraded"
        }
    }
}

pub fn run(service: &LedgerService, settings: &Settings, quick: bool) -> SelfTestReport {
    let mut checks = Vec::new();

    let mut faults = Vec::new();
    if settings.database.as_os_str().is_empty() {
        faults.push("database path empty");
    }
    if !settings.referral_bonus.is_positive() {
        faults.push("referral bonus not positive");
    }
    checks.push(if faults.is_empty() {
        Check::new(
            "config:settings",
            true,
            format!("db {}", settings.database.display()),
        )
    } else {
        Check::new("config:settings", false, faults.join(", "))
    });

    let started = Instant::now();
    checks.push(match service.store().ping() {
        Ok(()) => Check::new(
            "db:ping",
            true,
            format!("{} ms", started.elapsed().as_millis()),
        ),
        Err(error) => Check::new("db:ping", false, error.to_string()),
    });

    checks.push(match service.store().table_names() {
        Ok(tables) => {
            let missing: Vec<&str> = EXPECTED_TABLES
                .iter()
                .filter(|expected| !tables.iter().any(|name| name == *expected))
                .copied()
                .collect();
            if missing.is_empty() {
                Check::new("db:schema", true, format!("{} tables", tables.len()))
            } else {
                Check::new("db:schema", false, format!("missing: {}", missing.join(", ")))
            }
        }
        Err(error) => Check::new("db:schema", false, error.to_string()),
    });

    checks.push(match &settings.payout {
        PayoutMode::Disabled => Check::new("payout:sink", true, "disabled"),
        PayoutMode::Spool(path) => {
            // An empty parent means the spool lives in the working
            // directory.
            let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty());
            let ok = dir.map_or(true, |dir| dir.is_dir());
            let detail = if ok {
                format!("spool {}", path.display())
            } else {
                format!("spool directory missing: {}", path.display())
            };
            Check::new("payout:sink", ok, detail)
        }
    });

    if !quick {
        checks.push(match service.store().accounts_by_kind(service.kind()) {
            Ok(accounts) => Check::new(
                "ledger:accounts",
                true,
                format!("{} {} accounts", accounts.len(), service.kind()),
            ),
            Err(error) => Check::new("ledger:accounts", false, error.to_string()),
        });

        checks.push(
            match service.list_redemptions(Some(RedemptionStatus::Pending), QUEUE_PROBE_LIMIT) {
                Ok(pending) => Check::new(
                    "ledger:redemptions",
                    true,
                    format!("{} pending", pending.len()),
                ),
                Err(error) => Check::new("ledger:redemptions", false, error.to_string()),
            },
        );
    }

    SelfTestReport { checks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slh_store::LedgerStore;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn service() -> LedgerService {
        let store = Arc::new(LedgerStore::in_memory().unwrap());
        LedgerService::with_store(store, &Settings::default())
    }

    #[test]
    fn test_quick_run_is_healthy() {
        let service = service();
        let report = run(&service, &Settings::default(), true);

        assert!(report.healthy());
        assert_eq!(report.status(), "ok");
        let names: Vec<&str> = report.checks.iter().map(|check| check.name).collect();
        assert_eq!(names, ["config:settings", "db:ping", "db:schema", "payout:sink"]);
    }

    #[test]
    fn test_deep_run_adds_ledger_probes() {
        let service = service();
        let report = run(&service, &Settings::default(), false);

        assert!(report.healthy());
        assert_eq!(report.checks.len(), 6);
        assert!(report
            .checks
            .iter()
            .any(|check| check.name == "ledger:redemptions" && check.detail == "0 pending"));
    }

    #[test]
    fn test_missing_spool_directory_degrades() {
        let service = service();
        let settings = Settings {
            payout: PayoutMode::Spool(PathBuf::from("/no/such/dir/payouts.jsonl")),
            ..Settings::default()
        };

        let report = run(&service, &settings, true);
        assert!(!report.healthy());
        assert_eq!(report.status(), "degraded");
    }
}
