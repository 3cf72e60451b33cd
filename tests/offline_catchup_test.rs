use std::cell::Cell;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use satdrip::models::users::AccountKind;
use satdrip::repositories::accrual::{AccrualEngine, DAILY_BUDGET_SECS};
use satdrip::repositories::ledger::LedgerRepository;
use satdrip::repositories::snapshot::{FileBackend, MemoryBackend};
use satdrip::utils::{Clock, FixedClock};

const BASE: f64 = 0.000_000_000_1;

/// Advances one second per reading, simulating the live tick timer.
struct SteppingClock(Cell<NaiveDateTime>);

impl Clock for SteppingClock {
    fn now(&self) -> NaiveDateTime {
        let now = self.0.get();
        self.0.set(now + Duration::seconds(1));
        now
    }
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() <= 1e-18 + b.abs() * 1e-9, "{a} != {b}");
}

fn populated_repo(now: NaiveDateTime) -> LedgerRepository {
    let mut repo = LedgerRepository::open(Box::new(MemoryBackend::new()), now).unwrap();
    repo.add_user("referrer", "referrer@example.com", "pw", None, now);
    repo.add_wallet("referrer@example.com", "ref-wallet", now);
    let code = repo
        .get_user("referrer@example.com")
        .unwrap()
        .referral_code
        .clone();
    repo.add_user("earner", "earner@example.com", "pw", Some(&code), now);
    repo.add_wallet("earner@example.com", "earner-wallet-1", now);
    repo.add_wallet("earner@example.com", "earner-wallet-2", now);
    repo.add_user("idle", "idle@example.com", "pw", None, now);
    repo
}

/// Replaying a multi-day offline window in one shot must produce the
/// same balances and budgets as ticking once per simulated second,
/// referral commission included.
#[test]
fn offline_catchup_equals_per_second_replay_with_referrals() {
    let persisted = at(2024, 3, 1, 23, 0, 0);
    let elapsed: i64 = 90_000; // 25 hours, crosses two midnight boundaries

    let mut offline = populated_repo(persisted);
    let caught_up = AccrualEngine::new(
        Box::new(FixedClock(persisted + Duration::seconds(elapsed))),
        BASE,
    );
    offline.catch_up(&caught_up).unwrap();

    let mut live = populated_repo(persisted);
    let ticker = AccrualEngine::new(Box::new(SteppingClock(Cell::new(persisted))), BASE);
    for _ in 0..elapsed {
        live.run_tick(&ticker);
    }

    for (a, b) in offline
        .ledger()
        .users
        .iter()
        .zip(live.ledger().users.iter())
    {
        assert_eq!(a.email, b.email);
        assert_eq!(a.earning_time_left, b.earning_time_left);
        assert_eq!(a.earning_time_reset_at, b.earning_time_reset_at);
        for (wa, wb) in a.wallets.iter().zip(b.wallets.iter()) {
            assert_close(wa.balance, wb.balance);
        }
    }
}

/// The daily budget invariant must hold for every standard user after
/// an arbitrary replay.
#[test]
fn budget_invariant_holds_after_long_replay() {
    let persisted = at(2024, 3, 1, 4, 30, 0);
    let mut repo = populated_repo(persisted);

    let engine = AccrualEngine::new(
        Box::new(FixedClock(
            persisted + Duration::days(9) + Duration::seconds(12_345),
        )),
        BASE,
    );
    repo.catch_up(&engine).unwrap();

    for user in repo.ledger().users.iter() {
        if user.kind == AccountKind::Standard {
            assert!(user.earning_time_left >= 0);
            assert!(user.earning_time_left <= DAILY_BUDGET_SECS);
        }
    }
}

/// Earning stops at 6 hours per calendar day no matter how long the
/// process stays down.
#[test]
fn offline_window_earns_at_most_the_daily_budget_per_day() {
    let persisted = at(2024, 3, 1, 0, 0, 0);
    let mut repo = LedgerRepository::open(Box::new(MemoryBackend::new()), persisted).unwrap();
    repo.add_user("earner", "earner@example.com", "pw", None, persisted);
    repo.add_wallet("earner@example.com", "w", persisted);

    let engine = AccrualEngine::new(Box::new(FixedClock(persisted + Duration::days(3))), BASE);
    repo.catch_up(&engine).unwrap();

    let user = repo.get_user("earner@example.com").unwrap();
    assert_close(
        user.wallets[0].balance,
        3.0 * DAILY_BUDGET_SECS as f64 * BASE,
    );
}

/// The snapshot file written by one repository is a complete restart
/// point for the next one, and catch-up resumes from its watermark.
#[test]
fn file_snapshot_round_trips_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let t0 = at(2024, 3, 1, 8, 0, 0);

    {
        let mut repo = LedgerRepository::open(Box::new(FileBackend::new(&path)), t0).unwrap();
        repo.add_user("alice", "alice@example.com", "pw", None, t0);
        repo.add_wallet("alice@example.com", "addr-1", t0);
        repo.update_balance("alice@example.com", "addr-1", 0.5);
        repo.persist().unwrap();
    }

    let mut repo = LedgerRepository::open(Box::new(FileBackend::new(&path)), t0).unwrap();
    let alice = repo.get_user("alice@example.com").unwrap();
    assert_close(alice.wallets[0].balance, 0.5);
    assert_eq!(repo.ledger().last_updated, t0);

    // two offline hours since the snapshot
    let engine = AccrualEngine::new(Box::new(FixedClock(t0 + Duration::hours(2))), BASE);
    repo.catch_up(&engine).unwrap();
    let alice = repo.get_user("alice@example.com").unwrap();
    assert_close(alice.wallets[0].balance, 0.5 + 7_200.0 * BASE);
    assert_eq!(repo.ledger().last_updated, t0 + Duration::hours(2));
}
