use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::models::ledger::Ledger;
use crate::models::users::{EarningEntry, EarningKind, User};
use crate::utils::Clock;

/// Daily earning-time budget: 6 hours of accrual-eligible seconds,
/// reset at local midnight.
pub const DAILY_BUDGET_SECS: i64 = 21_600;
/// Share of a referred user's per-tick total credited to the referrer.
pub const COMMISSION_RATE: f64 = 0.05;
/// Earnings log entries older than this are pruned.
pub const LOG_RETENTION_DAYS: i64 = 7;

/// Earnings accrual engine. Grants balance increments for elapsed real
/// time, subject to the daily budget, and propagates referral
/// commission. The same rules drive the live per-tick path and the
/// day-chunked offline replay; the clock is injected so replays and
/// tests are deterministic.
pub struct AccrualEngine {
    clock: Box<dyn Clock>,
    base_amount_per_tick: f64,
}

impl AccrualEngine {
    pub fn new(clock: Box<dyn Clock>, base_amount_per_tick: f64) -> Self {
        AccrualEngine {
            clock,
            base_amount_per_tick,
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Runs one live tick (one second of elapsed time) for every user
    /// and advances the ledger's `last_updated` watermark.
    pub fn tick(&self, ledger: &mut Ledger) {
        let now = self.clock.now();
        for index in 0..ledger.users.len() {
            self.accrue_live_tick(ledger, index, now);
        }
        ledger.last_updated = now;
    }

    /// One tick of accrual for one user.
    ///
    /// Admin accounts are credited unconditionally, with no budget and
    /// no log. Standard accounts get their budget reset at the first
    /// tick past a midnight boundary, then earn only while budget
    /// remains and at least one wallet exists; an exhausted budget is a
    /// silent no-op.
    pub fn accrue_live_tick(&self, ledger: &mut Ledger, user_index: usize, now: NaiveDateTime) {
        let base = self.base_amount_per_tick;
        let referral;
        {
            let user = &mut ledger.users[user_index];
            if user.is_admin() {
                for wallet in &mut user.wallets {
                    wallet.balance += base;
                }
                return;
            }
            reset_budget_if_stale(user, now);
            if user.earning_time_left == 0 || user.wallets.is_empty() {
                return;
            }
            for wallet in &mut user.wallets {
                wallet.balance += base;
            }
            user.earning_time_left -= 1;
            let total = base * user.wallets.len() as f64;
            push_earning(user, total, EarningKind::Accrual, now);
            referral = user
                .referred_by
                .clone()
                .map(|email| (email, total * COMMISSION_RATE));
        }
        if let Some((referrer_email, commission)) = referral {
            self.credit_referrer(ledger, &referrer_email, commission, now);
        }
    }

    /// Replays `elapsed_secs` of accrual for one user starting at the
    /// simulated timestamp `start`, in day-aligned chunks. Equivalent to
    /// running `accrue_live_tick` once per second with a simulated clock,
    /// modulo floating-point accumulation order: each chunk runs to the
    /// next midnight boundary or the remaining time, whichever is
    /// smaller, and the budget is reset at every boundary crossing.
    /// Credits, log entries and referral commission all use the
    /// simulated timestamp.
    pub fn accrue_offline(
        &self,
        ledger: &mut Ledger,
        user_index: usize,
        start: NaiveDateTime,
        elapsed_secs: i64,
    ) {
        if elapsed_secs <= 0 {
            return;
        }
        let base = self.base_amount_per_tick;
        {
            let user = &mut ledger.users[user_index];
            if user.is_admin() {
                let credit = base * elapsed_secs as f64;
                for wallet in &mut user.wallets {
                    wallet.balance += credit;
                }
                return;
            }
        }

        let mut sim_now = start;
        let mut remaining = elapsed_secs;
        while remaining > 0 {
            let next_boundary = midnight_of(sim_now) + Duration::days(1);
            let to_boundary = (next_boundary - sim_now).num_seconds();
            let chunk = remaining.min(to_boundary);
            if chunk <= 0 {
                // Clock skew, DST or a corrupt persisted timestamp can
                // produce an empty chunk; terminate instead of spinning.
                log::warn!("offline replay stalled at {sim_now}, aborting remaining {remaining}s");
                break;
            }

            let referral;
            {
                let user = &mut ledger.users[user_index];
                reset_budget_if_stale(user, sim_now);
                let earn_secs = chunk.min(user.earning_time_left);
                if earn_secs > 0 && !user.wallets.is_empty() {
                    let credit = base * earn_secs as f64;
                    for wallet in &mut user.wallets {
                        wallet.balance += credit;
                    }
                    user.earning_time_left -= earn_secs;
                    let total = credit * user.wallets.len() as f64;
                    push_earning(user, total, EarningKind::Accrual, sim_now);
                    referral = user
                        .referred_by
                        .clone()
                        .map(|email| (email, total * COMMISSION_RATE));
                } else {
                    referral = None;
                }
            }
            if let Some((referrer_email, commission)) = referral {
                self.credit_referrer(ledger, &referrer_email, commission, sim_now);
            }

            sim_now += Duration::seconds(chunk);
            remaining -= chunk;
        }
    }

    /// Reconstructs everything missed between the persisted
    /// `last_updated` and now, then advances the watermark. A snapshot
    /// from the future is skipped with a warning.
    pub fn catch_up(&self, ledger: &mut Ledger) {
        let now = self.clock.now();
        let elapsed = (now - ledger.last_updated).num_seconds();
        if elapsed <= 0 {
            if elapsed < 0 {
                log::warn!(
                    "persisted snapshot is {}s in the future, skipping catch-up",
                    -elapsed
                );
            }
            ledger.last_updated = now;
            return;
        }
        log::info!(
            "replaying {elapsed}s of offline accrual for {} users",
            ledger.users.len()
        );
        let start = ledger.last_updated;
        for index in 0..ledger.users.len() {
            self.accrue_offline(ledger, index, start, elapsed);
        }
        ledger.last_updated = now;
    }

    /// Commission is split evenly across the referrer's wallets and
    /// logged as a distinct referral entry; the referrer's own budget is
    /// not consumed. A referrer without wallets receives nothing.
    fn credit_referrer(
        &self,
        ledger: &mut Ledger,
        email: &str,
        commission: f64,
        now: NaiveDateTime,
    ) {
        let Some(referrer) = ledger.user_mut(email) else {
            return;
        };
        if referrer.wallets.is_empty() {
            return;
        }
        let share = commission / referrer.wallets.len() as f64;
        for wallet in &mut referrer.wallets {
            wallet.balance += share;
        }
        push_earning(referrer, commission, EarningKind::Referral, now);
    }
}

fn midnight_of(at: NaiveDateTime) -> NaiveDateTime {
    at.date().and_time(NaiveTime::MIN)
}

fn reset_budget_if_stale(user: &mut User, now: NaiveDateTime) {
    let midnight = midnight_of(now);
    if user.earning_time_reset_at.is_none_or(|at| at < midnight) {
        user.earning_time_left = DAILY_BUDGET_SECS;
        user.earning_time_reset_at = Some(midnight);
    }
}

fn push_earning(user: &mut User, amount: f64, kind: EarningKind, now: NaiveDateTime) {
    user.earnings_log.push(EarningEntry {
        amount,
        kind,
        timestamp: now,
    });
    let cutoff = now - Duration::days(LOG_RETENTION_DAYS);
    user.earnings_log.retain(|e| e.timestamp > cutoff);
}
