use chrono::{Duration, NaiveDateTime};

use crate::models::ledger::{LeaderboardEntry, Ledger};
use crate::models::users::{AccountKind, EarningsSummary, User, Wallet};
use crate::models::withdrawals::{WithdrawalRequest, WithdrawalStatus};
use crate::repositories::accrual::{AccrualEngine, DAILY_BUDGET_SECS};
use crate::repositories::snapshot::SnapshotBackend;
use crate::utils;

/// One-time bonus credited to a referrer's first wallet when someone
/// signs up with their code. Distinct from the ongoing commission.
pub const SIGNUP_BONUS: f64 = 0.000_05;

/// When a mutation is pushed to the snapshot backend. Structural changes
/// persist immediately; per-tick accrual only marks the state dirty and
/// relies on the periodic flush. A crash inside that window loses at
/// most the latest ticks, which offline catch-up reconstructs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushPolicy {
    Immediate,
    Deferred,
}

/// The ledger store: sole owner of durable state and the only writer.
/// Operations signal failure with `bool` (not-found, already-exists and
/// invalid-state all collapse to `false`); snapshot I/O is the only
/// `Result` channel.
pub struct LedgerRepository {
    ledger: Ledger,
    backend: Box<dyn SnapshotBackend>,
    dirty: bool,
}

impl LedgerRepository {
    /// Loads the persisted snapshot, or starts an empty ledger.
    pub fn open(backend: Box<dyn SnapshotBackend>, now: NaiveDateTime) -> Result<Self, anyhow::Error> {
        let ledger = match backend.load()? {
            Some(ledger) => ledger,
            None => Ledger::empty(now),
        };
        Ok(LedgerRepository {
            ledger,
            backend,
            dirty: false,
        })
    }

    /// Seeds the configured admin account if absent and retrofits
    /// referral codes onto users from older snapshots that predate them.
    pub fn init(&mut self, username: &str, email: &str, password: &str, now: NaiveDateTime) {
        if self.ledger.user(email).is_none() {
            let referral_code = self.unique_referral_code(email);
            self.ledger.users.push(User {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                kind: AccountKind::Admin,
                wallets: Vec::new(),
                earnings_log: Vec::new(),
                referral_code,
                referred_by: None,
                earning_time_left: DAILY_BUDGET_SECS,
                earning_time_reset_at: None,
                last_seen: now,
                created_at: now,
            });
            log::info!("seeded admin account {email}");
        }
        for index in 0..self.ledger.users.len() {
            if self.ledger.users[index].referral_code.is_empty() {
                let email = self.ledger.users[index].email.clone();
                let code = self.unique_referral_code(&email);
                self.ledger.users[index].referral_code = code;
            }
        }
        self.save(FlushPolicy::Immediate);
    }

    // --- session ---

    pub fn login(&mut self, email: &str, password: &str, now: NaiveDateTime) -> bool {
        let Some(user) = self.ledger.user_mut(email) else {
            return false;
        };
        if user.password != password {
            return false;
        }
        user.last_seen = now;
        let canonical = user.email.clone();
        self.ledger.logged_in_user_email = Some(canonical);
        self.save(FlushPolicy::Immediate);
        true
    }

    pub fn logout(&mut self) {
        self.ledger.logged_in_user_email = None;
        self.save(FlushPolicy::Immediate);
    }

    pub fn logged_in_user(&self) -> Option<&User> {
        self.ledger
            .logged_in_user_email
            .as_deref()
            .and_then(|email| self.ledger.user(email))
    }

    // --- users ---

    pub fn get_user(&self, email: &str) -> Option<&User> {
        self.ledger.user(email)
    }

    pub fn all_users(&self) -> &[User] {
        &self.ledger.users
    }

    /// Fails on a duplicate email. A resolvable referral code links the
    /// new user to the referrer and pays the signup bonus into the
    /// referrer's first wallet, if they have one.
    pub fn add_user(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
        referred_by_code: Option<&str>,
        now: NaiveDateTime,
    ) -> bool {
        if self.ledger.user(email).is_some() {
            return false;
        }
        let referral_code = self.unique_referral_code(email);

        let mut referred_by = None;
        if let Some(code) = referred_by_code {
            let referrer = self
                .ledger
                .users
                .iter_mut()
                .find(|u| u.referral_code.eq_ignore_ascii_case(code));
            if let Some(referrer) = referrer {
                referred_by = Some(referrer.email.clone());
                if let Some(first) = referrer.wallets.first_mut() {
                    first.balance += SIGNUP_BONUS;
                }
            }
        }

        self.ledger.users.push(User {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            kind: AccountKind::Standard,
            wallets: Vec::new(),
            earnings_log: Vec::new(),
            referral_code,
            referred_by,
            earning_time_left: DAILY_BUDGET_SECS,
            earning_time_reset_at: None,
            last_seen: now,
            created_at: now,
        });
        self.save(FlushPolicy::Immediate);
        true
    }

    pub fn delete_user(&mut self, email: &str) -> bool {
        let Some(index) = self.ledger.user_index(email) else {
            return false;
        };
        self.ledger.users.remove(index);
        let was_logged_in = self
            .ledger
            .logged_in_user_email
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(email));
        if was_logged_in {
            self.ledger.logged_in_user_email = None;
        }
        self.save(FlushPolicy::Immediate);
        true
    }

    // --- wallets ---

    pub fn add_wallet(&mut self, email: &str, address: &str, now: NaiveDateTime) -> bool {
        let Some(user) = self.ledger.user_mut(email) else {
            return false;
        };
        if user.wallet(address).is_some() {
            return false;
        }
        user.wallets.push(Wallet {
            address: address.to_string(),
            balance: 0.0,
            created_at: now,
        });
        self.save(FlushPolicy::Immediate);
        true
    }

    pub fn delete_wallet(&mut self, email: &str, address: &str) -> bool {
        let Some(user) = self.ledger.user_mut(email) else {
            return false;
        };
        let before = user.wallets.len();
        user.wallets.retain(|w| w.address != address);
        if user.wallets.len() == before {
            return false;
        }
        self.save(FlushPolicy::Immediate);
        true
    }

    /// Admin balance edit. Balances are non-negative by invariant.
    pub fn update_balance(&mut self, email: &str, address: &str, new_balance: f64) -> bool {
        if !new_balance.is_finite() || new_balance < 0.0 {
            return false;
        }
        let Some(user) = self.ledger.user_mut(email) else {
            return false;
        };
        let Some(wallet) = user.wallet_mut(address) else {
            return false;
        };
        wallet.balance = new_balance;
        self.save(FlushPolicy::Immediate);
        true
    }

    // --- withdrawals ---

    /// Snapshots the wallet balance into a pending request and zeroes
    /// the wallet in the same step, so the amount is never counted
    /// twice. Fails on a missing wallet or an empty balance.
    pub fn create_withdrawal_request(
        &mut self,
        email: &str,
        address: &str,
        now: NaiveDateTime,
    ) -> bool {
        let Some(user) = self.ledger.user_mut(email) else {
            return false;
        };
        let canonical = user.email.clone();
        let Some(wallet) = user.wallet_mut(address) else {
            return false;
        };
        if wallet.balance <= 0.0 {
            return false;
        }
        let amount = wallet.balance;
        wallet.balance = 0.0;
        self.ledger.withdrawal_requests.push(WithdrawalRequest {
            id: utils::withdrawal_id(),
            user_email: canonical,
            wallet_address: address.to_string(),
            amount,
            status: WithdrawalStatus::Pending,
            timestamp: now,
        });
        self.save(FlushPolicy::Immediate);
        true
    }

    /// Newest first.
    pub fn withdrawal_requests(&self) -> Vec<WithdrawalRequest> {
        let mut requests = self.ledger.withdrawal_requests.clone();
        requests.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        requests
    }

    /// Resolves a pending request. `Denied` refunds the snapshot amount
    /// to the named wallet, recreating it if it was deleted in the
    /// interim; `Approved` removes the value from the system. Exactly
    /// one terminal transition: re-processing returns `false`.
    pub fn process_withdrawal_request(
        &mut self,
        id: &str,
        status: WithdrawalStatus,
        now: NaiveDateTime,
    ) -> bool {
        if status == WithdrawalStatus::Pending {
            return false;
        }
        let Some(request) = self
            .ledger
            .withdrawal_requests
            .iter_mut()
            .find(|r| r.id == id)
        else {
            return false;
        };
        if request.status != WithdrawalStatus::Pending {
            return false;
        }
        request.status = status;
        let email = request.user_email.clone();
        let address = request.wallet_address.clone();
        let amount = request.amount;

        if status == WithdrawalStatus::Denied {
            if let Some(user) = self.ledger.user_mut(&email) {
                match user.wallet_mut(&address) {
                    Some(wallet) => wallet.balance += amount,
                    None => user.wallets.push(Wallet {
                        address,
                        balance: amount,
                        created_at: now,
                    }),
                }
            }
        }
        self.save(FlushPolicy::Immediate);
        true
    }

    // --- derived reads ---

    pub fn earnings_summary(&self, email: &str, now: NaiveDateTime) -> Option<EarningsSummary> {
        let user = self.ledger.user(email)?;
        let day_ago = now - Duration::days(1);
        let week_ago = now - Duration::days(7);
        Some(EarningsSummary {
            total: user.total_balance(),
            today: user
                .earnings_log
                .iter()
                .filter(|e| e.timestamp > day_ago)
                .map(|e| e.amount)
                .sum(),
            weekly: user
                .earnings_log
                .iter()
                .filter(|e| e.timestamp > week_ago)
                .map(|e| e.amount)
                .sum(),
        })
    }

    /// Total earned = current balances plus approved withdrawals.
    /// Pending amounts are excluded by construction: the balance was
    /// already zeroed when the request was created.
    pub fn top_earners(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.ranked(limit, |user| {
            user.total_balance() + self.approved_withdrawal_total(&user.email)
        })
    }

    pub fn top_withdrawers(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.ranked(limit, |user| self.approved_withdrawal_total(&user.email))
    }

    pub fn top_referrers(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.ranked(limit, |user| {
            self.ledger
                .users
                .iter()
                .filter(|u| {
                    u.referred_by
                        .as_deref()
                        .is_some_and(|r| r.eq_ignore_ascii_case(&user.email))
                })
                .count() as f64
        })
    }

    fn ranked(&self, limit: usize, value: impl Fn(&User) -> f64) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<LeaderboardEntry> = self
            .ledger
            .users
            .iter()
            .map(|user| LeaderboardEntry {
                username: user.username.clone(),
                email: user.email.clone(),
                value: value(user),
            })
            .collect();
        rows.sort_by(|a, b| b.value.total_cmp(&a.value));
        rows.truncate(limit);
        rows
    }

    fn approved_withdrawal_total(&self, email: &str) -> f64 {
        self.ledger
            .withdrawal_requests
            .iter()
            .filter(|r| {
                r.status == WithdrawalStatus::Approved && r.user_email.eq_ignore_ascii_case(email)
            })
            .map(|r| r.amount)
            .sum()
    }

    // --- accrual entry points ---

    /// One live tick across all users; persisted lazily.
    pub fn run_tick(&mut self, engine: &AccrualEngine) {
        engine.tick(&mut self.ledger);
        self.save(FlushPolicy::Deferred);
    }

    /// Offline catch-up on startup, persisted immediately.
    pub fn catch_up(&mut self, engine: &AccrualEngine) -> Result<(), anyhow::Error> {
        engine.catch_up(&mut self.ledger);
        self.persist()
    }

    // --- persistence ---

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn save(&mut self, policy: FlushPolicy) {
        match policy {
            FlushPolicy::Deferred => self.dirty = true,
            FlushPolicy::Immediate => {
                if let Err(e) = self.persist() {
                    log::error!("failed to persist ledger snapshot: {e:#}");
                }
            }
        }
    }

    /// Writes the snapshot now, regardless of the dirty flag.
    pub fn persist(&mut self) -> Result<(), anyhow::Error> {
        self.backend.save(&self.ledger)?;
        self.dirty = false;
        Ok(())
    }

    /// Drains a deferred write, if any.
    pub fn flush(&mut self) -> Result<(), anyhow::Error> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    fn unique_referral_code(&self, email: &str) -> String {
        loop {
            let code = utils::referral_code(email);
            let taken = self
                .ledger
                .users
                .iter()
                .any(|u| u.referral_code.eq_ignore_ascii_case(&code));
            if !taken {
                return code;
            }
        }
    }
}
