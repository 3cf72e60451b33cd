use serde::{Deserialize, Serialize};

/// Account kind, dispatched once at the top of accrual instead of an
/// ad-hoc admin flag re-checked throughout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Standard,
    Admin,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Wallet {
    pub address: String,
    pub balance: f64,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EarningKind {
    Accrual,
    Referral,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EarningEntry {
    pub amount: f64,
    pub kind: EarningKind,
    pub timestamp: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    pub username: String,
    pub email: String,
    pub password: String,
    pub kind: AccountKind,
    pub wallets: Vec<Wallet>,
    pub earnings_log: Vec<EarningEntry>,
    pub referral_code: String,
    pub referred_by: Option<String>,
    /// Remaining accrual-eligible seconds in the current day.
    /// Invariant for standard accounts: 0 <= x <= 21600.
    pub earning_time_left: i64,
    /// The last midnight boundary the budget was reset at.
    pub earning_time_reset_at: Option<chrono::NaiveDateTime>,
    pub last_seen: chrono::NaiveDateTime,
    pub created_at: chrono::NaiveDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.kind == AccountKind::Admin
    }

    pub fn total_balance(&self) -> f64 {
        self.wallets.iter().map(|w| w.balance).sum()
    }

    pub fn wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.address == address)
    }

    pub fn wallet_mut(&mut self, address: &str) -> Option<&mut Wallet> {
        self.wallets.iter_mut().find(|w| w.address == address)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub referral_code: Option<String>,
}

/// Derived earnings figures for the dashboard.
#[derive(Clone, Debug, Serialize)]
pub struct EarningsSummary {
    pub total: f64,
    pub today: f64,
    pub weekly: f64,
}
