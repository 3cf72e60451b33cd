use serde::{Deserialize, Serialize};

use super::users::User;
use super::withdrawals::WithdrawalRequest;

/// Root record of the system. This is exactly what gets persisted as a
/// single snapshot document; `last_updated` is the basis for computing
/// offline elapsed time on the next load.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Ledger {
    pub users: Vec<User>,
    pub logged_in_user_email: Option<String>,
    pub withdrawal_requests: Vec<WithdrawalRequest>,
    pub last_updated: chrono::NaiveDateTime,
}

impl Ledger {
    pub fn empty(now: chrono::NaiveDateTime) -> Self {
        Ledger {
            users: Vec::new(),
            logged_in_user_email: None,
            withdrawal_requests: Vec::new(),
            last_updated: now,
        }
    }

    /// Emails are unique case-insensitively.
    pub fn user_index(&self, email: &str) -> Option<usize> {
        self.users
            .iter()
            .position(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn user(&self, email: &str) -> Option<&User> {
        self.user_index(email).map(|i| &self.users[i])
    }

    pub fn user_mut(&mut self, email: &str) -> Option<&mut User> {
        self.user_index(email).map(|i| &mut self.users[i])
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub email: String,
    pub value: f64,
}
