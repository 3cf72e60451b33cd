use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Denied,
}

/// A withdrawal request. `amount` is the balance snapshot taken at
/// creation and never changes afterwards; the wallet is zeroed in the
/// same operation so the value is never double-counted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WithdrawalRequest {
    pub id: String,
    pub user_email: String,
    pub wallet_address: String,
    pub amount: f64,
    pub status: WithdrawalStatus,
    pub timestamp: chrono::NaiveDateTime,
}
