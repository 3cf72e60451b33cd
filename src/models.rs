pub mod ledger;
pub mod users;
pub mod withdrawals;
