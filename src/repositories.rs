pub mod accrual;
pub mod ledger;
pub mod snapshot;
