use std::time::Duration;

use tokio::sync::mpsc;

use super::ledger::LedgerRequest;

/// Sends one `Tick` per interval for the lifetime of the session.
pub fn start_tick_task(channel: mpsc::Sender<LedgerRequest>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            if channel.send(LedgerRequest::Tick).await.is_err() {
                log::warn!("ledger service is gone, stopping tick timer");
                break;
            }
        }
    });
}

/// Debounced durability for the high-frequency tick path: the ledger
/// batches accrual writes and this timer drains them.
pub fn start_flush_task(channel: mpsc::Sender<LedgerRequest>, debounce_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(debounce_secs.max(1)));
        loop {
            interval.tick().await;
            if channel.send(LedgerRequest::Flush).await.is_err() {
                log::warn!("ledger service is gone, stopping flush timer");
                break;
            }
        }
    });
}
