use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::repositories::accrual::AccrualEngine;
use crate::repositories::ledger::LedgerRepository;
use crate::settings::Settings;

pub mod accrual;
mod http;
pub mod ledger;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&mut self, request: T);
}

/// Requests are handled strictly in order. The ledger is one mutable
/// record with a single-writer invariant, so there is no per-request
/// spawning here: the handler owns the state and drains its queue.
#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T>,
{
    async fn run(&mut self, mut handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            handler.handle_request(request).await;
        }
    }
}

pub async fn start_services(
    repository: LedgerRepository,
    engine: AccrualEngine,
    settings: Settings,
    listen: &str,
) -> Result<(), anyhow::Error> {
    let (ledger_tx, mut ledger_rx) = mpsc::channel(512);

    log::info!("Starting ledger service.");
    let mut ledger_service = ledger::LedgerService::new();
    tokio::spawn(async move {
        ledger_service
            .run(
                ledger::LedgerRequestHandler::new(repository, engine),
                &mut ledger_rx,
            )
            .await;
    });

    log::info!("Starting accrual tick timer.");
    accrual::start_tick_task(ledger_tx.clone(), settings.earning.tick_interval_secs);

    log::info!("Starting snapshot flush timer.");
    accrual::start_flush_task(ledger_tx.clone(), settings.storage.flush_debounce_secs);

    log::info!("Starting HTTP server.");
    http::start_http_server(ledger_tx, listen).await
}
