use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::ledger::LedgerRequest;
use super::ServiceError;
use crate::models::withdrawals::WithdrawalStatus;

mod users;

#[derive(Clone)]
pub(super) struct AppState {
    ledger_channel: mpsc::Sender<LedgerRequest>,
}

/// Round-trips one request through the ledger service.
pub(super) async fn dispatch<R>(
    channel: &mpsc::Sender<LedgerRequest>,
    request: LedgerRequest,
    receiver: oneshot::Receiver<R>,
) -> Result<R, ServiceError> {
    channel
        .send(request)
        .await
        .map_err(|e| ServiceError::Communication("ledger".to_string(), e.to_string()))?;
    receiver
        .await
        .map_err(|e| ServiceError::Communication("ledger".to_string(), e.to_string()))
}

pub(super) fn reply(
    result: Result<Result<(), ServiceError>, ServiceError>,
    created: StatusCode,
    rejected: StatusCode,
) -> (StatusCode, Json<serde_json::Value>) {
    match result {
        Ok(Ok(())) => (created, Json(json!({ "status": "ok" }))),
        Ok(Err(e)) => (rejected, Json(json!({ "description": e.to_string() }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "description": e.to_string() })),
        ),
    }
}

#[derive(Deserialize)]
struct NewWithdrawal {
    email: String,
    address: String,
}

async fn create_withdrawal(
    State(state): State<AppState>,
    Json(req): Json<NewWithdrawal>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let result = dispatch(
        &state.ledger_channel,
        LedgerRequest::CreateWithdrawal {
            email: req.email,
            address: req.address,
            response: tx,
        },
        rx,
    )
    .await;
    reply(result, StatusCode::CREATED, StatusCode::UNPROCESSABLE_ENTITY)
}

async fn list_withdrawals(State(state): State<AppState>) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.ledger_channel,
        LedgerRequest::GetWithdrawals { response: tx },
        rx,
    )
    .await
    {
        Ok(requests) => (StatusCode::OK, Json(json!(requests))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "description": e.to_string() })),
        ),
    }
}

#[derive(Deserialize)]
struct ProcessWithdrawal {
    status: WithdrawalStatus,
}

async fn process_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ProcessWithdrawal>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let result = dispatch(
        &state.ledger_channel,
        LedgerRequest::ProcessWithdrawal {
            id,
            status: req.status,
            response: tx,
        },
        rx,
    )
    .await;
    reply(result, StatusCode::OK, StatusCode::CONFLICT)
}

#[derive(Deserialize)]
struct LeaderboardParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

async fn top_earners(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    leaderboard(
        &state,
        LedgerRequest::GetTopEarners {
            limit: params.limit,
            response: tx,
        },
        rx,
    )
    .await
}

async fn top_withdrawers(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    leaderboard(
        &state,
        LedgerRequest::GetTopWithdrawers {
            limit: params.limit,
            response: tx,
        },
        rx,
    )
    .await
}

async fn top_referrers(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    leaderboard(
        &state,
        LedgerRequest::GetTopReferrers {
            limit: params.limit,
            response: tx,
        },
        rx,
    )
    .await
}

async fn leaderboard(
    state: &AppState,
    request: LedgerRequest,
    rx: oneshot::Receiver<Vec<crate::models::ledger::LeaderboardEntry>>,
) -> (StatusCode, Json<serde_json::Value>) {
    match dispatch(&state.ledger_channel, request, rx).await {
        Ok(rows) => (StatusCode::OK, Json(json!(rows))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "description": e.to_string() })),
        ),
    }
}

pub async fn start_http_server(
    ledger_channel: mpsc::Sender<LedgerRequest>,
    listen: &str,
) -> Result<(), anyhow::Error> {
    let app_state = AppState { ledger_channel };

    let app = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/logout", post(users::logout))
        .route("/me", get(users::me))
        .route("/users", get(users::list_users))
        .route("/users/{email}", get(users::get_user).delete(users::delete_user))
        .route("/users/{email}/earnings", get(users::earnings_summary))
        .route("/users/{email}/wallets", post(users::add_wallet))
        .route(
            "/users/{email}/wallets/{address}",
            put(users::update_balance).delete(users::delete_wallet),
        )
        .route("/withdrawals", post(create_withdrawal).get(list_withdrawals))
        .route("/withdrawals/{id}", put(process_withdrawal))
        .route("/leaderboard/earners", get(top_earners))
        .route("/leaderboard/withdrawers", get(top_withdrawers))
        .route("/leaderboard/referrers", get(top_referrers))
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
