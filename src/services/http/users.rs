use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::oneshot;

use super::{dispatch, reply, AppState};
use crate::models::users::{AccountKind, NewUser, User, Wallet};
use crate::services::ledger::LedgerRequest;

/// What the rendering layer sees of a user. Credentials and the raw
/// earnings log stay server-side.
#[derive(Serialize)]
struct UserView {
    username: String,
    email: String,
    kind: AccountKind,
    wallets: Vec<Wallet>,
    referral_code: String,
    referred_by: Option<String>,
    earning_time_left: i64,
    last_seen: chrono::NaiveDateTime,
    created_at: chrono::NaiveDateTime,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView {
            username: user.username,
            email: user.email,
            kind: user.kind,
            wallets: user.wallets,
            referral_code: user.referral_code,
            referred_by: user.referred_by,
            earning_time_left: user.earning_time_left,
            last_seen: user.last_seen,
            created_at: user.created_at,
        }
    }
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(req): Json<NewUser>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let result = dispatch(
        &state.ledger_channel,
        LedgerRequest::Register {
            username: req.username,
            email: req.email,
            password: req.password,
            referred_by_code: req.referral_code,
            response: tx,
        },
        rx,
    )
    .await;
    reply(result, StatusCode::CREATED, StatusCode::CONFLICT)
}

#[derive(Deserialize)]
pub(super) struct Credentials {
    email: String,
    password: String,
}

pub(super) async fn login(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let result = dispatch(
        &state.ledger_channel,
        LedgerRequest::Login {
            email: req.email,
            password: req.password,
            response: tx,
        },
        rx,
    )
    .await;
    reply(result, StatusCode::OK, StatusCode::UNAUTHORIZED)
}

pub(super) async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.ledger_channel,
        LedgerRequest::Logout { response: tx },
        rx,
    )
    .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "description": e.to_string() })),
        ),
    }
}

pub(super) async fn me(State(state): State<AppState>) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.ledger_channel,
        LedgerRequest::GetLoggedInUser { response: tx },
        rx,
    )
    .await
    {
        Ok(Some(user)) => (StatusCode::OK, Json(json!(UserView::from(user)))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "description": "no active session" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "description": e.to_string() })),
        ),
    }
}

pub(super) async fn list_users(State(state): State<AppState>) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.ledger_channel,
        LedgerRequest::GetAllUsers { response: tx },
        rx,
    )
    .await
    {
        Ok(users) => {
            let views: Vec<UserView> = users.into_iter().map(UserView::from).collect();
            (StatusCode::OK, Json(json!(views)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "description": e.to_string() })),
        ),
    }
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.ledger_channel,
        LedgerRequest::GetUser {
            email,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(Some(user)) => (StatusCode::OK, Json(json!(UserView::from(user)))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "description": "user not found" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "description": e.to_string() })),
        ),
    }
}

pub(super) async fn delete_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let result = dispatch(
        &state.ledger_channel,
        LedgerRequest::DeleteUser {
            email,
            response: tx,
        },
        rx,
    )
    .await;
    reply(result, StatusCode::OK, StatusCode::NOT_FOUND)
}

pub(super) async fn earnings_summary(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    match dispatch(
        &state.ledger_channel,
        LedgerRequest::GetEarningsSummary {
            email,
            response: tx,
        },
        rx,
    )
    .await
    {
        Ok(Some(summary)) => (StatusCode::OK, Json(json!(summary))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "description": "user not found" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "description": e.to_string() })),
        ),
    }
}

#[derive(Deserialize)]
pub(super) struct NewWallet {
    address: String,
}

pub(super) async fn add_wallet(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(req): Json<NewWallet>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let result = dispatch(
        &state.ledger_channel,
        LedgerRequest::AddWallet {
            email,
            address: req.address,
            response: tx,
        },
        rx,
    )
    .await;
    reply(result, StatusCode::CREATED, StatusCode::CONFLICT)
}

pub(super) async fn delete_wallet(
    State(state): State<AppState>,
    Path((email, address)): Path<(String, String)>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let result = dispatch(
        &state.ledger_channel,
        LedgerRequest::DeleteWallet {
            email,
            address,
            response: tx,
        },
        rx,
    )
    .await;
    reply(result, StatusCode::OK, StatusCode::NOT_FOUND)
}

#[derive(Deserialize)]
pub(super) struct BalanceUpdate {
    balance: f64,
}

pub(super) async fn update_balance(
    State(state): State<AppState>,
    Path((email, address)): Path<(String, String)>,
    Json(req): Json<BalanceUpdate>,
) -> impl IntoResponse {
    let (tx, rx) = oneshot::channel();
    let result = dispatch(
        &state.ledger_channel,
        LedgerRequest::UpdateBalance {
            email,
            address,
            new_balance: req.balance,
            response: tx,
        },
        rx,
    )
    .await;
    reply(result, StatusCode::OK, StatusCode::UNPROCESSABLE_ENTITY)
}
