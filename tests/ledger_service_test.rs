use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::{mpsc, oneshot};

use satdrip::models::withdrawals::WithdrawalStatus;
use satdrip::repositories::accrual::AccrualEngine;
use satdrip::repositories::ledger::LedgerRepository;
use satdrip::repositories::snapshot::MemoryBackend;
use satdrip::services::ledger::{LedgerRequest, LedgerRequestHandler, LedgerService};
use satdrip::services::Service;
use satdrip::utils::FixedClock;

const BASE: f64 = 0.000_000_000_1;

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn start_service() -> mpsc::Sender<LedgerRequest> {
    let repository = LedgerRepository::open(Box::new(MemoryBackend::new()), noon()).unwrap();
    let engine = AccrualEngine::new(Box::new(FixedClock(noon())), BASE);
    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut service = LedgerService::new();
        service
            .run(LedgerRequestHandler::new(repository, engine), &mut rx)
            .await;
    });
    tx
}

async fn expect_ok(
    tx: &mpsc::Sender<LedgerRequest>,
    build: impl FnOnce(oneshot::Sender<Result<(), satdrip::services::ServiceError>>) -> LedgerRequest,
) {
    let (response, rx) = oneshot::channel();
    tx.send(build(response)).await.unwrap();
    rx.await.unwrap().unwrap();
}

#[tokio::test]
async fn register_login_tick_and_withdraw_through_the_service() {
    let tx = start_service();

    expect_ok(&tx, |response| LedgerRequest::Register {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password: "pw".to_string(),
        referred_by_code: None,
        response,
    })
    .await;

    expect_ok(&tx, |response| LedgerRequest::Login {
        email: "alice@example.com".to_string(),
        password: "pw".to_string(),
        response,
    })
    .await;

    expect_ok(&tx, |response| LedgerRequest::AddWallet {
        email: "alice@example.com".to_string(),
        address: "addr-1".to_string(),
        response,
    })
    .await;

    for _ in 0..5 {
        tx.send(LedgerRequest::Tick).await.unwrap();
    }

    let (response, rx) = oneshot::channel();
    tx.send(LedgerRequest::GetLoggedInUser { response })
        .await
        .unwrap();
    let me = rx.await.unwrap().expect("session active");
    assert_eq!(me.email, "alice@example.com");
    assert!((me.wallets[0].balance - 5.0 * BASE).abs() < 1e-18);

    expect_ok(&tx, |response| LedgerRequest::CreateWithdrawal {
        email: "alice@example.com".to_string(),
        address: "addr-1".to_string(),
        response,
    })
    .await;

    let (response, rx) = oneshot::channel();
    tx.send(LedgerRequest::GetWithdrawals { response })
        .await
        .unwrap();
    let requests = rx.await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, WithdrawalStatus::Pending);
    assert!((requests[0].amount - 5.0 * BASE).abs() < 1e-18);
    let id = requests[0].id.clone();

    // the wallet was zeroed when the request was created
    let (response, rx) = oneshot::channel();
    tx.send(LedgerRequest::GetUser {
        email: "alice@example.com".to_string(),
        response,
    })
    .await
    .unwrap();
    assert_eq!(rx.await.unwrap().unwrap().wallets[0].balance, 0.0);

    expect_ok(&tx, |response| LedgerRequest::ProcessWithdrawal {
        id: id.clone(),
        status: WithdrawalStatus::Denied,
        response,
    })
    .await;

    // denial refunded the snapshot amount
    let (response, rx) = oneshot::channel();
    tx.send(LedgerRequest::GetUser {
        email: "alice@example.com".to_string(),
        response,
    })
    .await
    .unwrap();
    let alice = rx.await.unwrap().unwrap();
    assert!((alice.wallets[0].balance - 5.0 * BASE).abs() < 1e-18);

    // a resolved request cannot be processed again
    let (response, rx) = oneshot::channel();
    tx.send(LedgerRequest::ProcessWithdrawal {
        id,
        status: WithdrawalStatus::Approved,
        response,
    })
    .await
    .unwrap();
    assert!(rx.await.unwrap().is_err());
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let tx = start_service();

    expect_ok(&tx, |response| LedgerRequest::Register {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password: "pw".to_string(),
        referred_by_code: None,
        response,
    })
    .await;

    let (response, rx) = oneshot::channel();
    tx.send(LedgerRequest::Register {
        username: "mallory".to_string(),
        email: "ALICE@example.com".to_string(),
        password: "other".to_string(),
        referred_by_code: None,
        response,
    })
    .await
    .unwrap();
    assert!(rx.await.unwrap().is_err());
}

#[tokio::test]
async fn leaderboards_rank_referrers_through_the_service() {
    let tx = start_service();

    expect_ok(&tx, |response| LedgerRequest::Register {
        username: "ref".to_string(),
        email: "ref@example.com".to_string(),
        password: "pw".to_string(),
        referred_by_code: None,
        response,
    })
    .await;

    let (response, rx) = oneshot::channel();
    tx.send(LedgerRequest::GetUser {
        email: "ref@example.com".to_string(),
        response,
    })
    .await
    .unwrap();
    let code = rx.await.unwrap().unwrap().referral_code;

    expect_ok(&tx, |response| LedgerRequest::Register {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password: "pw".to_string(),
        referred_by_code: Some(code),
        response,
    })
    .await;

    let (response, rx) = oneshot::channel();
    tx.send(LedgerRequest::GetTopReferrers {
        limit: 1,
        response,
    })
    .await
    .unwrap();
    let rows = rx.await.unwrap();
    assert_eq!(rows[0].email, "ref@example.com");
    assert_eq!(rows[0].value, 1.0);
}
