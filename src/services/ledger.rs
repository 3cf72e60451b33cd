use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::ledger::LeaderboardEntry;
use crate::models::users::{EarningsSummary, User};
use crate::models::withdrawals::{WithdrawalRequest, WithdrawalStatus};
use crate::repositories::accrual::AccrualEngine;
use crate::repositories::ledger::LedgerRepository;

pub enum LedgerRequest {
    Register {
        username: String,
        email: String,
        password: String,
        referred_by_code: Option<String>,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    Login {
        email: String,
        password: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    Logout {
        response: oneshot::Sender<()>,
    },
    GetLoggedInUser {
        response: oneshot::Sender<Option<User>>,
    },
    GetUser {
        email: String,
        response: oneshot::Sender<Option<User>>,
    },
    GetAllUsers {
        response: oneshot::Sender<Vec<User>>,
    },
    DeleteUser {
        email: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    AddWallet {
        email: String,
        address: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    DeleteWallet {
        email: String,
        address: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    UpdateBalance {
        email: String,
        address: String,
        new_balance: f64,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    CreateWithdrawal {
        email: String,
        address: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    GetWithdrawals {
        response: oneshot::Sender<Vec<WithdrawalRequest>>,
    },
    ProcessWithdrawal {
        id: String,
        status: WithdrawalStatus,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    GetEarningsSummary {
        email: String,
        response: oneshot::Sender<Option<EarningsSummary>>,
    },
    GetTopEarners {
        limit: usize,
        response: oneshot::Sender<Vec<LeaderboardEntry>>,
    },
    GetTopWithdrawers {
        limit: usize,
        response: oneshot::Sender<Vec<LeaderboardEntry>>,
    },
    GetTopReferrers {
        limit: usize,
        response: oneshot::Sender<Vec<LeaderboardEntry>>,
    },
    /// One unit of elapsed time for every user; sent by the tick timer.
    Tick,
    /// Drain a deferred snapshot write; sent by the flush timer.
    Flush,
}

pub struct LedgerRequestHandler {
    repository: LedgerRepository,
    engine: AccrualEngine,
}

impl LedgerRequestHandler {
    pub fn new(repository: LedgerRepository, engine: AccrualEngine) -> Self {
        LedgerRequestHandler { repository, engine }
    }

    fn rejected(ok: bool, what: &str) -> Result<(), ServiceError> {
        if ok {
            Ok(())
        } else {
            Err(ServiceError::Rejected(what.to_string()))
        }
    }
}

#[async_trait]
impl RequestHandler<LedgerRequest> for LedgerRequestHandler {
    async fn handle_request(&mut self, request: LedgerRequest) {
        match request {
            LedgerRequest::Register {
                username,
                email,
                password,
                referred_by_code,
                response,
            } => {
                let now = self.engine.now();
                let ok = self.repository.add_user(
                    &username,
                    &email,
                    &password,
                    referred_by_code.as_deref(),
                    now,
                );
                let _ = response.send(Self::rejected(ok, "email already registered"));
            }
            LedgerRequest::Login {
                email,
                password,
                response,
            } => {
                let now = self.engine.now();
                let ok = self.repository.login(&email, &password, now);
                let _ = response.send(Self::rejected(ok, "invalid credentials"));
            }
            LedgerRequest::Logout { response } => {
                self.repository.logout();
                let _ = response.send(());
            }
            LedgerRequest::GetLoggedInUser { response } => {
                let _ = response.send(self.repository.logged_in_user().cloned());
            }
            LedgerRequest::GetUser { email, response } => {
                let _ = response.send(self.repository.get_user(&email).cloned());
            }
            LedgerRequest::GetAllUsers { response } => {
                let _ = response.send(self.repository.all_users().to_vec());
            }
            LedgerRequest::DeleteUser { email, response } => {
                let ok = self.repository.delete_user(&email);
                let _ = response.send(Self::rejected(ok, "user not found"));
            }
            LedgerRequest::AddWallet {
                email,
                address,
                response,
            } => {
                let now = self.engine.now();
                let ok = self.repository.add_wallet(&email, &address, now);
                let _ = response.send(Self::rejected(ok, "wallet already exists"));
            }
            LedgerRequest::DeleteWallet {
                email,
                address,
                response,
            } => {
                let ok = self.repository.delete_wallet(&email, &address);
                let _ = response.send(Self::rejected(ok, "wallet not found"));
            }
            LedgerRequest::UpdateBalance {
                email,
                address,
                new_balance,
                response,
            } => {
                let ok = self.repository.update_balance(&email, &address, new_balance);
                let _ = response.send(Self::rejected(ok, "invalid balance update"));
            }
            LedgerRequest::CreateWithdrawal {
                email,
                address,
                response,
            } => {
                let now = self.engine.now();
                let ok = self.repository.create_withdrawal_request(&email, &address, now);
                let _ = response.send(Self::rejected(ok, "nothing to withdraw"));
            }
            LedgerRequest::GetWithdrawals { response } => {
                let _ = response.send(self.repository.withdrawal_requests());
            }
            LedgerRequest::ProcessWithdrawal {
                id,
                status,
                response,
            } => {
                let now = self.engine.now();
                let ok = self.repository.process_withdrawal_request(&id, status, now);
                let _ = response.send(Self::rejected(ok, "request not pending"));
            }
            LedgerRequest::GetEarningsSummary { email, response } => {
                let now = self.engine.now();
                let _ = response.send(self.repository.earnings_summary(&email, now));
            }
            LedgerRequest::GetTopEarners { limit, response } => {
                let _ = response.send(self.repository.top_earners(limit));
            }
            LedgerRequest::GetTopWithdrawers { limit, response } => {
                let _ = response.send(self.repository.top_withdrawers(limit));
            }
            LedgerRequest::GetTopReferrers { limit, response } => {
                let _ = response.send(self.repository.top_referrers(limit));
            }
            LedgerRequest::Tick => {
                self.repository.run_tick(&self.engine);
            }
            LedgerRequest::Flush => {
                if let Err(e) = self.repository.flush() {
                    log::error!("failed to flush ledger snapshot: {e:#}");
                }
            }
        }
    }
}

pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        LedgerService
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service<LedgerRequest, LedgerRequestHandler> for LedgerService {}
