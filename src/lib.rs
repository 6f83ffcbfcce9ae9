pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod ports;
pub mod provider;
pub mod services;
pub mod startup;
pub mod use_cases;
pub mod validation;
pub mod webhook_auth;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

use crate::ports::{AccountStore, LedgerStore};
use crate::provider::PaymentProvider;
use crate::use_cases::{CreateDeposit, CreateWithdrawal, ReconcileWebhook};

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub deposits: Arc<CreateDeposit>,
    pub withdrawals: Arc<CreateWithdrawal>,
    pub reconciler: Arc<ReconcileWebhook>,
    pub webhook_secret: Option<String>,
}

impl AppState {
    /// Wires the use cases over one store implementing both ports.
    pub fn new<S>(
        store: S,
        provider: Arc<dyn PaymentProvider>,
        notification_url: String,
        webhook_secret: Option<String>,
    ) -> Self
    where
        S: AccountStore + LedgerStore + Clone + 'static,
    {
        let accounts: Arc<dyn AccountStore> = Arc::new(store.clone());
        let ledger: Arc<dyn LedgerStore> = Arc::new(store);

        Self {
            deposits: Arc::new(CreateDeposit::new(
                accounts.clone(),
                ledger.clone(),
                provider.clone(),
                notification_url.clone(),
            )),
            withdrawals: Arc::new(CreateWithdrawal::new(
                accounts.clone(),
                ledger.clone(),
                provider,
                notification_url,
            )),
            reconciler: Arc::new(ReconcileWebhook::new(accounts.clone(), ledger.clone())),
            accounts,
            ledger,
            webhook_secret,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/gateway/deposit", post(handlers::gateway::deposit))
        .route("/api/gateway/withdraw", post(handlers::gateway::withdraw))
        .route(config::CALLBACK_PATH, post(handlers::gateway::callback))
        .route(
            "/api/gateway/accounts/:account_id/balance",
            get(handlers::accounts::balance),
        )
        .route(
            "/api/gateway/accounts/:account_id/transactions",
            get(handlers::accounts::list_transactions),
        )
        .route(
            "/api/gateway/transactions/:external_reference",
            get(handlers::accounts::get_transaction),
        )
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(openapi::ApiDoc::openapi()) }),
        )
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
