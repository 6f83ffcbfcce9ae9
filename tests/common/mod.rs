#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use pix_gateway::adapters::InMemoryStore;
use pix_gateway::domain::Account;
use pix_gateway::provider::{
    DepositCharge, PaymentProvider, ProviderError, ProviderResponse, WithdrawalTransfer,
};
use pix_gateway::{create_app, AppState};

pub const NOTIFICATION_URL: &str = "https://gateway.test/api/gateway/callback";

/// Scripted provider: answers with a QR payload unless a failure is queued.
#[derive(Default)]
pub struct FakeProvider {
    failure: Mutex<Option<ProviderError>>,
    pub deposits: Mutex<Vec<DepositCharge>>,
    pub withdrawals: Mutex<Vec<WithdrawalTransfer>>,
}

impl FakeProvider {
    pub fn fail_with(&self, err: ProviderError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    fn answer(&self, reference: &str) -> Result<ProviderResponse, ProviderError> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(ProviderResponse {
            id: Some("prov_1".to_string()),
            status: Some("waiting_payment".to_string()),
            payload: json!({
                "id": "prov_1",
                "status": "waiting_payment",
                "external_reference": reference,
                "pix": { "qrcode": "00020126580014br.gov.bcb.pix" }
            }),
        })
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_deposit(
        &self,
        charge: &DepositCharge,
    ) -> Result<ProviderResponse, ProviderError> {
        self.deposits.lock().unwrap().push(charge.clone());
        self.answer(&charge.external_reference)
    }

    async fn create_withdrawal(
        &self,
        transfer: &WithdrawalTransfer,
    ) -> Result<ProviderResponse, ProviderError> {
        self.withdrawals.lock().unwrap().push(transfer.clone());
        self.answer(&transfer.external_reference)
    }
}

pub fn account(id: i64, balance_minor: i64) -> Account {
    Account {
        id,
        phone: format!("+55 (11) 9{:04}-0000", id),
        balance_minor,
        referral_code: format!("REF{}", id),
        invited_by_code: None,
        tier_level: 0,
    }
}

pub struct TestApp {
    pub store: InMemoryStore,
    pub provider: Arc<FakeProvider>,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_secret(None).await
    }

    pub async fn with_secret(webhook_secret: Option<&str>) -> Self {
        let store = InMemoryStore::new();
        let provider = Arc::new(FakeProvider::default());
        let state = AppState::new(
            store.clone(),
            provider.clone(),
            NOTIFICATION_URL.to_string(),
            webhook_secret.map(str::to_string),
        );
        Self {
            store,
            provider,
            state,
        }
    }

    pub fn router(&self) -> Router {
        create_app(self.state.clone())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn deposit(&self, account_id: i64, amount: i64) -> String {
        let (status, body) = self
            .post_json(
                "/api/gateway/deposit",
                json!({ "account_id": account_id, "amount": amount }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "deposit failed: {}", body);
        body["external_reference"].as_str().unwrap().to_string()
    }

    pub async fn callback(&self, external_ref: &str, status: &str) -> (StatusCode, Value) {
        self.post_json(
            "/api/gateway/callback",
            json!({
                "type": "transaction",
                "data": { "externalRef": external_ref, "status": status }
            }),
        )
        .await
    }
}

pub fn callback_body(external_ref: &str, status: &str) -> String {
    json!({
        "type": "transaction",
        "data": { "externalRef": external_ref, "status": status }
    })
    .to_string()
}

/// Hex `HMAC-SHA256(secret, body)`, as the provider signs callbacks.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
