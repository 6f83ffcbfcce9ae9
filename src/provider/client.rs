use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use super::schema::{v1, DepositCharge, ProviderResponse, WithdrawalTransfer};
use super::PaymentProvider;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),
    #[error("Payment provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid response from payment provider: {0}")]
    ResponseInvalid(String),
}

/// Everything the adapter needs, passed explicitly instead of read from a
/// process-wide client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            secret_key: secret_key.into(),
            timeout: Duration::from_secs(30),
            failure_threshold: 5,
            reset_timeout_secs: 30,
        }
    }
}

/// `Basic base64(secret_key + ":x")`
pub fn basic_auth_header(secret_key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:x", secret_key)))
}

fn is_outage(err: &ProviderError) -> bool {
    matches!(err, ProviderError::Unavailable(_))
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Unavailable("request timed out".to_string())
    } else if err.is_connect() {
        ProviderError::Unavailable(format!("connection failed: {}", err))
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

/// HTTP client for the PIX provider's transactions and transfers API
#[derive(Clone)]
pub struct PixProviderClient {
    client: Client,
    base_url: String,
    auth_header: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl PixProviderClient {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(config.reset_timeout_secs),
            Duration::from_secs(config.reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(config.failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        PixProviderClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: basic_auth_header(&config.secret_key),
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self
            .client
            .post(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(CONTENT_TYPE, "application/json")
            .json(body);

        tracing::debug!(url = %url, "Calling payment provider");

        // Only outages count towards opening the breaker; a 4xx is the
        // provider answering.
        let result = self
            .circuit_breaker
            .call_with(is_outage, async move {
                let response = request.send().await.map_err(classify_transport)?;
                let status = response.status();
                let text = response.text().await.map_err(classify_transport)?;

                if !status.is_success() {
                    return Err(ProviderError::Rejected {
                        status: status.as_u16(),
                        body: text,
                    });
                }

                ProviderResponse::from_body(&text)
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(FailsafeError::Rejected) => Err(ProviderError::Unavailable(
                "payment provider circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => {
                tracing::warn!(url = %url, error = %e, "Payment provider call failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PaymentProvider for PixProviderClient {
    async fn create_deposit(
        &self,
        charge: &DepositCharge,
    ) -> Result<ProviderResponse, ProviderError> {
        self.post("/transactions", &v1::TransactionRequest::from(charge))
            .await
    }

    async fn create_withdrawal(
        &self,
        transfer: &WithdrawalTransfer,
    ) -> Result<ProviderResponse, ProviderError> {
        self.post("/transfers", &v1::TransferRequest::from(transfer))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::parse_pix_key;

    fn charge() -> DepositCharge {
        DepositCharge {
            amount_minor: 5000,
            external_reference: "DEP-01HZX".to_string(),
            notification_url: "https://app.example/api/gateway/callback".to_string(),
            customer_phone: "11987654321".to_string(),
        }
    }

    fn config(base_url: String) -> ProviderConfig {
        ProviderConfig::new(base_url, "sk_test")
    }

    #[test]
    fn test_basic_auth_header() {
        // base64("sk_test:x")
        assert_eq!(basic_auth_header("sk_test"), "Basic c2tfdGVzdDp4");
    }

    #[test]
    fn test_client_creation_trims_base_url() {
        let client = PixProviderClient::new(&config("https://api.provider.test/v1/".to_string()));
        assert_eq!(client.base_url, "https://api.provider.test/v1");
        assert_eq!(client.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_create_deposit_sends_signed_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transactions")
            .match_header("authorization", "Basic c2tfdGVzdDp4")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "value": 5000,
                "external_reference": "DEP-01HZX",
                "type": "PIX",
                "customer": { "phone_number": "11987654321" }
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"tx_1","status":"waiting_payment","pix":{"qrcode":"000201"}}"#)
            .create_async()
            .await;

        let client = PixProviderClient::new(&config(server.url()));
        let response = client.create_deposit(&charge()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.id.as_deref(), Some("tx_1"));
        assert_eq!(response.payload["pix"]["qrcode"], "000201");
    }

    #[tokio::test]
    async fn test_non_2xx_is_rejected_with_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/transactions")
            .with_status(422)
            .with_body(r#"{"error":"invalid phone"}"#)
            .create_async()
            .await;

        let client = PixProviderClient::new(&config(server.url()));
        let result = client.create_deposit(&charge()).await;

        assert_eq!(
            result,
            Err(ProviderError::Rejected {
                status: 422,
                body: r#"{"error":"invalid phone"}"#.to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_not_swallowed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/transfers")
            .with_status(200)
            .with_body("OK")
            .create_async()
            .await;

        let client = PixProviderClient::new(&config(server.url()));
        let transfer = WithdrawalTransfer {
            amount_minor: 300,
            external_reference: "WD-01HZX".to_string(),
            notification_url: "https://app.example/api/gateway/callback".to_string(),
            customer_phone: "11987654321".to_string(),
            pix_key: parse_pix_key("12345678909").unwrap(),
        };
        let result = client.create_withdrawal(&transfer).await;

        assert_eq!(result, Err(ProviderError::ResponseInvalid("OK".to_string())));
    }

    #[tokio::test]
    async fn test_connection_failure_is_unavailable() {
        // Nothing listens on port 1.
        let client = PixProviderClient::new(&config("http://127.0.0.1:1".to_string()));
        let result = client.create_deposit(&charge()).await;

        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_outages() {
        let mut cfg = config("http://127.0.0.1:1".to_string());
        cfg.failure_threshold = 2;
        cfg.reset_timeout_secs = 60;
        let client = PixProviderClient::new(&cfg);

        for _ in 0..2 {
            let _ = client.create_deposit(&charge()).await;
        }

        assert_eq!(client.circuit_state(), "open");
        let result = client.create_deposit(&charge()).await;
        assert_eq!(
            result,
            Err(ProviderError::Unavailable(
                "payment provider circuit breaker is open".to_string()
            ))
        );
    }
}
