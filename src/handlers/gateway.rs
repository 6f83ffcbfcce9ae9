use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::{AccountId, GatewayError, TransactionStatus};
use crate::error::AppError;
use crate::use_cases::{ReconcileOutcome, WebhookInput};
use crate::validation::{sanitize_string, validate_required};
use crate::webhook_auth::{self, SIGNATURE_HEADER};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    pub account_id: AccountId,
    /// Amount in cents.
    pub amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DepositResponse {
    pub external_reference: String,
    pub status: TransactionStatus,
    pub amount: i64,
    /// Provider presentment data (PIX QR code etc.), passed through unchanged.
    #[schema(value_type = Object)]
    pub payment: serde_json::Value,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    pub account_id: AccountId,
    /// Amount in cents.
    pub amount: i64,
    pub pix_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawResponse {
    pub external_reference: String,
    pub status: TransactionStatus,
    pub amount: i64,
}

/// Provider callback envelope: `{ "type": ..., "data": { "externalRef": ..., "status": ... } }`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CallbackPayload {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    pub data: CallbackData,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CallbackData {
    #[serde(rename = "externalRef", alias = "external_reference", alias = "external_id")]
    pub external_ref: String,
    pub status: String,
}

#[utoipa::path(
    post,
    path = "/api/gateway/deposit",
    request_body = DepositRequest,
    responses(
        (status = 201, description = "Charge created, pending payment", body = DepositResponse),
        (status = 400, description = "Invalid amount"),
        (status = 404, description = "Unknown account"),
        (status = 502, description = "Provider rejected the charge"),
        (status = 503, description = "Payment network unavailable")
    ),
    tag = "Gateway"
)]
pub async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> Result<impl IntoResponse, AppError> {
    let output = state.deposits.execute(req.account_id, req.amount).await?;

    let body = DepositResponse {
        external_reference: output.transaction.external_reference,
        status: output.transaction.status,
        amount: output.transaction.amount_minor,
        payment: output.provider_payload,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    post,
    path = "/api/gateway/withdraw",
    request_body = WithdrawRequest,
    responses(
        (status = 202, description = "Withdrawal submitted, funds locked", body = WithdrawResponse),
        (status = 400, description = "Invalid amount or PIX key"),
        (status = 404, description = "Unknown account"),
        (status = 422, description = "Insufficient balance"),
        (status = 502, description = "Provider rejected the transfer"),
        (status = 503, description = "Payment network unavailable")
    ),
    tag = "Gateway"
)]
pub async fn withdraw(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<impl IntoResponse, AppError> {
    let output = state
        .withdrawals
        .execute(req.account_id, req.amount, &req.pix_key)
        .await?;

    let body = WithdrawResponse {
        external_reference: output.transaction.external_reference,
        status: output.transaction.status,
        amount: output.transaction.amount_minor,
    };
    Ok((StatusCode::ACCEPTED, Json(body)))
}

/// Acknowledges every structurally valid callback with 200; the provider
/// retries anything else.
#[utoipa::path(
    post,
    path = "/api/gateway/callback",
    request_body = CallbackPayload,
    responses(
        (status = 200, description = "Callback acknowledged"),
        (status = 400, description = "Structurally invalid payload"),
        (status = 401, description = "Bad signature"),
        (status = 500, description = "Store unavailable, provider should retry")
    ),
    tag = "Gateway"
)]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();
        if !webhook_auth::verify(secret, &body, signature) {
            return Err(AppError::Unauthorized("Invalid signature".to_string()));
        }
    }

    let payload: CallbackPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid callback payload: {}", e)))?;
    let external_reference = sanitize_string(&payload.data.external_ref);
    validate_required("externalRef", &external_reference)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    tracing::info!(
        external_reference = %external_reference,
        status = %payload.data.status,
        event_type = payload.event_type.as_deref().unwrap_or("-"),
        "Provider callback received"
    );

    let input = WebhookInput {
        external_reference,
        status: payload.data.status,
    };

    let result = match state.reconciler.execute(input).await {
        Ok(ReconcileOutcome::Applied { transaction, .. }) => transaction.status.as_str(),
        Ok(ReconcileOutcome::AlreadyFinal(_)) => "already_processed",
        Ok(ReconcileOutcome::Ignored { .. }) => "ignored",
        Err(GatewayError::TransactionNotFound(reference)) => {
            tracing::warn!(
                target: "reconciliation",
                external_reference = %reference,
                "Callback for unknown transaction acknowledged"
            );
            "unknown_reference"
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "result": result })),
    ))
}
