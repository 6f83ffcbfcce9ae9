use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::GatewayError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Payment network unavailable, try again later")]
    ProviderUnavailable(String),

    #[error("Payment provider error: {0}")]
    BadGateway(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Stable machine-readable code for clients.
    fn code(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::Validation(_) | AppError::BadRequest(_) => "invalid_request",
            AppError::NotFound(_) => "not_found",
            AppError::InsufficientBalance => "insufficient_balance",
            AppError::ProviderUnavailable(_) | AppError::BadGateway(_) => "provider_unavailable",
            AppError::Unauthorized(_) => "unauthorized",
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Validation(msg) => AppError::Validation(msg),
            GatewayError::AccountNotFound(id) => AppError::NotFound(format!("Account {} not found", id)),
            GatewayError::InsufficientBalance => AppError::InsufficientBalance,
            GatewayError::ProviderUnavailable(reason) => AppError::ProviderUnavailable(reason),
            GatewayError::ProviderRejected { status, .. } => {
                AppError::BadGateway(format!("payment provider rejected the request (HTTP {})", status))
            }
            GatewayError::ProviderResponseInvalid(_) => {
                AppError::BadGateway("payment provider returned an invalid response".to_string())
            }
            GatewayError::TransactionNotFound(r) => AppError::NotFound(format!("Transaction {} not found", r)),
            e @ GatewayError::ReconciliationAnomaly { .. } => AppError::Internal(e.to_string()),
            GatewayError::Store(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_error_is_internal() {
        let error = AppError::from(GatewayError::Store(crate::ports::StoreError::Unavailable(
            "pool timed out".to_string(),
        )));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthorized_error_status_code() {
        let error = AppError::Unauthorized("bad signature".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_gateway_errors_are_distinguishable() {
        let invalid = AppError::from(GatewayError::Validation("amount".to_string()));
        let broke = AppError::from(GatewayError::InsufficientBalance);
        let down = AppError::from(GatewayError::ProviderUnavailable("timeout".to_string()));
        let rejected = AppError::from(GatewayError::ProviderRejected {
            status: 400,
            body: "{}".to_string(),
        });

        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code(), "invalid_request");
        assert_eq!(broke.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(broke.code(), "insufficient_balance");
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.code(), "provider_unavailable");
        assert_eq!(rejected.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_account_not_found_maps_to_404() {
        let error = AppError::from(GatewayError::AccountNotFound(7));
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_string(), "Not found: Account 7 not found");
    }

    #[tokio::test]
    async fn test_insufficient_balance_response() {
        let response = AppError::InsufficientBalance.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
