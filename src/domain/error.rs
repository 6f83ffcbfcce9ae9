//! Error taxonomy of the gateway core.

use thiserror::Error;

use super::account::AccountId;
use crate::ports::StoreError;
use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Payment network unavailable, try again later: {0}")]
    ProviderUnavailable(String),

    #[error("Payment provider rejected the request (HTTP {status})")]
    ProviderRejected { status: u16, body: String },

    #[error("Payment provider returned an invalid response")]
    ProviderResponseInvalid(String),

    #[error("Transaction {0} not found")]
    TransactionNotFound(String),

    #[error("Reconciliation required for {external_reference}: {reason}")]
    ReconciliationAnomaly {
        external_reference: String,
        reason: String,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(reason) => GatewayError::ProviderUnavailable(reason),
            ProviderError::Rejected { status, body } => {
                GatewayError::ProviderRejected { status, body }
            }
            ProviderError::ResponseInvalid(raw) => GatewayError::ProviderResponseInvalid(raw),
        }
    }
}

/// Non-fatal failure while crediting referral commission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommissionError {
    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Commission overflow for amount {0}")]
    Overflow(i64),

    #[error("Credit failed: {0}")]
    Credit(String),
}

impl From<crate::validation::ValidationError> for GatewayError {
    fn from(err: crate::validation::ValidationError) -> Self {
        GatewayError::Validation(err.to_string())
    }
}
