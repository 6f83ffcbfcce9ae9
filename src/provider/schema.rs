//! Request and response shapes exchanged with the provider.
//!
//! `DepositCharge` and `WithdrawalTransfer` are what the initiators hand to
//! the adapter; the `v1` module is the wire format of the current provider
//! integration.

use serde::Serialize;
use serde_json::Value;

use super::client::ProviderError;
use crate::validation::PixKey;

pub const PAYMENT_TYPE_PIX: &str = "PIX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositCharge {
    pub amount_minor: i64,
    pub external_reference: String,
    pub notification_url: String,
    pub customer_phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalTransfer {
    pub amount_minor: i64,
    pub external_reference: String,
    pub notification_url: String,
    pub customer_phone: String,
    pub pix_key: PixKey,
}

pub mod v1 {
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    pub struct Customer {
        pub phone_number: String,
    }

    /// Body of `POST /transactions`.
    #[derive(Debug, Serialize)]
    pub struct TransactionRequest {
        /// Minor units.
        pub value: i64,
        pub external_reference: String,
        pub notification_url: String,
        pub customer: Customer,
        #[serde(rename = "type")]
        pub payment_type: &'static str,
    }

    /// Body of `POST /transfers`.
    #[derive(Debug, Serialize)]
    pub struct TransferRequest {
        /// Minor units.
        pub value: i64,
        pub external_reference: String,
        pub notification_url: String,
        pub pix_key: String,
        pub pix_key_type: &'static str,
        pub customer: Customer,
        #[serde(rename = "type")]
        pub payment_type: &'static str,
    }
}

impl From<&DepositCharge> for v1::TransactionRequest {
    fn from(charge: &DepositCharge) -> Self {
        Self {
            value: charge.amount_minor,
            external_reference: charge.external_reference.clone(),
            notification_url: charge.notification_url.clone(),
            customer: v1::Customer {
                phone_number: charge.customer_phone.clone(),
            },
            payment_type: PAYMENT_TYPE_PIX,
        }
    }
}

impl From<&WithdrawalTransfer> for v1::TransferRequest {
    fn from(transfer: &WithdrawalTransfer) -> Self {
        Self {
            value: transfer.amount_minor,
            external_reference: transfer.external_reference.clone(),
            notification_url: transfer.notification_url.clone(),
            pix_key: transfer.pix_key.value().to_string(),
            pix_key_type: transfer.pix_key.kind().as_str(),
            customer: v1::Customer {
                phone_number: transfer.customer_phone.clone(),
            },
            payment_type: PAYMENT_TYPE_PIX,
        }
    }
}

/// Successful provider answer. `payload` is the untouched JSON object, handed
/// back to API callers as-is (QR code, copy-paste code, expiry...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResponse {
    pub id: Option<String>,
    pub status: Option<String>,
    pub payload: Value,
}

impl ProviderResponse {
    pub fn from_body(body: &str) -> Result<Self, ProviderError> {
        let payload: Value = serde_json::from_str(body)
            .map_err(|_| ProviderError::ResponseInvalid(body.to_string()))?;
        let object = payload
            .as_object()
            .ok_or_else(|| ProviderError::ResponseInvalid(body.to_string()))?;

        let id = object.get("id").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let status = object
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            id,
            status,
            payload,
        })
    }
}
