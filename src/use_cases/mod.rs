//! Application use cases: the two initiators and the webhook reconciler.

pub mod create_deposit;
pub mod create_withdrawal;
pub mod reconcile_webhook;

pub use create_deposit::{CreateDeposit, DepositOutput};
pub use create_withdrawal::{CreateWithdrawal, WithdrawalOutput};
pub use reconcile_webhook::{ReconcileOutcome, ReconcileWebhook, WebhookInput};

use crate::domain::{AccountId, GatewayError};

/// Logs a state divergence between the provider and the local ledger on the
/// `reconciliation` target, which operators alert on.
pub(crate) fn report_anomaly(
    external_reference: &str,
    account_id: AccountId,
    amount_minor: i64,
    reason: impl Into<String>,
) -> GatewayError {
    let reason = reason.into();
    tracing::error!(
        target: "reconciliation",
        external_reference = %external_reference,
        account_id,
        amount_minor,
        reason = %reason,
        "Reconciliation required"
    );
    GatewayError::ReconciliationAnomaly {
        external_reference: external_reference.to_string(),
        reason,
    }
}
