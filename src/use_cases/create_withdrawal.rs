//! Withdrawal initiator.
//! Funds are locked (debited) before the provider is called and returned if
//! the transfer never leaves the system.

use std::sync::Arc;

use crate::domain::{
    AccountId, ExternalReference, GatewayError, Transaction, TransactionKind, TransactionStatus,
};
use crate::ports::{AccountStore, LedgerStore, StoreError, TransitionEffects, TransitionResult};
use crate::provider::{PaymentProvider, ProviderError, WithdrawalTransfer};
use crate::validation::{parse_pix_key, validate_positive_amount};

use super::report_anomaly;

#[derive(Debug)]
pub struct WithdrawalOutput {
    pub transaction: Transaction,
    pub provider_payload: Option<serde_json::Value>,
}

pub struct CreateWithdrawal {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerStore>,
    provider: Arc<dyn PaymentProvider>,
    notification_url: String,
}

impl CreateWithdrawal {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn LedgerStore>,
        provider: Arc<dyn PaymentProvider>,
        notification_url: String,
    ) -> Self {
        Self {
            accounts,
            ledger,
            provider,
            notification_url,
        }
    }

    pub async fn execute(
        &self,
        account_id: AccountId,
        amount_minor: i64,
        pix_key: &str,
    ) -> Result<WithdrawalOutput, GatewayError> {
        validate_positive_amount(amount_minor)?;
        let pix_key = parse_pix_key(pix_key)?;

        let account = self
            .accounts
            .find_account(account_id)
            .await?
            .ok_or(GatewayError::AccountNotFound(account_id))?;

        let reference = ExternalReference::generate(TransactionKind::Withdrawal);
        let pending = Transaction::new_pending(
            reference,
            account_id,
            TransactionKind::Withdrawal,
            amount_minor,
        );

        let transaction = self
            .ledger
            .reserve_withdrawal(&pending)
            .await
            .map_err(|e| match e {
                StoreError::InsufficientBalance(_) => GatewayError::InsufficientBalance,
                StoreError::NotFound(_) => GatewayError::AccountNotFound(account_id),
                other => GatewayError::Store(other),
            })?;

        let transfer = WithdrawalTransfer {
            amount_minor,
            external_reference: transaction.external_reference.clone(),
            notification_url: self.notification_url.clone(),
            customer_phone: account.phone_digits(),
            pix_key,
        };

        match self.provider.create_withdrawal(&transfer).await {
            Ok(response) => {
                tracing::info!(
                    external_reference = %transaction.external_reference,
                    account_id,
                    amount_minor,
                    "Withdrawal submitted"
                );
                Ok(WithdrawalOutput {
                    transaction,
                    provider_payload: Some(response.payload),
                })
            }
            Err(ProviderError::ResponseInvalid(raw)) => {
                // A 2xx came back, so the transfer may be in flight. Keep the
                // funds locked and let the webhook settle it.
                report_anomaly(
                    &transaction.external_reference,
                    account_id,
                    amount_minor,
                    format!("withdrawal accepted with unreadable response: {}", raw),
                );
                Ok(WithdrawalOutput {
                    transaction,
                    provider_payload: None,
                })
            }
            Err(err) => {
                self.cancel(&transaction).await?;
                Err(err.into())
            }
        }
    }

    /// Compensation: Pending -> Cancelled plus the credit back, atomically.
    async fn cancel(&self, transaction: &Transaction) -> Result<(), GatewayError> {
        let effects = TransitionEffects::for_transition(
            TransactionKind::Withdrawal,
            TransactionStatus::Cancelled,
        );
        let result = self
            .ledger
            .transition(
                &transaction.external_reference,
                TransactionStatus::Pending,
                TransactionStatus::Cancelled,
                None,
                effects,
            )
            .await;

        match result {
            Ok(TransitionResult::Applied { .. }) => {
                tracing::info!(
                    external_reference = %transaction.external_reference,
                    account_id = transaction.account_id,
                    "Withdrawal cancelled, funds returned"
                );
                Ok(())
            }
            Ok(TransitionResult::Stale(current)) => {
                tracing::warn!(
                    external_reference = %current.external_reference,
                    status = %current.status,
                    "Withdrawal settled before it could be cancelled"
                );
                Ok(())
            }
            Err(e) => Err(report_anomaly(
                &transaction.external_reference,
                transaction.account_id,
                transaction.amount_minor,
                format!("provider call failed and compensation failed: {}", e),
            )),
        }
    }
}
