//! Deposit initiator.
//! Charges the provider first and records the pending entry only after the
//! provider accepted the charge. A 2xx the adapter cannot read still means the
//! charge may exist, so the pending entry is recorded for the webhook to settle.

use std::sync::Arc;

use crate::domain::{
    AccountId, ExternalReference, GatewayError, Transaction, TransactionKind,
};
use crate::ports::{AccountStore, LedgerStore};
use crate::provider::{DepositCharge, PaymentProvider, ProviderError};
use crate::validation::validate_positive_amount;

use super::report_anomaly;

#[derive(Debug)]
pub struct DepositOutput {
    pub transaction: Transaction,
    /// Provider presentment data (QR code etc.), unchanged.
    pub provider_payload: serde_json::Value,
}

pub struct CreateDeposit {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerStore>,
    provider: Arc<dyn PaymentProvider>,
    notification_url: String,
}

impl CreateDeposit {
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
    ) -> Result<DepositOutput, GatewayError> {
        validate_positive_amount(amount_minor)?;

        let account = self
            .accounts
            .find_account(account_id)
            .await?
            .ok_or(GatewayError::AccountNotFound(account_id))?;

        let reference = ExternalReference::generate(TransactionKind::Deposit);
        let charge = DepositCharge {
            amount_minor,
            external_reference: reference.to_string(),
            notification_url: self.notification_url.clone(),
            customer_phone: account.phone_digits(),
        };

        let pending =
            Transaction::new_pending(reference, account_id, TransactionKind::Deposit, amount_minor);

        let response = match self.provider.create_deposit(&charge).await {
            Ok(response) => response,
            Err(ProviderError::ResponseInvalid(raw)) => {
                return Err(self.record_unreadable_charge(&pending, raw).await);
            }
            Err(e) => return Err(e.into()),
        };

        let transaction = match self.ledger.create_transaction(&pending).await {
            Ok(saved) => saved,
            Err(e) => {
                // The charge exists at the provider but not here.
                return Err(report_anomaly(
                    &pending.external_reference,
                    account_id,
                    amount_minor,
                    format!(
                        "deposit accepted by provider (id {:?}) but ledger write failed: {}",
                        response.id, e
                    ),
                ));
            }
        };

        tracing::info!(
            external_reference = %transaction.external_reference,
            account_id,
            amount_minor,
            "Deposit created"
        );

        Ok(DepositOutput {
            transaction,
            provider_payload: response.payload,
        })
    }

    /// Keeps the pending entry so a later `paid` callback still credits the
    /// account, and flags the charge for manual follow-up. The caller gets no
    /// payment data, so the request itself still fails.
    async fn record_unreadable_charge(&self, pending: &Transaction, raw: String) -> GatewayError {
        let reason = match self.ledger.create_transaction(pending).await {
            Ok(_) => format!("deposit accepted with unreadable response: {}", raw),
            Err(e) => {
                return report_anomaly(
                    &pending.external_reference,
                    pending.account_id,
                    pending.amount_minor,
                    format!(
                        "deposit accepted with unreadable response and ledger write failed: {}",
                        e
                    ),
                );
            }
        };
        report_anomaly(
            &pending.external_reference,
            pending.account_id,
            pending.amount_minor,
            reason,
        );
        GatewayError::ProviderResponseInvalid(raw)
    }
}
