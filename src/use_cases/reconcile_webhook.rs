//! Webhook reconciler.
//!
//! Maps provider callbacks to ledger transitions. Providers retry deliveries,
//! so the same callback may arrive any number of times, concurrently; the
//! ledger's compare-and-swap makes only one of them apply the money movement.

use std::sync::Arc;

use crate::domain::{
    Commission, GatewayError, ProviderStatus, Transaction, TransactionKind, TransactionStatus,
};
use crate::ports::{
    AccountStore, CommissionOutcome, LedgerStore, TransitionEffects, TransitionResult,
};
use crate::services::CommissionCalculator;

use super::report_anomaly;

#[derive(Debug, Clone)]
pub struct WebhookInput {
    pub external_reference: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This delivery moved the transaction to a terminal state.
    Applied {
        transaction: Transaction,
        commission: CommissionOutcome,
    },
    /// The transaction was already terminal; nothing changed.
    AlreadyFinal(Transaction),
    /// Waiting or unrecognized status; nothing changed.
    Ignored { status: String },
}

pub struct ReconcileWebhook {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerStore>,
    commission: CommissionCalculator,
}

impl ReconcileWebhook {
    pub fn new(accounts: Arc<dyn AccountStore>, ledger: Arc<dyn LedgerStore>) -> Self {
        let commission = CommissionCalculator::new(accounts.clone());
        Self {
            accounts,
            ledger,
            commission,
        }
    }

    pub async fn execute(&self, input: WebhookInput) -> Result<ReconcileOutcome, GatewayError> {
        let transaction = self
            .ledger
            .find_by_external_reference(&input.external_reference)
            .await?
            .ok_or_else(|| GatewayError::TransactionNotFound(input.external_reference.clone()))?;

        let provider_status = ProviderStatus::parse(&input.status);
        let Some(target) = provider_status.target_status() else {
            if let ProviderStatus::Unrecognized(raw) = &provider_status {
                tracing::warn!(
                    external_reference = %input.external_reference,
                    status = %raw,
                    "Unrecognized provider status, ignoring"
                );
            }
            return Ok(ReconcileOutcome::Ignored {
                status: input.status,
            });
        };

        if transaction.status.is_terminal() {
            self.check_final_agrees(&transaction, target);
            return Ok(ReconcileOutcome::AlreadyFinal(transaction));
        }

        let mut effects = TransitionEffects::for_transition(transaction.kind, target);
        let mut unresolved = None;
        if transaction.kind == TransactionKind::Deposit && target == TransactionStatus::Approved {
            match self.resolve_commission(&transaction).await {
                Ok(commission) => effects = effects.with_commission(commission),
                Err(reason) => unresolved = Some(reason),
            }
        }

        let result = self
            .ledger
            .transition(
                &transaction.external_reference,
                TransactionStatus::Pending,
                target,
                Some(&input.status),
                effects,
            )
            .await?;

        match result {
            TransitionResult::Applied {
                transaction,
                commission,
            } => {
                let commission = match (commission, unresolved) {
                    (CommissionOutcome::NotApplicable, Some(reason)) => {
                        CommissionOutcome::Unresolved(reason)
                    }
                    (outcome, _) => outcome,
                };
                log_commission(&transaction, &commission);
                tracing::info!(
                    external_reference = %transaction.external_reference,
                    account_id = transaction.account_id,
                    kind = %transaction.kind,
                    status = %transaction.status,
                    amount_minor = transaction.amount_minor,
                    "Transaction reconciled"
                );
                Ok(ReconcileOutcome::Applied {
                    transaction,
                    commission,
                })
            }
            TransitionResult::Stale(current) => {
                // A concurrent delivery won the swap.
                self.check_final_agrees(&current, target);
                Ok(ReconcileOutcome::AlreadyFinal(current))
            }
        }
    }

    async fn resolve_commission(
        &self,
        transaction: &Transaction,
    ) -> Result<Option<Commission>, String> {
        let depositor = self
            .accounts
            .find_account(transaction.account_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("depositor {} not found", transaction.account_id))?;

        self.commission
            .compute(&depositor, transaction.amount_minor)
            .await
            .map_err(|e| e.to_string())
    }

    /// A terminal transaction receiving a contradicting status means money
    /// moved differently at the provider than in the ledger.
    fn check_final_agrees(&self, transaction: &Transaction, reported: TransactionStatus) {
        let agrees = match transaction.status {
            TransactionStatus::Approved => reported == TransactionStatus::Approved,
            TransactionStatus::Refused | TransactionStatus::Cancelled => {
                reported == TransactionStatus::Refused
            }
            TransactionStatus::Pending => true,
        };

        if agrees {
            tracing::debug!(
                external_reference = %transaction.external_reference,
                status = %transaction.status,
                "Duplicate callback for settled transaction"
            );
        } else {
            report_anomaly(
                &transaction.external_reference,
                transaction.account_id,
                transaction.amount_minor,
                format!(
                    "provider reported {} for a transaction already {}",
                    reported, transaction.status
                ),
            );
        }
    }
}

fn log_commission(transaction: &Transaction, commission: &CommissionOutcome) {
    match commission {
        CommissionOutcome::Credited(c) => tracing::info!(
            external_reference = %transaction.external_reference,
            payee_account_id = c.payee_account_id,
            amount_minor = c.amount_minor,
            "Referral commission credited"
        ),
        CommissionOutcome::Failed { commission, reason } => tracing::error!(
            external_reference = %transaction.external_reference,
            payee_account_id = commission.payee_account_id,
            amount_minor = commission.amount_minor,
            reason = %reason,
            "Referral commission failed, deposit credit kept"
        ),
        CommissionOutcome::Unresolved(reason) => tracing::error!(
            external_reference = %transaction.external_reference,
            reason = %reason,
            "Referral commission could not be resolved, deposit credit kept"
        ),
        CommissionOutcome::NotApplicable => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::{Account, ExternalReference};

    async fn setup() -> (InMemoryStore, ReconcileWebhook) {
        let store = InMemoryStore::new();
        store
            .insert_account(Account {
                id: 1,
                phone: "11999990000".to_string(),
                balance_minor: 1000,
                referral_code: "ONE".to_string(),
                invited_by_code: None,
                tier_level: 0,
            })
            .await;
        let shared = Arc::new(store.clone());
        let reconciler = ReconcileWebhook::new(shared.clone(), shared);
        (store, reconciler)
    }

    async fn pending(store: &InMemoryStore, kind: TransactionKind, amount: i64) -> Transaction {
        let tx = Transaction::new_pending(ExternalReference::generate(kind), 1, kind, amount);
        store.create_transaction(&tx).await.unwrap()
    }

    fn input(tx: &Transaction, status: &str) -> WebhookInput {
        WebhookInput {
            external_reference: tx.external_reference.clone(),
            status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_waiting_status_is_a_no_op() {
        let (store, reconciler) = setup().await;
        let tx = pending(&store, TransactionKind::Deposit, 500).await;

        let outcome = reconciler.execute(input(&tx, "waiting_payment")).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));
        assert_eq!(store.balance_of(1).await, Some(1000));
    }

    #[tokio::test]
    async fn test_unrecognized_status_is_a_no_op() {
        let (store, reconciler) = setup().await;
        let tx = pending(&store, TransactionKind::Deposit, 500).await;

        let outcome = reconciler.execute(input(&tx, "in_review")).await.unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored {
                status: "in_review".to_string()
            }
        );
        let stored = store
            .find_by_external_reference(&tx.external_reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_refused_deposit_changes_no_balance() {
        let (store, reconciler) = setup().await;
        let tx = pending(&store, TransactionKind::Deposit, 500).await;

        let outcome = reconciler.execute(input(&tx, "chargeback")).await.unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Applied { ref transaction, .. } if transaction.status == TransactionStatus::Refused
        ));
        assert_eq!(store.balance_of(1).await, Some(1000));
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_found() {
        let (_store, reconciler) = setup().await;

        let result = reconciler
            .execute(WebhookInput {
                external_reference: "DEP-UNKNOWN".to_string(),
                status: "paid".to_string(),
            })
            .await;

        assert!(matches!(result, Err(GatewayError::TransactionNotFound(r)) if r == "DEP-UNKNOWN"));
    }

    #[tokio::test]
    async fn test_approval_after_refusal_is_absorbed() {
        let (store, reconciler) = setup().await;
        let tx = pending(&store, TransactionKind::Deposit, 500).await;

        reconciler.execute(input(&tx, "refused")).await.unwrap();
        let outcome = reconciler.execute(input(&tx, "paid")).await.unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::AlreadyFinal(ref t) if t.status == TransactionStatus::Refused
        ));
        assert_eq!(store.balance_of(1).await, Some(1000));
    }
}
