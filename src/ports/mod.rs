//! Storage ports consumed by the gateway use cases.
//!
//! Every method that mutates money is atomic on its own: implementations must
//! never expose a read-then-write window to callers.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Account, AccountId, Commission, Transaction, TransactionKind, TransactionStatus,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate external reference: {0}")]
    Duplicate(String),

    #[error("Insufficient balance on account {0}")]
    InsufficientBalance(AccountId),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Balance mutations applied in the same atomic scope as a status transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionEffects {
    /// Credit the transaction amount to its owning account.
    pub credit_owner: bool,
    /// Referral commission, applied in an isolated sub-scope.
    pub commission: Option<Commission>,
}

impl TransitionEffects {
    /// Owner-side balance effect of moving a pending `kind` transaction to `to`.
    ///
    /// Approved deposits credit the depositor. Withdrawals already debited the
    /// account when they were opened, so refusal or cancellation returns the
    /// funds and approval changes nothing.
    pub fn for_transition(kind: TransactionKind, to: TransactionStatus) -> Self {
        let credit_owner = matches!(
            (kind, to),
            (TransactionKind::Deposit, TransactionStatus::Approved)
                | (TransactionKind::Withdrawal, TransactionStatus::Refused)
                | (TransactionKind::Withdrawal, TransactionStatus::Cancelled)
        );
        Self {
            credit_owner,
            commission: None,
        }
    }

    pub fn with_commission(mut self, commission: Option<Commission>) -> Self {
        self.commission = commission;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommissionOutcome {
    NotApplicable,
    Credited(Commission),
    Failed { commission: Commission, reason: String },
    /// The payee or rate could not be resolved; nothing was attempted.
    Unresolved(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// The compare-and-swap won; effects were applied.
    Applied {
        transaction: Transaction,
        commission: CommissionOutcome,
    },
    /// The transaction was no longer in the expected state. Nothing changed.
    Stale(Transaction),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>>;

    async fn find_account_by_referral_code(&self, code: &str) -> StoreResult<Option<Account>>;

    /// Commission percentage configured for a tier, `None` when the tier has no rate.
    async fn find_tier_rate(&self, tier_level: i32) -> StoreResult<Option<i32>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a pending entry. Fails with `Duplicate` if the reference exists.
    async fn create_transaction(&self, tx: &Transaction) -> StoreResult<Transaction>;

    /// Debits the owner by `tx.amount_minor` only if the balance covers it, and
    /// inserts the pending withdrawal, as one atomic step.
    async fn reserve_withdrawal(&self, tx: &Transaction) -> StoreResult<Transaction>;

    async fn find_by_external_reference(
        &self,
        external_reference: &str,
    ) -> StoreResult<Option<Transaction>>;

    async fn list_for_account(
        &self,
        account_id: AccountId,
        kind: Option<TransactionKind>,
    ) -> StoreResult<Vec<Transaction>>;

    /// Moves `external_reference` from `from` to `to` and applies `effects`,
    /// all or nothing. A commission failure only rolls back the commission.
    async fn transition(
        &self,
        external_reference: &str,
        from: TransactionStatus,
        to: TransactionStatus,
        provider_status: Option<&str>,
        effects: TransitionEffects,
    ) -> StoreResult<TransitionResult>;

    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effects_for_transitions() {
        use TransactionKind::*;
        use TransactionStatus::*;

        assert!(TransitionEffects::for_transition(Deposit, Approved).credit_owner);
        assert!(!TransitionEffects::for_transition(Deposit, Refused).credit_owner);
        assert!(!TransitionEffects::for_transition(Deposit, Cancelled).credit_owner);
        assert!(!TransitionEffects::for_transition(Withdrawal, Approved).credit_owner);
        assert!(TransitionEffects::for_transition(Withdrawal, Refused).credit_owner);
        assert!(TransitionEffects::for_transition(Withdrawal, Cancelled).credit_owner);
    }
}
