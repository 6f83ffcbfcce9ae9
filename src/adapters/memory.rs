//! In-memory implementation of the storage ports.
//!
//! A single mutex guards accounts and ledger together, so every port call is
//! atomic with respect to every other. Used by tests and local runs without
//! Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, Commission, Transaction, TransactionKind, TransactionStatus,
};
use crate::ports::{
    AccountStore, CommissionOutcome, LedgerStore, StoreError, StoreResult, TransitionEffects,
    TransitionResult,
};

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<AccountId, Account>,
    tiers: HashMap<i32, Option<i32>>,
    transactions: HashMap<String, Transaction>,
    commissions: HashMap<Uuid, Commission>,
    reject_writes: bool,
}

impl MemoryState {
    fn check_writable(&self) -> StoreResult<()> {
        if self.reject_writes {
            return Err(StoreError::Unavailable("writes are rejected".to_string()));
        }
        Ok(())
    }

    fn check_new_reference(&self, tx: &Transaction) -> StoreResult<()> {
        if self.transactions.contains_key(&tx.external_reference) {
            return Err(StoreError::Duplicate(tx.external_reference.clone()));
        }
        Ok(())
    }

    fn try_commission(&mut self, transaction_id: Uuid, commission: Commission) -> CommissionOutcome {
        if self.commissions.contains_key(&transaction_id) {
            return CommissionOutcome::Failed {
                commission,
                reason: "commission already recorded for transaction".to_string(),
            };
        }

        let Some(payee) = self.accounts.get_mut(&commission.payee_account_id) else {
            return CommissionOutcome::Failed {
                commission,
                reason: format!("payee account {} not found", commission.payee_account_id),
            };
        };

        match payee.balance_minor.checked_add(commission.amount_minor) {
            Some(balance) => {
                payee.balance_minor = balance;
                self.commissions.insert(transaction_id, commission);
                CommissionOutcome::Credited(commission)
            }
            None => CommissionOutcome::Failed {
                commission,
                reason: "payee balance overflow".to_string(),
            },
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_account(&self, account: Account) {
        self.state.lock().await.accounts.insert(account.id, account);
    }

    pub async fn set_tier_rate(&self, tier_level: i32, commission_percent: Option<i32>) {
        self.state
            .lock()
            .await
            .tiers
            .insert(tier_level, commission_percent);
    }

    pub async fn balance_of(&self, id: AccountId) -> Option<i64> {
        self.state
            .lock()
            .await
            .accounts
            .get(&id)
            .map(|a| a.balance_minor)
    }

    pub async fn commission_for(&self, transaction_id: Uuid) -> Option<Commission> {
        self.state
            .lock()
            .await
            .commissions
            .get(&transaction_id)
            .copied()
    }

    /// Makes every subsequent ledger write fail with `StoreError::Unavailable`.
    pub async fn reject_writes(&self, reject: bool) {
        self.state.lock().await.reject_writes = reject;
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_referral_code(&self, code: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .state
            .lock()
            .await
            .accounts
            .values()
            .find(|a| a.referral_code == code)
            .cloned())
    }

    async fn find_tier_rate(&self, tier_level: i32) -> StoreResult<Option<i32>> {
        Ok(self
            .state
            .lock()
            .await
            .tiers
            .get(&tier_level)
            .copied()
            .flatten())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn create_transaction(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.check_new_reference(tx)?;
        state
            .transactions
            .insert(tx.external_reference.clone(), tx.clone());
        Ok(tx.clone())
    }

    async fn reserve_withdrawal(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.check_new_reference(tx)?;

        let account = state
            .accounts
            .get_mut(&tx.account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", tx.account_id)))?;
        if account.balance_minor < tx.amount_minor {
            return Err(StoreError::InsufficientBalance(tx.account_id));
        }
        account.balance_minor -= tx.amount_minor;

        state
            .transactions
            .insert(tx.external_reference.clone(), tx.clone());
        Ok(tx.clone())
    }

    async fn find_by_external_reference(
        &self,
        external_reference: &str,
    ) -> StoreResult<Option<Transaction>> {
        Ok(self
            .state
            .lock()
            .await
            .transactions
            .get(external_reference)
            .cloned())
    }

    async fn list_for_account(
        &self,
        account_id: AccountId,
        kind: Option<TransactionKind>,
    ) -> StoreResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.account_id == account_id)
            .filter(|t| kind.map_or(true, |k| t.kind == k))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn transition(
        &self,
        external_reference: &str,
        from: TransactionStatus,
        to: TransactionStatus,
        provider_status: Option<&str>,
        effects: TransitionEffects,
    ) -> StoreResult<TransitionResult> {
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }
        let mut state = self.state.lock().await;
        state.check_writable()?;

        let current = state
            .transactions
            .get(external_reference)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(external_reference.to_string()))?;
        if current.status != from {
            return Ok(TransitionResult::Stale(current));
        }

        // Validate the owner credit before mutating anything.
        let owner_balance = if effects.credit_owner {
            let owner = state.accounts.get(&current.account_id).ok_or_else(|| {
                StoreError::NotFound(format!("account {}", current.account_id))
            })?;
            let balance = owner
                .balance_minor
                .checked_add(current.amount_minor)
                .ok_or_else(|| StoreError::Corrupt("balance overflow".to_string()))?;
            Some(balance)
        } else {
            None
        };

        if let Some(balance) = owner_balance {
            if let Some(owner) = state.accounts.get_mut(&current.account_id) {
                owner.balance_minor = balance;
            }
        }

        let mut updated = current;
        updated.status = to;
        if let Some(raw) = provider_status {
            updated.provider_status = Some(raw.to_string());
        }
        updated.status_updated_at = Utc::now();
        state
            .transactions
            .insert(updated.external_reference.clone(), updated.clone());

        let commission = match effects.commission {
            Some(c) => state.try_commission(updated.id, c),
            None => CommissionOutcome::NotApplicable,
        };

        Ok(TransitionResult::Applied {
            transaction: updated,
            commission,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
