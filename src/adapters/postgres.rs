//! Postgres implementation of the storage ports.
//!
//! Status transitions are a compare-and-swap on `transactions.status`; the
//! balance effects run inside the same database transaction. Commission is
//! applied under a savepoint so its failure cannot undo the deposit credit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, Commission, Transaction, TransactionKind, TransactionStatus,
};
use crate::ports::{
    AccountStore, CommissionOutcome, LedgerStore, StoreError, StoreResult, TransitionEffects,
    TransitionResult,
};

const TRANSACTION_COLUMNS: &str = "id, external_reference, account_id, kind, amount_minor, \
     status, provider_status, created_at, status_updated_at";

/// Postgres-backed account and ledger store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_insert_error(err: sqlx::Error, external_reference: &str) -> StoreError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreError::Duplicate(external_reference.to_string())
        }
        other => StoreError::Database(other),
    }
}

async fn insert_transaction(conn: &mut PgConnection, tx: &Transaction) -> StoreResult<Transaction> {
    let sql = format!(
        r#"
        INSERT INTO transactions (
            id, external_reference, account_id, kind, amount_minor,
            status, provider_status, created_at, status_updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    );

    let row = sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(tx.id)
        .bind(&tx.external_reference)
        .bind(tx.account_id)
        .bind(tx.kind.as_str())
        .bind(tx.amount_minor)
        .bind(tx.status.as_str())
        .bind(&tx.provider_status)
        .bind(tx.created_at)
        .bind(tx.status_updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_insert_error(e, &tx.external_reference))?;

    row.into_domain()
}

async fn credit_account(conn: &mut PgConnection, id: AccountId, amount_minor: i64) -> StoreResult<()> {
    let result = sqlx::query(
        "UPDATE accounts SET balance_minor = balance_minor + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(amount_minor)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("account {}", id)));
    }
    Ok(())
}

async fn record_commission(
    conn: &mut PgConnection,
    transaction_id: Uuid,
    commission: Commission,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO commissions (id, transaction_id, payee_account_id, amount_minor, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(transaction_id)
    .bind(commission.payee_account_id)
    .bind(commission.amount_minor)
    .execute(&mut *conn)
    .await?;

    credit_account(conn, commission.payee_account_id, commission.amount_minor).await
}

async fn apply_commission(
    conn: &mut PgConnection,
    transaction_id: Uuid,
    commission: Commission,
) -> StoreResult<CommissionOutcome> {
    let mut savepoint = conn.begin().await?;

    match record_commission(&mut savepoint, transaction_id, commission).await {
        Ok(()) => {
            savepoint.commit().await?;
            Ok(CommissionOutcome::Credited(commission))
        }
        Err(e) => {
            savepoint.rollback().await?;
            Ok(CommissionOutcome::Failed {
                commission,
                reason: e.to_string(),
            })
        }
    }
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, phone, balance_minor, referral_code, invited_by_code, tier_level
            FROM accounts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AccountRow::into_domain))
    }

    async fn find_account_by_referral_code(&self, code: &str) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, phone, balance_minor, referral_code, invited_by_code, tier_level
            FROM accounts WHERE referral_code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AccountRow::into_domain))
    }

    async fn find_tier_rate(&self, tier_level: i32) -> StoreResult<Option<i32>> {
        let rate: Option<Option<i32>> =
            sqlx::query_scalar("SELECT commission_percent FROM tiers WHERE level = $1")
                .bind(tier_level)
                .fetch_optional(&self.pool)
                .await?;

        Ok(rate.flatten())
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn create_transaction(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut conn = self.pool.acquire().await?;
        insert_transaction(&mut conn, tx).await
    }

    async fn reserve_withdrawal(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        let debited = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_minor = balance_minor - $2, updated_at = NOW()
            WHERE id = $1 AND balance_minor >= $2
            "#,
        )
        .bind(tx.account_id)
        .bind(tx.amount_minor)
        .execute(&mut *db_tx)
        .await?;

        if debited.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
                    .bind(tx.account_id)
                    .fetch_one(&mut *db_tx)
                    .await?;
            db_tx.rollback().await?;
            return Err(if exists {
                StoreError::InsufficientBalance(tx.account_id)
            } else {
                StoreError::NotFound(format!("account {}", tx.account_id))
            });
        }

        let inserted = insert_transaction(&mut db_tx, tx).await?;
        db_tx.commit().await?;
        Ok(inserted)
    }

    async fn find_by_external_reference(
        &self,
        external_reference: &str,
    ) -> StoreResult<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE external_reference = $1",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(external_reference)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn list_for_account(
        &self,
        account_id: AccountId,
        kind: Option<TransactionKind>,
    ) -> StoreResult<Vec<Transaction>> {
        let sql = format!(
            r#"
            SELECT {} FROM transactions
            WHERE account_id = $1 AND ($2::text IS NULL OR kind = $2)
            ORDER BY created_at DESC
            "#,
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(account_id)
            .bind(kind.map(|k| k.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
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
        let mut db_tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE transactions
            SET status = $1,
                provider_status = COALESCE($2, provider_status),
                status_updated_at = NOW()
            WHERE external_reference = $3 AND status = $4
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );
        let swapped = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(to.as_str())
            .bind(provider_status)
            .bind(external_reference)
            .bind(from.as_str())
            .fetch_optional(&mut *db_tx)
            .await?;

        let Some(row) = swapped else {
            db_tx.rollback().await?;
            let current = self
                .find_by_external_reference(external_reference)
                .await?
                .ok_or_else(|| StoreError::NotFound(external_reference.to_string()))?;
            return Ok(TransitionResult::Stale(current));
        };
        let transaction = row.into_domain()?;

        if effects.credit_owner {
            credit_account(&mut db_tx, transaction.account_id, transaction.amount_minor).await?;
        }

        let commission = match effects.commission {
            Some(c) => apply_commission(&mut db_tx, transaction.id, c).await?,
            None => CommissionOutcome::NotApplicable,
        };

        db_tx.commit().await?;

        Ok(TransitionResult::Applied {
            transaction,
            commission,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    external_reference: String,
    account_id: i64,
    kind: String,
    amount_minor: i64,
    status: String,
    provider_status: Option<String>,
    created_at: DateTime<Utc>,
    status_updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            external_reference: self.external_reference,
            account_id: self.account_id,
            kind: self.kind.parse().map_err(StoreError::Corrupt)?,
            amount_minor: self.amount_minor,
            status: self.status.parse().map_err(StoreError::Corrupt)?,
            provider_status: self.provider_status,
            created_at: self.created_at,
            status_updated_at: self.status_updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    phone: String,
    balance_minor: i64,
    referral_code: String,
    invited_by_code: Option<String>,
    tier_level: i32,
}

impl AccountRow {
    fn into_domain(self) -> Account {
        Account {
            id: self.id,
            phone: self.phone,
            balance_minor: self.balance_minor,
            referral_code: self.referral_code,
            invited_by_code: self.invited_by_code,
            tier_level: self.tier_level,
        }
    }
}
