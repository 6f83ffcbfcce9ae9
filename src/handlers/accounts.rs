use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::account::format_major_units;
use crate::domain::{AccountId, TransactionKind};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub balance_minor: i64,
    /// Display-only, e.g. `"15.00"`.
    pub balance: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionFilter {
    /// `deposit` or `withdrawal`
    pub kind: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/gateway/accounts/{account_id}/balance",
    params(("account_id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 404, description = "Unknown account")
    ),
    tag = "Accounts"
)]
pub async fn balance(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .accounts
        .find_account(account_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))?;

    Ok(Json(BalanceResponse {
        account_id,
        balance_minor: account.balance_minor,
        balance: format_major_units(account.balance_minor),
    }))
}

#[utoipa::path(
    get,
    path = "/api/gateway/accounts/{account_id}/transactions",
    params(("account_id" = i64, Path, description = "Account id"), TransactionFilter),
    responses(
        (status = 200, description = "Ledger entries, newest first", body = [crate::domain::Transaction]),
        (status = 400, description = "Unknown kind filter")
    ),
    tag = "Accounts"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(filter): Query<TransactionFilter>,
) -> Result<impl IntoResponse, AppError> {
    let kind = filter
        .kind
        .as_deref()
        .map(str::parse::<TransactionKind>)
        .transpose()
        .map_err(AppError::Validation)?;

    let transactions = state
        .ledger
        .list_for_account(account_id, kind)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(transactions))
}

#[utoipa::path(
    get,
    path = "/api/gateway/transactions/{external_reference}",
    params(("external_reference" = String, Path, description = "Provider correlation id")),
    responses(
        (status = 200, description = "Ledger entry", body = crate::domain::Transaction),
        (status = 404, description = "Unknown reference")
    ),
    tag = "Accounts"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(external_reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .ledger
        .find_by_external_reference(&external_reference)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", external_reference)))?;

    Ok(Json(transaction))
}
