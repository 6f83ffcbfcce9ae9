use utoipa::OpenApi;

use crate::domain::{Transaction, TransactionKind, TransactionStatus};
use crate::handlers::accounts::BalanceResponse;
use crate::handlers::gateway::{
    CallbackData, CallbackPayload, DepositRequest, DepositResponse, WithdrawRequest,
    WithdrawResponse,
};
use crate::handlers::HealthStatus;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PIX Gateway API",
        description = "Deposits and withdrawals over PIX with webhook reconciliation."
    ),
    paths(
        crate::handlers::health,
        crate::handlers::gateway::deposit,
        crate::handlers::gateway::withdraw,
        crate::handlers::gateway::callback,
        crate::handlers::accounts::balance,
        crate::handlers::accounts::list_transactions,
        crate::handlers::accounts::get_transaction,
    ),
    components(
        schemas(
            HealthStatus,
            DepositRequest,
            DepositResponse,
            WithdrawRequest,
            WithdrawResponse,
            CallbackPayload,
            CallbackData,
            BalanceResponse,
            Transaction,
            TransactionKind,
            TransactionStatus,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and store connectivity"),
        (name = "Gateway", description = "Initiators and provider callback"),
        (name = "Accounts", description = "Balances and ledger history")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_gateway_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/gateway/deposit"));
        assert!(paths.contains_key("/api/gateway/withdraw"));
        assert!(paths.contains_key("/api/gateway/callback"));
        assert!(paths.contains_key("/api/gateway/accounts/{account_id}/balance"));
    }
}
