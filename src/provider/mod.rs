//! Outbound adapter for the PIX payment provider.

pub mod client;
pub mod schema;

use async_trait::async_trait;

pub use client::{PixProviderClient, ProviderConfig, ProviderError};
pub use schema::{DepositCharge, ProviderResponse, WithdrawalTransfer};

/// Port the initiators use to reach the provider. Implementations must not
/// touch the ledger.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_deposit(&self, charge: &DepositCharge)
        -> Result<ProviderResponse, ProviderError>;

    async fn create_withdrawal(
        &self,
        transfer: &WithdrawalTransfer,
    ) -> Result<ProviderResponse, ProviderError>;
}
