//! Framework-agnostic domain types for the gateway core.

pub mod account;
pub mod error;
pub mod transaction;

pub use account::{Account, AccountId, Commission};
pub use error::{CommissionError, GatewayError};
pub use transaction::{
    ExternalReference, ProviderStatus, Transaction, TransactionKind, TransactionStatus,
};
