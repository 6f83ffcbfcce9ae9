//! Transaction domain entity.
//! One ledger entry per deposit or withdrawal attempt, correlated with the
//! payment provider through its external reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::account::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }

    fn reference_prefix(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEP",
            TransactionKind::Withdrawal => "WD",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

/// Ledger status. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Refused,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Refused => "refused",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Terminal states are absorbing.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        *self == TransactionStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "approved" => Ok(TransactionStatus::Approved),
            "refused" => Ok(TransactionStatus::Refused),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// Status values as reported by the provider in webhook callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Paid,
    Refused,
    Waiting,
    Unrecognized(String),
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" | "approved" => ProviderStatus::Paid,
            "refused" | "cancelled" | "canceled" | "chargeback" | "chargedback" => {
                ProviderStatus::Refused
            }
            "pending" | "waiting_payment" => ProviderStatus::Waiting,
            _ => ProviderStatus::Unrecognized(raw.to_string()),
        }
    }

    /// Ledger status this provider status drives a pending transaction to, if any.
    pub fn target_status(&self) -> Option<TransactionStatus> {
        match self {
            ProviderStatus::Paid => Some(TransactionStatus::Approved),
            ProviderStatus::Refused => Some(TransactionStatus::Refused),
            ProviderStatus::Waiting | ProviderStatus::Unrecognized(_) => None,
        }
    }
}

/// Correlation key shared with the provider: `DEP-<ulid>` or `WD-<ulid>`.
///
/// ULIDs carry 80 random bits next to the millisecond timestamp, so two
/// requests landing in the same millisecond still get distinct references.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalReference(String);

impl ExternalReference {
    pub fn generate(kind: TransactionKind) -> Self {
        Self(format!("{}-{}", kind.reference_prefix(), ulid::Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExternalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Domain entity representing a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub external_reference: String,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    /// Amount in minor units (cents).
    pub amount_minor: i64,
    pub status: TransactionStatus,
    /// Last raw status string reported by the provider.
    pub provider_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status_updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new_pending(
        external_reference: ExternalReference,
        account_id: AccountId,
        kind: TransactionKind,
        amount_minor: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_reference: external_reference.into_inner(),
            account_id,
            kind,
            amount_minor,
            status: TransactionStatus::Pending,
            provider_status: None,
            created_at: now,
            status_updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_absorbing() {
        for from in [
            TransactionStatus::Approved,
            TransactionStatus::Refused,
            TransactionStatus::Cancelled,
        ] {
            for to in [
                TransactionStatus::Pending,
                TransactionStatus::Approved,
                TransactionStatus::Refused,
                TransactionStatus::Cancelled,
            ] {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_pending_moves_only_to_terminal_states() {
        let pending = TransactionStatus::Pending;
        assert!(!pending.can_transition_to(TransactionStatus::Pending));
        assert!(pending.can_transition_to(TransactionStatus::Approved));
        assert!(pending.can_transition_to(TransactionStatus::Refused));
        assert!(pending.can_transition_to(TransactionStatus::Cancelled));
    }

    #[test]
    fn test_provider_status_mapping() {
        assert_eq!(ProviderStatus::parse("paid"), ProviderStatus::Paid);
        assert_eq!(ProviderStatus::parse("APPROVED"), ProviderStatus::Paid);
        assert_eq!(ProviderStatus::parse("chargeback"), ProviderStatus::Refused);
        assert_eq!(ProviderStatus::parse("canceled"), ProviderStatus::Refused);
        assert_eq!(ProviderStatus::parse("waiting_payment"), ProviderStatus::Waiting);
        assert_eq!(
            ProviderStatus::parse("in_analysis"),
            ProviderStatus::Unrecognized("in_analysis".to_string())
        );

        assert_eq!(
            ProviderStatus::Paid.target_status(),
            Some(TransactionStatus::Approved)
        );
        assert_eq!(
            ProviderStatus::Refused.target_status(),
            Some(TransactionStatus::Refused)
        );
        assert_eq!(ProviderStatus::Waiting.target_status(), None);
    }

    #[test]
    fn test_external_references_are_unique_and_prefixed() {
        let a = ExternalReference::generate(TransactionKind::Deposit);
        let b = ExternalReference::generate(TransactionKind::Deposit);
        let w = ExternalReference::generate(TransactionKind::Withdrawal);

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("DEP-"));
        assert!(w.as_str().starts_with("WD-"));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Approved,
            TransactionStatus::Refused,
            TransactionStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>(), Ok(status));
        }
        assert!("completed".parse::<TransactionStatus>().is_err());
    }
}
