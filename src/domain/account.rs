//! Account subset the gateway core reads and mutates.

use serde::{Deserialize, Serialize};

pub type AccountId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub phone: String,
    /// Balance in minor units. Never negative.
    pub balance_minor: i64,
    pub referral_code: String,
    /// Referral code of the inviting account. Weak reference, may dangle.
    pub invited_by_code: Option<String>,
    pub tier_level: i32,
}

impl Account {
    /// Digits-only phone number, the form the provider expects.
    pub fn phone_digits(&self) -> String {
        self.phone.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

/// Referral commission owed to an inviter for one approved deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub payee_account_id: AccountId,
    pub amount_minor: i64,
}

/// Formats minor units as a major-unit string (`12345` -> `"123.45"`).
/// Presentation only; balance arithmetic never goes through this.
pub fn format_major_units(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
