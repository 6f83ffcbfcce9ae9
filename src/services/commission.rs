//! Referral commission owed to the inviter of a depositor.

use std::sync::Arc;

use crate::domain::{Account, Commission, CommissionError};
use crate::ports::AccountStore;

/// `floor(amount * percent / 100)` in integer minor units.
pub fn commission_amount(amount_minor: i64, percent: i32) -> Result<i64, CommissionError> {
    if amount_minor <= 0 || percent <= 0 {
        return Ok(0);
    }
    amount_minor
        .checked_mul(i64::from(percent))
        .map(|scaled| scaled / 100)
        .ok_or(CommissionError::Overflow(amount_minor))
}

#[derive(Clone)]
pub struct CommissionCalculator {
    accounts: Arc<dyn AccountStore>,
}

impl CommissionCalculator {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Resolves depositor -> inviter -> inviter tier -> rate. Any missing link
    /// means no commission; only store failures are errors.
    pub async fn compute(
        &self,
        depositor: &Account,
        approved_amount_minor: i64,
    ) -> Result<Option<Commission>, CommissionError> {
        let Some(code) = depositor.invited_by_code.as_deref() else {
            return Ok(None);
        };

        let inviter = self
            .accounts
            .find_account_by_referral_code(code)
            .await
            .map_err(|e| CommissionError::Lookup(e.to_string()))?;
        let Some(inviter) = inviter else {
            tracing::warn!(
                account_id = depositor.id,
                invited_by_code = %code,
                "Inviter not found for referral code, skipping commission"
            );
            return Ok(None);
        };

        if inviter.id == depositor.id {
            tracing::warn!(account_id = depositor.id, "Account refers itself, skipping commission");
            return Ok(None);
        }

        let rate = self
            .accounts
            .find_tier_rate(inviter.tier_level)
            .await
            .map_err(|e| CommissionError::Lookup(e.to_string()))?;
        let Some(percent) = rate else {
            return Ok(None);
        };

        let amount_minor = commission_amount(approved_amount_minor, percent)?;
        if amount_minor == 0 {
            return Ok(None);
        }

        Ok(Some(Commission {
            payee_account_id: inviter.id,
            amount_minor,
        }))
    }
}
