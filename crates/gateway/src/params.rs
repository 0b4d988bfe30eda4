//! Retryable gas parameters for messages the token bridge schedules.

use alloy_primitives::U256;

/// The child chain execution budget of one retryable ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryableGasParams {
    /// The gas limit of the auto-redeem. Zero schedules no auto-redeem.
    pub gas_limit: U256,
    /// The child chain gas price bid.
    pub max_fee_per_gas: U256,
    /// The maximum fee paid to create the ticket.
    pub max_submission_cost: U256,
}

impl Default for RetryableGasParams {
    /// 300k gas at 1 gwei with a 0.001 ETH submission budget.
    fn default() -> Self {
        Self {
            gas_limit: U256::from(300_000u64),
            max_fee_per_gas: U256::from(1_000_000_000u64),
            max_submission_cost: U256::from(1_000_000_000_000_000u64),
        }
    }
}

impl RetryableGasParams {
    /// Sets the auto-redeem gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = U256::from(gas_limit);
        self
    }

    /// The value that must accompany the ticket: the submission budget plus the execution budget.
    pub fn deposit_value(&self) -> U256 {
        self.max_submission_cost.saturating_add(self.gas_limit.saturating_mul(self.max_fee_per_gas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_value_covers_submission_and_execution() {
        let params = RetryableGasParams::default();
        assert_eq!(
            params.deposit_value(),
            U256::from(1_000_000_000_000_000u64) + U256::from(300_000u64 * 1_000_000_000)
        );
        assert_eq!(
            params.with_gas_limit(0).deposit_value(),
            params.max_submission_cost
        );
    }
}
