//! Error types for the `nitro-bridge-gateway` crate.

use alloy_primitives::{Address, B256};
use nitro_bridge_messaging::{BridgeError, FailedMessage};
use nitro_bridge_providers::ProviderError;
use thiserror::Error;

/// An error encountered while resolving gateways or moving tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// A message lifecycle operation failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    /// A chain provider could not answer. Safe to retry.
    #[error("Provider failure: {0}")]
    Provider(#[from] ProviderError),
    /// A submitted transaction was mined but reverted.
    #[error("Transaction {0} reverted")]
    Reverted(B256),
    /// A receipt did not carry the retryable tickets the operation schedules.
    #[error("Transaction {tx_hash} created {found} retryable tickets, expected {expected}")]
    UnexpectedTickets {
        /// The parent chain transaction.
        tx_hash: B256,
        /// The number of tickets the operation schedules.
        expected: usize,
        /// The number of tickets decoded from the receipt.
        found: usize,
    },
    /// Every message of a registration failed.
    #[error("Registration of {l1_token} failed: {}", describe(.failed))]
    RegistrationFailed {
        /// The parent chain token.
        l1_token: Address,
        /// The failed messages, in the order they were scheduled.
        failed: Vec<FailedMessage>,
    },
    /// Both registration tickets were redeemed but the gateways do not resolve as registered.
    #[error("Registration of {l1_token} not visible: {reason}")]
    VerificationFailed {
        /// The parent chain token.
        l1_token: Address,
        /// The first mismatch found.
        reason: String,
    },
    /// The token has no child chain counterpart to withdraw from.
    #[error("Token {0} is not bridged")]
    NotBridged(Address),
}

impl GatewayError {
    /// Whether the failure is transient and the operation may be retried unchanged.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Bridge(err) => err.is_transient(),
            Self::Provider(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<alloy_sol_types::Error> for GatewayError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::Bridge(err.into())
    }
}

fn describe(failed: &[FailedMessage]) -> String {
    failed.iter().map(|f| format!("{}: {}", f.id, f.reason)).collect::<Vec<_>>().join(", ")
}

/// A [Result] alias for the [GatewayError] type.
pub type GatewayResult<T> = core::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use nitro_bridge_primitives::MessageId;

    #[test]
    fn test_registration_failure_names_every_ticket() {
        let failed = (0..2)
            .map(|seq| FailedMessage {
                id: MessageId { origin_tx_hash: B256::repeat_byte(0xbb), sequence_number: seq },
                reason: "CREATION_FAILED".into(),
            })
            .collect::<Vec<_>>();
        let rendered =
            GatewayError::RegistrationFailed { l1_token: Address::ZERO, failed: failed.clone() }
                .to_string();
        for message in failed {
            assert!(rendered.contains(&message.id.to_string()));
        }
    }

    #[test]
    fn test_transience_follows_provider() {
        let transport = ProviderError::Transport("timeout".into());
        assert!(GatewayError::Provider(transport.clone()).is_transient());
        assert!(GatewayError::Bridge(BridgeError::Provider(transport)).is_transient());
        assert!(!GatewayError::Reverted(B256::ZERO).is_transient());
    }
}
