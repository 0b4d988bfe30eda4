//! Error types for the `nitro-bridge-messaging` crate.

use alloy_primitives::B256;
use core::time::Duration;
use nitro_bridge_primitives::{MessageId, RetryableDecodeError};
use nitro_bridge_providers::{PollError, ProviderError};
use thiserror::Error;

/// A sub-message of a multi-message operation that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedMessage {
    /// The identity of the failed message.
    pub id: MessageId,
    /// What went wrong, e.g. the terminal status it reached.
    pub reason: String,
}

/// An error encountered while tracking or acting on a cross-domain message.
///
/// Every variant that concerns a single message carries its [MessageId].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The message does not exist at the queried identity.
    #[error("Message {0} not found")]
    NotFound(MessageId),
    /// The message did not reach a terminal status before the deadline.
    #[error("Message {id} still {last_status} after {timeout:?}")]
    Timeout {
        /// The message.
        id: MessageId,
        /// The configured deadline.
        timeout: Duration,
        /// The last status observed before the deadline.
        last_status: String,
    },
    /// The wait was cancelled by the caller.
    #[error("Wait for message {0} cancelled")]
    Cancelled(MessageId),
    /// The operation is not allowed in the current status of the message.
    #[error("Cannot {operation} message {id} in status {status}")]
    InvalidState {
        /// The message.
        id: MessageId,
        /// The rejected operation.
        operation: &'static str,
        /// The status the message was in.
        status: String,
    },
    /// A chain provider could not answer. Safe to retry.
    #[error("Provider failure: {0}")]
    Provider(#[from] ProviderError),
    /// An outbox proof was requested before the message was confirmed.
    #[error("Proof for message {0} unavailable before confirmation")]
    ProofUnavailable(MessageId),
    /// The proof served by the child chain does not prove the message against the confirmed
    /// send root.
    #[error("Invalid proof for message {id}: {reason}")]
    InvalidProof {
        /// The message.
        id: MessageId,
        /// Why the proof was rejected.
        reason: String,
    },
    /// The outbox message has already been executed.
    #[error("Message {0} already executed")]
    AlreadyExecuted(MessageId),
    /// The outbox message is not confirmed yet.
    #[error("Message {0} not confirmed")]
    NotConfirmed(MessageId),
    /// The message reached a terminal status other than success.
    #[error("Message {id} failed with status {status}")]
    MessageFailed {
        /// The message.
        id: MessageId,
        /// The terminal status, or a description of the failed child transaction.
        status: String,
    },
    /// Some messages of a multi-message operation succeeded while others failed.
    #[error("Partial failure: {} succeeded, {} failed ({})",
        .succeeded.len(), .failed.len(), describe_failures(.failed))]
    PartialFailure {
        /// The messages that succeeded.
        succeeded: Vec<MessageId>,
        /// The messages that failed. Never empty.
        failed: Vec<FailedMessage>,
    },
    /// The block a message was emitted in is no longer part of its origin chain.
    #[error("Origin block {block_hash} of message {id} is no longer canonical")]
    OriginReorged {
        /// The message.
        id: MessageId,
        /// The origin block hash recorded when the message was decoded.
        block_hash: B256,
    },
    /// A status was observed that lies before one observed earlier.
    #[error("Status of message {id} regressed from {from} to {to}")]
    StatusRegression {
        /// The message.
        id: MessageId,
        /// The status observed earlier.
        from: String,
        /// The status observed now.
        to: String,
    },
    /// The chains returned data that contradicts itself, e.g. a confirmed assertion over an
    /// unknown block.
    #[error("Inconsistent chain data: {0}")]
    Inconsistent(String),
    /// Parent-to-child messages could not be decoded from a receipt.
    #[error(transparent)]
    TicketDecode(#[from] RetryableDecodeError),
    /// Logs or call results could not be ABI decoded.
    #[error("ABI decode error: {0}")]
    Abi(String),
    /// A poll configuration was rejected.
    #[error(transparent)]
    InvalidConfig(#[from] PollError),
}

impl BridgeError {
    /// Whether the failure is transient and the operation may be retried unchanged.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Provider(err) => err.is_transient(),
            _ => false,
        }
    }

    /// The message the error concerns, if it concerns exactly one.
    pub const fn message_id(&self) -> Option<MessageId> {
        match self {
            Self::NotFound(id)
            | Self::Cancelled(id)
            | Self::ProofUnavailable(id)
            | Self::AlreadyExecuted(id)
            | Self::NotConfirmed(id) => Some(*id),
            Self::Timeout { id, .. }
            | Self::InvalidState { id, .. }
            | Self::InvalidProof { id, .. }
            | Self::MessageFailed { id, .. }
            | Self::OriginReorged { id, .. }
            | Self::StatusRegression { id, .. } => Some(*id),
            _ => None,
        }
    }
}

impl From<alloy_sol_types::Error> for BridgeError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::Abi(err.to_string())
    }
}

fn describe_failures(failed: &[FailedMessage]) -> String {
    failed.iter().map(|f| format!("{}: {}", f.id, f.reason)).collect::<Vec<_>>().join(", ")
}

/// A [Result] alias for the [BridgeError] type.
pub type BridgeResult<T> = core::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn id(seq: u64) -> MessageId {
        MessageId { origin_tx_hash: B256::repeat_byte(0xaa), sequence_number: seq }
    }

    #[test]
    fn test_partial_failure_names_failed_message() {
        let err = BridgeError::PartialFailure {
            succeeded: vec![id(0)],
            failed: vec![FailedMessage { id: id(1), reason: "FUNDS_DEPOSITED_ON_L2".into() }],
        };
        let rendered = err.to_string();
        assert!(rendered.contains(&id(1).to_string()));
        assert!(rendered.contains("FUNDS_DEPOSITED_ON_L2"));
    }

    #[test]
    fn test_message_id_and_transience() {
        assert_eq!(BridgeError::AlreadyExecuted(id(3)).message_id(), Some(id(3)));
        assert_eq!(BridgeError::Inconsistent("x".into()).message_id(), None);
        assert!(BridgeError::Provider(ProviderError::Transport("reset".into())).is_transient());
        assert!(!BridgeError::NotFound(id(1)).is_transient());
    }
}
