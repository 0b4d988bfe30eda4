//! Error types for the `nitro-bridge-providers` crate.

use alloy_primitives::Bytes;
use alloy_sol_types::SolError;
use core::time::Duration;
use thiserror::Error;

/// An error returned by a [ChainProvider] or [ChainSigner].
///
/// Transport failures are kept apart from answers the chain actually gave (a revert, a rejected
/// log range) so callers can decide what is worth retrying.
///
/// [ChainProvider]: crate::ChainProvider
/// [ChainSigner]: crate::ChainSigner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider could not be reached or returned a malformed response.
    #[error("Transport error: {0}")]
    Transport(String),
    /// An `eth_call` or transaction execution reverted with the given data.
    #[error("Execution reverted: {0}")]
    Reverted(Bytes),
    /// The provider refused a `getLogs` request spanning too many blocks.
    #[error("Log range {from}..={to} too large")]
    LogRangeTooLarge {
        /// The first block of the rejected range.
        from: u64,
        /// The last block of the rejected range.
        to: u64,
    },
    /// The signer rejected the transaction before submission.
    #[error("Transaction rejected: {0}")]
    Rejected(String),
    /// A call returned data that could not be ABI decoded.
    #[error("Failed to decode call result: {0}")]
    Decode(String),
    /// A bounded wait ended early.
    #[error(transparent)]
    Poll(#[from] PollError),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Poll(PollError::Timeout(_)))
    }

    /// Whether this is a revert carrying the selector of the custom error `E`.
    pub fn reverted_with<E: SolError>(&self) -> bool {
        matches!(self, Self::Reverted(data) if data.starts_with(&E::SELECTOR))
    }
}

impl From<alloy_sol_types::Error> for ProviderError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// A [Result] alias for the [ProviderError] type.
pub type ProviderResult<T> = core::result::Result<T, ProviderError>;

/// An error ending a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PollError {
    /// The deadline elapsed.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    /// The cancellation token fired.
    #[error("Cancelled")]
    Cancelled,
    /// The interval or timeout is zero.
    #[error("Invalid poll config: interval {interval:?}, timeout {timeout:?}")]
    InvalidConfig {
        /// The configured interval.
        interval: Duration,
        /// The configured timeout.
        timeout: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::sol;

    sol! {
        error Missing();
        error Other(uint256 code);
    }

    #[test]
    fn test_reverted_with_matches_selector() {
        let err = ProviderError::Reverted(Bytes::copy_from_slice(&Missing::SELECTOR));
        assert!(err.reverted_with::<Missing>());
        assert!(!err.reverted_with::<Other>());
        assert!(!ProviderError::Transport("eof".into()).reverted_with::<Missing>());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Transport("connection reset".into()).is_transient());
        assert!(ProviderError::Poll(PollError::Timeout(Duration::from_secs(1))).is_transient());
        assert!(!ProviderError::Reverted(Bytes::new()).is_transient());
        assert!(!ProviderError::Poll(PollError::Cancelled).is_transient());
    }
}
