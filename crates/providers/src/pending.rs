//! Submitted transactions awaiting inclusion.

use crate::{poll_until, ChainProvider, ChainSigner, PollConfig, ProviderError, ProviderResult};
use alloy_primitives::B256;
use nitro_bridge_primitives::{TransactionReceipt, TransactionRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A transaction that has been submitted but whose receipt has not been observed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingTransaction {
    hash: B256,
}

impl PendingTransaction {
    /// Wraps the hash of a submitted transaction.
    pub const fn new(hash: B256) -> Self {
        Self { hash }
    }

    /// Submits `request` through `signer`.
    pub async fn send<S: ChainSigner>(
        signer: &S,
        request: TransactionRequest,
    ) -> ProviderResult<Self> {
        let to = request.to;
        let hash = signer.send_transaction(request).await?;
        info!(target: "provider", %hash, %to, from = %signer.address(), "Submitted transaction");
        Ok(Self::new(hash))
    }

    /// The transaction hash.
    pub const fn hash(&self) -> B256 {
        self.hash
    }

    /// Polls `provider` until the receipt of the transaction is available. The receipt is returned
    /// whether or not the transaction succeeded.
    pub async fn wait<P: ChainProvider>(
        &self,
        provider: &P,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> ProviderResult<TransactionReceipt> {
        let hash = self.hash;
        poll_until(config, cancel, move || async move {
            let receipt = provider.transaction_receipt(hash).await?;
            if receipt.is_none() {
                debug!(target: "provider", %hash, "Transaction not mined yet");
            }
            Ok::<_, ProviderError>(receipt)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::MockChainProvider, PollError};
    use alloy_primitives::Address;

    #[tokio::test]
    async fn test_send_and_wait_for_receipt() {
        let provider = MockChainProvider::default();
        let pending =
            PendingTransaction::send(&provider, TransactionRequest::call(Address::ZERO, vec![1u8]))
                .await
                .unwrap();
        assert_eq!(provider.sent().len(), 1);

        let receipt = pending
            .wait(&provider, &PollConfig::from_millis(1, 1_000).unwrap(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(receipt.transaction_hash, pending.hash());
        assert!(receipt.status);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_for_unknown_transaction() {
        let provider = MockChainProvider::default();
        let err = PendingTransaction::new(B256::repeat_byte(9))
            .wait(&provider, &PollConfig::from_millis(10, 50).unwrap(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Poll(PollError::Timeout(_))));
    }
}
