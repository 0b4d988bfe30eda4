//! The [OutboxMessageManager] drives child-to-parent messages.

use crate::{
    wait_for_status, BridgeError, BridgeProviders, BridgeResult, ConfirmedSend,
    MessageStatusOracle,
};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use nitro_bridge_primitives::{
    abi::{INodeInterface, IOutbox, ITokenGateway},
    extract_outbox_messages, CrossDomainMessage, L2ToL1MessageStatus, OutboxMessage, OutboxProof,
    TransactionReceipt, TransactionRequest, NODE_INTERFACE_ADDRESS,
};
use nitro_bridge_providers::{
    fetch_logs, BlockTag, ChainProvider, ChainSigner, LogFilter, PendingTransaction, PollConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A `WithdrawalInitiated` event emitted by a child chain gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalEvent {
    /// The parent chain token being withdrawn.
    pub l1_token: Address,
    /// The child chain account that withdrew.
    pub from: Address,
    /// The parent chain recipient.
    pub to: Address,
    /// The position of the outbox message carrying the withdrawal.
    pub l2_to_l1_id: U256,
    /// The gateway's exit counter.
    pub exit_num: U256,
    /// The withdrawn amount.
    pub amount: U256,
    /// The child chain block the event was emitted in.
    pub block_number: u64,
    /// The transaction that emitted the event.
    pub transaction_hash: B256,
}

/// Decodes outbox messages from child chain receipts, proves them against confirmed assertions
/// and executes them on the parent chain.
#[derive(Debug, Clone)]
pub struct OutboxMessageManager<L1, L2> {
    oracle: MessageStatusOracle<L1, L2>,
}

impl<L1, L2> OutboxMessageManager<L1, L2> {
    /// Creates a manager over the given chains.
    pub const fn new(providers: BridgeProviders<L1, L2>) -> Self {
        Self { oracle: MessageStatusOracle::new(providers) }
    }

    /// The oracle the manager computes statuses with.
    pub const fn oracle(&self) -> &MessageStatusOracle<L1, L2> {
        &self.oracle
    }

    /// Decodes every outbox message sent by a child chain transaction, in log order.
    pub fn from_receipt(&self, receipt: &TransactionReceipt) -> BridgeResult<Vec<OutboxMessage>> {
        Ok(extract_outbox_messages(receipt)?)
    }
}

impl<L1, L2> OutboxMessageManager<L1, L2>
where
    L1: ChainProvider,
    L2: ChainProvider,
{
    /// Computes the status of `message`.
    pub async fn status(&self, message: &OutboxMessage) -> BridgeResult<L2ToL1MessageStatus> {
        self.oracle.outbox_status(message).await
    }

    /// Polls until `message` is [L2ToL1MessageStatus::Executed] or
    /// [L2ToL1MessageStatus::Expired].
    pub async fn wait_for_status(
        &self,
        message: &OutboxMessage,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> BridgeResult<L2ToL1MessageStatus> {
        wait_for_status(&self.oracle, message, config, cancel).await
    }

    /// Builds the proof of `message` against the latest confirmed send root.
    ///
    /// The proof is served by the child chain and checked locally: it must prove the item hash
    /// of `message` against the confirmed send root before it is returned.
    pub async fn build_proof(&self, message: &OutboxMessage) -> BridgeResult<OutboxProof> {
        match self.status(message).await? {
            L2ToL1MessageStatus::Confirmed => {}
            L2ToL1MessageStatus::Executed => return Err(BridgeError::AlreadyExecuted(message.id())),
            L2ToL1MessageStatus::Unconfirmed | L2ToL1MessageStatus::Expired => {
                return Err(BridgeError::ProofUnavailable(message.id()))
            }
        }
        let confirmed =
            self.oracle.confirmed_send().await?.ok_or(BridgeError::ProofUnavailable(message.id()))?;
        self.proof_against(message, &confirmed).await
    }

    async fn proof_against(
        &self,
        message: &OutboxMessage,
        confirmed: &ConfirmedSend,
    ) -> BridgeResult<OutboxProof> {
        let call = INodeInterface::constructOutboxProofCall {
            size: confirmed.send_count,
            leaf: message.position,
        };
        let ret = self.oracle.providers().l2.call_sol(NODE_INTERFACE_ADDRESS, call).await?;
        let proof = OutboxProof {
            position: message.position,
            send: ret.send,
            root: ret.root,
            proof: ret.proof,
        };

        let item = message.item_hash();
        let invalid = |reason: String| BridgeError::InvalidProof { id: message.id(), reason };
        if proof.send != item {
            return Err(invalid(format!(
                "proof is for item {}, message hashes to {item}",
                proof.send
            )));
        }
        if proof.root != confirmed.send_root {
            return Err(invalid(format!(
                "proof root {} differs from confirmed send root {}",
                proof.root, confirmed.send_root
            )));
        }
        if !proof.verify(item, confirmed.send_root) {
            return Err(invalid("sibling path does not fold to the send root".to_string()));
        }
        debug!(
            target: "outbox",
            id = %message.id(),
            position = message.position,
            depth = proof.proof.len(),
            "Built outbox proof"
        );
        Ok(proof)
    }

    /// Executes `message` on the parent chain.
    ///
    /// Fails with [BridgeError::AlreadyExecuted] or [BridgeError::NotConfirmed] without
    /// submitting anything when the message is not executable.
    pub async fn execute<S: ChainSigner>(
        &self,
        message: &OutboxMessage,
        signer: &S,
    ) -> BridgeResult<PendingTransaction> {
        match self.status(message).await? {
            L2ToL1MessageStatus::Confirmed => {}
            L2ToL1MessageStatus::Executed => return Err(BridgeError::AlreadyExecuted(message.id())),
            L2ToL1MessageStatus::Unconfirmed => return Err(BridgeError::NotConfirmed(message.id())),
            status @ L2ToL1MessageStatus::Expired => {
                return Err(BridgeError::InvalidState {
                    id: message.id(),
                    operation: "execute",
                    status: status.to_string(),
                })
            }
        }
        let confirmed =
            self.oracle.confirmed_send().await?.ok_or(BridgeError::NotConfirmed(message.id()))?;
        let proof = self.proof_against(message, &confirmed).await?;

        let input = IOutbox::executeTransactionCall {
            proof: proof.proof,
            index: U256::from(message.position),
            l2Sender: message.caller,
            to: message.destination,
            l2Block: message.arb_block_num,
            l1Block: message.eth_block_num,
            l2Timestamp: message.timestamp,
            value: message.callvalue,
            data: message.data.clone(),
        }
        .abi_encode();
        let outbox = self.oracle.providers().network.eth_bridge.outbox;
        let pending =
            PendingTransaction::send(signer, TransactionRequest::call(outbox, input)).await?;
        info!(
            target: "outbox",
            id = %message.id(),
            position = message.position,
            tx = %pending.hash(),
            "Submitted outbox execution"
        );
        Ok(pending)
    }

    /// Returns every `WithdrawalInitiated` event emitted by `gateway` on the child chain between
    /// `from_block` and `to_block`, optionally restricted to a parent chain token and a sender.
    ///
    /// Either all matching events in range are returned or an error; ranges the provider rejects
    /// as too large are split, never truncated.
    pub async fn query_withdrawal_events(
        &self,
        gateway: Address,
        from_block: u64,
        to_block: BlockTag,
        l1_token: Option<Address>,
        from: Option<Address>,
    ) -> BridgeResult<Vec<WithdrawalEvent>> {
        let mut filter = LogFilter::new(from_block, to_block)
            .address(gateway)
            .event(ITokenGateway::WithdrawalInitiated::SIGNATURE_HASH);
        if let Some(from) = from {
            filter = filter.topic(1, from.into_word());
        }

        let providers = self.oracle.providers();
        let logs = fetch_logs(&providers.l2, &filter, &providers.log_query).await?;
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let event = ITokenGateway::WithdrawalInitiated::decode_log_data(&log.log.data, true)?;
            // The token is not indexed, so it can only be filtered here.
            if l1_token.is_some_and(|token| token != event.l1Token) {
                continue;
            }
            events.push(WithdrawalEvent {
                l1_token: event.l1Token,
                from: event._from,
                to: event._to,
                l2_to_l1_id: event._l2ToL1Id,
                exit_num: event._exitNum,
                amount: event._amount,
                block_number: log.block_number,
                transaction_hash: log.transaction_hash,
            });
        }
        debug!(target: "outbox", %gateway, count = events.len(), "Queried withdrawal events");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Bytes, B256};
    use nitro_bridge_devnet::{Devnet, DevnetProvider};
    use nitro_bridge_primitives::{abi::IArbSys, ARB_SYS_ADDRESS};

    fn manager(devnet: &Devnet) -> OutboxMessageManager<DevnetProvider, DevnetProvider> {
        OutboxMessageManager::new(BridgeProviders::new(devnet.l1(), devnet.l2(), devnet.network()))
    }

    fn poll() -> PollConfig {
        PollConfig::from_millis(1, 5_000).unwrap()
    }

    async fn send_to_l1(devnet: &Devnet, count: usize) -> TransactionReceipt {
        let l2 = devnet.l2();
        let mut last = None;
        for i in 0..count {
            let input = IArbSys::sendTxToL1Call {
                destination: address!("00000000000000000000000000000000000d0d0d"),
                data: Bytes::from(vec![i as u8; 3]),
            }
            .abi_encode();
            let request = TransactionRequest::call(ARB_SYS_ADDRESS, input);
            let receipt = PendingTransaction::send(&l2, request)
                .await
                .unwrap()
                .wait(&l2, &poll(), &CancellationToken::new())
                .await
                .unwrap();
            last = Some(receipt);
        }
        last.unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_unconfirmed_confirmed_executed() {
        let devnet = Devnet::new();
        send_to_l1(&devnet, 2).await;
        let receipt = send_to_l1(&devnet, 1).await;
        let manager = manager(&devnet);

        let messages = manager.from_receipt(&receipt).unwrap();
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.position, 2);
        assert_eq!(manager.status(message).await.unwrap(), L2ToL1MessageStatus::Unconfirmed);
        assert_eq!(
            manager.build_proof(message).await.unwrap_err(),
            BridgeError::ProofUnavailable(message.id())
        );
        let l1 = devnet.l1();
        assert_eq!(
            manager.execute(message, &l1).await.unwrap_err(),
            BridgeError::NotConfirmed(message.id())
        );

        devnet.confirm_assertion();
        assert_eq!(manager.status(message).await.unwrap(), L2ToL1MessageStatus::Confirmed);
        let proof = manager.build_proof(message).await.unwrap();
        assert_eq!(proof.position, 2);
        assert_eq!(proof.proof.len(), 2);

        let pending = manager.execute(message, &l1).await.unwrap();
        let receipt = pending.wait(&l1, &poll(), &CancellationToken::new()).await.unwrap();
        assert!(receipt.status);
        assert_eq!(
            manager.wait_for_status(message, &poll(), &CancellationToken::new()).await.unwrap(),
            L2ToL1MessageStatus::Executed
        );
        assert_eq!(
            manager.execute(message, &l1).await.unwrap_err(),
            BridgeError::AlreadyExecuted(message.id())
        );
    }

    #[tokio::test]
    async fn test_messages_sent_after_confirmation_stay_unconfirmed() {
        let devnet = Devnet::new();
        let first = send_to_l1(&devnet, 1).await;
        devnet.confirm_assertion();
        let second = send_to_l1(&devnet, 1).await;
        let manager = manager(&devnet);

        let first = &manager.from_receipt(&first).unwrap()[0];
        let second = &manager.from_receipt(&second).unwrap()[0];
        assert_eq!(manager.status(first).await.unwrap(), L2ToL1MessageStatus::Confirmed);
        assert_eq!(manager.status(second).await.unwrap(), L2ToL1MessageStatus::Unconfirmed);
    }

    #[tokio::test]
    async fn test_reorged_origin_is_an_error() {
        let devnet = Devnet::new();
        let receipt = send_to_l1(&devnet, 1).await;
        let manager = manager(&devnet);
        let message = &manager.from_receipt(&receipt).unwrap()[0];

        devnet.reorg_l2_block(receipt.block_number);
        assert_eq!(
            manager.status(message).await.unwrap_err(),
            BridgeError::OriginReorged { id: message.id(), block_hash: receipt.block_hash }
        );
    }

    #[tokio::test]
    async fn test_expiry_window() {
        let devnet = Devnet::new();
        devnet.set_outbox_expiry_blocks(Some(3));
        let receipt = send_to_l1(&devnet, 1).await;
        let manager = manager(&devnet);
        let message = &manager.from_receipt(&receipt).unwrap()[0];
        assert_eq!(manager.status(message).await.unwrap(), L2ToL1MessageStatus::Unconfirmed);

        devnet.mine_l1_blocks(5);
        assert_eq!(manager.status(message).await.unwrap(), L2ToL1MessageStatus::Expired);
        let l1 = devnet.l1();
        assert!(matches!(
            manager.execute(message, &l1).await.unwrap_err(),
            BridgeError::InvalidState { operation: "execute", .. }
        ));
    }

    #[tokio::test]
    async fn test_expired_message_ignores_late_confirmation() {
        let devnet = Devnet::new();
        devnet.set_outbox_expiry_blocks(Some(3));
        let receipt = send_to_l1(&devnet, 1).await;
        let manager = manager(&devnet);
        let message = &manager.from_receipt(&receipt).unwrap()[0];

        devnet.mine_l1_blocks(5);
        assert_eq!(manager.status(message).await.unwrap(), L2ToL1MessageStatus::Expired);

        devnet.confirm_assertion();
        assert_eq!(manager.status(message).await.unwrap(), L2ToL1MessageStatus::Expired);
        assert_eq!(
            manager.build_proof(message).await.unwrap_err(),
            BridgeError::ProofUnavailable(message.id())
        );
        let l1 = devnet.l1();
        assert!(matches!(
            manager.execute(message, &l1).await.unwrap_err(),
            BridgeError::InvalidState { operation: "execute", .. }
        ));
    }

    #[tokio::test]
    async fn test_confirmation_inside_window_outlives_expiry() {
        let devnet = Devnet::new();
        devnet.set_outbox_expiry_blocks(Some(3));
        let receipt = send_to_l1(&devnet, 1).await;
        let manager = manager(&devnet);
        let message = &manager.from_receipt(&receipt).unwrap()[0];

        devnet.confirm_assertion();
        devnet.mine_l1_blocks(10);
        assert_eq!(manager.status(message).await.unwrap(), L2ToL1MessageStatus::Confirmed);

        let l1 = devnet.l1();
        let receipt = manager
            .execute(message, &l1)
            .await
            .unwrap()
            .wait(&l1, &poll(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(receipt.status);
        assert_eq!(manager.status(message).await.unwrap(), L2ToL1MessageStatus::Executed);
    }

    #[tokio::test]
    async fn test_message_not_emitted_by_origin_is_not_found() {
        let devnet = Devnet::new();
        let receipt = send_to_l1(&devnet, 1).await;
        let manager = manager(&devnet);
        let message = &manager.from_receipt(&receipt).unwrap()[0];

        let mut shifted = message.clone();
        shifted.position += 1;
        shifted.origin.sequence_number += 1;
        assert_eq!(
            manager.status(&shifted).await.unwrap_err(),
            BridgeError::NotFound(shifted.id())
        );

        let mut forged = message.clone();
        forged.hash = B256::repeat_byte(0x42);
        assert_eq!(manager.status(&forged).await.unwrap_err(), BridgeError::NotFound(forged.id()));

        let mut unknown = message.clone();
        unknown.origin.tx_hash = B256::repeat_byte(0xee);
        let err = manager
            .wait_for_status(&unknown, &poll(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::NotFound(unknown.id()));
    }

    #[tokio::test]
    async fn test_confirmation_lookup_starts_at_assertion_creation() {
        let devnet = Devnet::new();
        devnet.mine_l1_blocks(40);
        send_to_l1(&devnet, 1).await;
        let node_num = devnet.confirm_assertion();
        let confirmed_at = devnet.l1().block_number().await.unwrap();
        devnet.mine_l1_blocks(40);
        devnet.set_log_range_limit(Some(8));

        let manager = manager(&devnet);
        let confirmed = manager.oracle.confirmed_send().await.unwrap().unwrap();
        assert_eq!(confirmed.node_num, node_num);
        assert_eq!(confirmed.send_count, 1);
        assert_eq!(confirmed.confirmed_at_block, confirmed_at);
    }
}
