//! The [RetryableTicketManager] drives parent-to-child messages.

use crate::{
    wait::wait_until, wait_for_status_with, BridgeError, BridgeProviders, BridgeResult,
    MessageStatusOracle, RedeemLookup, RetryableWaitResult,
};
use alloy_sol_types::SolCall;
use nitro_bridge_primitives::{
    abi::IArbRetryableTx, extract_retryable_tickets, CrossDomainMessage, L1ToL2MessageStatus,
    MessageStatus, RetryableTicket, TransactionReceipt, TransactionRequest,
    ARB_RETRYABLE_TX_ADDRESS,
};
use nitro_bridge_providers::{ChainProvider, ChainSigner, PendingTransaction, PollConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Decodes retryable tickets from parent chain receipts and drives them to a terminal status on
/// the child chain.
#[derive(Debug, Clone)]
pub struct RetryableTicketManager<L1, L2> {
    oracle: MessageStatusOracle<L1, L2>,
}

impl<L1, L2> RetryableTicketManager<L1, L2> {
    /// Creates a manager over the given chains.
    pub const fn new(providers: BridgeProviders<L1, L2>) -> Self {
        Self { oracle: MessageStatusOracle::new(providers) }
    }

    /// The oracle the manager computes statuses with.
    pub const fn oracle(&self) -> &MessageStatusOracle<L1, L2> {
        &self.oracle
    }

    /// Decodes the tickets created by a parent chain transaction, in log order.
    ///
    /// An ETH deposit yields one ticket without calldata, a token deposit one ticket, and a
    /// custom gateway registration two: the gateway token mapping first, then the router
    /// registration.
    pub fn from_receipt(&self, receipt: &TransactionReceipt) -> BridgeResult<Vec<RetryableTicket>> {
        Ok(extract_retryable_tickets(receipt, &self.oracle.providers().network)?)
    }
}

impl<L1, L2> RetryableTicketManager<L1, L2>
where
    L1: ChainProvider,
    L2: ChainProvider,
{
    /// Computes the status of `ticket`.
    pub async fn status(&self, ticket: &RetryableTicket) -> BridgeResult<L1ToL2MessageStatus> {
        self.oracle.retryable_status(ticket).await
    }

    /// Polls until `ticket` is [L1ToL2MessageStatus::Redeemed],
    /// [L1ToL2MessageStatus::CreationFailed] or [L1ToL2MessageStatus::Expired], returning the
    /// terminal status and the child chain receipt that settled it.
    pub async fn wait_for_status(
        &self,
        ticket: &RetryableTicket,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> BridgeResult<RetryableWaitResult> {
        let (status, receipt) = wait_for_status_with(ticket, config, cancel, || async {
            let result = self.oracle.retryable_status_with_receipt(ticket).await?;
            Ok::<_, BridgeError>((result.status, result.receipt))
        })
        .await?;

        if status == L1ToL2MessageStatus::Redeemed {
            info!(
                target: "retryable",
                id = %ticket.id(),
                ticket_id = %ticket.ticket_id,
                "Ticket redeemed"
            );
        } else {
            warn!(
                target: "retryable",
                id = %ticket.id(),
                ticket_id = %ticket.ticket_id,
                %status,
                "Ticket failed"
            );
        }
        Ok(RetryableWaitResult { status, receipt })
    }

    /// Polls until `ticket` either reaches a terminal status or was created without being
    /// redeemed by its auto-redeem.
    ///
    /// In the latter case the result reports [L1ToL2MessageStatus::FundsDepositedOnL2] with the
    /// failed auto-redeem receipt (`None` if no auto-redeem was scheduled): the ticket now waits
    /// for a manual redeem or its expiry.
    pub async fn wait_for_auto_redeem(
        &self,
        ticket: &RetryableTicket,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> BridgeResult<RetryableWaitResult> {
        let (status, (receipt, _)) = wait_until(
            ticket,
            config,
            cancel,
            || async {
                let result = self.oracle.retryable_status_with_receipt(ticket).await?;
                if result.status != L1ToL2MessageStatus::FundsDepositedOnL2 {
                    return Ok::<_, BridgeError>((result.status, (result.receipt, false)));
                }
                let auto = self.oracle.auto_redeem_attempt(ticket).await?;
                Ok((result.status, (auto, true)))
            },
            |status: &L1ToL2MessageStatus, attached: &(Option<TransactionReceipt>, bool)| {
                status.is_terminal() || attached.1
            },
        )
        .await?;

        if status == L1ToL2MessageStatus::FundsDepositedOnL2 {
            warn!(
                target: "retryable",
                id = %ticket.id(),
                ticket_id = %ticket.ticket_id,
                "Auto-redeem did not redeem ticket"
            );
        }
        Ok(RetryableWaitResult { status, receipt })
    }

    /// Returns the receipt of the auto-redeem attempted by the creation transaction of `ticket`.
    pub async fn auto_redeem_attempt(
        &self,
        ticket: &RetryableTicket,
    ) -> BridgeResult<Option<TransactionReceipt>> {
        self.oracle.auto_redeem_attempt(ticket).await
    }

    /// Searches the redeem attempts of `ticket` for one that succeeded.
    pub async fn successful_redeem(&self, ticket: &RetryableTicket) -> BridgeResult<RedeemLookup> {
        self.oracle.successful_redeem(ticket).await
    }

    /// Returns the child chain timestamp at which `ticket` expires.
    pub async fn timeout(&self, ticket: &RetryableTicket) -> BridgeResult<u64> {
        let call = IArbRetryableTx::getTimeoutCall { ticketId: ticket.ticket_id };
        match self.oracle.providers().l2.call_sol(ARB_RETRYABLE_TX_ADDRESS, call).await {
            Ok(ret) => Ok(ret.timeout.saturating_to()),
            Err(err) if err.reverted_with::<IArbRetryableTx::NoTicketWithID>() => {
                Err(BridgeError::NotFound(ticket.id()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Submits a manual redeem of `ticket`. Only valid while the ticket holds its funds.
    pub async fn redeem<S: ChainSigner>(
        &self,
        ticket: &RetryableTicket,
        signer: &S,
    ) -> BridgeResult<PendingTransaction> {
        self.ensure_redeemable(ticket, "redeem").await?;
        let input = IArbRetryableTx::redeemCall { ticketId: ticket.ticket_id }.abi_encode();
        let request = TransactionRequest::call(ARB_RETRYABLE_TX_ADDRESS, input);
        let pending = PendingTransaction::send(signer, request).await?;
        info!(
            target: "retryable",
            id = %ticket.id(),
            ticket_id = %ticket.ticket_id,
            tx = %pending.hash(),
            "Submitted manual redeem"
        );
        Ok(pending)
    }

    /// Cancels `ticket`, refunding its call value to the beneficiary. Only valid while the ticket
    /// holds its funds; afterwards the ticket reports [L1ToL2MessageStatus::Expired].
    pub async fn cancel<S: ChainSigner>(
        &self,
        ticket: &RetryableTicket,
        signer: &S,
    ) -> BridgeResult<PendingTransaction> {
        self.ensure_redeemable(ticket, "cancel").await?;
        let input = IArbRetryableTx::cancelCall { ticketId: ticket.ticket_id }.abi_encode();
        let request = TransactionRequest::call(ARB_RETRYABLE_TX_ADDRESS, input);
        let pending = PendingTransaction::send(signer, request).await?;
        info!(
            target: "retryable",
            id = %ticket.id(),
            ticket_id = %ticket.ticket_id,
            tx = %pending.hash(),
            "Submitted cancellation"
        );
        Ok(pending)
    }

    /// Extends the lifetime of `ticket` by one lifetime period.
    pub async fn keepalive<S: ChainSigner>(
        &self,
        ticket: &RetryableTicket,
        signer: &S,
    ) -> BridgeResult<PendingTransaction> {
        self.ensure_redeemable(ticket, "keep alive").await?;
        let input = IArbRetryableTx::keepaliveCall { ticketId: ticket.ticket_id }.abi_encode();
        let request = TransactionRequest::call(ARB_RETRYABLE_TX_ADDRESS, input);
        let pending = PendingTransaction::send(signer, request).await?;
        info!(
            target: "retryable",
            id = %ticket.id(),
            ticket_id = %ticket.ticket_id,
            tx = %pending.hash(),
            "Submitted keepalive"
        );
        Ok(pending)
    }

    async fn ensure_redeemable(
        &self,
        ticket: &RetryableTicket,
        operation: &'static str,
    ) -> BridgeResult<()> {
        let status = self.status(ticket).await?;
        if status != L1ToL2MessageStatus::FundsDepositedOnL2 {
            return Err(BridgeError::InvalidState {
                id: ticket.id(),
                operation,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Bytes, B256, U256};
    use nitro_bridge_devnet::{Devnet, DevnetProvider};
    use nitro_bridge_primitives::{abi::IInbox, RetryableKind};
    use nitro_bridge_providers::test_utils::MockChainProvider;

    fn manager(devnet: &Devnet) -> RetryableTicketManager<DevnetProvider, DevnetProvider> {
        let providers = BridgeProviders::new(devnet.l1(), devnet.l2(), devnet.network());
        RetryableTicketManager::new(providers)
    }

    fn poll() -> PollConfig {
        PollConfig::from_millis(1, 5_000).unwrap()
    }

    async fn submit_retryable(devnet: &Devnet, gas_limit: u64, data: Bytes) -> RetryableTicket {
        let l1 = devnet.l1();
        let call = IInbox::createRetryableTicketCall {
            to: address!("00000000000000000000000000000000000d0d0d"),
            l2CallValue: U256::ZERO,
            maxSubmissionCost: U256::from(1_000_000_000_000_000u64),
            excessFeeRefundAddress: l1.address(),
            callValueRefundAddress: l1.address(),
            gasLimit: U256::from(gas_limit),
            maxFeePerGas: U256::from(1_000_000_000u64),
            data,
        };
        let request = TransactionRequest::call(devnet.network().eth_bridge.inbox, call.abi_encode())
            .with_value(U256::from(10_000_000_000_000_000u64));
        let receipt = PendingTransaction::send(&l1, request)
            .await
            .unwrap()
            .wait(&l1, &poll(), &CancellationToken::new())
            .await
            .unwrap();
        let mut tickets = manager(devnet).from_receipt(&receipt).unwrap();
        assert_eq!(tickets.len(), 1);
        tickets.remove(0)
    }

    #[tokio::test]
    async fn test_eth_deposit_yields_one_value_only_ticket() {
        let devnet = Devnet::new();
        let l1 = devnet.l1();
        let request = TransactionRequest::call(
            devnet.network().eth_bridge.inbox,
            IInbox::depositEthCall {}.abi_encode(),
        )
        .with_value(U256::from(5));
        let receipt = PendingTransaction::send(&l1, request)
            .await
            .unwrap()
            .wait(&l1, &poll(), &CancellationToken::new())
            .await
            .unwrap();

        let manager = manager(&devnet);
        let tickets = manager.from_receipt(&receipt).unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].kind, RetryableKind::EthDeposit);
        assert!(tickets[0].calldata.is_empty());

        let result =
            manager.wait_for_status(&tickets[0], &poll(), &CancellationToken::new()).await.unwrap();
        assert_eq!(result.status, L1ToL2MessageStatus::Redeemed);
        assert_eq!(result.receipt.unwrap().transaction_hash, tickets[0].ticket_id);
    }

    #[tokio::test]
    async fn test_auto_redeem_detected_from_creation_receipt() {
        let devnet = Devnet::new();
        let ticket = submit_retryable(&devnet, 500_000, Bytes::from_static(&[0xca, 0xfe])).await;
        let manager = manager(&devnet);

        let auto = manager.auto_redeem_attempt(&ticket).await.unwrap().unwrap();
        assert!(auto.status);
        assert_eq!(manager.status(&ticket).await.unwrap(), L1ToL2MessageStatus::Redeemed);
        assert_eq!(manager.successful_redeem(&ticket).await.unwrap(), RedeemLookup::Redeemed(auto));
    }

    #[tokio::test]
    async fn test_failed_auto_redeem_then_manual_redeem() {
        let devnet = Devnet::new();
        let ticket = submit_retryable(&devnet, 1, Bytes::from_static(&[0xca, 0xfe])).await;
        let manager = manager(&devnet);

        let auto = manager.auto_redeem_attempt(&ticket).await.unwrap().unwrap();
        assert!(!auto.status);
        assert_eq!(manager.status(&ticket).await.unwrap(), L1ToL2MessageStatus::FundsDepositedOnL2);
        // Status is a pure function of chain state.
        assert_eq!(manager.status(&ticket).await.unwrap(), L1ToL2MessageStatus::FundsDepositedOnL2);
        assert!(manager.timeout(&ticket).await.unwrap() > 0);

        let l2 = devnet.l2();
        let pending = manager.redeem(&ticket, &l2).await.unwrap();
        pending.wait(&l2, &poll(), &CancellationToken::new()).await.unwrap();

        let result =
            manager.wait_for_status(&ticket, &poll(), &CancellationToken::new()).await.unwrap();
        assert_eq!(result.status, L1ToL2MessageStatus::Redeemed);
        assert_ne!(result.receipt.unwrap().transaction_hash, auto.transaction_hash);

        let err = manager.redeem(&ticket, &l2).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidState { operation: "redeem", .. }));
    }

    #[tokio::test]
    async fn test_wait_for_auto_redeem_stops_on_failed_attempt() {
        let devnet = Devnet::new();
        let ticket = submit_retryable(&devnet, 1, Bytes::from_static(&[0xca, 0xfe])).await;
        let result = manager(&devnet)
            .wait_for_auto_redeem(&ticket, &poll(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status, L1ToL2MessageStatus::FundsDepositedOnL2);
        assert!(!result.receipt.unwrap().status);
    }

    #[tokio::test]
    async fn test_expiry_and_keepalive() {
        let devnet = Devnet::new();
        let ticket = submit_retryable(&devnet, 1, Bytes::from_static(&[1])).await;
        let manager = manager(&devnet);
        let l2 = devnet.l2();

        let timeout = manager.timeout(&ticket).await.unwrap();
        let pending = manager.keepalive(&ticket, &l2).await.unwrap();
        pending.wait(&l2, &poll(), &CancellationToken::new()).await.unwrap();
        let extended = manager.timeout(&ticket).await.unwrap();
        assert_eq!(extended, timeout + devnet.network().retryable_lifetime_seconds);

        devnet.advance_l2_time(2 * devnet.network().retryable_lifetime_seconds + 1);
        let result =
            manager.wait_for_status(&ticket, &poll(), &CancellationToken::new()).await.unwrap();
        assert_eq!(result.status, L1ToL2MessageStatus::Expired);
        assert!(result.receipt.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_ticket_reports_expired() {
        let devnet = Devnet::new();
        let ticket = submit_retryable(&devnet, 1, Bytes::from_static(&[1])).await;
        let manager = manager(&devnet);
        let l2 = devnet.l2();

        let pending = manager.cancel(&ticket, &l2).await.unwrap();
        pending.wait(&l2, &poll(), &CancellationToken::new()).await.unwrap();
        assert_eq!(manager.status(&ticket).await.unwrap(), L1ToL2MessageStatus::Expired);
        assert!(matches!(manager.timeout(&ticket).await, Err(BridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_underfunded_submission_fails_creation() {
        let devnet = Devnet::new();
        devnet.set_submission_fee(U256::from(u64::MAX));
        let ticket = submit_retryable(&devnet, 500_000, Bytes::from_static(&[1])).await;

        let result = manager(&devnet)
            .wait_for_status(&ticket, &poll(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status, L1ToL2MessageStatus::CreationFailed);
        assert!(!result.receipt.unwrap().status);
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_not_found() {
        let devnet = Devnet::new();
        let ticket = submit_retryable(&devnet, 1, Bytes::from_static(&[1])).await;
        let offline = MockChainProvider::default();
        offline.set_offline(true);
        let manager = RetryableTicketManager::new(BridgeProviders::new(
            devnet.l1(),
            offline,
            devnet.network(),
        ));

        let err = manager.status(&ticket).await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, BridgeError::Provider(_)));
    }

    #[tokio::test]
    async fn test_ticket_without_origin_is_not_found() {
        let devnet = Devnet::new();
        let mut ticket = submit_retryable(&devnet, 500_000, Bytes::from_static(&[1])).await;
        ticket.origin.tx_hash = B256::repeat_byte(0xee);
        ticket.ticket_id = B256::repeat_byte(0xdd);
        let manager = manager(&devnet);

        let err = manager.status(&ticket).await.unwrap_err();
        assert_eq!(err, BridgeError::NotFound(ticket.id()));
        assert!(!err.is_transient());

        let err =
            manager.wait_for_status(&ticket, &poll(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, BridgeError::NotFound(ticket.id()));
    }

    #[tokio::test]
    async fn test_mined_origin_without_creation_is_not_yet_created() {
        let devnet = Devnet::new();
        let ticket = submit_retryable(&devnet, 500_000, Bytes::from_static(&[1])).await;
        let lagging = MockChainProvider::default();
        let manager = RetryableTicketManager::new(BridgeProviders::new(
            devnet.l1(),
            lagging,
            devnet.network(),
        ));
        assert_eq!(manager.status(&ticket).await.unwrap(), L1ToL2MessageStatus::NotYetCreated);
    }
}
