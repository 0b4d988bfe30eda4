//! The [MessageStatusOracle] computes message statuses from chain state.

use crate::{BridgeError, BridgeProviders, BridgeResult};
use alloy_primitives::{B256, U256};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use nitro_bridge_primitives::{
    abi::{IArbRetryableTx, IOutbox, IRollup},
    extract_outbox_messages, ArbHeaderInfo, CrossDomainMessage, L1ToL2MessageStatus,
    L2ToL1MessageStatus, OutboxMessage, RetryableTicket, TransactionReceipt,
    ARB_RETRYABLE_TX_ADDRESS,
};
use nitro_bridge_providers::{fetch_logs, BlockTag, ChainProvider, FilteredLog, LogFilter};
use tracing::debug;

/// Computes the current status of a message of type `M`.
#[async_trait]
pub trait StatusOracle<M: CrossDomainMessage>: Send + Sync {
    /// Returns the status of `message`. Read only; provider failures are returned, never retried.
    async fn status(&self, message: &M) -> BridgeResult<M::Status>;
}

/// The status of a retryable ticket together with the child chain receipt that settled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryableWaitResult {
    /// The status of the ticket.
    pub status: L1ToL2MessageStatus,
    /// The successful redeem for [L1ToL2MessageStatus::Redeemed] (the creation receipt for
    /// tickets without calldata), the reverted creation for
    /// [L1ToL2MessageStatus::CreationFailed], `None` otherwise.
    pub receipt: Option<TransactionReceipt>,
}

impl RetryableWaitResult {
    const fn bare(status: L1ToL2MessageStatus) -> Self {
        Self { status, receipt: None }
    }

    const fn with_receipt(status: L1ToL2MessageStatus, receipt: TransactionReceipt) -> Self {
        Self { status, receipt: Some(receipt) }
    }
}

/// The outcome of a search for a successful redeem of a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemLookup {
    /// A redeem attempt succeeded; carries its receipt.
    Redeemed(TransactionReceipt),
    /// No redeem attempt succeeded so far.
    NotRedeemed,
}

/// The send accumulator state of the latest confirmed assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedSend {
    /// The assertion number.
    pub node_num: u64,
    /// The child chain block the assertion confirmed.
    pub l2_block_hash: B256,
    /// The confirmed send root.
    pub send_root: B256,
    /// The number of messages covered by the confirmed send root.
    pub send_count: u64,
    /// The parent chain block the confirmation was logged in.
    pub confirmed_at_block: u64,
}

/// Computes the lifecycle status of retryable tickets and outbox messages.
///
/// Every computation is a pure function of chain state, so one oracle can serve any number of
/// concurrent callers.
#[derive(Debug, Clone)]
pub struct MessageStatusOracle<L1, L2> {
    providers: BridgeProviders<L1, L2>,
}

impl<L1, L2> MessageStatusOracle<L1, L2> {
    /// Creates an oracle over the given chains.
    pub const fn new(providers: BridgeProviders<L1, L2>) -> Self {
        Self { providers }
    }

    /// The chains the oracle reads from.
    pub const fn providers(&self) -> &BridgeProviders<L1, L2> {
        &self.providers
    }
}

impl<L1, L2> MessageStatusOracle<L1, L2>
where
    L1: ChainProvider,
    L2: ChainProvider,
{
    /// Computes the status of `ticket`.
    pub async fn retryable_status(
        &self,
        ticket: &RetryableTicket,
    ) -> BridgeResult<L1ToL2MessageStatus> {
        Ok(self.retryable_status_with_receipt(ticket).await?.status)
    }

    /// Computes the status of `ticket` and fetches the receipt that settled it.
    ///
    /// The ticket id doubles as the hash of its creation transaction:
    /// - no creation receipt: [L1ToL2MessageStatus::NotYetCreated], or [BridgeError::NotFound]
    ///   if the parent chain transaction that should schedule the ticket is missing or reverted
    /// - reverted creation: [L1ToL2MessageStatus::CreationFailed]
    /// - created without calldata, or a redeem attempt (the auto-redeem recorded in the creation
    ///   receipt, or a later manual one) succeeded: [L1ToL2MessageStatus::Redeemed]
    /// - the ticket is gone or its timeout has passed: [L1ToL2MessageStatus::Expired]
    /// - otherwise [L1ToL2MessageStatus::FundsDepositedOnL2]
    pub async fn retryable_status_with_receipt(
        &self,
        ticket: &RetryableTicket,
    ) -> BridgeResult<RetryableWaitResult> {
        let result = self.compute_retryable_status(ticket).await?;
        debug!(
            target: "oracle",
            id = %ticket.id(),
            ticket_id = %ticket.ticket_id,
            status = %result.status,
            "Computed retryable status"
        );
        Ok(result)
    }

    async fn ensure_origin_mined(
        &self,
        ticket: &RetryableTicket,
    ) -> BridgeResult<RetryableWaitResult> {
        match self.providers.l1.transaction_receipt(ticket.origin.tx_hash).await? {
            Some(origin) if origin.status => {
                Ok(RetryableWaitResult::bare(L1ToL2MessageStatus::NotYetCreated))
            }
            _ => Err(BridgeError::NotFound(ticket.id())),
        }
    }

    async fn compute_retryable_status(
        &self,
        ticket: &RetryableTicket,
    ) -> BridgeResult<RetryableWaitResult> {
        let Some(creation) = self.providers.l2.transaction_receipt(ticket.ticket_id).await? else {
            return self.ensure_origin_mined(ticket).await;
        };
        if !creation.status {
            return Ok(RetryableWaitResult::with_receipt(
                L1ToL2MessageStatus::CreationFailed,
                creation,
            ));
        }
        if ticket.is_value_only() {
            return Ok(RetryableWaitResult::with_receipt(L1ToL2MessageStatus::Redeemed, creation));
        }

        if let Some(retry) = self.auto_redeem_in(ticket, &creation).await? {
            if retry.status {
                return Ok(RetryableWaitResult::with_receipt(L1ToL2MessageStatus::Redeemed, retry));
            }
        }
        let lookup = self.scan_redeems(ticket, creation.block_number).await?;
        if let RedeemLookup::Redeemed(retry) = lookup {
            return Ok(RetryableWaitResult::with_receipt(L1ToL2MessageStatus::Redeemed, retry));
        }

        let call = IArbRetryableTx::getTimeoutCall { ticketId: ticket.ticket_id };
        match self.providers.l2.call_sol(ARB_RETRYABLE_TX_ADDRESS, call).await {
            Ok(ret) => {
                let now = self.l2_head_timestamp().await?;
                if ret.timeout <= U256::from(now) {
                    Ok(RetryableWaitResult::bare(L1ToL2MessageStatus::Expired))
                } else {
                    Ok(RetryableWaitResult::bare(L1ToL2MessageStatus::FundsDepositedOnL2))
                }
            }
            Err(err) if err.reverted_with::<IArbRetryableTx::NoTicketWithID>() => {
                // The ticket disappears when redeemed, so a redeem landing after the scan above
                // looks like an expiry here.
                match self.scan_redeems(ticket, creation.block_number).await? {
                    RedeemLookup::Redeemed(retry) => {
                        Ok(RetryableWaitResult::with_receipt(L1ToL2MessageStatus::Redeemed, retry))
                    }
                    RedeemLookup::NotRedeemed => {
                        Ok(RetryableWaitResult::bare(L1ToL2MessageStatus::Expired))
                    }
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the receipt of the auto-redeem scheduled by the creation transaction of `ticket`,
    /// or `None` if the ticket has not been created or no auto-redeem was scheduled.
    pub async fn auto_redeem_attempt(
        &self,
        ticket: &RetryableTicket,
    ) -> BridgeResult<Option<TransactionReceipt>> {
        match self.providers.l2.transaction_receipt(ticket.ticket_id).await? {
            Some(creation) => self.auto_redeem_in(ticket, &creation).await,
            None => Ok(None),
        }
    }

    /// Searches every redeem attempt of `ticket` for one that succeeded.
    pub async fn successful_redeem(&self, ticket: &RetryableTicket) -> BridgeResult<RedeemLookup> {
        match self.providers.l2.transaction_receipt(ticket.ticket_id).await? {
            Some(creation) if creation.status => {
                self.scan_redeems(ticket, creation.block_number).await
            }
            _ => Ok(RedeemLookup::NotRedeemed),
        }
    }

    async fn auto_redeem_in(
        &self,
        ticket: &RetryableTicket,
        creation: &TransactionReceipt,
    ) -> BridgeResult<Option<TransactionReceipt>> {
        for log in creation.logs_from(ARB_RETRYABLE_TX_ADDRESS) {
            if log.topics().first() != Some(&IArbRetryableTx::RedeemScheduled::SIGNATURE_HASH) {
                continue;
            }
            let event = IArbRetryableTx::RedeemScheduled::decode_log_data(&log.data, true)?;
            if event.ticketId != ticket.ticket_id {
                continue;
            }
            let retry = self.providers.l2.transaction_receipt(event.retryTxHash).await?;
            if retry.is_none() {
                return Err(BridgeError::Inconsistent(format!(
                    "auto-redeem {} of ticket {} scheduled but not mined",
                    event.retryTxHash, ticket.ticket_id
                )));
            }
            return Ok(retry);
        }
        Ok(None)
    }

    async fn scan_redeems(
        &self,
        ticket: &RetryableTicket,
        from_block: u64,
    ) -> BridgeResult<RedeemLookup> {
        let filter = LogFilter::new(from_block, BlockTag::Latest)
            .address(ARB_RETRYABLE_TX_ADDRESS)
            .event(IArbRetryableTx::RedeemScheduled::SIGNATURE_HASH)
            .topic(1, ticket.ticket_id);
        let logs = fetch_logs(&self.providers.l2, &filter, &self.providers.log_query).await?;

        for log in logs {
            let event = IArbRetryableTx::RedeemScheduled::decode_log_data(&log.log.data, true)?;
            if let Some(retry) = self.providers.l2.transaction_receipt(event.retryTxHash).await? {
                if retry.status {
                    return Ok(RedeemLookup::Redeemed(retry));
                }
            }
        }
        Ok(RedeemLookup::NotRedeemed)
    }

    async fn l2_head_timestamp(&self) -> BridgeResult<u64> {
        let head = self.providers.l2.block_number().await?;
        let header = self
            .providers
            .l2
            .header_by_number(head)
            .await?
            .ok_or_else(|| {
                BridgeError::Inconsistent(format!("child chain head {head} not served"))
            })?;
        Ok(header.timestamp)
    }

    /// Computes the status of an outbox message.
    ///
    /// Fails with [BridgeError::OriginReorged] if the child chain block the message was emitted in
    /// is no longer served, and with [BridgeError::NotFound] if its origin transaction did not
    /// emit it.
    ///
    /// With an expiry window configured, a message whose window lapsed is
    /// [L2ToL1MessageStatus::Confirmed] only if an assertion covering it was confirmed inside the
    /// window. Otherwise it stays [L2ToL1MessageStatus::Expired] for good.
    pub async fn outbox_status(
        &self,
        message: &OutboxMessage,
    ) -> BridgeResult<L2ToL1MessageStatus> {
        let status = self.compute_outbox_status(message).await?;
        debug!(
            target: "oracle",
            id = %message.id(),
            position = message.position,
            %status,
            "Computed outbox status"
        );
        Ok(status)
    }

    async fn compute_outbox_status(
        &self,
        message: &OutboxMessage,
    ) -> BridgeResult<L2ToL1MessageStatus> {
        self.ensure_emitted(message).await?;

        let outbox = self.providers.network.eth_bridge.outbox;
        let call = IOutbox::isSpentCall { index: U256::from(message.position) };
        if self.providers.l1.call_sol(outbox, call).await?.spent {
            return Ok(L2ToL1MessageStatus::Executed);
        }

        let sent_at = message.eth_block_num.saturating_to::<u64>();
        if let Some(window) = self.providers.network.outbox_expiry_blocks {
            let deadline = sent_at.saturating_add(window);
            if self.providers.l1.block_number().await? > deadline {
                let confirmed = self.confirmed_send_between(sent_at, deadline).await?;
                return Ok(if covers(confirmed.as_ref(), message) {
                    L2ToL1MessageStatus::Confirmed
                } else {
                    L2ToL1MessageStatus::Expired
                });
            }
        }

        if covers(self.confirmed_send().await?.as_ref(), message) {
            Ok(L2ToL1MessageStatus::Confirmed)
        } else {
            Ok(L2ToL1MessageStatus::Unconfirmed)
        }
    }

    async fn ensure_emitted(&self, message: &OutboxMessage) -> BridgeResult<()> {
        let block_hash = message.origin.block_hash;
        if self.providers.l2.header_by_hash(block_hash).await?.is_none() {
            return Err(BridgeError::OriginReorged { id: message.id(), block_hash });
        }

        let Some(receipt) = self.providers.l2.transaction_receipt(message.origin.tx_hash).await?
        else {
            return Err(BridgeError::NotFound(message.id()));
        };
        if receipt.block_hash != block_hash {
            return Err(BridgeError::OriginReorged { id: message.id(), block_hash });
        }
        let emitted = extract_outbox_messages(&receipt)?
            .iter()
            .any(|sent| sent.position == message.position && sent.hash == message.hash);
        if !emitted {
            return Err(BridgeError::NotFound(message.id()));
        }
        Ok(())
    }

    /// Reads the send accumulator state of the latest confirmed assertion, or `None` while only
    /// the genesis assertion exists.
    ///
    /// The confirmation event is searched from the block the assertion was created in.
    pub async fn confirmed_send(&self) -> BridgeResult<Option<ConfirmedSend>> {
        let rollup = self.providers.network.eth_bridge.rollup;
        let node_num =
            self.providers.l1.call_sol(rollup, IRollup::latestConfirmedCall {}).await?.nodeNum;
        if node_num == 0 {
            return Ok(None);
        }
        let created_at = self
            .providers
            .l1
            .call_sol(rollup, IRollup::getNodeCreationBlockForLogLookupCall { nodeNum: node_num })
            .await?
            .blockNumber
            .saturating_to::<u64>();

        let filter = LogFilter::new(created_at, BlockTag::Latest)
            .address(rollup)
            .event(IRollup::NodeConfirmed::SIGNATURE_HASH)
            .topic(1, B256::from(U256::from(node_num).to_be_bytes::<32>()));
        let logs = fetch_logs(&self.providers.l1, &filter, &self.providers.log_query).await?;
        let log = logs.last().ok_or_else(|| {
            BridgeError::Inconsistent(format!(
                "confirmed assertion {node_num} has no confirmation event"
            ))
        })?;
        self.resolve_confirmation(log).await.map(Some)
    }

    /// Reads the send accumulator state of the last assertion confirmed between `from_block` and
    /// `to_block`, or `None` if no assertion was confirmed in that range.
    pub async fn confirmed_send_between(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> BridgeResult<Option<ConfirmedSend>> {
        let filter = LogFilter::new(from_block, to_block)
            .address(self.providers.network.eth_bridge.rollup)
            .event(IRollup::NodeConfirmed::SIGNATURE_HASH);
        let logs = fetch_logs(&self.providers.l1, &filter, &self.providers.log_query).await?;
        match logs.last() {
            Some(log) => self.resolve_confirmation(log).await.map(Some),
            None => Ok(None),
        }
    }

    async fn resolve_confirmation(&self, log: &FilteredLog) -> BridgeResult<ConfirmedSend> {
        let event = IRollup::NodeConfirmed::decode_log_data(&log.log.data, true)?;
        let node_num = event.nodeNum;

        let header = self.providers.l2.header_by_hash(event.blockHash).await?.ok_or_else(|| {
            BridgeError::Inconsistent(format!(
                "assertion {node_num} confirms unknown child block {}",
                event.blockHash
            ))
        })?;
        let info = ArbHeaderInfo::from_header(&header).ok_or_else(|| {
            BridgeError::Inconsistent(format!(
                "child block {} carries no send root",
                event.blockHash
            ))
        })?;
        if info.send_root != event.sendRoot {
            return Err(BridgeError::Inconsistent(format!(
                "assertion {node_num} send root {} differs from block send root {}",
                event.sendRoot, info.send_root
            )));
        }

        Ok(ConfirmedSend {
            node_num,
            l2_block_hash: event.blockHash,
            send_root: info.send_root,
            send_count: info.send_count,
            confirmed_at_block: log.block_number,
        })
    }
}

fn covers(confirmed: Option<&ConfirmedSend>, message: &OutboxMessage) -> bool {
    confirmed.is_some_and(|confirmed| confirmed.send_count > message.position)
}

#[async_trait]
impl<L1, L2> StatusOracle<RetryableTicket> for MessageStatusOracle<L1, L2>
where
    L1: ChainProvider,
    L2: ChainProvider,
{
    async fn status(&self, message: &RetryableTicket) -> BridgeResult<L1ToL2MessageStatus> {
        self.retryable_status(message).await
    }
}

#[async_trait]
impl<L1, L2> StatusOracle<OutboxMessage> for MessageStatusOracle<L1, L2>
where
    L1: ChainProvider,
    L2: ChainProvider,
{
    async fn status(&self, message: &OutboxMessage) -> BridgeResult<L2ToL1MessageStatus> {
        self.outbox_status(message).await
    }
}
