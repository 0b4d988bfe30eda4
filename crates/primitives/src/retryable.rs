//! Parent-to-child messages: retryable tickets and ETH deposits.

use crate::{
    abi::{IBridge, IInbox},
    CrossDomainMessage, L2Network, MessageOrigin, MessageStatus, TransactionReceipt,
    DEPOSIT_TX_TYPE, L1_MESSAGE_TYPE_ETH_DEPOSIT, L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX,
    SUBMIT_RETRYABLE_TX_TYPE,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::RlpEncodable;
use alloy_sol_types::SolEvent;
use core::fmt::{self, Display};
use std::collections::HashMap;
use thiserror::Error;

/// The number of 32 byte words preceding the calldata in a retryable submission payload.
const SUBMIT_RETRYABLE_HEADER_WORDS: usize = 9;

/// The length of an ETH deposit payload: a 20 byte destination followed by a 32 byte value.
const ETH_DEPOSIT_PAYLOAD_LEN: usize = 20 + 32;

/// The lifecycle of a parent-to-child message.
///
/// ```text
/// NotYetCreated ──► CreationFailed
///       │
///       ▼
/// FundsDepositedOnL2 ──► Redeemed
///       │
///       └──────────────► Expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum L1ToL2MessageStatus {
    /// The ticket has not been created on the child chain yet.
    NotYetCreated,
    /// The creation transaction reverted on the child chain, e.g. because the submission cost
    /// was too low.
    CreationFailed,
    /// The ticket exists and holds its funds, waiting to be redeemed.
    FundsDepositedOnL2,
    /// A redeem attempt of the ticket succeeded.
    Redeemed,
    /// The ticket lifetime elapsed (or the ticket was cancelled) before a successful redeem.
    Expired,
}

impl Display for L1ToL2MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotYetCreated => "NOT_YET_CREATED",
            Self::CreationFailed => "CREATION_FAILED",
            Self::FundsDepositedOnL2 => "FUNDS_DEPOSITED_ON_L2",
            Self::Redeemed => "REDEEMED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}

impl MessageStatus for L1ToL2MessageStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::CreationFailed | Self::Redeemed | Self::Expired)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::NotYetCreated => 0,
            Self::FundsDepositedOnL2 => 1,
            Self::CreationFailed | Self::Redeemed | Self::Expired => 2,
        }
    }
}

/// The delayed inbox message kind a ticket was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RetryableKind {
    /// A retryable ticket submission, executed on the child chain by a redeem.
    SubmitRetryable,
    /// A plain ETH deposit. Carries no calldata and needs no redeem.
    EthDeposit,
}

/// A parent-to-child message as decoded from the parent chain receipt that created it.
///
/// A ticket is immutable. Its status is a function of child chain state and is computed on
/// demand rather than stored.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RetryableTicket {
    /// Where the message was observed on the parent chain.
    pub origin: MessageOrigin,
    /// The inbox message kind.
    pub kind: RetryableKind,
    /// The id of the ticket on the child chain. This is also the hash of the child chain
    /// transaction that creates the ticket (or credits the deposit).
    pub ticket_id: B256,
    /// The sender as seen by the child chain (aliased for contract senders).
    pub sender: Address,
    /// The call target on the child chain.
    pub destination_address: Address,
    /// The value passed to the call target.
    pub l2_call_value: U256,
    /// The total value deposited on the child chain with the message.
    pub deposit_value: U256,
    /// The maximum fee paid for keeping the ticket in child chain state.
    pub max_submission_cost: U256,
    /// Receives unused gas and submission fees.
    pub excess_fee_refund_address: Address,
    /// Receives the call value if the ticket expires or is cancelled.
    pub call_value_refund_address: Address,
    /// The gas limit of the auto-redeem.
    pub gas_limit: U256,
    /// The max fee per gas of the auto-redeem.
    pub max_fee_per_gas: U256,
    /// The calldata executed against `destination_address`.
    pub calldata: Bytes,
    /// The parent chain base fee at submission time.
    pub l1_base_fee: U256,
}

impl RetryableTicket {
    /// Whether the ticket carries no calldata, in which case it settles as soon as its funds land
    /// on the child chain.
    pub fn is_value_only(&self) -> bool {
        self.calldata.is_empty()
    }
}

impl CrossDomainMessage for RetryableTicket {
    type Status = L1ToL2MessageStatus;

    fn origin(&self) -> &MessageOrigin {
        &self.origin
    }

    fn payload(&self) -> &Bytes {
        &self.calldata
    }
}

/// An error decoding parent-to-child messages out of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryableDecodeError {
    /// A payload is shorter than its fixed header.
    #[error("Message {index} payload too short. Expected at least {expected} bytes, got {actual}")]
    ShortPayload {
        /// The inbox message index.
        index: u64,
        /// The minimum payload length.
        expected: usize,
        /// The actual payload length.
        actual: usize,
    },
    /// The declared calldata length does not match the payload.
    #[error("Message {0} declares calldata length {1}, but the payload carries {2} bytes")]
    CalldataLength(u64, U256, usize),
    /// A bridge message has no matching inbox payload in the same receipt.
    #[error("Message {0} delivered without an inbox payload")]
    MissingPayload(u64),
    /// The payload does not hash to the data hash recorded by the bridge.
    #[error("Message {0} payload hash mismatch. Expected {1}, got {2}")]
    PayloadHashMismatch(u64, B256, B256),
    /// A bridge or inbox log could not be ABI decoded.
    #[error("Malformed log: {0}")]
    Abi(String),
}

impl From<alloy_sol_types::Error> for RetryableDecodeError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::Abi(err.to_string())
    }
}

/// The fields of a retryable submission payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRetryableData {
    /// The call target.
    pub dest: Address,
    /// The call value.
    pub l2_call_value: U256,
    /// The deposited value.
    pub deposit_value: U256,
    /// The maximum submission fee.
    pub max_submission_fee: U256,
    /// The excess fee refund address.
    pub excess_fee_refund_address: Address,
    /// The call value refund address.
    pub call_value_refund_address: Address,
    /// The auto-redeem gas limit.
    pub gas_limit: U256,
    /// The auto-redeem max fee per gas.
    pub max_fee_per_gas: U256,
    /// The calldata.
    pub data: Bytes,
}

impl SubmitRetryableData {
    /// Decodes the payload of the inbox message with the given index.
    ///
    /// The payload is nine 32 byte words (dest, call value, deposit value, max submission fee,
    /// excess fee refund address, call value refund address, gas limit, max fee per gas, calldata
    /// length) followed by the calldata.
    pub fn decode(index: u64, payload: &[u8]) -> Result<Self, RetryableDecodeError> {
        let header_len = SUBMIT_RETRYABLE_HEADER_WORDS * 32;
        if payload.len() < header_len {
            return Err(RetryableDecodeError::ShortPayload {
                index,
                expected: header_len,
                actual: payload.len(),
            });
        }

        let word = |i: usize| U256::from_be_slice(&payload[i * 32..(i + 1) * 32]);
        let address = |i: usize| Address::from_slice(&payload[i * 32 + 12..(i + 1) * 32]);

        let data = &payload[header_len..];
        let data_len = word(8);
        if data_len != U256::from(data.len()) {
            return Err(RetryableDecodeError::CalldataLength(index, data_len, data.len()));
        }

        Ok(Self {
            dest: address(0),
            l2_call_value: word(1),
            deposit_value: word(2),
            max_submission_fee: word(3),
            excess_fee_refund_address: address(4),
            call_value_refund_address: address(5),
            gas_limit: word(6),
            max_fee_per_gas: word(7),
            data: Bytes::copy_from_slice(data),
        })
    }

    /// Encodes the payload as the inbox does.
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(SUBMIT_RETRYABLE_HEADER_WORDS * 32 + self.data.len());
        out.extend_from_slice(self.dest.into_word().as_slice());
        out.extend_from_slice(&self.l2_call_value.to_be_bytes::<32>());
        out.extend_from_slice(&self.deposit_value.to_be_bytes::<32>());
        out.extend_from_slice(&self.max_submission_fee.to_be_bytes::<32>());
        out.extend_from_slice(self.excess_fee_refund_address.into_word().as_slice());
        out.extend_from_slice(self.call_value_refund_address.into_word().as_slice());
        out.extend_from_slice(&self.gas_limit.to_be_bytes::<32>());
        out.extend_from_slice(&self.max_fee_per_gas.to_be_bytes::<32>());
        out.extend_from_slice(&U256::from(self.data.len()).to_be_bytes::<32>());
        out.extend_from_slice(&self.data);
        out.into()
    }
}

/// The fields of an ETH deposit payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthDepositData {
    /// The credited account.
    pub dest: Address,
    /// The credited value.
    pub value: U256,
}

impl EthDepositData {
    /// Decodes the payload of the inbox message with the given index.
    pub fn decode(index: u64, payload: &[u8]) -> Result<Self, RetryableDecodeError> {
        if payload.len() != ETH_DEPOSIT_PAYLOAD_LEN {
            return Err(RetryableDecodeError::ShortPayload {
                index,
                expected: ETH_DEPOSIT_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }
        Ok(Self {
            dest: Address::from_slice(&payload[..20]),
            value: U256::from_be_slice(&payload[20..]),
        })
    }

    /// Encodes the payload as the inbox does.
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(ETH_DEPOSIT_PAYLOAD_LEN);
        out.extend_from_slice(self.dest.as_slice());
        out.extend_from_slice(&self.value.to_be_bytes::<32>());
        out.into()
    }
}

/// The RLP field order of the child chain transaction creating a retryable ticket.
#[derive(RlpEncodable)]
struct SubmitRetryableTx {
    chain_id: U256,
    request_id: B256,
    from: Address,
    l1_base_fee: U256,
    deposit_value: U256,
    gas_fee_cap: U256,
    gas: U256,
    retry_to: Bytes,
    retry_value: U256,
    beneficiary: Address,
    max_submission_fee: U256,
    fee_refund_address: Address,
    retry_data: Bytes,
}

/// The RLP field order of the child chain transaction crediting an ETH deposit.
#[derive(RlpEncodable)]
struct DepositTx {
    chain_id: U256,
    request_id: B256,
    from: Address,
    to: Address,
    value: U256,
}

fn typed_hash(ty: u8, rlp: Vec<u8>) -> B256 {
    let mut buf = Vec::with_capacity(rlp.len() + 1);
    buf.push(ty);
    buf.extend_from_slice(&rlp);
    keccak256(buf)
}

/// Computes the id of the retryable ticket created by inbox message `message_number`.
pub fn submit_retryable_id(
    chain_id: u64,
    message_number: u64,
    from: Address,
    l1_base_fee: U256,
    data: &SubmitRetryableData,
) -> B256 {
    // A zero destination is encoded as an empty string rather than the zero address.
    let retry_to = if data.dest.is_zero() {
        Bytes::new()
    } else {
        Bytes::copy_from_slice(data.dest.as_slice())
    };
    let tx = SubmitRetryableTx {
        chain_id: U256::from(chain_id),
        request_id: B256::from(U256::from(message_number).to_be_bytes::<32>()),
        from,
        l1_base_fee,
        deposit_value: data.deposit_value,
        gas_fee_cap: data.max_fee_per_gas,
        gas: data.gas_limit,
        retry_to,
        retry_value: data.l2_call_value,
        beneficiary: data.call_value_refund_address,
        max_submission_fee: data.max_submission_fee,
        fee_refund_address: data.excess_fee_refund_address,
        retry_data: data.data.clone(),
    };
    typed_hash(SUBMIT_RETRYABLE_TX_TYPE, alloy_rlp::encode(&tx))
}

/// Computes the hash of the child chain transaction crediting ETH deposit `message_number`.
pub fn eth_deposit_tx_id(
    chain_id: u64,
    message_number: u64,
    from: Address,
    data: &EthDepositData,
) -> B256 {
    let tx = DepositTx {
        chain_id: U256::from(chain_id),
        request_id: B256::from(U256::from(message_number).to_be_bytes::<32>()),
        from,
        to: data.dest,
        value: data.value,
    };
    typed_hash(DEPOSIT_TX_TYPE, alloy_rlp::encode(&tx))
}

/// Extracts every parent-to-child message created by `receipt`, in log order.
///
/// Bridge `MessageDelivered` logs are paired with inbox `InboxMessageDelivered` logs by message
/// index. Messages of kinds other than retryable submissions and ETH deposits are skipped.
pub fn extract_retryable_tickets(
    receipt: &TransactionReceipt,
    network: &L2Network,
) -> Result<Vec<RetryableTicket>, RetryableDecodeError> {
    let mut payloads = HashMap::<U256, Bytes>::new();
    for log in receipt.logs_from(network.eth_bridge.inbox) {
        if log.topics().first() != Some(&IInbox::InboxMessageDelivered::SIGNATURE_HASH) {
            continue;
        }
        let event = IInbox::InboxMessageDelivered::decode_log_data(&log.data, true)?;
        payloads.insert(event.messageNum, event.data);
    }

    let mut tickets = Vec::new();
    for log in receipt.logs_from(network.eth_bridge.bridge) {
        if log.topics().first() != Some(&IBridge::MessageDelivered::SIGNATURE_HASH) {
            continue;
        }
        let delivered = IBridge::MessageDelivered::decode_log_data(&log.data, true)?;
        if delivered.kind != L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX
            && delivered.kind != L1_MESSAGE_TYPE_ETH_DEPOSIT
        {
            continue;
        }

        let index = delivered.messageIndex.saturating_to::<u64>();
        let payload = payloads
            .get(&delivered.messageIndex)
            .ok_or(RetryableDecodeError::MissingPayload(index))?;
        let payload_hash = keccak256(payload);
        if payload_hash != delivered.messageDataHash {
            return Err(RetryableDecodeError::PayloadHashMismatch(
                index,
                delivered.messageDataHash,
                payload_hash,
            ));
        }

        let origin = MessageOrigin {
            tx_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash,
            block_number: receipt.block_number,
            sequence_number: index,
        };
        let ticket = if delivered.kind == L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX {
            let data = SubmitRetryableData::decode(index, payload)?;
            RetryableTicket {
                origin,
                kind: RetryableKind::SubmitRetryable,
                ticket_id: submit_retryable_id(
                    network.chain_id,
                    index,
                    delivered.sender,
                    delivered.baseFeeL1,
                    &data,
                ),
                sender: delivered.sender,
                destination_address: data.dest,
                l2_call_value: data.l2_call_value,
                deposit_value: data.deposit_value,
                max_submission_cost: data.max_submission_fee,
                excess_fee_refund_address: data.excess_fee_refund_address,
                call_value_refund_address: data.call_value_refund_address,
                gas_limit: data.gas_limit,
                max_fee_per_gas: data.max_fee_per_gas,
                calldata: data.data,
                l1_base_fee: delivered.baseFeeL1,
            }
        } else {
            let data = EthDepositData::decode(index, payload)?;
            RetryableTicket {
                origin,
                kind: RetryableKind::EthDeposit,
                ticket_id: eth_deposit_tx_id(network.chain_id, index, delivered.sender, &data),
                sender: delivered.sender,
                destination_address: data.dest,
                l2_call_value: data.value,
                deposit_value: data.value,
                max_submission_cost: U256::ZERO,
                excess_fee_refund_address: data.dest,
                call_value_refund_address: data.dest,
                gas_limit: U256::ZERO,
                max_fee_per_gas: U256::ZERO,
                calldata: Bytes::new(),
                l1_base_fee: delivered.baseFeeL1,
            }
        };
        tickets.push(ticket);
    }

    Ok(tickets)
}
