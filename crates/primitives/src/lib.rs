#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod abi;

mod constants;
pub use constants::{
    ADDRESS_ALIAS_OFFSET, ARB_RETRYABLE_TX_ADDRESS, ARB_SYS_ADDRESS,
    DEFAULT_RETRYABLE_LIFETIME_SECONDS, DEPOSIT_TX_TYPE, L1_MESSAGE_TYPE_ETH_DEPOSIT,
    L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX, NODE_INTERFACE_ADDRESS, SUBMIT_RETRYABLE_TX_TYPE,
};

mod alias;
pub use alias::{apply_l1_to_l2_alias, undo_l1_to_l2_alias};

mod message;
pub use message::{CrossDomainMessage, MessageId, MessageOrigin, MessageStatus};

mod network;
pub use network::{EthBridge, L2Network, TokenBridge};

mod receipt;
pub use receipt::{TransactionReceipt, TransactionRequest};

mod header;
pub use header::ArbHeaderInfo;

mod retryable;
pub use retryable::{
    eth_deposit_tx_id, extract_retryable_tickets, submit_retryable_id, EthDepositData,
    L1ToL2MessageStatus, RetryableDecodeError, RetryableKind, RetryableTicket,
    SubmitRetryableData,
};

mod outbox;
pub use outbox::{
    extract_outbox_messages, outbox_item_hash, L2ToL1MessageStatus, OutboxMessage, OutboxProof,
    SendMerkleTree, MAX_PROOF_LENGTH,
};
