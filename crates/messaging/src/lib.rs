#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod errors;
pub use errors::{BridgeError, BridgeResult, FailedMessage};

mod providers;
pub use providers::BridgeProviders;

mod oracle;
pub use oracle::{
    ConfirmedSend, MessageStatusOracle, RedeemLookup, RetryableWaitResult, StatusOracle,
};

mod wait;
pub use wait::{wait_for_status, wait_for_status_with};

mod retryable;
pub use retryable::RetryableTicketManager;

mod outbox;
pub use outbox::{OutboxMessageManager, WithdrawalEvent};
