//! Protocol constants shared by every child chain of the rollup.

use alloy_primitives::{address, Address};

/// The address of the `ArbSys` precompile.
pub const ARB_SYS_ADDRESS: Address = address!("0000000000000000000000000000000000000064");

/// The address of the `ArbRetryableTx` precompile.
pub const ARB_RETRYABLE_TX_ADDRESS: Address = address!("000000000000000000000000000000000000006e");

/// The address of the `NodeInterface` virtual contract.
pub const NODE_INTERFACE_ADDRESS: Address = address!("00000000000000000000000000000000000000c8");

/// The offset applied to a parent chain contract address when it acts as a sender on the child
/// chain.
pub const ADDRESS_ALIAS_OFFSET: Address = address!("1111000000000000000000000000000000001111");

/// Delayed inbox message kind of a retryable ticket submission.
pub const L1_MESSAGE_TYPE_SUBMIT_RETRYABLE_TX: u8 = 9;

/// Delayed inbox message kind of a plain ETH deposit.
pub const L1_MESSAGE_TYPE_ETH_DEPOSIT: u8 = 12;

/// EIP-2718 type byte of the child chain transaction that creates a retryable ticket.
pub const SUBMIT_RETRYABLE_TX_TYPE: u8 = 0x69;

/// EIP-2718 type byte of the child chain transaction that credits an ETH deposit.
pub const DEPOSIT_TX_TYPE: u8 = 0x64;

/// The default lifetime of a retryable ticket: seven days.
pub const DEFAULT_RETRYABLE_LIFETIME_SECONDS: u64 = 7 * 24 * 60 * 60;
