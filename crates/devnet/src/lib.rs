#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use alloy_primitives::{Address, Log};
use alloy_sol_types::SolEvent;

mod addresses;
pub use addresses::{L1_CHAIN_ID, L2_CHAIN_ID, USER, VALIDATOR};

mod errors;
pub use errors::{ExecutionError, ExecutionResult};

mod chain;
mod token;
mod l1;
mod l2;

mod devnet;
pub use devnet::Devnet;

mod provider;
pub use provider::DevnetProvider;

mod tracing;
pub use tracing::{CapturedEvent, CollectingLayer, TraceStorage};

/// Builds the log `event` emitted by the contract at `address`.
pub(crate) fn emit<E: SolEvent>(address: Address, event: &E) -> Log {
    Log { address, data: event.encode_log_data() }
}

/// The function selector of `input`, zero if the input is shorter than four bytes.
pub(crate) fn selector(input: &[u8]) -> [u8; 4] {
    input.get(..4).and_then(|s| s.try_into().ok()).unwrap_or_default()
}
