//! Chain-agnostic transaction receipt and request types.

use alloy_primitives::{Address, Bytes, Log, B256, U256};

/// A mined transaction as reported by a chain provider.
///
/// `logs` are kept in emission order; a log's position in the vector is its index within the
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct TransactionReceipt {
    /// The hash of the transaction.
    pub transaction_hash: B256,
    /// The hash of the block the transaction was included in.
    pub block_hash: B256,
    /// The number of the block the transaction was included in.
    pub block_number: u64,
    /// The sender of the transaction.
    pub from: Address,
    /// The recipient of the transaction, if it was not a contract creation.
    pub to: Option<Address>,
    /// Whether the transaction executed successfully.
    pub status: bool,
    /// The logs emitted by the transaction.
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    /// Returns the logs emitted by `address`, keeping their original order.
    pub fn logs_from(&self, address: Address) -> impl Iterator<Item = &Log> {
        self.logs.iter().filter(move |log| log.address == address)
    }
}

/// A transaction to be signed and submitted by a chain signer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    /// The recipient of the call.
    pub to: Address,
    /// The calldata.
    pub input: Bytes,
    /// The value attached to the call.
    pub value: U256,
    /// An explicit gas limit. The signer estimates one when unset.
    pub gas_limit: Option<u64>,
}

impl TransactionRequest {
    /// Creates a call to `to` with the given calldata and no value.
    pub fn call(to: Address, input: impl Into<Bytes>) -> Self {
        Self { to, input: input.into(), ..Default::default() }
    }

    /// Attaches `value` to the request.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets an explicit gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}
