//! The chain access traits.

use crate::{FilteredLog, LogFilter, ProviderResult};
use alloy_consensus::Header;
use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use nitro_bridge_primitives::{TransactionReceipt, TransactionRequest};

/// Describes the read surface of one chain.
///
/// Lookups that can legitimately miss return `Ok(None)`; an `Err` always means the provider could
/// not answer.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Returns the number of the chain head.
    async fn block_number(&self) -> ProviderResult<u64>;

    /// Fetch the [Header] at the given number.
    async fn header_by_number(&self, number: u64) -> ProviderResult<Option<Header>>;

    /// Fetch the [Header] with the given hash.
    async fn header_by_hash(&self, hash: B256) -> ProviderResult<Option<Header>>;

    /// Fetch the receipt of a mined transaction.
    async fn transaction_receipt(&self, hash: B256) -> ProviderResult<Option<TransactionReceipt>>;

    /// Returns the logs matching `filter`, ordered by block and log index.
    async fn get_logs(&self, filter: &LogFilter) -> ProviderResult<Vec<FilteredLog>>;

    /// Executes a read-only call against the chain head.
    async fn call(&self, to: Address, input: Bytes) -> ProviderResult<Bytes>;

    /// Executes the ABI encoded `call` against `to` and decodes its return values.
    async fn call_sol<C>(&self, to: Address, call: C) -> ProviderResult<C::Return>
    where
        C: SolCall + Send + 'static,
        Self: Sized,
    {
        let output = self.call(to, call.abi_encode().into()).await?;
        Ok(C::abi_decode_returns(&output, true)?)
    }
}

/// Describes a chain account able to submit transactions.
#[async_trait]
pub trait ChainSigner: ChainProvider {
    /// The address transactions are sent from.
    fn address(&self) -> Address;

    /// Signs and submits `request`, returning the transaction hash.
    async fn send_transaction(&self, request: TransactionRequest) -> ProviderResult<B256>;
}
