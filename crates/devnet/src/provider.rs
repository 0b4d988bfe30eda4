//! [ChainProvider] and [ChainSigner] over one side of a [Devnet].

use crate::{
    devnet::{DevnetState, Side},
    Devnet,
};
use alloy_consensus::Header;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use nitro_bridge_primitives::{TransactionReceipt, TransactionRequest};
use nitro_bridge_providers::{
    BlockTag, ChainProvider, ChainSigner, FilteredLog, LogFilter, ProviderError, ProviderResult,
};
use std::sync::MutexGuard;

/// A provider for one chain of a [Devnet], signing as a fixed account.
#[derive(Debug, Clone)]
pub struct DevnetProvider {
    devnet: Devnet,
    side: Side,
    address: Address,
}

impl DevnetProvider {
    pub(crate) const fn new(devnet: Devnet, side: Side, address: Address) -> Self {
        Self { devnet, side, address }
    }

    /// The devnet this provider serves.
    pub const fn devnet(&self) -> &Devnet {
        &self.devnet
    }

    fn online(&self) -> ProviderResult<MutexGuard<'_, DevnetState>> {
        let state = self.devnet.state();
        if state.offline {
            return Err(ProviderError::Transport("devnet offline".into()));
        }
        Ok(state)
    }
}

#[async_trait]
impl ChainProvider for DevnetProvider {
    async fn block_number(&self) -> ProviderResult<u64> {
        Ok(self.online()?.block_number(self.side))
    }

    async fn header_by_number(&self, number: u64) -> ProviderResult<Option<Header>> {
        Ok(self.online()?.header_by_number(self.side, number))
    }

    async fn header_by_hash(&self, hash: B256) -> ProviderResult<Option<Header>> {
        Ok(self.online()?.header_by_hash(self.side, hash))
    }

    async fn transaction_receipt(&self, hash: B256) -> ProviderResult<Option<TransactionReceipt>> {
        Ok(self.online()?.receipt(self.side, hash))
    }

    async fn get_logs(&self, filter: &LogFilter) -> ProviderResult<Vec<FilteredLog>> {
        let state = self.online()?;
        let to = match filter.to_block {
            BlockTag::Number(to) => to,
            BlockTag::Latest => state.block_number(self.side),
        };
        let from = filter.from_block;
        if state.log_range_limit.is_some_and(|limit| to.saturating_sub(from) + 1 > limit) {
            return Err(ProviderError::LogRangeTooLarge { from, to });
        }
        Ok(state.logs(self.side, filter, from, to))
    }

    async fn call(&self, to: Address, input: Bytes) -> ProviderResult<Bytes> {
        Ok(self.online()?.call(self.side, to, &input)?)
    }
}

#[async_trait]
impl ChainSigner for DevnetProvider {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transaction(&self, request: TransactionRequest) -> ProviderResult<B256> {
        Ok(self.online()?.send(self.side, self.address, request))
    }
}
