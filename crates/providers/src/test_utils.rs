//! Test utilities for provider consumers.

use crate::{ChainProvider, ChainSigner, FilteredLog, LogFilter, ProviderError, ProviderResult};
use alloy_consensus::Header;
use alloy_primitives::{keccak256, Address, Bytes, B256};
use async_trait::async_trait;
use nitro_bridge_primitives::{TransactionReceipt, TransactionRequest};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Debug, Default)]
struct MockState {
    head: u64,
    offline: bool,
    max_log_range: Option<u64>,
    headers: Vec<Header>,
    receipts: HashMap<B256, TransactionReceipt>,
    logs: Vec<FilteredLog>,
    calls: HashMap<(Address, Bytes), ProviderResult<Bytes>>,
    sent: Vec<TransactionRequest>,
    log_requests: Vec<(u64, u64)>,
}

/// A scripted [ChainProvider] and [ChainSigner].
///
/// Clones share state. Submitted transactions are mined immediately with a successful receipt
/// and no logs; anything richer is inserted explicitly.
#[derive(Debug, Clone, Default)]
pub struct MockChainProvider {
    address: Address,
    state: Arc<Mutex<MockState>>,
}

impl MockChainProvider {
    /// Creates a mock signing as `address`.
    pub fn with_address(address: Address) -> Self {
        Self { address, state: Default::default() }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets the chain head.
    pub fn set_head(&self, head: u64) {
        self.state().head = head;
    }

    /// Makes every request fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Rejects `getLogs` requests covering more than `limit` blocks.
    pub fn set_max_log_range(&self, limit: Option<u64>) {
        self.state().max_log_range = limit;
    }

    /// Inserts a header, served by number and by hash.
    pub fn insert_header(&self, header: Header) {
        self.state().headers.push(header);
    }

    /// Inserts a receipt.
    pub fn insert_receipt(&self, receipt: TransactionReceipt) {
        self.state().receipts.insert(receipt.transaction_hash, receipt);
    }

    /// Appends a log to the log index.
    pub fn push_log(&self, log: FilteredLog) {
        self.state().logs.push(log);
    }

    /// Scripts the answer to `call(to, input)`.
    pub fn mock_call(&self, to: Address, input: impl Into<Bytes>, result: ProviderResult<Bytes>) {
        self.state().calls.insert((to, input.into()), result);
    }

    /// The transactions submitted so far.
    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.state().sent.clone()
    }

    /// The block ranges of every `getLogs` request served so far.
    pub fn log_requests(&self) -> Vec<(u64, u64)> {
        self.state().log_requests.clone()
    }

    fn online(&self) -> ProviderResult<MutexGuard<'_, MockState>> {
        let state = self.state();
        if state.offline {
            return Err(ProviderError::Transport("mock provider offline".into()));
        }
        Ok(state)
    }
}

#[async_trait]
impl ChainProvider for MockChainProvider {
    async fn block_number(&self) -> ProviderResult<u64> {
        Ok(self.online()?.head)
    }

    async fn header_by_number(&self, number: u64) -> ProviderResult<Option<Header>> {
        Ok(self.online()?.headers.iter().find(|h| h.number == number).cloned())
    }

    async fn header_by_hash(&self, hash: B256) -> ProviderResult<Option<Header>> {
        Ok(self.online()?.headers.iter().find(|h| h.hash_slow() == hash).cloned())
    }

    async fn transaction_receipt(&self, hash: B256) -> ProviderResult<Option<TransactionReceipt>> {
        Ok(self.online()?.receipts.get(&hash).cloned())
    }

    async fn get_logs(&self, filter: &LogFilter) -> ProviderResult<Vec<FilteredLog>> {
        let mut state = self.online()?;
        let to = match filter.to_block {
            crate::BlockTag::Number(to) => to,
            crate::BlockTag::Latest => state.head,
        };
        state.log_requests.push((filter.from_block, to));
        if state.max_log_range.is_some_and(|limit| to.saturating_sub(filter.from_block) + 1 > limit)
        {
            return Err(ProviderError::LogRangeTooLarge { from: filter.from_block, to });
        }
        let filter = filter.with_range(filter.from_block, to);
        Ok(state.logs.iter().filter(|l| filter.matches(&l.log, l.block_number)).cloned().collect())
    }

    async fn call(&self, to: Address, input: Bytes) -> ProviderResult<Bytes> {
        self.online()?
            .calls
            .get(&(to, input))
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::Reverted(Bytes::new())))
    }
}

#[async_trait]
impl ChainSigner for MockChainProvider {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transaction(&self, request: TransactionRequest) -> ProviderResult<B256> {
        let mut state = self.online()?;
        let nonce = state.sent.len() as u64;
        let hash = keccak256([self.address.as_slice(), nonce.to_be_bytes().as_slice()].concat());
        state.head += 1;
        let receipt = TransactionReceipt {
            transaction_hash: hash,
            block_hash: keccak256(state.head.to_be_bytes()),
            block_number: state.head,
            from: self.address,
            to: Some(request.to),
            status: true,
            logs: Vec::new(),
        };
        state.receipts.insert(hash, receipt);
        state.sent.push(request);
        Ok(hash)
    }
}
