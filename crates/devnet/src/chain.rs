//! A single automining chain: blocks, receipts and the log index.

use alloy_consensus::Header;
use alloy_primitives::{keccak256, Address, Log, B256, U256};
use nitro_bridge_primitives::{ArbHeaderInfo, TransactionReceipt};
use nitro_bridge_providers::{FilteredLog, LogFilter};
use std::collections::HashMap;

/// The timestamp of both genesis blocks.
pub(crate) const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
struct Block {
    header: Header,
    hash: B256,
    transactions: Vec<B256>,
}

/// A transaction about to be mined.
#[derive(Debug)]
pub(crate) struct MinedTx {
    pub(crate) hash: B256,
    pub(crate) from: Address,
    pub(crate) to: Address,
    pub(crate) status: bool,
    pub(crate) logs: Vec<Log>,
}

#[derive(Debug)]
pub(crate) struct Chain {
    chain_id: u64,
    blocks: Vec<Block>,
    receipts: HashMap<B256, TransactionReceipt>,
    nonces: HashMap<Address, u64>,
    pending_time: u64,
}

impl Chain {
    pub(crate) fn new(chain_id: u64, genesis_info: Option<ArbHeaderInfo>) -> Self {
        let mut header = Header { timestamp: GENESIS_TIMESTAMP, ..Default::default() };
        if let Some(info) = genesis_info {
            info.apply(&mut header);
        }
        let hash = header.hash_slow();
        Self {
            chain_id,
            blocks: vec![Block { header, hash, transactions: Vec::new() }],
            receipts: HashMap::new(),
            nonces: HashMap::new(),
            pending_time: 0,
        }
    }

    pub(crate) fn head_number(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    pub(crate) fn next_number(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn head(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub(crate) fn head_hash(&self) -> B256 {
        self.head().hash
    }

    pub(crate) fn head_timestamp(&self) -> u64 {
        self.head().header.timestamp
    }

    /// The timestamp the next block will carry.
    pub(crate) fn next_timestamp(&self) -> u64 {
        self.head_timestamp() + 1 + self.pending_time
    }

    /// Pushes the timestamp of the next block `seconds` further.
    pub(crate) fn advance_time(&mut self, seconds: u64) {
        self.pending_time += seconds;
    }

    /// Derives the hash of the next transaction sent by `from`.
    pub(crate) fn next_tx_hash(&mut self, from: Address) -> B256 {
        let nonce = self.nonces.entry(from).or_default();
        let hash = keccak256(
            [
                self.chain_id.to_be_bytes().as_slice(),
                from.as_slice(),
                nonce.to_be_bytes().as_slice(),
            ]
            .concat(),
        );
        *nonce += 1;
        hash
    }

    /// Mines `tx` alone in a new block. Child chain blocks carry `info` in their header.
    pub(crate) fn mine(&mut self, tx: MinedTx, info: Option<ArbHeaderInfo>) -> TransactionReceipt {
        let (block_hash, block_number) = self.seal(vec![tx.hash], info);
        let receipt = TransactionReceipt {
            transaction_hash: tx.hash,
            block_hash,
            block_number,
            from: tx.from,
            to: Some(tx.to),
            status: tx.status,
            logs: if tx.status { tx.logs } else { Vec::new() },
        };
        self.receipts.insert(tx.hash, receipt.clone());
        receipt
    }

    /// Mines a block without transactions.
    pub(crate) fn mine_empty(&mut self, info: Option<ArbHeaderInfo>) {
        self.seal(Vec::new(), info);
    }

    fn seal(&mut self, transactions: Vec<B256>, info: Option<ArbHeaderInfo>) -> (B256, u64) {
        let mut header = Header {
            parent_hash: self.head().hash,
            number: self.next_number(),
            timestamp: self.next_timestamp(),
            ..Default::default()
        };
        if let Some(info) = info {
            info.apply(&mut header);
        }
        let hash = header.hash_slow();
        let number = header.number;
        self.pending_time = 0;
        self.blocks.push(Block { header, hash, transactions });
        (hash, number)
    }

    pub(crate) fn header_by_number(&self, number: u64) -> Option<Header> {
        self.blocks.get(number as usize).map(|block| block.header.clone())
    }

    pub(crate) fn header_by_hash(&self, hash: B256) -> Option<Header> {
        self.blocks.iter().find(|block| block.hash == hash).map(|block| block.header.clone())
    }

    pub(crate) fn receipt(&self, hash: B256) -> Option<TransactionReceipt> {
        self.receipts.get(&hash).cloned()
    }

    /// Returns the logs matching `filter` between `from` and `to`, in chain order.
    pub(crate) fn logs(&self, filter: &LogFilter, from: u64, to: u64) -> Vec<FilteredLog> {
        let mut logs = Vec::new();
        let last = to.min(self.head_number());
        for number in from..=last {
            let block = &self.blocks[number as usize];
            let mut log_index = 0u64;
            for tx in &block.transactions {
                let Some(receipt) = self.receipts.get(tx) else { continue };
                for log in &receipt.logs {
                    if filter.matches(log, number) {
                        logs.push(FilteredLog {
                            log: log.clone(),
                            block_number: number,
                            block_hash: block.hash,
                            transaction_hash: *tx,
                            log_index,
                        });
                    }
                    log_index += 1;
                }
            }
        }
        logs
    }

    /// Replaces block `number` with a sibling and re-links every later block onto it.
    pub(crate) fn reorg(&mut self, number: u64) {
        let start = number as usize;
        if start == 0 || start >= self.blocks.len() {
            return;
        }
        self.blocks[start].header.difficulty += U256::from(1);
        for i in start..self.blocks.len() {
            let parent_hash = self.blocks[i - 1].hash;
            let block = &mut self.blocks[i];
            block.header.parent_hash = parent_hash;
            block.hash = block.header.hash_slow();
            for tx in &block.transactions {
                if let Some(receipt) = self.receipts.get_mut(tx) {
                    receipt.block_hash = block.hash;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Bytes, LogData};

    fn tx(chain: &mut Chain, topic: u8) -> MinedTx {
        let from = address!("00000000000000000000000000000000000000f1");
        MinedTx {
            hash: chain.next_tx_hash(from),
            from,
            to: Address::ZERO,
            status: true,
            logs: vec![Log {
                address: Address::ZERO,
                data: LogData::new_unchecked(vec![B256::repeat_byte(topic)], Bytes::new()),
            }],
        }
    }

    #[test]
    fn test_one_block_per_transaction_and_linked_headers() {
        let mut chain = Chain::new(1, None);
        let first = tx(&mut chain, 1);
        let first = chain.mine(first, None);
        let second = tx(&mut chain, 2);
        let second = chain.mine(second, None);

        assert_eq!((first.block_number, second.block_number), (1, 2));
        assert_ne!(first.transaction_hash, second.transaction_hash);
        let header = chain.header_by_number(2).unwrap();
        assert_eq!(header.parent_hash, first.block_hash);
        assert_eq!(header.timestamp, GENESIS_TIMESTAMP + 2);
    }

    #[test]
    fn test_logs_filtered_by_range_and_topic() {
        let mut chain = Chain::new(1, None);
        for topic in [1, 2, 1] {
            let tx = tx(&mut chain, topic);
            chain.mine(tx, None);
        }
        let filter = LogFilter::new(0, 3).event(B256::repeat_byte(1));
        let logs = chain.logs(&filter, 0, 3);
        assert_eq!(logs.iter().map(|l| l.block_number).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(chain.logs(&filter, 2, 2).len(), 0);
    }

    #[test]
    fn test_reorg_replaces_block_hash() {
        let mut chain = Chain::new(1, None);
        let tx = tx(&mut chain, 1);
        let receipt = chain.mine(tx, None);
        chain.mine_empty(None);

        chain.reorg(1);
        assert!(chain.header_by_hash(receipt.block_hash).is_none());
        let moved = chain.receipt(receipt.transaction_hash).unwrap();
        assert_ne!(moved.block_hash, receipt.block_hash);
        assert_eq!(chain.header_by_number(2).unwrap().parent_hash, moved.block_hash);
    }

    #[test]
    fn test_advanced_time_applies_to_next_block() {
        let mut chain = Chain::new(1, None);
        chain.advance_time(100);
        chain.mine_empty(None);
        assert_eq!(chain.head_timestamp(), GENESIS_TIMESTAMP + 101);
    }
}
