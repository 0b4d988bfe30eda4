//! Log filters and the logs they return.

use alloy_primitives::{Address, Log, B256};

/// The upper bound of a block range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockTag {
    /// A fixed block number.
    Number(u64),
    /// The chain head at the time of the query.
    #[default]
    Latest,
}

impl From<u64> for BlockTag {
    fn from(number: u64) -> Self {
        Self::Number(number)
    }
}

/// An `eth_getLogs` filter over one emitter and up to four topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// The emitting contract. Any emitter when unset.
    pub address: Option<Address>,
    /// Topic constraints by position. An unset position matches any topic.
    pub topics: [Option<B256>; 4],
    /// The first block of the range.
    pub from_block: u64,
    /// The last block of the range.
    pub to_block: BlockTag,
}

impl LogFilter {
    /// Creates a filter over the given block range.
    pub fn new(from_block: u64, to_block: impl Into<BlockTag>) -> Self {
        Self { from_block, to_block: to_block.into(), ..Default::default() }
    }

    /// Restricts the filter to logs emitted by `address`.
    pub const fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Restricts the filter to logs with the given event signature.
    pub const fn event(mut self, signature: B256) -> Self {
        self.topics[0] = Some(signature);
        self
    }

    /// Restricts indexed topic `position` (1 to 3) to `value`.
    pub const fn topic(mut self, position: usize, value: B256) -> Self {
        self.topics[position] = Some(value);
        self
    }

    /// Returns the filter with a fixed block range.
    pub fn with_range(&self, from_block: u64, to_block: u64) -> Self {
        Self { from_block, to_block: BlockTag::Number(to_block), ..self.clone() }
    }

    /// Whether `log`, emitted in block `block_number`, passes the filter.
    pub fn matches(&self, log: &Log, block_number: u64) -> bool {
        if block_number < self.from_block {
            return false;
        }
        if let BlockTag::Number(to) = self.to_block {
            if block_number > to {
                return false;
            }
        }
        if self.address.is_some_and(|address| address != log.address) {
            return false;
        }
        let topics = log.topics();
        self.topics.iter().enumerate().all(|(i, expected)| match expected {
            Some(expected) => topics.get(i) == Some(expected),
            None => true,
        })
    }
}

/// A log together with its position in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredLog {
    /// The log.
    pub log: Log,
    /// The block the log was emitted in.
    pub block_number: u64,
    /// The hash of that block.
    pub block_hash: B256,
    /// The transaction that emitted the log.
    pub transaction_hash: B256,
    /// The index of the log within its block.
    pub log_index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Bytes, LogData};

    fn log(topics: Vec<B256>) -> Log {
        Log {
            address: address!("00000000000000000000000000000000000000aa"),
            data: LogData::new_unchecked(topics, Bytes::new()),
        }
    }

    #[test]
    fn test_filter_matches_address_topics_and_range() {
        let sig = B256::repeat_byte(1);
        let sender = B256::repeat_byte(2);
        let filter = LogFilter::new(10, 20)
            .address(address!("00000000000000000000000000000000000000aa"))
            .event(sig)
            .topic(2, sender);

        assert!(filter.matches(&log(vec![sig, B256::ZERO, sender]), 15));
        assert!(!filter.matches(&log(vec![sig, B256::ZERO, sender]), 21));
        assert!(!filter.matches(&log(vec![sig, B256::ZERO, B256::ZERO]), 15));
        assert!(!filter.matches(&log(vec![sig]), 15));

        let mut foreign = log(vec![sig, B256::ZERO, sender]);
        foreign.address = Address::ZERO;
        assert!(!filter.matches(&foreign, 15));
    }

    #[test]
    fn test_latest_is_unbounded() {
        let filter = LogFilter::new(5, BlockTag::Latest);
        assert!(filter.matches(&log(vec![]), u64::MAX));
        assert!(!filter.matches(&log(vec![]), 4));
    }
}
